//! Interceptor that attaches `Authorization: Bearer <token>` to every request.

// crates.io
use oauth2::http::header::AUTHORIZATION;
// self
use crate::{
	_prelude::*,
	HttpRequest,
	intercept::{InterceptFuture, Interceptor, Next},
	obs::{self, OpKind},
	provider::TokenProvider,
};

/// Fetches a token from a [`TokenProvider`] and sets the `Authorization` header.
///
/// Any existing `Authorization` value is replaced. When no token can be obtained the request
/// is never forwarded and the provider's error is returned instead.
pub struct BearerAuthInterceptor<P>
where
	P: ?Sized + TokenProvider,
{
	provider: Arc<P>,
}
impl<P> BearerAuthInterceptor<P>
where
	P: ?Sized + TokenProvider,
{
	/// Wraps a shared provider.
	pub fn new(provider: Arc<P>) -> Self {
		Self { provider }
	}

	/// Provider consulted for each request.
	pub fn provider(&self) -> &Arc<P> {
		&self.provider
	}

	async fn authorize(&self, mut request: HttpRequest) -> Result<HttpRequest> {
		let token = self.provider.get_token().await?;

		request.headers_mut().insert(AUTHORIZATION, token.authorization()?);

		Ok(request)
	}
}
impl<P> Interceptor for BearerAuthInterceptor<P>
where
	P: ?Sized + TokenProvider,
{
	fn handle<'a>(&'a self, request: HttpRequest, next: Next<'a>) -> InterceptFuture<'a> {
		Box::pin(async move {
			let subject = format!("{} {}", request.method(), request.uri().path());
			let authorized =
				obs::observe(OpKind::Intercept, "bearer", &subject, self.authorize(request)).await;

			next.run(authorized?).await
		})
	}
}
impl<P> Clone for BearerAuthInterceptor<P>
where
	P: ?Sized + TokenProvider,
{
	fn clone(&self) -> Self {
		Self { provider: self.provider.clone() }
	}
}
impl<P> Debug for BearerAuthInterceptor<P>
where
	P: ?Sized + TokenProvider,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("BearerAuthInterceptor(..)")
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use oauth2::http::HeaderValue;
	// self
	use super::*;
	use crate::{
		HttpResponse,
		auth::Token,
		error::AuthError,
		intercept::{Chain, RequestExecutor},
		provider::TokenFuture,
	};

	struct StaticProvider(&'static str);
	impl TokenProvider for StaticProvider {
		fn get_token(&self) -> TokenFuture<'_> {
			let value = self.0;

			Box::pin(async move {
				Ok(Token::new(value, OffsetDateTime::now_utc(), Duration::minutes(5))?)
			})
		}
	}

	struct FailingProvider;
	impl TokenProvider for FailingProvider {
		fn get_token(&self) -> TokenFuture<'_> {
			Box::pin(async {
				Err(AuthError::Rejected {
					status: Some(401),
					error: Some("invalid_client".into()),
					reason: "invalid_client".into(),
					retry_after: None,
				}
				.into())
			})
		}
	}

	#[derive(Default)]
	struct Recorder {
		calls: AtomicUsize,
		authorization: Mutex<Vec<String>>,
	}
	impl RequestExecutor for Recorder {
		fn execute(&self, request: HttpRequest) -> InterceptFuture<'_> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.authorization.lock().extend(
				request
					.headers()
					.get_all(AUTHORIZATION)
					.iter()
					.filter_map(|value| value.to_str().ok().map(str::to_owned)),
			);

			Box::pin(async { Ok(HttpResponse::new(Vec::new())) })
		}
	}

	#[tokio::test]
	async fn sets_bearer_header_from_provider() {
		let recorder = Arc::new(Recorder::default());
		let chain =
			Chain::builder(recorder.clone()).bearer_auth(Arc::new(StaticProvider("tok123"))).build();

		chain.execute(HttpRequest::new(Vec::new())).await.expect("Request should be forwarded.");

		assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
		assert_eq!(recorder.authorization.lock().as_slice(), ["Bearer tok123"]);
	}

	#[tokio::test]
	async fn replaces_existing_authorization() {
		let recorder = Arc::new(Recorder::default());
		let chain =
			Chain::builder(recorder.clone()).bearer_auth(Arc::new(StaticProvider("fresh"))).build();
		let mut request = HttpRequest::new(Vec::new());

		request.headers_mut().insert(AUTHORIZATION, HeaderValue::from_static("Basic c3RhbGU="));
		chain.execute(request).await.expect("Request should be forwarded.");

		assert_eq!(recorder.authorization.lock().as_slice(), ["Bearer fresh"]);
	}

	#[tokio::test]
	async fn provider_failure_blocks_the_request() {
		let recorder = Arc::new(Recorder::default());
		let chain = Chain::builder(recorder.clone()).bearer_auth(Arc::new(FailingProvider)).build();
		let err = chain
			.execute(HttpRequest::new(Vec::new()))
			.await
			.expect_err("Provider failure must surface.");

		assert_eq!(err.as_auth().and_then(AuthError::status), Some(401));
		assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn header_value_is_marked_sensitive() {
		struct Inspect;
		impl RequestExecutor for Inspect {
			fn execute(&self, request: HttpRequest) -> InterceptFuture<'_> {
				let sensitive = request
					.headers()
					.get(AUTHORIZATION)
					.is_some_and(HeaderValue::is_sensitive);

				Box::pin(async move {
					assert!(sensitive);

					Ok(HttpResponse::new(Vec::new()))
				})
			}
		}

		Chain::builder(Inspect)
			.bearer_auth(Arc::new(StaticProvider("tok123")))
			.build()
			.execute(HttpRequest::new(Vec::new()))
			.await
			.expect("Request should be forwarded.");
	}
}
