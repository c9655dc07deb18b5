//! Ordered request interceptor chains.
//!
//! A [`Chain`] is an immutable slice of [`Interceptor`]s that ends in one [`RequestExecutor`].
//! Interceptors never hold a reference to "the next handler"; instead each invocation
//! receives a [`Next`] cursor over the remaining slice, so the chain is fixed once
//! [`ChainBuilder::build`] runs and can be shared across tasks without coordination.

pub mod bearer;

pub use bearer::*;

// self
use crate::{_prelude::*, HttpRequest, HttpResponse, provider::TokenProvider};
#[cfg(feature = "reqwest")]
use crate::{config::Settings, provider::ReqwestClientCredentialsProvider};

/// Boxed future returned by interceptors and executors.
pub type InterceptFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse>> + 'a + Send>>;

/// Terminal handler that actually sends a request.
pub trait RequestExecutor
where
	Self: Send + Sync,
{
	/// Sends `request` and returns the response.
	fn execute(&self, request: HttpRequest) -> InterceptFuture<'_>;
}
impl<E> RequestExecutor for Arc<E>
where
	E: ?Sized + RequestExecutor,
{
	fn execute(&self, request: HttpRequest) -> InterceptFuture<'_> {
		E::execute(self, request)
	}
}

/// One step in a [`Chain`].
pub trait Interceptor
where
	Self: Send + Sync,
{
	/// Processes `request`, usually finishing with `next.run(request)`.
	///
	/// Returning without calling `next` short-circuits the chain; nothing downstream sees the
	/// request.
	fn handle<'a>(&'a self, request: HttpRequest, next: Next<'a>) -> InterceptFuture<'a>;
}

/// Cursor over the interceptors that have not yet seen the request.
#[derive(Clone, Copy)]
pub struct Next<'a> {
	interceptors: &'a [Arc<dyn Interceptor>],
	executor: &'a dyn RequestExecutor,
}
impl<'a> Next<'a> {
	/// Forwards to the next interceptor, or to the executor when none remain.
	pub fn run(self, request: HttpRequest) -> InterceptFuture<'a> {
		match self.interceptors.split_first() {
			Some((head, rest)) =>
				head.handle(request, Next { interceptors: rest, executor: self.executor }),
			None => self.executor.execute(request),
		}
	}

	/// Number of interceptors still ahead of the executor.
	pub fn remaining(&self) -> usize {
		self.interceptors.len()
	}
}
impl Debug for Next<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Next").field("remaining", &self.interceptors.len()).finish()
	}
}

/// Immutable interceptor chain terminated by a [`RequestExecutor`].
#[derive(Clone)]
pub struct Chain {
	interceptors: Arc<[Arc<dyn Interceptor>]>,
	executor: Arc<dyn RequestExecutor>,
}
impl Chain {
	/// Starts a chain that ends in `executor`.
	pub fn builder(executor: impl RequestExecutor + 'static) -> ChainBuilder {
		ChainBuilder { interceptors: Vec::new(), executor: Arc::new(executor) }
	}

	/// Runs `request` through every interceptor in registration order, then the executor.
	pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
		Next { interceptors: &self.interceptors, executor: self.executor.as_ref() }
			.run(request)
			.await
	}

	/// Number of registered interceptors.
	pub fn len(&self) -> usize {
		self.interceptors.len()
	}

	/// Returns true when requests go straight to the executor.
	pub fn is_empty(&self) -> bool {
		self.interceptors.is_empty()
	}
}
impl RequestExecutor for Chain {
	fn execute(&self, request: HttpRequest) -> InterceptFuture<'_> {
		Box::pin(Chain::execute(self, request))
	}
}
impl Debug for Chain {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Chain").field("interceptors", &self.interceptors.len()).finish()
	}
}

/// Collects interceptors before they are frozen into a [`Chain`].
pub struct ChainBuilder {
	interceptors: Vec<Arc<dyn Interceptor>>,
	executor: Arc<dyn RequestExecutor>,
}
impl ChainBuilder {
	/// Appends an interceptor; it runs after every interceptor added before it.
	pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
		self.interceptors.push(Arc::new(interceptor));

		self
	}

	/// Appends a shared interceptor.
	pub fn shared_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
		self.interceptors.push(interceptor);

		self
	}

	/// Appends a [`BearerAuthInterceptor`] backed by `provider`.
	pub fn bearer_auth<P>(self, provider: Arc<P>) -> Self
	where
		P: 'static + ?Sized + TokenProvider,
	{
		self.interceptor(BearerAuthInterceptor::new(provider))
	}

	/// Appends bearer auth configured by `settings`, or nothing when they are disabled.
	#[cfg(feature = "reqwest")]
	pub fn bearer_auth_from_settings(self, settings: &Settings) -> Result<Self> {
		if !settings.is_enabled() {
			return Ok(self);
		}

		let provider = ReqwestClientCredentialsProvider::from_settings(settings)?;

		Ok(self.bearer_auth(Arc::new(provider)))
	}

	/// Freezes the interceptor order.
	pub fn build(self) -> Chain {
		Chain { interceptors: self.interceptors.into(), executor: self.executor }
	}
}
impl Debug for ChainBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ChainBuilder").field("interceptors", &self.interceptors.len()).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::http_types::{HeaderValue, Method, StatusCode};

	struct Tag(&'static str);
	impl Interceptor for Tag {
		fn handle<'a>(&'a self, mut request: HttpRequest, next: Next<'a>) -> InterceptFuture<'a> {
			request.headers_mut().append("x-trace", HeaderValue::from_static(self.0));

			next.run(request)
		}
	}

	struct Reject;
	impl Interceptor for Reject {
		fn handle<'a>(&'a self, _request: HttpRequest, _next: Next<'a>) -> InterceptFuture<'a> {
			Box::pin(async {
				let mut response = HttpResponse::new(Vec::new());

				*response.status_mut() = StatusCode::FORBIDDEN;

				Ok(response)
			})
		}
	}

	#[derive(Default)]
	struct Echo {
		calls: Mutex<Vec<Vec<String>>>,
	}
	impl RequestExecutor for Echo {
		fn execute(&self, request: HttpRequest) -> InterceptFuture<'_> {
			let trace = request
				.headers()
				.get_all("x-trace")
				.iter()
				.filter_map(|value| value.to_str().ok().map(str::to_owned))
				.collect::<Vec<_>>();

			self.calls.lock().push(trace.clone());

			Box::pin(async move { Ok(HttpResponse::new(trace.join(",").into_bytes())) })
		}
	}

	fn request() -> HttpRequest {
		let mut request = HttpRequest::new(Vec::new());

		*request.method_mut() = Method::PUT;

		request
	}

	#[tokio::test]
	async fn interceptors_run_in_registration_order() {
		let echo = Arc::new(Echo::default());
		let chain = Chain::builder(echo.clone())
			.interceptor(Tag("first"))
			.interceptor(Tag("second"))
			.build();
		let response = chain.execute(request()).await.expect("Chain should succeed.");

		assert_eq!(chain.len(), 2);
		assert_eq!(response.body().as_slice(), b"first,second");
		assert_eq!(echo.calls.lock().len(), 1);
	}

	#[tokio::test]
	async fn empty_chain_executes_directly() {
		let echo = Arc::new(Echo::default());
		let chain = Chain::builder(echo.clone()).build();

		assert!(chain.is_empty());

		chain.execute(request()).await.expect("Executor should be reached directly.");

		assert_eq!(echo.calls.lock().as_slice(), &[Vec::<String>::new()]);
	}

	#[tokio::test]
	async fn short_circuit_skips_downstream() {
		let echo = Arc::new(Echo::default());
		let chain = Chain::builder(echo.clone())
			.interceptor(Reject)
			.interceptor(Tag("never"))
			.build();
		let response = chain.execute(request()).await.expect("Reject returns a response.");

		assert_eq!(response.status(), StatusCode::FORBIDDEN);
		assert!(echo.calls.lock().is_empty());
	}

	#[cfg(feature = "reqwest")]
	#[test]
	fn disabled_settings_install_no_interceptor() {
		let settings = Settings::from_json_str(
			r#"{"client_id":"","client_secret":"","scopes":[],"token_endpoint":"http://127.0.0.1:1/token","enabled":false}"#,
		)
		.expect("Disabled settings skip credential validation.");
		let chain = Chain::builder(Echo::default())
			.bearer_auth_from_settings(&settings)
			.expect("Disabled settings should not fail.")
			.build();

		assert!(chain.is_empty());
	}

	#[tokio::test]
	async fn chains_nest_as_executors() {
		let echo = Arc::new(Echo::default());
		let inner = Chain::builder(echo.clone()).interceptor(Tag("inner")).build();
		let outer = Chain::builder(inner).interceptor(Tag("outer")).build();
		let response = outer.execute(request()).await.expect("Nested chain should succeed.");

		assert_eq!(response.body().as_slice(), b"outer,inner");
	}
}
