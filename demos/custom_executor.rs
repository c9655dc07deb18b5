//! Plugs a caller-defined executor and interceptor around the bearer interceptor, and shows
//! that a failing token endpoint keeps requests from leaving the process.

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use registry_oauth::{
	HttpRequest,
	auth::{Credentials, ScopeSet},
	http::ReqwestHttpClient,
	http_types::{HeaderValue, Method, Request},
	intercept::{Chain, InterceptFuture, Interceptor, Next, RequestExecutor},
	provider::{ReqwestClientCredentialsProvider, TokenProvider},
};

/// Counts requests before handing them to reqwest.
struct CountingExecutor {
	inner: ReqwestHttpClient,
	sent: AtomicUsize,
}
impl RequestExecutor for CountingExecutor {
	fn execute(&self, request: HttpRequest) -> InterceptFuture<'_> {
		self.sent.fetch_add(1, Ordering::SeqCst);

		self.inner.execute(request)
	}
}

/// Tags every request with the calling service.
struct ServiceTag(&'static str);
impl Interceptor for ServiceTag {
	fn handle<'a>(&'a self, mut request: HttpRequest, next: Next<'a>) -> InterceptFuture<'a> {
		request.headers_mut().insert("x-service-name", HeaderValue::from_static(self.0));

		next.run(request)
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_client\",\"error_description\":\"unknown client\"}");
		})
		.await;
	let credentials = Credentials::builder("abc", "wrong-secret")
		.token_endpoint(Url::parse(&server.url("/token"))?)
		.scopes(ScopeSet::new(["registry.read"])?)
		.audience("registry")
		.build()?;
	let provider = Arc::new(ReqwestClientCredentialsProvider::new(credentials)?);
	let executor = Arc::new(CountingExecutor {
		inner: ReqwestHttpClient::with_timeout(None)?,
		sent: AtomicUsize::new(0),
	});
	let chain = Chain::builder(executor.clone())
		.interceptor(ServiceTag("inventory"))
		.bearer_auth(provider.clone())
		.build();
	let request =
		Request::builder().method(Method::PUT).uri(server.url("/eureka/apps/INVENTORY")).body(
			b"<instance/>".to_vec(),
		)?;

	match chain.execute(request).await {
		Ok(response) => println!("Unexpected success: {}.", response.status()),
		Err(e) => println!("Request blocked: {e}."),
	}

	println!("Requests that reached the executor: {}.", executor.sent.load(Ordering::SeqCst));

	if let Err(e) = provider.get_token().await {
		println!("Direct token call also fails: {e}.");
	}

	token_mock.assert_calls_async(2).await;

	Ok(())
}
