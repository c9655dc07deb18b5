//! Loads settings from JSON, wires a bearer-auth chain, and calls a mocked registry endpoint
//! twice while the token endpoint is only contacted once.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use registry_oauth::{
	config::Settings,
	http::ReqwestHttpClient,
	http_types::{Method, Request},
	intercept::Chain,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").query_param("aud", "registry");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"tok123\",\"expires_in\":3600}",
			);
		})
		.await;
	let registry_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/eureka/apps").header("authorization", "Bearer tok123");
			then.status(200).header("content-type", "application/xml").body("<applications/>");
		})
		.await;
	let settings = Settings::from_json_str(&format!(
		r#"{{
			"client_id": "abc",
			"client_secret": "xyz",
			"scopes": "registry.read,registry.write",
			"token_endpoint": "{}",
			"audience": "registry",
			"request_timeout_secs": 5
		}}"#,
		server.url("/token"),
	))?;
	let chain = Chain::builder(ReqwestHttpClient::with_timeout(settings.request_timeout())?)
		.bearer_auth_from_settings(&settings)?
		.build();

	for _ in 0..2 {
		let request = Request::builder()
			.method(Method::GET)
			.uri(server.url("/eureka/apps"))
			.body(Vec::new())?;
		let response = chain.execute(request).await?;

		println!(
			"Registry answered {} with {}.",
			response.status(),
			String::from_utf8_lossy(response.body())
		);
	}

	token_mock.assert_calls_async(1).await;
	registry_mock.assert_calls_async(2).await;

	Ok(())
}
