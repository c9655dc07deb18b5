//! OAuth 2.0 client-credentials bearer auth for service-registry clients.
//!
//! Tokens are cached and refreshed single-flight, then attached to outgoing requests by an
//! immutable interceptor chain that fails closed when no token can be obtained.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod intercept;
pub mod oauth;
pub mod obs;
pub mod provider;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
#[doc(hidden)]
pub mod _preludet {
	//! Test-only re-exports and helpers; enabled by the `test` feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{Credentials, ScopeSet},
		http::ReqwestHttpClient,
		provider::{ReqwestClientCredentialsProvider, RefreshPolicy},
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Builds credentials pointing at `token_endpoint` with the provided audience and scopes.
	pub fn test_credentials(
		token_endpoint: &str,
		client_id: &str,
		client_secret: &str,
		audience: &str,
		scopes: &str,
	) -> Credentials {
		Credentials::builder(client_id, client_secret)
			.token_endpoint(Url::parse(token_endpoint).expect("Test token endpoint should parse."))
			.audience(audience)
			.scopes(ScopeSet::from_comma_separated(scopes).expect("Test scopes should parse."))
			.build()
			.expect("Test credentials should build.")
	}

	/// Constructs a [`ReqwestClientCredentialsProvider`] backed by the insecure test transport.
	pub fn build_reqwest_test_provider(
		credentials: Credentials,
		policy: RefreshPolicy,
	) -> ReqwestClientCredentialsProvider {
		ReqwestClientCredentialsProvider::with_http_client(
			credentials,
			test_reqwest_http_client(),
			crate::oauth::ReqwestTransportErrorMapper,
		)
		.expect("Test provider should build.")
		.with_refresh_policy(policy)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2::{HttpRequest, HttpResponse, http as http_types};
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tokio as _};
