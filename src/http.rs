//! HTTP transports for the token endpoint and the terminal request executor.
//!
//! [`TokenHttpClient`] is the only dependency the token exchange has on an HTTP stack.
//! Each exchange receives a fresh [`ResponseMetadataSlot`]; the transport records the
//! status and Retry-After hint there so failures can be classified into
//! [`AuthError`](crate::error::AuthError) variants with consistent metadata.
//!
//! With the `reqwest` feature, [`ReqwestHttpClient`] serves both roles: it backs token
//! exchanges and it implements [`RequestExecutor`] so it can terminate an interceptor chain.

// crates.io
use oauth2::{AsyncHttpClient, HttpClientError};
#[cfg(feature = "reqwest")] use reqwest::header::{HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, HttpRequest, HttpResponse};
#[cfg(feature = "reqwest")]
use crate::{
	error::DispatchError,
	intercept::{InterceptFuture, RequestExecutor},
};

/// Transport capable of executing token exchanges while publishing response metadata.
///
/// Implementations must be `Send + Sync + 'static` so one transport can back a provider
/// shared across tasks, and the handles they return must own whatever state their request
/// futures need so those futures stay `Send`.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds a handle that records outcomes in `slot`.
	///
	/// Call [`ResponseMetadataSlot::take`] before dispatching so stale data never leaks
	/// across attempts, then [`ResponseMetadataSlot::store`] once a status is known.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Metadata from the most recent token endpoint response.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the token endpoint, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Thin wrapper around [`ReqwestClient`] shared by token exchanges and request execution.
///
/// Token requests should not follow redirects; configure any custom client accordingly.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client with redirects disabled and an optional overall request timeout.
	pub fn with_timeout(timeout: Option<std::time::Duration>) -> Result<Self> {
		let mut builder = ReqwestClient::builder().redirect(reqwest::redirect::Policy::none());

		if let Some(timeout) = timeout {
			builder = builder.timeout(timeout);
		}

		Ok(Self(builder.build().map_err(crate::error::ConfigError::from)?))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Debug for ReqwestHttpClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ReqwestHttpClient(..)")
	}
}
#[cfg(feature = "reqwest")]
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		InstrumentedHandle { client: self.0.clone(), slot }
	}
}
#[cfg(feature = "reqwest")]
impl RequestExecutor for ReqwestHttpClient {
	fn execute(&self, request: HttpRequest) -> InterceptFuture<'_> {
		Box::pin(dispatch(self.0.clone(), request))
	}
}

/// [`AsyncHttpClient`] handle returned by [`ReqwestHttpClient`] for token exchanges.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct InstrumentedHandle {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = self.client.clone();
		let slot = self.slot.clone();

		Box::pin(async move {
			slot.take();

			let response =
				client.execute(request.try_into().map_err(Box::new)?).await.map_err(Box::new)?;
			let retry_after = parse_retry_after(response.headers());

			slot.store(ResponseMetadata { status: Some(response.status().as_u16()), retry_after });

			into_http_response(response).await.map_err(|e| HttpClientError::Reqwest(Box::new(e)))
		})
	}
}

#[cfg(feature = "reqwest")]
async fn dispatch(client: ReqwestClient, request: HttpRequest) -> Result<HttpResponse> {
	let request = reqwest::Request::try_from(request).map_err(DispatchError::invalid_request)?;
	let response = client.execute(request).await.map_err(DispatchError::network)?;

	Ok(into_http_response(response).await.map_err(DispatchError::network)?)
}

#[cfg(feature = "reqwest")]
async fn into_http_response(response: reqwest::Response) -> Result<HttpResponse, ReqwestError> {
	let status = response.status();
	let headers = response.headers().to_owned();
	let mut converted = HttpResponse::new(response.bytes().await?.to_vec());

	*converted.status_mut() = status;
	*converted.headers_mut() = headers;

	Ok(converted)
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}

	let delta = OffsetDateTime::parse(raw, &Rfc2822).ok()? - OffsetDateTime::now_utc();

	delta.is_positive().then_some(delta)
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// crates.io
	use reqwest::header::HeaderValue;
	// self
	use super::*;

	#[test]
	fn retry_after_accepts_seconds_and_ignores_garbage() {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));

		assert_eq!(parse_retry_after(&headers), Some(Duration::seconds(120)));

		headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));

		assert_eq!(parse_retry_after(&headers), None);
		assert_eq!(parse_retry_after(&HeaderMap::new()), None);
	}

	#[test]
	fn retry_after_in_the_past_is_dropped() {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 +0000"));

		assert_eq!(parse_retry_after(&headers), None);
	}

	#[test]
	fn metadata_slot_take_clears_value() {
		let slot = ResponseMetadataSlot::default();

		slot.store(ResponseMetadata { status: Some(503), retry_after: None });

		assert_eq!(slot.take().and_then(|meta| meta.status), Some(503));
		assert!(slot.take().is_none());
	}
}
