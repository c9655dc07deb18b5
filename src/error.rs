//! Crate-level error types shared by the token provider, interceptors, and configuration.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token acquisition failed; the request was not sent.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// The terminal executor failed to send an authenticated request.
	#[error(transparent)]
	Dispatch(#[from] DispatchError),
}
impl Error {
	/// Returns the wrapped [`AuthError`], if this is a token acquisition failure.
	pub fn as_auth(&self) -> Option<&AuthError> {
		match self {
			Self::Auth(e) => Some(e),
			_ => None,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A required setting was not supplied.
	#[error("Missing required setting `{key}`.")]
	MissingSetting {
		/// Name of the missing key.
		key: String,
	},
	/// A setting was supplied but could not be interpreted.
	#[error("Setting `{key}` is invalid: {reason}.")]
	InvalidSetting {
		/// Name of the offending key.
		key: String,
		/// Why the value was rejected.
		reason: String,
	},
	/// Token endpoint is not a valid URL.
	#[error("Token endpoint URL is invalid.")]
	InvalidTokenEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Configured scopes cannot be normalized.
	#[error("Configured scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Credentials builder validation failed.
	#[error("Unable to build credentials.")]
	Credentials(#[from] crate::auth::CredentialsError),
	/// Settings file could not be read.
	#[error("Settings file could not be read.")]
	SettingsIo(#[from] std::io::Error),
	/// Settings JSON did not match the expected shape.
	#[error("Settings JSON is malformed at `{}`.", .source.path())]
	SettingsParse {
		/// Path-aware parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	pub(crate) fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
		Self::InvalidSetting { key: key.into(), reason: reason.into() }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures while acquiring or attaching a bearer token.
///
/// None of these are retried by the crate; callers decide whether to retry the whole
/// operation.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// The token endpoint could not be reached (DNS, TCP, TLS, timeout, I/O).
	#[error("Token endpoint is unreachable.")]
	Unreachable {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// The token endpoint answered with a non-success status or an OAuth error payload.
	#[error("Token endpoint rejected the request: {reason}.")]
	Rejected {
		/// HTTP status code, when available.
		status: Option<u16>,
		/// OAuth `error` code, when the body carried one.
		error: Option<String>,
		/// Human-readable summary.
		reason: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// The token endpoint responded with JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	MalformedResponse {
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The token endpoint responded in a way the exchange could not interpret.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	UnexpectedResponse {
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Summary of the anomaly.
		message: String,
	},
	/// A concurrent refresh this caller was queued behind failed; its outcome is reported here
	/// instead of issuing another exchange.
	#[error("Shared token refresh failed: {0}")]
	RefreshFailed(RefreshFailure),
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned an empty `access_token`.
	#[error("Token endpoint returned an empty access token.")]
	EmptyAccessToken,
	/// The access token cannot be encoded as an HTTP header value.
	#[error("Access token cannot be used as an Authorization header value.")]
	InvalidHeaderValue(#[from] oauth2::http::header::InvalidHeaderValue),
}
impl AuthError {
	/// Wraps a transport-specific network failure.
	pub fn unreachable(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Unreachable { source: Box::new(src) }
	}

	/// HTTP status reported by the token endpoint, if one was observed.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. }
			| Self::MalformedResponse { status, .. }
			| Self::UnexpectedResponse { status, .. } => *status,
			Self::RefreshFailed(failure) => failure.status,
			_ => None,
		}
	}

	/// Retry-After hint reported by the token endpoint, if one was observed.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Rejected { retry_after, .. } => *retry_after,
			Self::RefreshFailed(failure) => failure.retry_after,
			_ => None,
		}
	}
}

/// Cloneable summary of a failed token refresh, handed to every caller queued behind it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshFailure {
	/// HTTP status code observed by the failed refresh, when available.
	pub status: Option<u16>,
	/// Retry-After hint observed by the failed refresh, if supplied.
	pub retry_after: Option<Duration>,
	/// Display form of the original failure.
	pub reason: String,
}
impl RefreshFailure {
	pub(crate) fn capture(err: &Error) -> Self {
		let auth = err.as_auth();

		Self {
			status: auth.and_then(AuthError::status),
			retry_after: auth.and_then(AuthError::retry_after),
			reason: err.to_string(),
		}
	}
}
impl Display for RefreshFailure {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.reason)
	}
}

/// Failures raised by the terminal [`RequestExecutor`](crate::intercept::RequestExecutor).
#[derive(Debug, ThisError)]
pub enum DispatchError {
	/// The outgoing request could not be converted for the underlying client.
	#[error("Outgoing request could not be built.")]
	InvalidRequest {
		/// Conversion failure.
		#[source]
		source: BoxError,
	},
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl DispatchError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a request conversion failure.
	pub fn invalid_request(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::InvalidRequest { source: Box::new(src) }
	}
}
