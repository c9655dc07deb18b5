//! Immutable access token values and their expiry helpers.

// crates.io
use oauth2::http::HeaderValue;
// self
use crate::{_prelude::*, auth::Secret, error::AuthError};

/// Scheme every token from the client-credentials exchange is presented with.
pub const BEARER_SCHEME: &str = "Bearer";

/// Access token issued by the token endpoint.
///
/// Tokens are never mutated; a refresh produces a new value that replaces the cached one.
#[derive(Clone)]
pub struct Token {
	/// Access token secret; callers must avoid logging it.
	pub value: Secret,
	/// Instant the token was received.
	pub issued_at: OffsetDateTime,
	/// Expiry instant derived from `issued_at + expires_in`.
	pub expires_at: OffsetDateTime,
}
impl Token {
	/// Creates a token issued at `issued_at` that lives for `expires_in`.
	///
	/// Rejects blank values and non-positive lifetimes.
	pub fn new(
		value: impl Into<Arc<str>>,
		issued_at: OffsetDateTime,
		expires_in: Duration,
	) -> Result<Self, AuthError> {
		let value = Secret::new(value);

		if value.is_blank() {
			return Err(AuthError::EmptyAccessToken);
		}
		if !expires_in.is_positive() {
			return Err(AuthError::NonPositiveExpiresIn);
		}

		let expires_at =
			issued_at.checked_add(expires_in).ok_or(AuthError::ExpiresInOutOfRange)?;

		Ok(Self { value, issued_at, expires_at })
	}

	/// Returns `true` if the token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Returns `true` if the token is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Remaining lifetime at `instant`, clamped at zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}

	/// Formats the value for an `Authorization` header.
	pub fn bearer(&self) -> String {
		format!("{BEARER_SCHEME} {}", self.value.expose())
	}

	/// Sensitive `Authorization` header value carrying this token.
	pub fn authorization(&self) -> Result<HeaderValue, AuthError> {
		Ok(self.value.header_value(BEARER_SCHEME)?)
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Token")
			.field("value", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
