//! Redacted secret strings shared by cached tokens and client credentials.

// crates.io
use oauth2::http::{HeaderValue, header::InvalidHeaderValue};
// self
use crate::_prelude::*;

/// Secret string that never appears in `Debug` or `Display` output.
///
/// Backed by `Arc<str>`: the provider hands a clone of the cached token to every outgoing
/// request without copying the token material.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub struct Secret(Arc<str>);
impl Secret {
	/// Wraps a secret value.
	pub fn new(value: impl Into<Arc<str>>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` when the value is empty or whitespace only.
	pub fn is_blank(&self) -> bool {
		self.0.trim().is_empty()
	}

	/// Builds an `Authorization`-style header value `"<scheme> <secret>"`, marked sensitive so
	/// HTTP stacks keep it out of their own debug output.
	pub fn header_value(&self, scheme: &str) -> Result<HeaderValue, InvalidHeaderValue> {
		let mut value = HeaderValue::try_from(format!("{scheme} {}", self.0))?;

		value.set_sensitive(true);

		Ok(value)
	}
}
impl From<String> for Secret {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}
impl Debug for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Secret(<redacted>)")
	}
}
impl Display for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
