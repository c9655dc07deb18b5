//! Client credentials used for the token exchange.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, Secret},
};

/// Query parameter carrying the audience on the token endpoint URL.
pub const AUDIENCE_PARAM: &str = "aud";

/// How the client authenticates against the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}
impl FromStr for ClientAuthMethod {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"client_secret_basic" | "basic" | "header" => Ok(Self::ClientSecretBasic),
			"client_secret_post" | "post" | "form" => Ok(Self::ClientSecretPost),
			other => Err(format!("unknown client authentication method `{other}`")),
		}
	}
}

/// Errors raised while constructing [`Credentials`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CredentialsError {
	/// Client identifier was empty.
	#[error("Client identifier cannot be empty.")]
	EmptyClientId,
	/// Client secret was empty.
	#[error("Client secret cannot be empty.")]
	EmptyClientSecret,
	/// No token endpoint was configured.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Token endpoint must be an absolute HTTP(S) URL.
	#[error("Token endpoint must use http or https: {url}.")]
	UnsupportedScheme {
		/// Endpoint URL that failed validation.
		url: String,
	},
}

/// Immutable client identity loaded once from configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// Client secret; redacted in `Debug`.
	pub client_secret: Secret,
	/// Normalized scopes requested on every exchange.
	pub scopes: ScopeSet,
	/// Token endpoint without the audience parameter.
	pub token_endpoint: Url,
	/// Audience appended as `aud=<audience>`; empty means none.
	pub audience: String,
	/// Client authentication method for the token endpoint.
	pub auth_method: ClientAuthMethod,
}
impl Credentials {
	/// Returns a builder seeded with the client identifier and secret.
	pub fn builder(
		client_id: impl Into<String>,
		client_secret: impl Into<Arc<str>>,
	) -> CredentialsBuilder {
		CredentialsBuilder::new(client_id, client_secret)
	}

	/// Token endpoint with the audience query pair appended.
	///
	/// Existing query pairs on the configured endpoint are preserved.
	pub fn token_url(&self) -> Url {
		let mut url = self.token_endpoint.clone();

		if !self.audience.is_empty() {
			url.query_pairs_mut().append_pair(AUDIENCE_PARAM, &self.audience);
		}

		url
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("scopes", &self.scopes)
			.field("token_endpoint", &self.token_endpoint.as_str())
			.field("audience", &self.audience)
			.field("auth_method", &self.auth_method)
			.finish()
	}
}

/// Builder for [`Credentials`].
#[derive(Debug)]
pub struct CredentialsBuilder {
	client_id: String,
	client_secret: Secret,
	scopes: ScopeSet,
	token_endpoint: Option<Url>,
	audience: String,
	auth_method: ClientAuthMethod,
}
impl CredentialsBuilder {
	fn new(client_id: impl Into<String>, client_secret: impl Into<Arc<str>>) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: Secret::new(client_secret),
			scopes: ScopeSet::default(),
			token_endpoint: None,
			audience: String::new(),
			auth_method: ClientAuthMethod::default(),
		}
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the requested scopes.
	pub fn scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = scopes;

		self
	}

	/// Sets the audience appended to the token endpoint.
	pub fn audience(mut self, audience: impl Into<String>) -> Self {
		self.audience = audience.into();

		self
	}

	/// Overrides the client authentication method.
	pub fn auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.auth_method = method;

		self
	}

	/// Consumes the builder and validates the resulting credentials.
	pub fn build(self) -> Result<Credentials, CredentialsError> {
		if self.client_id.trim().is_empty() {
			return Err(CredentialsError::EmptyClientId);
		}
		if self.client_secret.is_blank() {
			return Err(CredentialsError::EmptyClientSecret);
		}

		let token_endpoint = self.token_endpoint.ok_or(CredentialsError::MissingTokenEndpoint)?;

		if !matches!(token_endpoint.scheme(), "http" | "https") {
			return Err(CredentialsError::UnsupportedScheme { url: token_endpoint.to_string() });
		}

		Ok(Credentials {
			client_id: self.client_id,
			client_secret: self.client_secret,
			scopes: self.scopes,
			token_endpoint,
			audience: self.audience.trim().to_owned(),
			auth_method: self.auth_method,
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Failed to parse test URL.")
	}

	#[test]
	fn token_url_appends_audience() {
		let credentials = Credentials::builder("abc", "xyz")
			.token_endpoint(url("https://auth.example/token"))
			.audience("registry")
			.build()
			.expect("Credentials should build.");

		assert_eq!(credentials.token_url().as_str(), "https://auth.example/token?aud=registry");
	}

	#[test]
	fn token_url_preserves_existing_query_and_skips_empty_audience() {
		let with_query = Credentials::builder("abc", "xyz")
			.token_endpoint(url("https://auth.example/token?realm=svc"))
			.audience("registry host")
			.build()
			.expect("Credentials should build.");

		assert_eq!(
			with_query.token_url().as_str(),
			"https://auth.example/token?realm=svc&aud=registry+host"
		);

		let without = Credentials::builder("abc", "xyz")
			.token_endpoint(url("https://auth.example/token"))
			.build()
			.expect("Credentials should build.");

		assert_eq!(without.token_url().as_str(), "https://auth.example/token");
	}

	#[test]
	fn builder_validates_required_fields() {
		assert_eq!(
			Credentials::builder("", "xyz").token_endpoint(url("https://a/token")).build(),
			Err(CredentialsError::EmptyClientId)
		);
		assert_eq!(
			Credentials::builder("abc", "").token_endpoint(url("https://a/token")).build(),
			Err(CredentialsError::EmptyClientSecret)
		);
		assert_eq!(
			Credentials::builder("abc", "  ").token_endpoint(url("https://a/token")).build(),
			Err(CredentialsError::EmptyClientSecret)
		);
		assert_eq!(
			Credentials::builder("abc", "xyz").build(),
			Err(CredentialsError::MissingTokenEndpoint)
		);
		assert!(matches!(
			Credentials::builder("abc", "xyz").token_endpoint(url("ftp://a/token")).build(),
			Err(CredentialsError::UnsupportedScheme { .. })
		));
	}

	#[test]
	fn debug_redacts_secret() {
		let credentials = Credentials::builder("abc", "very-secret")
			.token_endpoint(url("https://auth.example/token"))
			.build()
			.expect("Credentials should build.");

		assert!(!format!("{credentials:?}").contains("very-secret"));
	}

	#[test]
	fn auth_method_parses_aliases() {
		assert_eq!("post".parse::<ClientAuthMethod>(), Ok(ClientAuthMethod::ClientSecretPost));
		assert_eq!(
			"client_secret_basic".parse::<ClientAuthMethod>(),
			Ok(ClientAuthMethod::ClientSecretBasic)
		);
		assert!("jwt".parse::<ClientAuthMethod>().is_err());
	}
}
