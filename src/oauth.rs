//! Client-credentials exchange built on the `oauth2` crate.
//!
//! The facade owns a configured `oauth2` client and a [`TokenHttpClient`]; it performs one
//! `grant_type=client_credentials` request per call and maps every failure into
//! [`AuthError`]. Caching lives one layer up in [`crate::provider`].
//!
//! Token endpoints in the wild often omit `token_type`; such responses are read as bearer
//! tokens rather than rejected.

pub use oauth2;

// crates.io
use oauth2::{
	AccessToken, AuthType, Client, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RefreshToken, RequestTokenError, Scope, StandardRevocableToken,
	TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
};
use serde::Deserializer;
// self
use crate::{
	_prelude::*,
	auth::{ClientAuthMethod, Credentials, Token},
	error::{AuthError, ConfigError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
};

type TokenEndpointClient = Client<
	BasicErrorResponse,
	TokenEndpointResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;

/// Successful token endpoint body.
///
/// Unlike `oauth2`'s standard response, `token_type` may be absent (or `null`) and then reads
/// as [`BasicTokenType::Bearer`]; matching is case-insensitive.
#[derive(Clone, Debug, Deserialize, Serialize)]
struct TokenEndpointResponse {
	access_token: AccessToken,
	#[serde(default = "bearer_token_type", deserialize_with = "deserialize_token_type")]
	token_type: BasicTokenType,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	expires_in: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	refresh_token: Option<RefreshToken>,
	#[serde(rename = "scope", default, deserialize_with = "deserialize_scopes", skip_serializing)]
	scopes: Option<Vec<Scope>>,
}
impl TokenResponse for TokenEndpointResponse {
	type TokenType = BasicTokenType;

	fn access_token(&self) -> &AccessToken {
		&self.access_token
	}

	fn token_type(&self) -> &BasicTokenType {
		&self.token_type
	}

	fn expires_in(&self) -> Option<std::time::Duration> {
		self.expires_in.map(std::time::Duration::from_secs)
	}

	fn refresh_token(&self) -> Option<&RefreshToken> {
		self.refresh_token.as_ref()
	}

	fn scopes(&self) -> Option<&Vec<Scope>> {
		self.scopes.as_ref()
	}
}

fn bearer_token_type() -> BasicTokenType {
	BasicTokenType::Bearer
}

fn deserialize_token_type<'de, D>(deserializer: D) -> Result<BasicTokenType, D::Error>
where
	D: Deserializer<'de>,
{
	let Some(raw) = Option::<String>::deserialize(deserializer)? else {
		return Ok(BasicTokenType::Bearer);
	};
	let token_type = match raw.to_ascii_lowercase().as_str() {
		"" | "bearer" => BasicTokenType::Bearer,
		"mac" => BasicTokenType::Mac,
		_ => BasicTokenType::Extension(raw),
	};

	Ok(token_type)
}

fn deserialize_scopes<'de, D>(deserializer: D) -> Result<Option<Vec<Scope>>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<String>::deserialize(deserializer)?
		.map(|raw| raw.split_whitespace().map(|scope| Scope::new(scope.to_owned())).collect()))
}

/// Maps HTTP transport failures into [`AuthError`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into an auth error.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> AuthError;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> AuthError {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(meta, *inner),
			other => map_generic_transport_error(meta, other),
		}
	}
}

/// Performs client-credentials exchanges for one set of [`Credentials`].
pub struct ClientCredentialsFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: TokenEndpointClient,
	scopes: Vec<Scope>,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> ClientCredentialsFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds a facade targeting [`Credentials::token_url`].
	pub fn new(
		credentials: &Credentials,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let token_url = TokenUrl::from_url(credentials.token_url());
		let mut oauth_client: TokenEndpointClient =
			Client::new(ClientId::new(credentials.client_id.clone()))
				.set_client_secret(ClientSecret::new(credentials.client_secret.expose().to_owned()))
				.set_token_uri(token_url);

		if matches!(credentials.auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self {
			oauth_client,
			scopes: credentials.scopes.iter().map(|scope| Scope::new(scope.to_owned())).collect(),
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		})
	}

	/// Requests a new access token.
	pub async fn exchange(&self) -> Result<Token> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());
		let response = self
			.oauth_client
			.exchange_client_credentials()
			.add_scopes(self.scopes.iter().cloned())
			.request_async(&handle)
			.await
			.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))?;

		Ok(map_token_response(response, OffsetDateTime::now_utc())?)
	}
}
impl<C, M> Debug for ClientCredentialsFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredentialsFacade")
			.field("token_url", &self.oauth_client.token_uri().as_str())
			.field("scopes", &self.scopes.len())
			.finish()
	}
}

fn map_token_response(
	response: TokenEndpointResponse,
	issued_at: OffsetDateTime,
) -> Result<Token, AuthError> {
	let expires_in = response.expires_in().ok_or(AuthError::MissingExpiresIn)?;
	let expires_in =
		Duration::try_from(expires_in).map_err(|_| AuthError::ExpiresInOutOfRange)?;

	Token::new(response.access_token().secret().to_owned(), issued_at, expires_in)
}

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();
	let status = meta_status(meta_ref);
	let auth = match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(response, meta_ref),
		// Request construction failures are local problems, not endpoint failures.
		RequestTokenError::Request(HttpClientError::Http(inner)) =>
			return ConfigError::from(inner).into(),
		RequestTokenError::Request(error) => mapper.map_transport_error(meta_ref, error),
		RequestTokenError::Parse(source, _body) if is_success(status) =>
			AuthError::MalformedResponse { status, source },
		RequestTokenError::Parse(_, body) => AuthError::Rejected {
			status,
			error: None,
			reason: body_preview(&body),
			retry_after: meta_retry_after(meta_ref),
		},
		RequestTokenError::Other(message) if is_success(status) =>
			AuthError::UnexpectedResponse { status, message },
		RequestTokenError::Other(message) => AuthError::Rejected {
			status,
			error: None,
			reason: message,
			retry_after: meta_retry_after(meta_ref),
		},
	};

	auth.into()
}

fn map_server_response_error(
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> AuthError {
	let code = response.error().as_ref().to_owned();
	let reason = match response.error_description() {
		Some(description) => format!("{code}: {description}"),
		None => code.clone(),
	};

	AuthError::Rejected {
		status: meta_status(meta),
		error: Some(code),
		reason,
		retry_after: meta_retry_after(meta),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(meta: Option<&ResponseMetadata>, err: ReqwestError) -> AuthError {
	let status = meta_status(meta).or_else(|| err.status().map(|code| code.as_u16()));

	if is_success(status) {
		return AuthError::unreachable(err);
	}

	AuthError::Rejected {
		status,
		error: None,
		reason: err.to_string(),
		retry_after: meta_retry_after(meta),
	}
}

#[cfg(feature = "reqwest")]
fn map_generic_transport_error(
	meta: Option<&ResponseMetadata>,
	err: HttpClientError<ReqwestError>,
) -> AuthError {
	match err {
		HttpClientError::Io(inner) => AuthError::unreachable(inner),
		other => AuthError::UnexpectedResponse {
			status: meta_status(meta),
			message: format!("HTTP client error occurred while calling the token endpoint: {other}"),
		},
	}
}

fn body_preview(body: &[u8]) -> String {
	const LIMIT: usize = 256;

	let text = String::from_utf8_lossy(body);
	let trimmed = text.trim();

	if trimmed.is_empty() {
		return "empty error response".into();
	}

	let mut preview = trimmed.chars().take(LIMIT).collect::<String>();

	if trimmed.chars().count() > LIMIT {
		preview.push('…');
	}

	preview
}

fn is_success(status: Option<u16>) -> bool {
	status.is_none_or(|code| (200..300).contains(&code))
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn parse(body: &str) -> TokenEndpointResponse {
		serde_json::from_str(body).expect("Token response fixture should deserialize.")
	}

	#[test]
	fn token_response_requires_expiry() {
		let response = parse("{\"access_token\":\"tok123\",\"token_type\":\"bearer\"}");
		let err = map_token_response(response, OffsetDateTime::now_utc())
			.expect_err("Missing expires_in must be rejected.");

		assert!(matches!(err, AuthError::MissingExpiresIn));
	}

	#[test]
	fn token_response_maps_value_and_expiry() {
		let response = parse("{\"access_token\":\"tok123\",\"expires_in\":3600}");
		let issued_at = OffsetDateTime::now_utc();
		let token = map_token_response(response, issued_at).expect("Response should map.");

		assert_eq!(token.value.expose(), "tok123");
		assert_eq!(token.expires_at - issued_at, Duration::hours(1));
	}

	#[test]
	fn missing_or_null_token_type_reads_as_bearer() {
		for body in [
			"{\"access_token\":\"tok123\",\"expires_in\":3600}",
			"{\"access_token\":\"tok123\",\"token_type\":null,\"expires_in\":3600}",
			"{\"access_token\":\"tok123\",\"token_type\":\"Bearer\",\"expires_in\":3600}",
		] {
			assert_eq!(parse(body).token_type(), &BasicTokenType::Bearer, "{body}");
		}

		let mac = parse("{\"access_token\":\"tok123\",\"token_type\":\"MAC\"}");

		assert_eq!(mac.token_type(), &BasicTokenType::Mac);
	}

	#[test]
	fn scope_field_is_space_delimited() {
		let response = parse(
			"{\"access_token\":\"tok123\",\"expires_in\":60,\"scope\":\"registry.read registry.write\"}",
		);
		let scopes = response
			.scopes()
			.map(|scopes| scopes.iter().map(|scope| scope.as_str()).collect::<Vec<_>>());

		assert_eq!(scopes, Some(vec!["registry.read", "registry.write"]));
		assert_eq!(response.expires_in(), Some(std::time::Duration::from_secs(60)));
		assert!(parse("{\"access_token\":\"tok123\"}").scopes().is_none());
	}

	#[test]
	fn body_preview_truncates_and_labels_empty_bodies() {
		assert_eq!(body_preview(b"  "), "empty error response");
		assert_eq!(body_preview(b"Bad Gateway"), "Bad Gateway");

		let long = "x".repeat(300);
		let preview = body_preview(long.as_bytes());

		assert_eq!(preview.chars().count(), 257);
		assert!(preview.ends_with('…'));
	}

	#[test]
	fn success_range_treats_missing_status_as_success() {
		assert!(is_success(None));
		assert!(is_success(Some(200)));
		assert!(!is_success(Some(401)));
		assert!(!is_success(Some(503)));
	}
}
