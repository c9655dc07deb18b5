//! Client settings loaded from environment variables or JSON.
//!
//! Environment keys are `<PREFIX>_<NAME>`; the default prefix is [`Settings::ENV_PREFIX`].
//!
//! | Key | Required | Meaning |
//! | --- | --- | --- |
//! | `CLIENT_ID` | yes | OAuth client identifier |
//! | `CLIENT_SECRET` | yes | OAuth client secret |
//! | `SCOPES` | yes | Comma-separated scopes |
//! | `TOKEN_ENDPOINT` | yes | Token endpoint URL, without the audience |
//! | `AUDIENCE` | yes | Audience sent as `aud`; may be empty |
//! | `CLIENT_AUTH` | no | `client_secret_basic` (default) or `client_secret_post` |
//! | `PREEMPTIVE_WINDOW_SECS` | no | Refresh this many seconds before expiry |
//! | `REQUEST_TIMEOUT_SECS` | no | Overall timeout for token endpoint requests |
//! | `ENABLED` | no | `false` skips bearer auth entirely |

// std
use std::{env, path::Path};
// self
use crate::{
	_prelude::*,
	auth::{ClientAuthMethod, Credentials, ScopeSet, Secret},
	error::ConfigError,
	provider::RefreshPolicy,
};

/// Settings for one registry client.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: Secret,
	/// Scopes requested on every exchange.
	pub scopes: ScopeSet,
	/// Token endpoint without the audience parameter.
	pub token_endpoint: Url,
	/// Audience sent as `aud`; empty means none.
	#[serde(default)]
	pub audience: String,
	/// Client authentication method.
	#[serde(default)]
	pub client_auth: ClientAuthMethod,
	/// Preemptive refresh window in seconds.
	#[serde(default)]
	pub preemptive_window_secs: Option<u64>,
	/// Token endpoint request timeout in seconds.
	#[serde(default)]
	pub request_timeout_secs: Option<u64>,
	/// Whether bearer auth is active.
	#[serde(default = "enabled_by_default")]
	pub enabled: bool,
}
impl Settings {
	/// Default environment prefix.
	pub const ENV_PREFIX: &'static str = "REGISTRY_OAUTH";

	/// Loads settings from `REGISTRY_OAUTH_*` environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_env_with_prefix(Self::ENV_PREFIX)
	}

	/// Loads settings from `<prefix>_*` environment variables.
	pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
		Self::from_source(prefix, |key| match env::var(key) {
			Ok(value) => Ok(Some(value)),
			Err(env::VarError::NotPresent) => Ok(None),
			Err(e) => Err(ConfigError::invalid(key, e.to_string())),
		})
	}

	/// Loads settings through an arbitrary key lookup, e.g. a map in tests.
	///
	/// `lookup` receives fully prefixed keys such as `REGISTRY_OAUTH_CLIENT_ID`.
	pub fn from_lookup<F>(prefix: &str, mut lookup: F) -> Result<Self, ConfigError>
	where
		F: FnMut(&str) -> Option<String>,
	{
		Self::from_source(prefix, |key| Ok(lookup(key)))
	}

	/// Parses settings from a JSON document.
	pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(json);
		let settings: Self = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::SettingsParse { source })?;

		settings.validate()?;

		Ok(settings)
	}

	/// Reads and parses a JSON settings file.
	pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		Self::from_json_str(&std::fs::read_to_string(path)?)
	}

	/// Validated [`Credentials`] for the token exchange.
	pub fn credentials(&self) -> Result<Credentials, ConfigError> {
		Ok(Credentials::builder(self.client_id.clone(), self.client_secret.expose())
			.token_endpoint(self.token_endpoint.clone())
			.scopes(self.scopes.clone())
			.audience(self.audience.clone())
			.auth_method(self.client_auth)
			.build()?)
	}

	/// Refresh policy derived from `preemptive_window_secs`.
	pub fn refresh_policy(&self) -> RefreshPolicy {
		match self.preemptive_window_secs {
			Some(secs) => RefreshPolicy::with_preemptive_window(Duration::seconds(
				i64::try_from(secs).unwrap_or(i64::MAX),
			)),
			None => RefreshPolicy::default(),
		}
	}

	/// Timeout applied to token endpoint requests, if configured.
	pub fn request_timeout(&self) -> Option<std::time::Duration> {
		self.request_timeout_secs.map(std::time::Duration::from_secs)
	}

	/// Returns false when bearer auth should be skipped.
	pub fn is_enabled(&self) -> bool {
		self.enabled
	}

	fn from_source<F>(prefix: &str, mut lookup: F) -> Result<Self, ConfigError>
	where
		F: FnMut(&str) -> Result<Option<String>, ConfigError>,
	{
		let mut read = |name: &str| {
			let key = format!("{prefix}_{name}");

			lookup(&key).map(|value| (key, value))
		};
		let required = |(key, value): (String, Option<String>)| {
			value.ok_or(ConfigError::MissingSetting { key })
		};
		let client_id = required(read("CLIENT_ID")?)?;
		let client_secret = Secret::new(required(read("CLIENT_SECRET")?)?);
		let scopes = ScopeSet::from_comma_separated(&required(read("SCOPES")?)?)?;
		let token_endpoint = Url::parse(required(read("TOKEN_ENDPOINT")?)?.trim())
			.map_err(|source| ConfigError::InvalidTokenEndpoint { source })?;
		let audience = required(read("AUDIENCE")?)?;
		let client_auth = match read("CLIENT_AUTH")? {
			(key, Some(raw)) =>
				raw.parse::<ClientAuthMethod>().map_err(|reason| ConfigError::invalid(key, reason))?,
			(_, None) => ClientAuthMethod::default(),
		};
		let preemptive_window_secs = parse_optional(read("PREEMPTIVE_WINDOW_SECS")?)?;
		let request_timeout_secs = parse_optional(read("REQUEST_TIMEOUT_SECS")?)?;
		let enabled = match read("ENABLED")? {
			(key, Some(raw)) => parse_flag(&key, &raw)?,
			(_, None) => true,
		};
		let settings = Self {
			client_id,
			client_secret,
			scopes,
			token_endpoint,
			audience,
			client_auth,
			preemptive_window_secs,
			request_timeout_secs,
			enabled,
		};

		settings.validate()?;

		Ok(settings)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.request_timeout_secs == Some(0) {
			return Err(ConfigError::invalid("request_timeout_secs", "must be greater than zero"));
		}
		if self.enabled {
			self.credentials()?;
		}

		Ok(())
	}
}

fn enabled_by_default() -> bool {
	true
}

fn parse_optional((key, value): (String, Option<String>)) -> Result<Option<u64>, ConfigError> {
	value
		.map(|raw| raw.trim().parse::<u64>().map_err(|e| ConfigError::invalid(&key, e.to_string())))
		.transpose()
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
	match raw.trim().to_ascii_lowercase().as_str() {
		"true" | "1" | "yes" | "on" => Ok(true),
		"false" | "0" | "no" | "off" => Ok(false),
		other => Err(ConfigError::invalid(key, format!("expected a boolean, got `{other}`"))),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn lookup(pairs: &[(&str, &str)]) -> impl FnMut(&str) -> Option<String> {
		let map = pairs
			.iter()
			.map(|(k, v)| (format!("REGISTRY_OAUTH_{k}"), (*v).to_owned()))
			.collect::<HashMap<_, _>>();

		move |key| map.get(key).cloned()
	}

	const REQUIRED: [(&str, &str); 5] = [
		("CLIENT_ID", "abc"),
		("CLIENT_SECRET", "xyz"),
		("SCOPES", "registry.read, registry.write"),
		("TOKEN_ENDPOINT", "https://auth.example/token"),
		("AUDIENCE", "registry"),
	];

	#[test]
	fn lookup_reads_required_keys_and_defaults() {
		let settings = Settings::from_lookup(Settings::ENV_PREFIX, lookup(&REQUIRED))
			.expect("Complete settings should load.");

		assert_eq!(settings.client_id, "abc");
		assert_eq!(settings.client_secret.expose(), "xyz");
		assert_eq!(settings.scopes.normalized(), "registry.read registry.write");
		assert_eq!(settings.token_endpoint.as_str(), "https://auth.example/token");
		assert_eq!(settings.client_auth, ClientAuthMethod::ClientSecretBasic);
		assert_eq!(settings.refresh_policy(), RefreshPolicy::default());
		assert_eq!(settings.request_timeout(), None);
		assert!(settings.is_enabled());

		let credentials = settings.credentials().expect("Credentials should build.");

		assert_eq!(credentials.token_url().as_str(), "https://auth.example/token?aud=registry");
	}

	#[test]
	fn missing_key_is_named() {
		let err = Settings::from_lookup(Settings::ENV_PREFIX, lookup(&REQUIRED[..4]))
			.expect_err("Audience is required.");

		assert!(
			matches!(err, ConfigError::MissingSetting { ref key } if key == "REGISTRY_OAUTH_AUDIENCE")
		);
	}

	#[test]
	fn optional_keys_are_parsed() {
		let mut pairs = REQUIRED.to_vec();

		pairs.extend([
			("CLIENT_AUTH", "post"),
			("PREEMPTIVE_WINDOW_SECS", "5"),
			("REQUEST_TIMEOUT_SECS", "10"),
			("ENABLED", "false"),
		]);

		let settings = Settings::from_lookup(Settings::ENV_PREFIX, lookup(&pairs))
			.expect("Optional settings should load.");

		assert_eq!(settings.client_auth, ClientAuthMethod::ClientSecretPost);
		assert_eq!(settings.refresh_policy().preemptive_window(), Duration::seconds(5));
		assert_eq!(settings.request_timeout(), Some(std::time::Duration::from_secs(10)));
		assert!(!settings.is_enabled());
	}

	#[test]
	fn invalid_values_name_the_key() {
		let mut pairs = REQUIRED.to_vec();

		pairs.push(("PREEMPTIVE_WINDOW_SECS", "soon"));

		let err = Settings::from_lookup(Settings::ENV_PREFIX, lookup(&pairs))
			.expect_err("Non-numeric window must be rejected.");

		assert!(matches!(
			err,
			ConfigError::InvalidSetting { ref key, .. } if key == "REGISTRY_OAUTH_PREEMPTIVE_WINDOW_SECS"
		));

		let mut pairs = REQUIRED.to_vec();

		pairs[3] = ("TOKEN_ENDPOINT", "not a url");

		assert!(matches!(
			Settings::from_lookup(Settings::ENV_PREFIX, lookup(&pairs)),
			Err(ConfigError::InvalidTokenEndpoint { .. })
		));
	}

	#[test]
	fn custom_prefix_is_honored() {
		let err = Settings::from_lookup("CATALOG", lookup(&REQUIRED))
			.expect_err("Keys under another prefix must not match.");

		assert!(
			matches!(err, ConfigError::MissingSetting { ref key } if key == "CATALOG_CLIENT_ID")
		);
	}

	#[test]
	fn json_accepts_scope_lists_and_strings() {
		let listed = Settings::from_json_str(
			r#"{
				"client_id": "abc",
				"client_secret": "xyz",
				"scopes": ["registry.read", "registry.write"],
				"token_endpoint": "https://auth.example/token",
				"audience": "registry",
				"client_auth": "client_secret_post"
			}"#,
		)
		.expect("Listed scopes should parse.");
		let joined = Settings::from_json_str(
			r#"{
				"client_id": "abc",
				"client_secret": "xyz",
				"scopes": "registry.read,registry.write",
				"token_endpoint": "https://auth.example/token",
				"audience": "registry"
			}"#,
		)
		.expect("Comma-separated scopes should parse.");

		assert_eq!(listed.scopes, joined.scopes);
		assert_eq!(listed.client_auth, ClientAuthMethod::ClientSecretPost);
		assert!(joined.is_enabled());
	}

	#[test]
	fn json_errors_carry_the_path() {
		let err = Settings::from_json_str(
			r#"{
				"client_id": "abc",
				"client_secret": "xyz",
				"scopes": "registry.read",
				"token_endpoint": "https://auth.example/token",
				"preemptive_window_secs": "thirty"
			}"#,
		)
		.expect_err("String window must be rejected.");

		match err {
			ConfigError::SettingsParse { source } =>
				assert_eq!(source.path().to_string(), "preemptive_window_secs"),
			other => panic!("Unexpected error: {other:?}."),
		}
	}

	#[test]
	fn json_file_round_trips_through_disk() {
		let path =
			env::temp_dir().join(format!("registry-oauth-settings-{}.json", std::process::id()));

		std::fs::write(
			&path,
			r#"{"client_id":"abc","client_secret":"xyz","scopes":"a","token_endpoint":"http://127.0.0.1:1/token","enabled":false}"#,
		)
		.expect("Settings fixture should be written.");

		let settings = Settings::from_json_file(&path).expect("Settings file should load.");

		std::fs::remove_file(&path).ok();

		assert!(!settings.is_enabled());
		assert!(settings.audience.is_empty());
		assert!(matches!(Settings::from_json_file(path), Err(ConfigError::SettingsIo(_))));
	}
}
