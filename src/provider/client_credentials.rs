//! Client-credentials token provider with caching + singleflight refresh.
//!
//! The cached token sits behind a short-lived [`RwLock`] so fresh hits never wait on the
//! network. When the cache is stale, callers queue on one async refresh guard; the first
//! caller performs the exchange and the rest take its outcome after acquiring the guard, so a
//! stampede of N callers results in exactly one token endpoint request whether the exchange
//! succeeds or fails. Failures are handed only to callers already queued; the next caller
//! starts a new exchange.

// self
use crate::{
	_prelude::*,
	auth::{Credentials, Token},
	error::{AuthError, RefreshFailure},
	http::TokenHttpClient,
	oauth::{ClientCredentialsFacade, TransportErrorMapper},
	obs::{self, OpKind, OpOutcome},
	provider::{RefreshPolicy, TokenFuture, TokenProvider},
};
#[cfg(feature = "reqwest")]
use crate::{config::Settings, http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Provider specialized for the crate's default reqwest transport stack.
pub type ReqwestClientCredentialsProvider =
	ClientCredentialsProvider<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Fetches and caches access tokens via the client-credentials grant.
pub struct ClientCredentialsProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	credentials: Arc<Credentials>,
	facade: ClientCredentialsFacade<C, M>,
	policy: RefreshPolicy,
	cached: RwLock<Option<Token>>,
	refresh_guard: AsyncMutex<()>,
	last_refresh: Mutex<LastRefresh>,
}
impl<C, M> ClientCredentialsProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a provider that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		credentials: Credentials,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let facade = ClientCredentialsFacade::new(&credentials, http_client, mapper)?;

		Ok(Self {
			credentials: Arc::new(credentials),
			facade,
			policy: RefreshPolicy::default(),
			cached: RwLock::new(None),
			refresh_guard: AsyncMutex::new(()),
			last_refresh: Mutex::new(LastRefresh::default()),
		})
	}

	/// Overrides the refresh policy (defaults to a 30 second preemptive window).
	pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Credentials this provider exchanges.
	pub fn credentials(&self) -> &Credentials {
		&self.credentials
	}

	/// Returns the cached token without contacting the endpoint, fresh or not.
	pub fn cached_token(&self) -> Option<Token> {
		self.cached.read().clone()
	}

	/// Drops the cached token so the next [`TokenProvider::get_token`] call refreshes.
	///
	/// Useful when a downstream service answers 401 for a token the cache still considers
	/// valid.
	pub fn invalidate(&self) {
		*self.cached.write() = None;
	}

	/// Returns the cached token if the refresh policy still accepts it at `now`.
	fn fresh_token(&self, now: OffsetDateTime) -> Option<Token> {
		self.cached.read().as_ref().filter(|token| !self.policy.should_refresh(token, now)).cloned()
	}

	async fn acquire(&self) -> Result<Token> {
		if let Some(token) = self.fresh_token(OffsetDateTime::now_utc()) {
			obs::record_op_outcome(OpKind::GetToken, OpOutcome::CacheHit);

			return Ok(token);
		}

		let queued_at = self.last_refresh.lock().generation;
		let _singleflight = self.refresh_guard.lock().await;

		// Another caller may have refreshed while this one waited on the guard.
		if let Some(token) = self.fresh_token(OffsetDateTime::now_utc()) {
			obs::record_op_outcome(OpKind::GetToken, OpOutcome::CacheHit);

			return Ok(token);
		}

		let completed = self.last_refresh.lock().completed_since(queued_at);

		if let Some(outcome) = completed {
			obs::record_op_outcome(OpKind::GetToken, OpOutcome::Shared);

			return outcome.map_err(|failure| AuthError::RefreshFailed(failure).into());
		}

		let result = self.refresh().await;

		if let Ok(token) = &result {
			*self.cached.write() = Some(token.clone());
		}

		self.last_refresh.lock().record(&result);

		result
	}

	async fn refresh(&self) -> Result<Token> {
		let result = obs::observe(
			OpKind::TokenExchange,
			"client_credentials",
			&self.credentials.client_id,
			self.facade.exchange(),
		)
		.await;

		if let Ok(token) = &result {
			obs::record_token_lifetime(token.expires_at - token.issued_at);
		}

		result
	}
}
#[cfg(feature = "reqwest")]
impl ClientCredentialsProvider<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a provider backed by a default reqwest transport.
	pub fn new(credentials: Credentials) -> Result<Self> {
		Self::with_http_client(
			credentials,
			ReqwestHttpClient::with_timeout(None)?,
			ReqwestTransportErrorMapper,
		)
	}

	/// Creates a provider from loaded [`Settings`], honoring the configured timeout and
	/// preemptive window.
	pub fn from_settings(settings: &Settings) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(settings.request_timeout())?;

		Ok(Self::with_http_client(
			settings.credentials()?,
			http_client,
			ReqwestTransportErrorMapper,
		)?
		.with_refresh_policy(settings.refresh_policy()))
	}
}
impl<C, M> TokenProvider for ClientCredentialsProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn get_token(&self) -> TokenFuture<'_> {
		let client_id = &self.credentials.client_id;

		Box::pin(obs::observe(OpKind::GetToken, "cache", client_id, self.acquire()))
	}
}
/// Outcome of the latest exchange, tagged with a generation so callers queued on the refresh
/// guard can tell whether an exchange completed while they waited.
#[derive(Debug, Default)]
struct LastRefresh {
	generation: u64,
	outcome: Option<Result<Token, RefreshFailure>>,
}
impl LastRefresh {
	fn record(&mut self, result: &Result<Token>) {
		self.generation = self.generation.wrapping_add(1);
		self.outcome = Some(result.as_ref().cloned().map_err(RefreshFailure::capture));
	}

	fn completed_since(&self, generation: u64) -> Option<Result<Token, RefreshFailure>> {
		if self.generation == generation {
			return None;
		}

		self.outcome.clone()
	}
}

impl<C, M> Debug for ClientCredentialsProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredentialsProvider")
			.field("credentials", &self.credentials)
			.field("policy", &self.policy)
			.field("cached", &self.cached.read().is_some())
			.finish()
	}
}
