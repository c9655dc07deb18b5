//! Token providers: the [`TokenProvider`] contract and its client-credentials implementation.

mod client_credentials;

pub use client_credentials::*;

// self
use crate::{_prelude::*, auth::Token};

/// Boxed future returned by [`TokenProvider::get_token`].
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<Token>> + 'a + Send>>;

/// Source of bearer tokens consulted by interceptors.
///
/// Implementations return a cached token while it is fresh and refresh it otherwise.
/// Failures surface as [`Error::Auth`] and are never retried internally.
pub trait TokenProvider
where
	Self: Send + Sync,
{
	/// Returns a currently valid token.
	fn get_token(&self) -> TokenFuture<'_>;
}
impl<P> TokenProvider for Arc<P>
where
	P: ?Sized + TokenProvider,
{
	fn get_token(&self) -> TokenFuture<'_> {
		P::get_token(self)
	}
}

/// Decides when a cached token is considered stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshPolicy {
	preemptive_window: Duration,
}
impl RefreshPolicy {
	/// Default window before expiry at which a token is refreshed early.
	pub const DEFAULT_PREEMPTIVE_WINDOW: Duration = Duration::seconds(30);

	/// Refresh only once the token has actually expired.
	pub const fn on_expiry() -> Self {
		Self { preemptive_window: Duration::ZERO }
	}

	/// Refresh `window` before expiry; negative windows clamp to zero.
	pub fn with_preemptive_window(window: Duration) -> Self {
		Self { preemptive_window: if window.is_negative() { Duration::ZERO } else { window } }
	}

	/// Configured preemptive window.
	pub fn preemptive_window(&self) -> Duration {
		self.preemptive_window
	}

	/// Returns true when `token` must be refreshed at `now`.
	pub fn should_refresh(&self, token: &Token, now: OffsetDateTime) -> bool {
		if token.is_expired_at(now) {
			return true;
		}
		if self.preemptive_window.is_zero() {
			return false;
		}

		token.remaining_at(now) <= self.preemptive_window
	}
}
impl Default for RefreshPolicy {
	fn default() -> Self {
		Self { preemptive_window: Self::DEFAULT_PREEMPTIVE_WINDOW }
	}
}
