//! Optional observability helpers for token acquisition and request interception.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `registry_oauth.op` with the `op`
//!   (operation) and `stage` (call site) fields.
//! - Enable `metrics` to increment the `registry_oauth_op_total` counter, labeled by `op` and
//!   `outcome`, and to record freshly issued token lifetimes in the
//!   `registry_oauth_token_lifetime_seconds` histogram.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// [`TokenProvider::get_token`](crate::provider::TokenProvider::get_token) calls.
	GetToken,
	/// Client-credentials exchanges against the token endpoint.
	TokenExchange,
	/// Bearer header injection inside an interceptor chain.
	Intercept,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::GetToken => "get_token",
			OpKind::TokenExchange => "token_exchange",
			OpKind::Intercept => "intercept",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an operation.
	Attempt,
	/// Served from the token cache without contacting the endpoint.
	CacheHit,
	/// Served the outcome of an exchange another caller performed while this one waited.
	Shared,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::CacheHit => "cache_hit",
			OpOutcome::Shared => "shared",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` as one observed operation.
///
/// Counts the attempt, instruments the future with an [`OpSpan`], logs the outcome against
/// `subject` inside that span, and counts success or failure. `subject` must not carry
/// secrets.
pub async fn observe<T, E, F>(
	kind: OpKind,
	stage: &'static str,
	subject: &str,
	fut: F,
) -> Result<T, E>
where
	E: Display,
	F: Future<Output = Result<T, E>>,
{
	record_op_outcome(kind, OpOutcome::Attempt);

	let result = OpSpan::new(kind, stage)
		.instrument(async {
			let result = fut.await;

			trace_outcome(kind, subject, &result);

			result
		})
		.await;

	record_result(kind, &result);

	result
}

/// Records success or failure for `result`.
pub fn record_result<T, E>(kind: OpKind, result: &Result<T, E>) {
	match result {
		Ok(_) => record_op_outcome(kind, OpOutcome::Success),
		Err(_) => record_op_outcome(kind, OpOutcome::Failure),
	}
}
