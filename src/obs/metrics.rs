// self
use crate::{
	_prelude::*,
	obs::{OpKind, OpOutcome},
};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_op_outcome(kind: OpKind, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"registry_oauth_op_total",
			"op" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records the lifetime granted to a freshly exchanged token, in seconds.
///
/// Short lifetimes relative to the preemptive window show up here before they show up as
/// refresh storms.
pub fn record_token_lifetime(lifetime: Duration) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!("registry_oauth_token_lifetime_seconds")
			.record(lifetime.as_seconds_f64());
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = lifetime;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_are_noops_without_a_global_recorder() {
		record_op_outcome(OpKind::TokenExchange, OpOutcome::Failure);
		record_op_outcome(OpKind::GetToken, OpOutcome::Shared);
		record_token_lifetime(Duration::hours(1));
	}
}
