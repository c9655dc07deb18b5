// self
use crate::{_prelude::*, obs::OpKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// Span builder shared by the provider and interceptors.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Creates a new span tagged with the provided operation + stage.
	pub fn new(kind: OpKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("registry_oauth.op", op = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event on success or a warning on failure inside the current span.
///
/// `subject` names what the operation acted on (client id, request URI) and must not carry
/// secrets.
pub fn trace_outcome<T, E>(kind: OpKind, subject: &str, result: &Result<T, E>)
where
	E: Display,
{
	#[cfg(feature = "tracing")]
	{
		match result {
			Ok(_) => tracing::debug!(op = kind.as_str(), subject, "Operation succeeded."),
			Err(e) => tracing::warn!(op = kind.as_str(), subject, error = %e, "Operation failed."),
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, subject, result);
	}
}
