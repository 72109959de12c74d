// crates.io
use tracing::instrument::Instrumented;
// self
use crate::{_prelude::*, obs::Call};

/// Span wrapping one facade call.
#[derive(Clone, Debug)]
pub struct CallSpan {
	span: tracing::Span,
}
impl CallSpan {
	/// Creates a new span tagged with the call's system and operation.
	pub fn new(call: Call) -> Self {
		let span = tracing::info_span!(
			"pipeline_relay.call",
			system = call.system,
			operation = call.operation
		);

		Self { span }
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> CallSpanGuard {
		CallSpanGuard { _guard: self.span.entered() }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		use tracing::Instrument;

		fut.instrument(self.span.clone())
	}
}

/// RAII guard returned by [`CallSpan::entered`].
pub struct CallSpanGuard {
	_guard: tracing::span::EnteredSpan,
}
impl Debug for CallSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("CallSpanGuard(..)")
	}
}
