// self
use crate::{error::ErrorKind, obs::Call};

/// Counts a facade call on entry via the global metrics recorder (when enabled).
pub fn record_call_started(call: Call) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"pipeline_relay_call_started_total",
			"system" => call.system,
			"operation" => call.operation
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = call;
	}
}

/// Counts a finished facade call, labeled with its outcome.
///
/// `failure` is the kind of the error the call returned, or `None` on success.
pub fn record_call_finished(call: Call, failure: Option<ErrorKind>) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"pipeline_relay_call_total",
			"system" => call.system,
			"operation" => call.operation,
			"outcome" => crate::obs::outcome_label(failure)
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (call, failure);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recording_without_a_recorder_is_a_no_op() {
		let call = Call::jenkins("job.build");

		record_call_started(call);
		record_call_finished(call, Some(ErrorKind::Transport));
		record_call_finished(call, None);
	}
}
