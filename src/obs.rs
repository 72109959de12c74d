//! Observability helpers wrapping every Jenkins and Argo CD facade call.
//!
//! # Feature Flags
//!
//! - Spans named `pipeline_relay.call` carry the `system` and `operation` fields and are always
//!   emitted through `tracing`.
//! - Enable `metrics` to count started calls in `pipeline_relay_call_started_total` and finished
//!   calls in `pipeline_relay_call_total`, the latter labeled with `outcome` (`success` or the
//!   failing [`ErrorKind`] label).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::{_prelude::*, error::ErrorKind};

/// Labels identifying one facade call in spans and metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Call {
	/// External system reached by the call (`jenkins` or `argocd`).
	pub system: &'static str,
	/// Facade operation name.
	pub operation: &'static str,
}
impl Call {
	/// Labels a Jenkins controller call.
	pub const fn jenkins(operation: &'static str) -> Self {
		Self { system: "jenkins", operation }
	}

	/// Labels an Argo CD API server call.
	pub const fn argocd(operation: &'static str) -> Self {
		Self { system: "argocd", operation }
	}
}
impl Display for Call {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}.{}", self.system, self.operation)
	}
}

/// Runs `fut` inside a [`CallSpan`] and records its start and outcome.
pub async fn observe<T, Fut>(call: Call, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = CallSpan::new(call);

	record_call_started(call);

	let result = span.instrument(fut).await;

	record_call_finished(call, result.as_ref().err().map(Error::kind));

	result
}

/// Metric label for a finished call.
pub fn outcome_label(failure: Option<ErrorKind>) -> &'static str {
	failure.map_or("success", ErrorKind::as_str)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn observe_passes_results_through() {
		let ok = observe(Call::jenkins("job.get"), async { Ok(7) }).await;
		let err = observe(Call::argocd("list_argo_apps"), async {
			Err::<(), _>(Error::invalid_argument("bad"))
		})
		.await;

		assert_eq!(ok.expect("Successful futures should pass through."), 7);
		assert!(matches!(err, Err(Error::InvalidArgument { .. })));
	}

	#[test]
	fn labels_are_stable() {
		assert_eq!(Call::argocd("sync_application").to_string(), "argocd.sync_application");
		assert_eq!(Call::jenkins("build.stop").system, "jenkins");
		assert_eq!(outcome_label(None), "success");
		assert_eq!(outcome_label(Some(ErrorKind::NotAllowed)), "not_allowed");
	}
}
