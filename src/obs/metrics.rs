// self
use crate::obs::{FlowKind, FlowOutcome};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"design_relay_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records the outcome of a flow result and passes it through.
pub fn record_result<T, E>(kind: FlowKind, result: Result<T, E>) -> Result<T, E> {
	let outcome = if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure };

	record_flow_outcome(kind, outcome);

	result
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_result_passes_value_through() {
		record_flow_outcome(FlowKind::AuthorizationCode, FlowOutcome::Attempt);

		assert_eq!(record_result::<_, ()>(FlowKind::Refresh, Ok(7)), Ok(7));
		assert_eq!(record_result::<u8, _>(FlowKind::DesignCreate, Err("boom")), Err("boom"));
	}
}
