//! Assertion utilities for validating flow results.

use wizflow_core::{FlowResult, FlowState, FlowStatus};

use crate::error::TestUtilsError;
use crate::faults::Fault;

/// One-line description of a result used in assertion messages
fn describe(result: &FlowResult) -> String {
    let error = result
        .error()
        .map(|e| format!("{} at step {}: {}", e.kind, e.step_index, e.message))
        .unwrap_or_else(|| "none".to_string());
    format!(
        "iteration {} (seed {}): status {:?}, patterns [{}], error {}",
        result.iteration(),
        result.seed(),
        result.status(),
        result.failure_patterns().join(", "),
        error
    )
}

/// Asserts that a flow ran to completion without failures.
pub fn assert_flow_passed(result: &FlowResult) -> Result<(), TestUtilsError> {
    if result.status() == FlowStatus::Pass && result.state() == FlowState::Completed {
        return Ok(());
    }
    Err(TestUtilsError::AssertionFailed(format!(
        "expected a passing flow, got {}",
        describe(result)
    )))
}

/// Asserts that a validator reported `pattern` somewhere in the flow.
pub fn assert_pattern_reported(result: &FlowResult, pattern: &str) -> Result<(), TestUtilsError> {
    if result.failure_patterns().iter().any(|p| p == pattern) {
        return Ok(());
    }
    Err(TestUtilsError::AssertionFailed(format!(
        "expected pattern '{}', got {}",
        pattern,
        describe(result)
    )))
}

/// Asserts that the flow aborted with an error of `kind`.
pub fn assert_flow_errored(result: &FlowResult, kind: &str) -> Result<(), TestUtilsError> {
    match result.error() {
        Some(error) if error.kind == kind && result.status() == FlowStatus::Error => Ok(()),
        _ => Err(TestUtilsError::AssertionFailed(format!(
            "expected a '{}' error, got {}",
            kind,
            describe(result)
        ))),
    }
}

/// Asserts that the harness surfaced `fault`, either as its failure pattern or as its flow error kind.
pub fn assert_fault_exposed(result: &FlowResult, fault: Fault) -> Result<(), TestUtilsError> {
    let expected = fault.expected_pattern();
    match result.error() {
        Some(_) => assert_flow_errored(result, expected),
        None => assert_pattern_reported(result, expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wizflow_core::{CoreError, FlowErrorRecord, FlowStep, StepAction};

    #[test]
    fn fresh_result_is_not_a_pass_until_finished() {
        let mut result = FlowResult::new(1, 42);
        assert!(assert_flow_passed(&result).is_err());
        result.finish(0);
        assert!(assert_flow_passed(&result).is_ok());
        assert!(assert_pattern_reported(&result, "racial_spells_not_cleared").is_err());
    }

    #[test]
    fn aborted_result_matches_its_error_kind() {
        let mut result = FlowResult::new(1, 42);
        let step = FlowStep::new(StepAction::SetBackground, "Set background");
        let error = CoreError::TransportError("connection reset".to_string());
        result.abort(FlowErrorRecord::from_error(4, &step, &error));
        assert!(assert_flow_errored(&result, "transport").is_ok());
        assert!(assert_flow_errored(&result, "rejected").is_err());
        assert!(assert_fault_exposed(&result, Fault::RejectBackgroundPatch).is_err());
    }
}
