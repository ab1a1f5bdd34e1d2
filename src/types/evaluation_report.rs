use std::fmt;
use std::time::Duration;

use super::field_ref::FieldId;
use super::visibility::{TargetId, Visibility};
use crate::evaluate::EvaluationState;

/// Result of a full evaluation, returned by
/// [`evaluate_form()`](crate::evaluate_form).
///
/// Holds the decision for every target, the order targets were visited in
/// and the wall-clock duration of the evaluation.
#[derive(Debug, Clone)]
#[must_use]
pub struct EvaluationReport {
    state: EvaluationState,
    evaluation_order: Vec<TargetId>,
    duration: Duration,
}

impl EvaluationReport {
    pub(crate) fn new(
        state: EvaluationState,
        evaluation_order: Vec<TargetId>,
        duration: Duration,
    ) -> Self {
        Self {
            state,
            evaluation_order,
            duration,
        }
    }

    #[must_use]
    pub fn visibility(&self, target: TargetId) -> Option<Visibility> {
        self.state.get(target)
    }

    /// Whether a field ended up hidden, directly or through its section or page.
    #[must_use]
    pub fn is_field_hidden(&self, field: FieldId) -> bool {
        self.state.is_hidden(TargetId::Field(field))
    }

    /// Hidden targets, in evaluation order.
    #[must_use]
    pub fn hidden(&self) -> Vec<TargetId> {
        self.evaluation_order
            .iter()
            .copied()
            .filter(|t| self.state.is_hidden(*t))
            .collect()
    }

    #[must_use]
    pub fn state(&self) -> &EvaluationState {
        &self.state
    }

    /// All targets in the order they were evaluated (topological order).
    #[must_use]
    pub fn evaluation_order(&self) -> &[TargetId] {
        &self.evaluation_order
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hidden: Vec<String> = self.hidden().iter().map(ToString::to_string).collect();
        write!(f, "evaluated: {}", self.evaluation_order.len())?;
        write!(f, ", hidden: [{}]", hidden.join(", "))?;
        write!(f, ", duration: {:?}", self.duration)?;
        Ok(())
    }
}
