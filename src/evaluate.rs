use std::collections::BTreeMap;
use std::time::Instant;

use tracing::trace;

use crate::resolve::{resolve, ValueMode};
use crate::types::{
    CompiledGroup, CompiledRule, EvaluationReport, Form, LogicType, NumberFormat, Operator,
    ResolvedValue, Snapshot, TargetId, Visibility,
};

/// The latest decision for every target. A target without an entry has not
/// been decided yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationState {
    decisions: BTreeMap<TargetId, Visibility>,
}

impl EvaluationState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, target: TargetId) -> Option<Visibility> {
        self.decisions.get(&target).copied()
    }

    #[must_use]
    pub fn is_hidden(&self, target: TargetId) -> bool {
        self.get(target) == Some(Visibility::Hidden)
    }

    /// Record a decision, returning the previous one.
    pub fn set(&mut self, target: TargetId, visibility: Visibility) -> Option<Visibility> {
        self.decisions.insert(target, visibility)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TargetId, Visibility)> + '_ {
        self.decisions.iter().map(|(t, v)| (*t, *v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

/// Apply a rule's operator to one resolved string.
#[must_use]
pub fn matches_operation(value: &str, rule: &CompiledRule) -> bool {
    let haystack = value.to_lowercase();
    let needle = rule.needle.as_str();
    match rule.operator {
        Operator::Is => haystack == needle,
        Operator::IsNot => haystack != needle,
        Operator::GreaterThan => compare_numbers(value, rule).is_some_and(|(a, b)| a > b),
        Operator::LessThan => compare_numbers(value, rule).is_some_and(|(a, b)| a < b),
        Operator::Contains => haystack.contains(needle),
        Operator::StartsWith => haystack.starts_with(needle),
        Operator::EndsWith => haystack.ends_with(needle),
    }
}

fn compare_numbers(value: &str, rule: &CompiledRule) -> Option<(f64, f64)> {
    Some((NumberFormat::DecimalDot.parse(value)?, rule.number?))
}

/// Evaluate one rule against a resolved value.
///
/// On multi-valued input `isnot` holds only when every value differs, the
/// other operators when any value matches. A blank `is`/`isnot` value tests
/// whether anything is selected at all.
#[must_use]
pub fn evaluate(rule: &CompiledRule, value: &ResolvedValue) -> bool {
    if !rule.satisfiable {
        return false;
    }
    match value {
        ResolvedValue::Single(v) => matches_operation(v, rule),
        ResolvedValue::Multiple(values) => {
            let blank_check = rule.value.trim().is_empty()
                && matches!(rule.operator, Operator::Is | Operator::IsNot);
            if blank_check {
                let empty = values.iter().all(|v| v.trim().is_empty());
                return (rule.operator == Operator::Is) == empty;
            }
            if rule.operator == Operator::IsNot {
                values.iter().all(|v| matches_operation(v, rule))
            } else {
                values.iter().any(|v| matches_operation(v, rule))
            }
        }
    }
}

/// Combine rule results into a decision: a satisfied group applies its
/// action, an unsatisfied one the opposite.
#[must_use]
pub fn aggregate(group: &CompiledGroup, results: impl IntoIterator<Item = bool>) -> Visibility {
    let mut results = results.into_iter();
    let satisfied = match group.logic_type {
        LogicType::All => results.all(|r| r),
        LogicType::Any => results.any(|r| r),
    };
    let outcome = group.action_type.outcome();
    if satisfied {
        outcome
    } else {
        outcome.inverse()
    }
}

/// Decide one target. A hidden section or page hides its members without
/// looking at their own rules.
pub(crate) fn decide<S: Snapshot + ?Sized>(
    form: &Form,
    target: TargetId,
    snapshot: &S,
    state: &EvaluationState,
) -> Visibility {
    let graph = form.graph();
    if let Some(container) = graph.container_of(target) {
        if state.is_hidden(container) {
            return Visibility::Hidden;
        }
    }
    let Some(group) = graph.group(target) else {
        return Visibility::Shown;
    };
    aggregate(
        group,
        group.rules.iter().map(|rule| {
            let value = rule_input(form, rule, snapshot, state);
            evaluate(rule, &value)
        }),
    )
}

/// The value a rule sees. A trigger field that is currently hidden reads as
/// its default, whatever the snapshot holds.
fn rule_input<S: Snapshot + ?Sized>(
    form: &Form,
    rule: &CompiledRule,
    snapshot: &S,
    state: &EvaluationState,
) -> ResolvedValue {
    let id = rule.field.field;
    let input = if state.is_hidden(TargetId::Field(id)) {
        form.default_state(id)
    } else {
        snapshot.input(id).or_else(|| form.default_state(id))
    };
    form.field(id)
        .zip(input)
        .and_then(|(field, input)| {
            resolve(
                field,
                input,
                rule.field.input,
                ValueMode::Rule,
                &form.definition().currency,
            )
        })
        .unwrap_or_else(|| ResolvedValue::Single(String::new()))
}

/// Evaluate every target of `form` against `snapshot`, starting from a fresh
/// state. This is the server-side counterpart of a session's init pass.
pub fn evaluate_form<S: Snapshot + ?Sized>(form: &Form, snapshot: &S) -> EvaluationReport {
    let start = Instant::now();
    let mut state = EvaluationState::new();
    for &target in form.evaluation_order() {
        let visibility = decide(form, target, snapshot, &state);
        trace!(%target, %visibility, "decided");
        state.set(target, visibility);
    }
    EvaluationReport::new(state, form.evaluation_order().to_vec(), start.elapsed())
}
