//! Conditional logic engine for form builders.
//!
//! A [`Form`] is compiled once from its definition: rules are prepared, the
//! dependency graph between fields is built and topologically ordered. A
//! rule that would close a dependency cycle is compiled as never matching.
//! The compiled form is immutable and can be shared across threads.
//!
//! On the client side a [`FormSession`] keeps the live values, re-evaluates
//! only the targets affected by a change and drives a [`Renderer`]. On the
//! server side [`validate_submission`] evaluates the posted values from
//! scratch with the same engine.

mod calc;
mod compile;
mod config;
mod error;
mod evaluate;
pub mod parse;
mod resolve;
#[cfg(feature = "binary-cache")]
pub mod serial;
mod session;
mod submission;
mod types;

pub use calc::recalculate;
pub use config::EngineConfig;
pub use error::FormLogicError;
pub use evaluate::{aggregate, evaluate, evaluate_form, matches_operation, EvaluationState};
pub use parse::ParseError;
pub use resolve::{resolve, ValueMode};
pub use session::{
    Batch, Debouncer, Effect, FormSession, LiveForm, NullRenderer, RecalcListener, Recalculation,
    Renderer, Transition,
};
pub use submission::{
    validate_submission, validate_submission_with_config, Submission, SubmissionOutcome,
};
pub use types::{
    checkbox_input_ids, field, input, input_name, ActionType, BinaryOp, CheckInput, Choice,
    CompileError, CompiledGroup, CompiledRule, CurrencyFormat, DependencyGraph, EvaluationReport,
    Field, FieldExpr, FieldId, FieldKind, FieldRef, Form, FormBuilder, FormDefinition, Formula,
    InputState, InvalidFieldRef, LogicType, NumberFormat, NumberFormatKind, Operator, Posted,
    PostedData, ResolvedValue, Rule, RuleGroup, Snapshot, SubInput, TargetId, Visibility,
    OTHER_CHOICE,
};
