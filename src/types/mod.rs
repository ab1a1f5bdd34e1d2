mod error;
mod evaluation_report;
mod field;
mod field_ref;
mod form;
mod formula;
mod graph;
mod rule;
mod state;
mod value;
mod visibility;

pub use error::CompileError;
pub use evaluation_report::EvaluationReport;
pub use field::{checkbox_input_ids, Choice, Field, FieldKind, SubInput, OTHER_CHOICE};
pub use field_ref::{FieldId, FieldRef, InvalidFieldRef};
pub use form::{Form, FormBuilder, FormDefinition};
pub use formula::{BinaryOp, Formula};
pub use graph::{CompiledGroup, DependencyGraph};
pub use rule::{
    field, input, ActionType, CompiledRule, FieldExpr, LogicType, Operator, Rule, RuleGroup,
};
pub use state::{input_name, CheckInput, InputState, Posted, PostedData, Snapshot};
pub use value::{CurrencyFormat, NumberFormat, NumberFormatKind, ResolvedValue};
pub use visibility::{TargetId, Visibility};

pub(crate) use form::number_format;
pub(crate) use graph::TargetNode;
pub(crate) use state::{decode_posted, encode_posted};
