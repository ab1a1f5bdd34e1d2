use thiserror::Error;

use super::field_ref::FieldId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("duplicate field id {id}")]
    DuplicateField { id: FieldId },

    /// A cycle no rule could be disabled to break.
    #[error("cyclic dependency detected: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    #[error("invalid formula in calculation field {field}: {message}")]
    InvalidFormula { field: FieldId, message: String },

    #[error("quantity field {field} refers to {product}, which is not a product field")]
    UnknownProduct { field: FieldId, product: FieldId },
}
