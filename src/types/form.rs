use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::CompileError;
use super::field::{Field, FieldKind};
use super::field_ref::FieldId;
use super::formula::Formula;
use super::graph::DependencyGraph;
use super::state::InputState;
use super::value::{CurrencyFormat, NumberFormat};
use super::visibility::TargetId;

/// A form as authored: its fields in display order plus form-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDefinition {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub currency: CurrencyFormat,
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// Builder for constructing a [`Form`].
///
/// # Example
///
/// ```
/// use formlogic::{Field, FormBuilder, RuleGroup, field};
///
/// let form = FormBuilder::new()
///     .field(Field::radio(1, ["Yes", "No"]))
///     .field(Field::text(2).logic(RuleGroup::show_if_all([field(1).is("Yes")])))
///     .compile()
///     .unwrap();
/// assert_eq!(form.dependents_of(1).len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct FormBuilder {
    definition: FormDefinition,
}

impl FormBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn id(mut self, id: u32) -> Self {
        self.definition.id = id;
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.definition.title = title.into();
        self
    }

    #[must_use]
    pub fn currency(mut self, currency: CurrencyFormat) -> Self {
        self.definition.currency = currency;
        self
    }

    /// Append a field. Fields keep the order they are added in, which
    /// decides section and page membership.
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.definition.fields.push(field);
        self
    }

    /// Compile into an immutable [`Form`].
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] if validation fails.
    pub fn compile(self) -> Result<Form, CompileError> {
        Form::compile(self.definition)
    }
}

/// A compiled, immutable form. Thread-safe and designed to live behind `Arc`.
#[derive(Debug)]
pub struct Form {
    pub(crate) definition: FormDefinition,
    pub(crate) positions: BTreeMap<FieldId, usize>,
    pub(crate) defaults: BTreeMap<FieldId, InputState>,
    pub(crate) formulas: BTreeMap<FieldId, Formula>,
    pub(crate) graph: DependencyGraph,
}

impl Form {
    /// Compile a form definition.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] on duplicate ids, malformed formulas or
    /// quantity fields without a product. Rules that close a dependency
    /// cycle are disabled with a warning instead.
    pub fn compile(definition: FormDefinition) -> Result<Self, CompileError> {
        crate::compile::compile(definition)
    }

    /// Parse a JSON form definition and compile it.
    ///
    /// # Errors
    ///
    /// Returns [`FormLogicError`](crate::FormLogicError) on JSON or compile failure.
    pub fn from_json(json: &str) -> Result<Self, crate::FormLogicError> {
        let definition: FormDefinition = serde_json::from_str(json)?;
        Ok(Self::compile(definition)?)
    }

    #[must_use]
    pub fn definition(&self) -> &FormDefinition {
        &self.definition
    }

    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.definition.fields
    }

    #[must_use]
    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.positions
            .get(&id)
            .and_then(|&i| self.definition.fields.get(i))
    }

    /// The state a field starts in and is reset to when hidden.
    #[must_use]
    pub fn default_state(&self, id: FieldId) -> Option<&InputState> {
        self.defaults.get(&id)
    }

    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Direct dependents of a field, in rank order.
    #[must_use]
    pub fn dependents_of(&self, field: FieldId) -> &[TargetId] {
        self.graph.dependents_of(field)
    }

    /// Deduplicated, rank-ordered dependents of a batch of changed fields.
    #[must_use]
    pub fn affected_by(&self, triggers: impl IntoIterator<Item = FieldId>) -> Vec<TargetId> {
        self.graph.affected_by(triggers)
    }

    /// Every target in the order a full evaluation visits them.
    #[must_use]
    pub fn evaluation_order(&self) -> &[TargetId] {
        self.graph.order()
    }

    /// How numbers are written in a field, taking the form currency into account.
    #[must_use]
    pub fn number_format(&self, id: FieldId) -> NumberFormat {
        self.field(id).map_or(NumberFormat::DecimalDot, |f| {
            number_format(f, &self.definition.currency)
        })
    }

    #[must_use]
    pub fn formula(&self, id: FieldId) -> Option<&Formula> {
        self.formulas.get(&id)
    }

    /// Fields whose values the engine computes, in form order.
    pub fn computed_fields(&self) -> impl Iterator<Item = &Field> {
        self.definition
            .fields
            .iter()
            .filter(|f| f.kind.is_computed())
    }

    /// The field that decides whether the honeypot check fires.
    #[must_use]
    pub fn honeypot(&self) -> Option<&Field> {
        self.definition.fields.iter().find(|f| f.is_honeypot)
    }
}

pub(crate) fn number_format(field: &Field, currency: &CurrencyFormat) -> NumberFormat {
    match &field.kind {
        FieldKind::Number { number_format } => NumberFormat::from_kind(*number_format, currency),
        FieldKind::Product { .. } | FieldKind::Total => NumberFormat::Currency(currency.clone()),
        _ => NumberFormat::DecimalDot,
    }
}

#[cfg(feature = "binary-cache")]
impl Form {
    /// Serialize the form definition to a checksummed byte vector.
    ///
    /// The optional `source_text` is hashed (BLAKE3) and embedded in the
    /// payload metadata so callers can tell when the cache is stale.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError`](crate::serial::SerializeError) if encoding fails.
    pub fn to_bytes(
        &self,
        source_text: Option<&str>,
    ) -> Result<Vec<u8>, crate::serial::SerializeError> {
        crate::serial::encode(self, source_text)
    }

    /// Rebuild a form from bytes produced by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// Returns [`DeserializeError`](crate::serial::DeserializeError) on
    /// format, integrity or compile failure.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, crate::serial::DeserializeError> {
        crate::serial::decode(bytes)
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Form({} fields, {} targets, {} triggers)",
            self.definition.fields.len(),
            self.graph.order.len(),
            self.graph.dependents.len(),
        )
    }
}
