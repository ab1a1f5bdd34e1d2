//! Reading a field reference out of an input state.

use crate::types::{
    number_format, CurrencyFormat, Field, FieldKind, FieldRef, Form, InputState, ResolvedValue,
    Snapshot, OTHER_CHOICE,
};

/// Which half of a `value|price` choice value to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueMode {
    /// The value rules compare against.
    #[default]
    Rule,
    /// The price, for totals.
    Price,
}

/// Resolve the value of `field` (or its sub-input `input`) from `state`.
///
/// Checkable fields yield only their checked items, so nothing checked is
/// `Multiple([])`. Number fields are rewritten to canonical decimal-dot
/// notation, as are totals, which are stored formatted in the form currency;
/// input that is not a valid number is returned unchanged.
/// Returns `None` when `input` names no sub-input of the field.
#[must_use]
pub fn resolve(
    field: &Field,
    state: &InputState,
    input: Option<u32>,
    mode: ValueMode,
    currency: &CurrencyFormat,
) -> Option<ResolvedValue> {
    let priced = field.kind.has_priced_choices();
    match state {
        InputState::Text(text) => {
            if input.is_some() {
                return None;
            }
            let value = match &field.kind {
                FieldKind::Number { .. } | FieldKind::Total => number_format(field, currency)
                    .normalize(text)
                    .unwrap_or_else(|| text.clone()),
                _ => project(text, priced, mode),
            };
            Some(ResolvedValue::Single(value))
        }
        InputState::Selections(values) => {
            if input.is_some() {
                return None;
            }
            Some(ResolvedValue::Multiple(
                values.iter().map(|v| project(v, priced, mode)).collect(),
            ))
        }
        InputState::Choices { items, other } => {
            let value_of = |value: &str| {
                if value == OTHER_CHOICE {
                    other.clone().unwrap_or_default()
                } else {
                    project(value, priced, mode)
                }
            };
            match input {
                Some(id) => {
                    let item = items.iter().find(|i| i.id == id)?;
                    Some(ResolvedValue::Single(if item.checked {
                        value_of(&item.value)
                    } else {
                        String::new()
                    }))
                }
                None => Some(ResolvedValue::Multiple(
                    items
                        .iter()
                        .filter(|i| i.checked)
                        .map(|i| value_of(&i.value))
                        .collect(),
                )),
            }
        }
        InputState::Parts(parts) => match input {
            Some(id) => {
                let part = parts.get(&id)?;
                resolve(field, part, None, mode, currency)
            }
            None => Some(ResolvedValue::Multiple(
                parts
                    .values()
                    .filter_map(|part| resolve(field, part, None, mode, currency))
                    .flat_map(|v| v.iter().map(str::to_owned).collect::<Vec<_>>())
                    .filter(|v| !v.trim().is_empty())
                    .collect(),
            )),
        },
    }
}

fn project(value: &str, priced: bool, mode: ValueMode) -> String {
    if !priced {
        return value.to_owned();
    }
    match (mode, value.split_once('|')) {
        (ValueMode::Rule, Some((v, _))) => v.to_owned(),
        (ValueMode::Price, Some((_, price))) => price.to_owned(),
        (ValueMode::Rule, None) => value.to_owned(),
        (ValueMode::Price, None) => String::new(),
    }
}

impl Form {
    /// Resolve a field reference against a snapshot, falling back to the
    /// field's default when the snapshot has no value for it.
    #[must_use]
    pub fn resolve(
        &self,
        snapshot: &(impl Snapshot + ?Sized),
        reference: FieldRef,
        mode: ValueMode,
    ) -> Option<ResolvedValue> {
        let field = self.field(reference.field)?;
        let state = snapshot
            .input(reference.field)
            .or_else(|| self.default_state(reference.field))?;
        resolve(field, state, reference.input, mode, &self.definition.currency)
    }
}
