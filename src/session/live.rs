use std::collections::{BTreeMap, BTreeSet};

use crate::types::{
    encode_posted, input_name, FieldId, FieldKind, Form, InputState, PostedData, Snapshot,
    TargetId, OTHER_CHOICE,
};

/// The client-side state of a rendered form: input values, which inputs are
/// disabled and each target's display style.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveForm {
    values: BTreeMap<FieldId, InputState>,
    radios: BTreeSet<FieldId>,
    disabled: BTreeSet<FieldId>,
    display: BTreeMap<TargetId, String>,
    captured: BTreeMap<TargetId, String>,
}

const HIDDEN_DISPLAY: &str = "none";

impl LiveForm {
    /// A live form with every field at its default.
    #[must_use]
    pub fn new(form: &Form) -> Self {
        let values = form
            .fields()
            .iter()
            .filter_map(|f| form.default_state(f.id).map(|s| (f.id, s.clone())))
            .collect();
        let radios = form
            .fields()
            .iter()
            .filter(|f| matches!(f.kind, FieldKind::Radio { .. }))
            .map(|f| f.id)
            .collect();
        Self {
            values,
            radios,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn value(&self, field: FieldId) -> Option<&InputState> {
        self.values.get(&field)
    }

    /// Replace a field's whole state.
    pub fn set(&mut self, field: FieldId, state: InputState) {
        self.values.insert(field, state);
    }

    pub fn set_text(&mut self, field: FieldId, text: impl Into<String>) {
        self.values.insert(field, InputState::Text(text.into()));
    }

    /// Check or uncheck one checkbox or radio item. Checking a radio item
    /// unchecks its siblings. Returns `false` if the item does not exist.
    pub fn set_checked(&mut self, field: FieldId, item: u32, checked: bool) -> bool {
        let radio = self.radios.contains(&field);
        let Some(InputState::Choices { items, .. }) = self.values.get_mut(&field) else {
            return false;
        };
        if !items.iter().any(|i| i.id == item) {
            return false;
        }
        for i in items.iter_mut() {
            if i.id == item {
                i.checked = checked;
            } else if radio && checked {
                i.checked = false;
            }
        }
        true
    }

    /// Select the radio item carrying `value`, unchecking the rest.
    pub fn select(&mut self, field: FieldId, value: &str) -> bool {
        let id = match self.values.get(&field) {
            Some(InputState::Choices { items, .. }) => {
                items.iter().find(|i| i.value == value).map(|i| i.id)
            }
            _ => None,
        };
        id.is_some_and(|id| self.set_checked(field, id, true))
    }

    /// Type into a radio field's "other" text box and select it.
    pub fn set_other(&mut self, field: FieldId, text: impl Into<String>) -> bool {
        match self.values.get_mut(&field) {
            Some(InputState::Choices {
                other: Some(other), ..
            }) => *other = text.into(),
            _ => return false,
        }
        self.select(field, OTHER_CHOICE)
    }

    /// Set one part of a composite field.
    pub fn set_part(&mut self, field: FieldId, part: u32, text: impl Into<String>) -> bool {
        match self.values.get_mut(&field) {
            Some(InputState::Parts(parts)) => {
                parts.insert(part, InputState::Text(text.into()));
                true
            }
            _ => false,
        }
    }

    /// Reset a field to `default`, returning whether anything changed.
    pub(crate) fn reset(&mut self, field: FieldId, default: &InputState) -> bool {
        match self.values.get_mut(&field) {
            Some(current) => current.reset_to(default),
            None => {
                self.values.insert(field, default.clone());
                true
            }
        }
    }

    #[must_use]
    pub fn is_disabled(&self, field: FieldId) -> bool {
        self.disabled.contains(&field)
    }

    pub(crate) fn set_disabled(&mut self, field: FieldId, disabled: bool) {
        if disabled {
            self.disabled.insert(field);
        } else {
            self.disabled.remove(&field);
        }
    }

    /// The target's current display style; empty means the default.
    #[must_use]
    pub fn display(&self, target: TargetId) -> &str {
        self.display.get(&target).map_or("", String::as_str)
    }

    /// Set the style a shown target uses, e.g. `"flex"`.
    pub fn set_display(&mut self, target: TargetId, style: impl Into<String>) {
        self.display.insert(target, style.into());
    }

    /// Remember the current display style and switch to hidden.
    pub(crate) fn capture_display(&mut self, target: TargetId) {
        let current = self.display(target).to_owned();
        if current != HIDDEN_DISPLAY {
            self.captured.insert(target, current);
        }
        self.display.insert(target, HIDDEN_DISPLAY.to_owned());
    }

    /// Put back the style captured when the target was hidden.
    pub(crate) fn restore_display(&mut self, target: TargetId) {
        let style = self.captured.remove(&target).unwrap_or_default();
        if style.is_empty() {
            self.display.remove(&target);
        } else {
            self.display.insert(target, style);
        }
    }

    /// Serialize the inputs the way a browser posts them: disabled inputs
    /// and unchecked boxes are left out.
    #[must_use]
    pub fn to_posted(&self) -> PostedData {
        let mut out = PostedData::new();
        for (field, state) in &self.values {
            if self.disabled.contains(field) {
                continue;
            }
            encode_posted(state, self.radios.contains(field), &input_name(*field), &mut out);
        }
        out
    }
}

impl Snapshot for LiveForm {
    fn input(&self, field: FieldId) -> Option<&InputState> {
        self.values.get(&field)
    }
}
