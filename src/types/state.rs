use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::field_ref::FieldId;

/// One checkbox or radio button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInput {
    pub id: u32,
    pub value: String,
    pub checked: bool,
}

/// Current (or default) value of one field's inputs.
///
/// The same shape serves as the live value, the posted value and the
/// captured default a hidden field is reset to. `Parts` nests, which is how
/// date parts, address lines and repeated rows are represented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputState {
    Text(String),
    Selections(Vec<String>),
    Choices {
        items: Vec<CheckInput>,
        other: Option<String>,
    },
    Parts(BTreeMap<u32, InputState>),
}

impl InputState {
    /// Reset this state to `default`, mapping nested inputs by id.
    ///
    /// Checkable items end up checked only when the default lists them as
    /// checked. Parts present only in the live state (added rows) are
    /// dropped. Returns `true` if anything changed.
    pub fn reset_to(&mut self, default: &InputState) -> bool {
        match (&mut *self, default) {
            (InputState::Text(current), InputState::Text(d)) => {
                if current == d {
                    return false;
                }
                current.clone_from(d);
                true
            }
            (InputState::Selections(current), InputState::Selections(d)) => {
                if current == d {
                    return false;
                }
                current.clone_from(d);
                true
            }
            (
                InputState::Choices { items, other },
                InputState::Choices {
                    items: d_items,
                    other: d_other,
                },
            ) => {
                let mut changed = false;
                for item in items.iter_mut() {
                    let checked = d_items.iter().any(|d| d.id == item.id && d.checked);
                    if item.checked != checked {
                        item.checked = checked;
                        changed = true;
                    }
                }
                if other != d_other {
                    other.clone_from(d_other);
                    changed = true;
                }
                changed
            }
            (InputState::Parts(parts), InputState::Parts(d_parts)) => {
                let before = parts.len();
                parts.retain(|id, _| d_parts.contains_key(id));
                let mut changed = parts.len() != before;
                for (id, d) in d_parts {
                    match parts.get_mut(id) {
                        Some(part) => changed |= part.reset_to(d),
                        None => {
                            parts.insert(*id, d.clone());
                            changed = true;
                        }
                    }
                }
                changed
            }
            (current, d) => {
                *current = d.clone();
                true
            }
        }
    }

    /// Whether nothing has been entered or selected.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            InputState::Text(v) => v.trim().is_empty(),
            InputState::Selections(values) => values.iter().all(|v| v.trim().is_empty()),
            InputState::Choices { items, .. } => !items.iter().any(|i| i.checked),
            InputState::Parts(parts) => parts.values().all(InputState::is_blank),
        }
    }
}

/// Read access to the current value of every field.
///
/// Implemented by the client-side live form and by a server-side
/// submission; both answer the same question so the evaluator can run
/// unchanged in either place.
pub trait Snapshot {
    fn input(&self, field: FieldId) -> Option<&InputState>;
}

impl Snapshot for BTreeMap<FieldId, InputState> {
    fn input(&self, field: FieldId) -> Option<&InputState> {
        self.get(&field)
    }
}

/// A value as it arrives in a form post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Posted {
    One(String),
    Many(Vec<String>),
}

impl Posted {
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        match self {
            Posted::One(v) => Some(v.as_str()),
            Posted::Many(values) => values.first().map(String::as_str),
        }
    }
}

impl From<&str> for Posted {
    fn from(v: &str) -> Self {
        Posted::One(v.to_owned())
    }
}

/// Posted form data keyed by input name (`input_5`, `input_5_2`, `input_5_other`).
pub type PostedData = BTreeMap<String, Posted>;

#[must_use]
pub fn input_name(field: FieldId) -> String {
    format!("input_{field}")
}

/// Append `state` to `out` the way a browser serializes the inputs:
/// unchecked boxes are omitted, radios post the checked value and the
/// "other" text alongside it.
pub(crate) fn encode_posted(state: &InputState, radio: bool, name: &str, out: &mut PostedData) {
    match state {
        InputState::Text(v) => {
            out.insert(name.to_owned(), Posted::One(v.clone()));
        }
        InputState::Selections(values) => {
            out.insert(name.to_owned(), Posted::Many(values.clone()));
        }
        InputState::Choices { items, other } => {
            for item in items.iter().filter(|i| i.checked) {
                if radio {
                    out.insert(name.to_owned(), Posted::One(item.value.clone()));
                } else {
                    out.insert(format!("{name}_{}", item.id), Posted::One(item.value.clone()));
                }
            }
            if let Some(text) = other {
                let other_checked = items
                    .iter()
                    .any(|i| i.checked && i.value == super::field::OTHER_CHOICE);
                if other_checked {
                    out.insert(format!("{name}_other"), Posted::One(text.clone()));
                }
            }
        }
        InputState::Parts(parts) => {
            for (id, part) in parts {
                encode_posted(part, false, &format!("{name}_{id}"), out);
            }
        }
    }
}

/// Rebuild a field's state from posted data, using its default state as the
/// shape. Inputs that were not posted come back empty or unchecked.
pub(crate) fn decode_posted(
    shape: &InputState,
    radio: bool,
    name: &str,
    posted: &PostedData,
) -> InputState {
    match shape {
        InputState::Text(_) => InputState::Text(
            posted
                .get(name)
                .and_then(Posted::first)
                .unwrap_or_default()
                .to_owned(),
        ),
        InputState::Selections(_) => InputState::Selections(match posted.get(name) {
            Some(Posted::Many(values)) => values.clone(),
            Some(Posted::One(v)) => vec![v.clone()],
            None => Vec::new(),
        }),
        InputState::Choices { items, other } => {
            let selected = posted.get(name).and_then(Posted::first);
            let items = items
                .iter()
                .map(|item| {
                    let checked = if radio {
                        selected == Some(item.value.as_str())
                    } else {
                        posted.contains_key(&format!("{name}_{}", item.id))
                    };
                    CheckInput {
                        checked,
                        ..item.clone()
                    }
                })
                .collect();
            let other = other.as_ref().map(|_| {
                posted
                    .get(&format!("{name}_other"))
                    .and_then(Posted::first)
                    .unwrap_or_default()
                    .to_owned()
            });
            InputState::Choices { items, other }
        }
        InputState::Parts(parts) => InputState::Parts(
            parts
                .iter()
                .map(|(id, part)| {
                    let value = decode_posted(part, false, &format!("{name}_{id}"), posted);
                    (*id, value)
                })
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choices(checked: &[bool]) -> InputState {
        InputState::Choices {
            items: checked
                .iter()
                .enumerate()
                .map(|(i, c)| CheckInput {
                    id: u32::try_from(i).unwrap() + 1,
                    value: format!("v{i}"),
                    checked: *c,
                })
                .collect(),
            other: None,
        }
    }

    #[test]
    fn reset_text() {
        let mut s = InputState::Text("typed".into());
        assert!(s.reset_to(&InputState::Text("foo".into())));
        assert_eq!(s, InputState::Text("foo".into()));
        assert!(!s.reset_to(&InputState::Text("foo".into())));
    }

    #[test]
    fn reset_checks_only_default_items() {
        let mut s = choices(&[true, true, false]);
        assert!(s.reset_to(&choices(&[false, false, true])));
        assert_eq!(s, choices(&[false, false, true]));
    }

    #[test]
    fn reset_parts_recursively_and_drops_added_rows() {
        let mut default = BTreeMap::new();
        default.insert(1, InputState::Text("01".into()));
        let row = BTreeMap::from([(1, InputState::Text(String::new()))]);
        default.insert(2, InputState::Parts(row));
        let default = InputState::Parts(default);

        let mut live = BTreeMap::new();
        live.insert(1, InputState::Text("12".into()));
        live.insert(2, InputState::Parts(BTreeMap::from([(1, InputState::Text("row".into()))])));
        live.insert(3, InputState::Text("extra row".into()));
        let mut live = InputState::Parts(live);

        assert!(live.reset_to(&default));
        assert_eq!(live, default);
    }

    #[test]
    fn reset_mismatched_shape_replaces() {
        let mut s = InputState::Text("x".into());
        assert!(s.reset_to(&InputState::Selections(vec![])));
        assert_eq!(s, InputState::Selections(vec![]));
    }

    #[test]
    fn blank_detection() {
        assert!(InputState::Text("  ".into()).is_blank());
        assert!(choices(&[false, false]).is_blank());
        assert!(!choices(&[false, true]).is_blank());
        assert!(InputState::Selections(vec![]).is_blank());
    }

    #[test]
    fn checkbox_posting_omits_unchecked() {
        let mut out = PostedData::new();
        encode_posted(&choices(&[true, false, true]), false, "input_5", &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out["input_5_1"], Posted::from("v0"));
        assert_eq!(out["input_5_3"], Posted::from("v2"));

        let decoded = decode_posted(&choices(&[false, false, false]), false, "input_5", &out);
        assert_eq!(decoded, choices(&[true, false, true]));
    }

    #[test]
    fn radio_posting_uses_field_name() {
        let mut out = PostedData::new();
        encode_posted(&choices(&[false, true]), true, "input_4", &mut out);
        assert_eq!(out["input_4"], Posted::from("v1"));
        let decoded = decode_posted(&choices(&[false, false]), true, "input_4", &out);
        assert_eq!(decoded, choices(&[false, true]));
    }

    #[test]
    fn missing_inputs_decode_empty() {
        let shape = InputState::Text("default".into());
        let decoded = decode_posted(&shape, false, "input_9", &PostedData::new());
        assert_eq!(decoded, InputState::Text(String::new()));
    }

    #[test]
    fn posted_deserializes_untagged() {
        let data: PostedData =
            serde_json::from_str(r#"{"input_1": "a", "input_2": ["x", "y"]}"#).unwrap();
        assert_eq!(data["input_1"], Posted::One("a".into()));
        assert_eq!(data["input_2"], Posted::Many(vec!["x".into(), "y".into()]));
    }
}
