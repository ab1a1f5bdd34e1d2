use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::field_ref::FieldId;
use super::rule::RuleGroup;
use super::state::{CheckInput, InputState};
use super::value::NumberFormatKind;

/// Value posted for a radio button whose free-text "other" option is chosen.
pub const OTHER_CHOICE: &str = "gf_other_choice";

/// One selectable option of a choice field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub text: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub is_selected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
}

impl Choice {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            text: value.clone(),
            value,
            is_selected: false,
            price: None,
        }
    }

    #[must_use]
    pub fn selected(mut self) -> Self {
        self.is_selected = true;
        self
    }

    #[must_use]
    pub fn priced(mut self, price: impl Into<String>) -> Self {
        self.price = Some(price.into());
        self
    }

    /// The value as rendered on the input: `value|price` for priced choices.
    #[must_use]
    pub fn input_value(&self) -> String {
        let value = if self.value.is_empty() {
            &self.text
        } else {
            &self.value
        };
        match &self.price {
            Some(price) => format!("{value}|{price}"),
            None => value.clone(),
        }
    }
}

/// A named part of a composite field (name, address, date parts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubInput {
    pub id: u32,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub default_value: String,
}

impl SubInput {
    #[must_use]
    pub fn new(id: u32, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            default_value: String::new(),
        }
    }

    #[must_use]
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = value.into();
        self
    }
}

/// Field types understood by the engine. Each variant carries only what
/// conditional logic and recalculation need from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    #[serde(
        alias = "textarea",
        alias = "email",
        alias = "hidden",
        alias = "phone",
        alias = "website"
    )]
    Text,
    #[serde(rename_all = "camelCase")]
    Number {
        #[serde(default)]
        number_format: NumberFormatKind,
    },
    Select {
        #[serde(default)]
        choices: Vec<Choice>,
    },
    Multiselect {
        #[serde(default)]
        choices: Vec<Choice>,
    },
    #[serde(rename_all = "camelCase")]
    Radio {
        #[serde(default)]
        choices: Vec<Choice>,
        #[serde(default)]
        enable_other_choice: bool,
    },
    Checkbox {
        #[serde(default)]
        choices: Vec<Choice>,
    },
    #[serde(alias = "name", alias = "address", alias = "date")]
    Composite {
        #[serde(default)]
        inputs: Vec<SubInput>,
    },
    List {
        #[serde(default)]
        columns: u32,
    },
    Section,
    Page,
    #[serde(rename_all = "camelCase")]
    Product {
        #[serde(default)]
        base_price: Option<String>,
        #[serde(default)]
        choices: Vec<Choice>,
    },
    #[serde(rename_all = "camelCase")]
    Quantity { product_id: FieldId },
    Total,
    Calculation {
        formula: String,
        #[serde(default)]
        rounding: Option<usize>,
    },
}

impl FieldKind {
    /// Sections and pages hold other fields instead of inputs.
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self, FieldKind::Section | FieldKind::Page)
    }

    /// Fields whose value the engine computes.
    #[must_use]
    pub fn is_computed(&self) -> bool {
        matches!(self, FieldKind::Total | FieldKind::Calculation { .. })
    }

    /// Whether a rendered value may carry a `|price` suffix.
    #[must_use]
    pub fn has_priced_choices(&self) -> bool {
        match self {
            FieldKind::Select { choices }
            | FieldKind::Multiselect { choices }
            | FieldKind::Radio { choices, .. }
            | FieldKind::Checkbox { choices }
            | FieldKind::Product { choices, .. } => !choices.is_empty(),
            _ => false,
        }
    }
}

/// One field of a form definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: FieldId,
    #[serde(default)]
    pub label: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_logic: Option<RuleGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_honeypot: bool,
}

impl Field {
    #[must_use]
    pub fn new(id: FieldId, kind: FieldKind) -> Self {
        Self {
            id,
            label: String::new(),
            kind,
            conditional_logic: None,
            default_value: None,
            is_required: false,
            is_honeypot: false,
        }
    }

    #[must_use]
    pub fn text(id: FieldId) -> Self {
        Self::new(id, FieldKind::Text)
    }

    #[must_use]
    pub fn number(id: FieldId, number_format: NumberFormatKind) -> Self {
        Self::new(id, FieldKind::Number { number_format })
    }

    #[must_use]
    pub fn select<I, C>(id: FieldId, choices: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Choice>,
    {
        Self::new(id, FieldKind::Select {
            choices: choices.into_iter().map(Into::into).collect(),
        })
    }

    #[must_use]
    pub fn radio<I, C>(id: FieldId, choices: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Choice>,
    {
        Self::new(id, FieldKind::Radio {
            choices: choices.into_iter().map(Into::into).collect(),
            enable_other_choice: false,
        })
    }

    #[must_use]
    pub fn checkbox<I, C>(id: FieldId, choices: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Choice>,
    {
        Self::new(id, FieldKind::Checkbox {
            choices: choices.into_iter().map(Into::into).collect(),
        })
    }

    #[must_use]
    pub fn section(id: FieldId) -> Self {
        Self::new(id, FieldKind::Section)
    }

    #[must_use]
    pub fn page(id: FieldId) -> Self {
        Self::new(id, FieldKind::Page)
    }

    #[must_use]
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn logic(mut self, group: RuleGroup) -> Self {
        self.conditional_logic = Some(group);
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    #[must_use]
    pub fn honeypot(mut self) -> Self {
        self.is_honeypot = true;
        self
    }

    /// The field's conditional logic, if it has any that can hide it.
    #[must_use]
    pub fn rule_group(&self) -> Option<&RuleGroup> {
        self.conditional_logic.as_ref().filter(|g| g.is_active())
    }

    /// Sub-input ids a rule may address with `field.input`.
    #[must_use]
    pub fn input_ids(&self) -> Vec<u32> {
        match &self.kind {
            FieldKind::Checkbox { choices } => checkbox_input_ids(choices.len()),
            FieldKind::Composite { inputs } => inputs.iter().map(|i| i.id).collect(),
            _ => Vec::new(),
        }
    }

    /// The input state the field starts in and returns to when hidden.
    /// Containers have no inputs and return `None`.
    #[must_use]
    pub fn default_state(&self) -> Option<InputState> {
        let authored = self.default_value.clone().unwrap_or_default();
        let state = match &self.kind {
            FieldKind::Section | FieldKind::Page => return None,
            FieldKind::Text
            | FieldKind::Number { .. }
            | FieldKind::Quantity { .. }
            | FieldKind::Total
            | FieldKind::Calculation { .. } => InputState::Text(authored),
            FieldKind::Select { choices } | FieldKind::Product { choices, .. }
                if !choices.is_empty() =>
            {
                let selected = choices
                    .iter()
                    .find(|c| c.is_selected)
                    .or_else(|| choices.first())
                    .map(Choice::input_value)
                    .unwrap_or_default();
                InputState::Text(selected)
            }
            FieldKind::Select { .. } => InputState::Text(authored),
            FieldKind::Product { base_price, .. } => {
                InputState::Text(base_price.clone().unwrap_or_default())
            }
            FieldKind::Multiselect { choices } => InputState::Selections(
                choices
                    .iter()
                    .filter(|c| c.is_selected)
                    .map(Choice::input_value)
                    .collect(),
            ),
            FieldKind::Radio {
                choices,
                enable_other_choice,
            } => {
                let mut items: Vec<CheckInput> = choices
                    .iter()
                    .enumerate()
                    .map(|(i, c)| CheckInput {
                        id: u32::try_from(i).unwrap_or(u32::MAX),
                        value: c.input_value(),
                        checked: c.is_selected,
                    })
                    .collect();
                if *enable_other_choice {
                    items.push(CheckInput {
                        id: u32::try_from(items.len()).unwrap_or(u32::MAX),
                        value: OTHER_CHOICE.to_owned(),
                        checked: false,
                    });
                }
                InputState::Choices {
                    items,
                    other: enable_other_choice.then(String::new),
                }
            }
            FieldKind::Checkbox { choices } => InputState::Choices {
                items: choices
                    .iter()
                    .zip(checkbox_input_ids(choices.len()))
                    .map(|(c, id)| CheckInput {
                        id,
                        value: c.input_value(),
                        checked: c.is_selected,
                    })
                    .collect(),
                other: None,
            },
            FieldKind::Composite { inputs } => InputState::Parts(
                inputs
                    .iter()
                    .map(|i| (i.id, InputState::Text(i.default_value.clone())))
                    .collect::<BTreeMap<_, _>>(),
            ),
            FieldKind::List { .. } => InputState::Selections(
                self.default_value
                    .as_deref()
                    .map(|v| v.split(',').map(str::to_owned).collect())
                    .unwrap_or_default(),
            ),
        };
        Some(state)
    }
}

impl From<&str> for Choice {
    fn from(value: &str) -> Self {
        Choice::new(value)
    }
}

/// Checkbox sub-input ids: 1..=9, 11..=19, ... Multiples of ten are skipped
/// so that `5.1` and `5.10` can never be confused.
#[must_use]
pub fn checkbox_input_ids(count: usize) -> Vec<u32> {
    (1_u32..)
        .filter(|id| id % 10 != 0)
        .take(count)
        .collect()
}
