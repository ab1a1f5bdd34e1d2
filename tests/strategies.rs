#![allow(dead_code)]

use std::collections::BTreeMap;

use formlogic::{
    checkbox_input_ids, field, ActionType, CheckInput, Choice, Field, FieldId, Form, FormBuilder,
    InputState, LogicType, NumberFormatKind, Rule, RuleGroup,
};
use proptest::prelude::*;

// --- Fixed form schema ---
// 1 : select   {"red", "green", "blue"}
// 2 : number   (decimal dot)
// 3 : checkbox {"A", "B", "C"}  (inputs 3.1, 3.2, 3.3)
// 4 : text     rule on 1..=3
// 5 : text     rule on 1..=4
// 6 : section  rule on 1..=3, holds 7, 8 and 9
// 7 : text     rule on 1..=5
// 8 : select   {"x", "y"}       rule on 1..=3
// 9 : text     rule on 1..=8 (never reads the section itself)

pub const COLORS: &[&str] = &["red", "green", "blue"];
pub const LETTERS: &[&str] = &["A", "B", "C"];
pub const XY: &[&str] = &["x", "y"];

/// Ids a generated rule may read from each slot, in the order above.
const READABLE: &[(FieldId, &[FieldId])] = &[
    (4, &[1, 2, 3]),
    (5, &[1, 2, 3, 4]),
    (6, &[1, 2, 3]),
    (7, &[1, 2, 3, 4, 5]),
    (8, &[1, 2, 3]),
    (9, &[1, 2, 3, 4, 5, 7, 8]),
];

/// A rule value that is meaningful for the field it reads.
fn arb_rule_on(id: FieldId) -> BoxedStrategy<Rule> {
    let values: BoxedStrategy<String> = match id {
        1 => prop::sample::select(COLORS).prop_map(str::to_owned).boxed(),
        2 => (0_i32..20).prop_map(|n| n.to_string()).boxed(),
        3 => prop::sample::select(LETTERS).prop_map(str::to_owned).boxed(),
        8 => prop::sample::select(XY).prop_map(str::to_owned).boxed(),
        _ => prop_oneof![Just(String::new()), "[a-c]{1,2}"].boxed(),
    };
    (values, 0_u8..7)
        .prop_map(move |(value, op)| {
            let f = field(id);
            match op {
                0 => f.is(value),
                1 => f.is_not(value),
                2 => f.greater_than(value),
                3 => f.less_than(value),
                4 => f.contains(value),
                5 => f.starts_with(value),
                _ => f.ends_with(value),
            }
        })
        .boxed()
}

/// An optional rule group reading only from `readable`.
fn arb_group(readable: &'static [FieldId]) -> impl Strategy<Value = Option<RuleGroup>> {
    let rule = prop::sample::select(readable).prop_flat_map(arb_rule_on);
    prop::option::weighted(
        0.8,
        (
            prop::collection::vec(rule, 1..=3),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(rules, show, all)| {
                RuleGroup::new(
                    if show { ActionType::Show } else { ActionType::Hide },
                    if all { LogicType::All } else { LogicType::Any },
                    rules,
                )
            }),
    )
}

/// Rule groups for the conditional slots of the schema.
#[derive(Debug, Clone)]
pub struct GenForm {
    pub groups: BTreeMap<FieldId, RuleGroup>,
}

impl GenForm {
    /// # Panics
    ///
    /// Panics if the generated form fails to compile (rules only read
    /// earlier fields, so it never should).
    #[must_use]
    pub fn compile(&self) -> Form {
        let with = |f: Field| match self.groups.get(&f.id) {
            Some(group) => f.logic(group.clone()),
            None => f,
        };
        FormBuilder::new()
            .field(Field::select(1, COLORS.iter().copied()))
            .field(Field::number(2, NumberFormatKind::DecimalDot))
            .field(Field::checkbox(3, LETTERS.iter().copied()))
            .field(with(Field::text(4)))
            .field(with(Field::text(5)))
            .field(with(Field::section(6)))
            .field(with(Field::text(7)))
            .field(with(Field::select(8, XY.iter().copied())))
            .field(with(Field::text(9).required()))
            .compile()
            .expect("generated form should compile")
    }
}

pub fn arb_form() -> impl Strategy<Value = GenForm> {
    let slots: Vec<_> = READABLE
        .iter()
        .map(|&(id, readable)| arb_group(readable).prop_map(move |g| (id, g)))
        .collect();
    slots.prop_map(|groups| GenForm {
        groups: groups
            .into_iter()
            .filter_map(|(id, g)| g.map(|g| (id, g)))
            .collect(),
    })
}

/// One user interaction with an input of the schema.
#[derive(Debug, Clone)]
pub enum Change {
    Select(FieldId, String),
    Number(String),
    Check(u32, bool),
    Type(FieldId, String),
}

impl Change {
    pub fn field(&self) -> FieldId {
        match self {
            Change::Select(id, _) | Change::Type(id, _) => *id,
            Change::Number(_) => 2,
            Change::Check(..) => 3,
        }
    }

    /// Apply to a snapshot held as a plain map.
    pub fn apply(&self, values: &mut BTreeMap<FieldId, InputState>) {
        match self {
            Change::Select(id, v) | Change::Type(id, v) => {
                values.insert(*id, InputState::Text(v.clone()));
            }
            Change::Number(v) => {
                values.insert(2, InputState::Text(v.clone()));
            }
            Change::Check(item, checked) => {
                if let Some(InputState::Choices { items, .. }) = values.get_mut(&3) {
                    for i in items.iter_mut().filter(|i| i.id == *item) {
                        i.checked = *checked;
                    }
                }
            }
        }
    }
}

pub fn arb_change() -> impl Strategy<Value = Change> {
    prop_oneof![
        prop::sample::select(COLORS).prop_map(|c| Change::Select(1, c.to_owned())),
        prop::sample::select(XY).prop_map(|c| Change::Select(8, c.to_owned())),
        prop_oneof![(0_i32..20).prop_map(|n| n.to_string()), "[a-z]{0,3}"].prop_map(Change::Number),
        (1_u32..=3, any::<bool>()).prop_map(|(i, c)| Change::Check(i, c)),
        (prop::sample::select(&[4_u32, 5, 7, 9][..]), "[a-c]{0,3}")
            .prop_map(|(id, text)| Change::Type(id, text)),
    ]
}

/// A complete snapshot of the schema's inputs.
pub fn arb_snapshot() -> impl Strategy<Value = BTreeMap<FieldId, InputState>> {
    (
        prop::sample::select(COLORS),
        "[0-9]{0,2}",
        prop::collection::vec(any::<bool>(), 3),
        prop::collection::vec("[a-c]{0,3}", 3),
        prop::sample::select(XY),
    )
        .prop_map(|(color, number, checks, texts, xy)| {
            let items = LETTERS
                .iter()
                .zip(checkbox_input_ids(LETTERS.len()))
                .zip(checks)
                .map(|((letter, id), checked)| CheckInput {
                    id,
                    value: Choice::new(*letter).input_value(),
                    checked,
                })
                .collect();
            let mut values = BTreeMap::new();
            values.insert(1, InputState::Text(color.to_owned()));
            values.insert(2, InputState::Text(number));
            values.insert(3, InputState::Choices { items, other: None });
            values.insert(8, InputState::Text(xy.to_owned()));
            for (id, text) in [4, 5, 7].into_iter().zip(texts) {
                values.insert(id, InputState::Text(text));
            }
            values
        })
}
