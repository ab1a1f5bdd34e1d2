use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::field_ref::{FieldId, FieldRef};
use super::value::NumberFormat;
use super::visibility::Visibility;

/// Comparison operators available to a conditional logic rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "is")]
    Is,
    #[serde(rename = "isnot")]
    IsNot,
    #[serde(rename = ">", alias = "greater_than")]
    GreaterThan,
    #[serde(rename = "<", alias = "less_than")]
    LessThan,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "starts_with")]
    StartsWith,
    #[serde(rename = "ends_with")]
    EndsWith,
}

impl Operator {
    /// Whether the operator compares numbers rather than strings.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Operator::GreaterThan | Operator::LessThan)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Is => "is",
            Operator::IsNot => "isnot",
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
            Operator::Contains => "contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
        };
        f.write_str(s)
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "is" => Ok(Operator::Is),
            "isnot" => Ok(Operator::IsNot),
            ">" | "greater_than" => Ok(Operator::GreaterThan),
            "<" | "less_than" => Ok(Operator::LessThan),
            "contains" => Ok(Operator::Contains),
            "starts_with" => Ok(Operator::StartsWith),
            "ends_with" => Ok(Operator::EndsWith),
            other => Err(format!("unknown operator '{other}'")),
        }
    }
}

/// One atomic condition: `field operator value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub field_id: FieldRef,
    pub operator: Operator,
    #[serde(default)]
    pub value: String,
}

/// What happens to the target when the rule group is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Show,
    Hide,
}

impl ActionType {
    #[must_use]
    pub fn outcome(self) -> Visibility {
        match self {
            ActionType::Show => Visibility::Shown,
            ActionType::Hide => Visibility::Hidden,
        }
    }
}

/// How the results of the individual rules combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicType {
    All,
    Any,
}

/// The conditional logic configuration of one field or page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroup {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub action_type: ActionType,
    pub logic_type: LogicType,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

fn enabled_by_default() -> bool {
    true
}

impl RuleGroup {
    #[must_use]
    pub fn new(action_type: ActionType, logic_type: LogicType, rules: Vec<Rule>) -> Self {
        Self {
            enabled: true,
            action_type,
            logic_type,
            rules,
        }
    }

    #[must_use]
    pub fn show_if_all(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self::new(ActionType::Show, LogicType::All, rules.into_iter().collect())
    }

    #[must_use]
    pub fn show_if_any(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self::new(ActionType::Show, LogicType::Any, rules.into_iter().collect())
    }

    #[must_use]
    pub fn hide_if_all(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self::new(ActionType::Hide, LogicType::All, rules.into_iter().collect())
    }

    #[must_use]
    pub fn hide_if_any(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self::new(ActionType::Hide, LogicType::Any, rules.into_iter().collect())
    }

    /// Disabled groups and groups without rules leave the target visible.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && !self.rules.is_empty()
    }

    /// Parse a rule group from its text form, e.g.
    /// `show if any: 5 is "A", 5 is "C"`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`](crate::ParseError) on malformed input.
    pub fn from_dsl(input: &str) -> Result<Self, crate::ParseError> {
        crate::parse::parse_rule_group(input)
    }
}

impl fmt::Display for RuleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.action_type {
            ActionType::Show => "show",
            ActionType::Hide => "hide",
        };
        let logic = match self.logic_type {
            LogicType::All => "all",
            LogicType::Any => "any",
        };
        write!(f, "{action} if {logic}:")?;
        for (i, rule) in self.rules.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{} {} {:?}", rule.field_id, rule.operator, rule.value)?;
        }
        Ok(())
    }
}

/// A rule with its comparison value prepared for evaluation.
///
/// The needle is lowercased once and numeric operators carry the value
/// pre-parsed with the trigger field's number format. A rule whose trigger
/// cannot be found in the form is kept but never matches.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    pub(crate) field: FieldRef,
    pub(crate) operator: Operator,
    pub(crate) value: String,
    pub(crate) needle: String,
    pub(crate) number: Option<f64>,
    pub(crate) satisfiable: bool,
}

impl CompiledRule {
    #[must_use]
    pub fn new(rule: &Rule, format: &NumberFormat) -> Self {
        let number = if rule.operator.is_numeric() {
            format
                .parse(&rule.value)
                .or_else(|| NumberFormat::DecimalDot.parse(&rule.value))
        } else {
            None
        };
        Self {
            field: rule.field_id,
            operator: rule.operator,
            value: rule.value.clone(),
            needle: rule.value.to_lowercase(),
            number,
            satisfiable: true,
        }
    }

    /// Prepare a rule whose trigger holds a number. Such fields resolve to
    /// canonical decimal-dot text, so the needle is rewritten the same way
    /// when it parses in `format`.
    #[must_use]
    pub fn for_number_field(rule: &Rule, format: &NumberFormat) -> Self {
        let mut compiled = Self::new(rule, format);
        if let Some(canonical) = format.normalize(&rule.value) {
            compiled.needle = canonical;
        }
        compiled
    }

    pub(crate) fn unsatisfiable(rule: &Rule) -> Self {
        Self {
            satisfiable: false,
            ..Self::new(rule, &NumberFormat::DecimalDot)
        }
    }

    #[must_use]
    pub fn field(&self) -> FieldRef {
        self.field
    }

    #[must_use]
    pub fn operator(&self) -> Operator {
        self.operator
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Intermediate builder for rules. Created by [`field()`] or [`input()`].
#[derive(Debug, Clone, Copy)]
pub struct FieldExpr {
    target: FieldRef,
}

impl FieldExpr {
    fn rule(self, operator: Operator, value: impl Into<String>) -> Rule {
        Rule {
            field_id: self.target,
            operator,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn is(self, value: impl Into<String>) -> Rule {
        self.rule(Operator::Is, value)
    }

    #[must_use]
    pub fn is_not(self, value: impl Into<String>) -> Rule {
        self.rule(Operator::IsNot, value)
    }

    #[must_use]
    pub fn greater_than(self, value: impl Into<String>) -> Rule {
        self.rule(Operator::GreaterThan, value)
    }

    #[must_use]
    pub fn less_than(self, value: impl Into<String>) -> Rule {
        self.rule(Operator::LessThan, value)
    }

    #[must_use]
    pub fn contains(self, value: impl Into<String>) -> Rule {
        self.rule(Operator::Contains, value)
    }

    #[must_use]
    pub fn starts_with(self, value: impl Into<String>) -> Rule {
        self.rule(Operator::StartsWith, value)
    }

    #[must_use]
    pub fn ends_with(self, value: impl Into<String>) -> Rule {
        self.rule(Operator::EndsWith, value)
    }
}

#[must_use]
pub fn field(id: FieldId) -> FieldExpr {
    FieldExpr {
        target: FieldRef::whole(id),
    }
}

#[must_use]
pub fn input(id: FieldId, sub: u32) -> FieldExpr {
    FieldExpr {
        target: FieldRef::sub(id, sub),
    }
}
