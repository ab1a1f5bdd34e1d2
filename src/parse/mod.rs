mod error;
mod formula;
mod grammar;

pub use error::ParseError;

use crate::types::{Formula, RuleGroup};

/// Parse the text form of a rule group, e.g. `show if any: 5 is "A", 5 is "C"`.
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not a valid rule group.
pub fn parse_rule_group(input: &str) -> Result<RuleGroup, ParseError> {
    use winnow::Parser;
    grammar::rule_group
        .parse(input)
        .map_err(|e| ParseError::new(e.to_string()))
}

/// Parse a calculation formula such as `({Price:3} + 2) * {Quantity:4}`.
///
/// # Errors
///
/// Returns [`ParseError`] if the formula is malformed.
pub fn parse_formula(input: &str) -> Result<Formula, ParseError> {
    use winnow::Parser;
    formula::formula
        .parse(input)
        .map_err(|e| ParseError::new(e.to_string()))
}
