use winnow::ascii::{digit1, multispace1, till_line_ending};
use winnow::combinator::{alt, cut_err, not, opt, repeat, separated, terminated};
use winnow::error::{ContextError, ErrMode, ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_while};

use crate::types::{ActionType, FieldRef, LogicType, Operator, Rule, RuleGroup};

// -- Whitespace & comments --------------------------------------------------

pub(super) fn ws(input: &mut &str) -> ModalResult<()> {
    let _: () = repeat(
        0..,
        alt((
            take_while(1.., |c: char| c.is_ascii_whitespace()).void(),
            ('#', till_line_ending).void(),
        )),
    )
    .parse_next(input)?;
    Ok(())
}

/// A literal word that is not the prefix of a longer identifier.
fn keyword<'i>(word: &'static str) -> impl Parser<&'i str, &'i str, ErrMode<ContextError>> {
    terminated(word, not(one_of(|c: char| c.is_alphanumeric() || c == '_')))
}

fn expected(what: &'static str) -> StrContext {
    StrContext::Expected(StrContextValue::Description(what))
}

// -- Field references & values ---------------------------------------------

pub(super) fn field_ref(input: &mut &str) -> ModalResult<FieldRef> {
    (digit1, opt(('.', digit1)))
        .take()
        .try_map(str::parse::<FieldRef>)
        .context(expected("field reference"))
        .parse_next(input)
}

fn string_literal(input: &mut &str) -> ModalResult<String> {
    '"'.parse_next(input)?;
    let mut s = String::new();
    loop {
        let ch = cut_err(any)
            .context(expected("closing quote"))
            .parse_next(input)?;
        match ch {
            '"' => return Ok(s),
            '\\' => {
                let esc = cut_err(any).parse_next(input)?;
                match esc {
                    '"' => s.push('"'),
                    '\\' => s.push('\\'),
                    'n' => s.push('\n'),
                    'r' => s.push('\r'),
                    't' => s.push('\t'),
                    other => {
                        s.push('\\');
                        s.push(other);
                    }
                }
            }
            c => s.push(c),
        }
    }
}

/// Unquoted values run to the next comma, comment or line end.
fn bare_value(input: &mut &str) -> ModalResult<String> {
    take_while(0.., |c: char| !matches!(c, ',' | '#' | '\n'))
        .map(|s: &str| s.trim_end().to_owned())
        .parse_next(input)
}

fn rule_value(input: &mut &str) -> ModalResult<String> {
    ws.parse_next(input)?;
    alt((string_literal, bare_value)).parse_next(input)
}

// -- Operators --------------------------------------------------------------

fn operator(input: &mut &str) -> ModalResult<Operator> {
    ws.parse_next(input)?;
    alt((
        keyword("isnot").value(Operator::IsNot),
        (keyword("is"), multispace1, keyword("not")).value(Operator::IsNot),
        keyword("is").value(Operator::Is),
        ">".value(Operator::GreaterThan),
        "<".value(Operator::LessThan),
        keyword("greater_than").value(Operator::GreaterThan),
        keyword("less_than").value(Operator::LessThan),
        keyword("contains").value(Operator::Contains),
        keyword("starts_with").value(Operator::StartsWith),
        keyword("ends_with").value(Operator::EndsWith),
    ))
    .context(expected("operator"))
    .parse_next(input)
}

// -- Rules & groups ---------------------------------------------------------

fn rule(input: &mut &str) -> ModalResult<Rule> {
    ws.parse_next(input)?;
    let field_id = field_ref.parse_next(input)?;
    let operator = cut_err(operator).parse_next(input)?;
    let value = cut_err(rule_value).parse_next(input)?;
    Ok(Rule {
        field_id,
        operator,
        value,
    })
}

pub fn rule_group(input: &mut &str) -> ModalResult<RuleGroup> {
    ws.parse_next(input)?;
    let action_type = alt((
        keyword("show").value(ActionType::Show),
        keyword("hide").value(ActionType::Hide),
    ))
    .context(expected("'show' or 'hide'"))
    .parse_next(input)?;

    ws.parse_next(input)?;
    cut_err(keyword("if"))
        .context(expected("'if'"))
        .parse_next(input)?;

    ws.parse_next(input)?;
    let logic_type = cut_err(alt((
        keyword("all").value(LogicType::All),
        keyword("any").value(LogicType::Any),
    )))
    .context(expected("'all' or 'any'"))
    .parse_next(input)?;

    ws.parse_next(input)?;
    cut_err(':').context(expected("':'")).parse_next(input)?;

    let rules: Vec<Rule> = separated(0.., rule, (ws, ',')).parse_next(input)?;
    ws.parse_next(input)?;

    Ok(RuleGroup::new(action_type, logic_type, rules))
}
