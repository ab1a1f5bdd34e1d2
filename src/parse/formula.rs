use winnow::ascii::digit1;
use winnow::combinator::{alt, cut_err, delimited, opt, preceded, repeat};
use winnow::error::{ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::take_while;

use crate::types::{BinaryOp, FieldRef, Formula};

use super::grammar::{field_ref, ws};

fn number(input: &mut &str) -> ModalResult<Formula> {
    alt((
        (digit1, opt(('.', digit1))).take(),
        ('.', digit1).take(),
    ))
    .try_map(str::parse::<f64>)
    .map(Formula::Number)
    .parse_next(input)
}

/// `{Label:5}`, `{Label:5.2}` or `{Label:5:value}`. Labels are free text and
/// only the field reference matters.
fn merge_tag(input: &mut &str) -> ModalResult<FieldRef> {
    '{'.parse_next(input)?;
    take_while(0.., |c: char| c != ':' && c != '}').parse_next(input)?;
    cut_err(':')
        .context(StrContext::Expected(StrContextValue::CharLiteral(':')))
        .parse_next(input)?;
    let reference = cut_err(field_ref).parse_next(input)?;
    opt(preceded(':', take_while(0.., |c: char| c != '}'))).parse_next(input)?;
    cut_err('}')
        .context(StrContext::Expected(StrContextValue::CharLiteral('}')))
        .parse_next(input)?;
    Ok(reference)
}

fn factor(input: &mut &str) -> ModalResult<Formula> {
    ws.parse_next(input)?;
    alt((
        number,
        merge_tag.map(Formula::Field),
        delimited('(', cut_err(expr), cut_err((ws, ')'))),
        preceded('-', cut_err(factor)).map(|inner| Formula::Neg(Box::new(inner))),
    ))
    .context(StrContext::Expected(StrContextValue::Description("operand")))
    .parse_next(input)
}

fn additive(input: &mut &str) -> ModalResult<BinaryOp> {
    ws.parse_next(input)?;
    alt(('+'.value(BinaryOp::Add), '-'.value(BinaryOp::Sub))).parse_next(input)
}

fn multiplicative(input: &mut &str) -> ModalResult<BinaryOp> {
    ws.parse_next(input)?;
    alt(('*'.value(BinaryOp::Mul), '/'.value(BinaryOp::Div))).parse_next(input)
}

fn fold(first: Formula, rest: Vec<(BinaryOp, Formula)>) -> Formula {
    rest.into_iter().fold(first, |lhs, (op, rhs)| Formula::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

fn term(input: &mut &str) -> ModalResult<Formula> {
    let first = factor(input)?;
    let rest: Vec<(BinaryOp, Formula)> =
        repeat(0.., (multiplicative, cut_err(factor))).parse_next(input)?;
    Ok(fold(first, rest))
}

fn expr(input: &mut &str) -> ModalResult<Formula> {
    let first = term(input)?;
    let rest: Vec<(BinaryOp, Formula)> =
        repeat(0.., (additive, cut_err(term))).parse_next(input)?;
    Ok(fold(first, rest))
}

pub fn formula(input: &mut &str) -> ModalResult<Formula> {
    let parsed = expr(input)?;
    ws.parse_next(input)?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use crate::parse::parse_formula;

    use super::*;

    fn eval(text: &str, values: &[(u32, f64)]) -> f64 {
        parse_formula(text).unwrap().eval(&mut |r: FieldRef| {
            values
                .iter()
                .find(|(id, _)| *id == r.field)
                .map_or(0.0, |(_, v)| *v)
        })
    }

    #[test]
    fn precedence_and_grouping() {
        assert_eq!(eval("1 + 2 * 3", &[]), 7.0);
        assert_eq!(eval("(1 + 2) * 3", &[]), 9.0);
        assert_eq!(eval("10 - 4 - 3", &[]), 3.0);
        assert_eq!(eval("-2 * -3", &[]), 6.0);
        assert_eq!(eval("1.5 + .5", &[]), 2.0);
    }

    #[test]
    fn merge_tags_reference_fields() {
        let f = parse_formula("{Price:3} * {Quantity:4.1:value}").unwrap();
        assert_eq!(f.fields(), vec![FieldRef::whole(3), FieldRef::sub(4, 1)]);
        assert_eq!(eval("{Price:3} * {Qty:4}", &[(3, 2.5), (4, 4.0)]), 10.0);
    }

    #[test]
    fn labels_may_contain_spaces_and_symbols() {
        let f = parse_formula("{Number of guests (adults):12} + 1").unwrap();
        assert_eq!(f.fields(), vec![FieldRef::whole(12)]);
    }

    #[test]
    fn division_by_zero_is_zero() {
        assert_eq!(eval("5 / {Empty:9}", &[]), 0.0);
    }

    #[test]
    fn rejects_malformed_formulas() {
        for input in ["", "1 +", "(1 + 2", "{Price}", "{Price:x}", "2 ** 3", "1 2"] {
            assert!(parse_formula(input).is_err(), "accepted {input:?}");
        }
    }
}
