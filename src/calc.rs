//! Recomputation of calculation and total fields.

use std::collections::BTreeMap;

use crate::evaluate::EvaluationState;
use crate::resolve::ValueMode;
use crate::types::{
    FieldId, FieldKind, FieldRef, Form, InputState, NumberFormat, ResolvedValue, Snapshot,
    TargetId,
};

/// Snapshot with freshly computed values laid over it, so a calculation can
/// read one computed earlier in the same pass.
struct Overlay<'a, S: ?Sized> {
    base: &'a S,
    computed: BTreeMap<FieldId, InputState>,
}

impl<S: Snapshot + ?Sized> Snapshot for Overlay<'_, S> {
    fn input(&self, field: FieldId) -> Option<&InputState> {
        self.computed.get(&field).or_else(|| self.base.input(field))
    }
}

/// Compute the value of every calculation and total field.
///
/// Calculations run in form order, then totals. Operands that are hidden,
/// missing or not numeric count as zero.
pub fn recalculate<S: Snapshot + ?Sized>(
    form: &Form,
    snapshot: &S,
    state: &EvaluationState,
) -> BTreeMap<FieldId, String> {
    let mut overlay = Overlay {
        base: snapshot,
        computed: BTreeMap::new(),
    };
    let mut out = BTreeMap::new();

    for field in form.computed_fields() {
        if let FieldKind::Calculation { rounding, .. } = &field.kind {
            let Some(formula) = form.formula(field.id) else {
                continue;
            };
            let value = formula.eval(&mut |r| operand(form, &overlay, state, r));
            let text = format_result(value, *rounding);
            overlay
                .computed
                .insert(field.id, InputState::Text(text.clone()));
            out.insert(field.id, text);
        }
    }

    let currency = &form.definition().currency;
    let total = order_total(form, &overlay, state);
    let formatted = NumberFormat::Currency(currency.clone()).format(total, currency.decimals);
    for field in form
        .computed_fields()
        .filter(|f| matches!(f.kind, FieldKind::Total))
    {
        out.insert(field.id, formatted.clone());
    }
    out
}

fn is_hidden(state: &EvaluationState, field: FieldId) -> bool {
    state.is_hidden(TargetId::Field(field))
}

fn operand<S: Snapshot + ?Sized>(
    form: &Form,
    snapshot: &S,
    state: &EvaluationState,
    reference: FieldRef,
) -> f64 {
    if is_hidden(state, reference.field) {
        return 0.0;
    }
    let Some(field) = form.field(reference.field) else {
        return 0.0;
    };
    let mode = if field.kind.has_priced_choices() {
        ValueMode::Price
    } else {
        ValueMode::Rule
    };
    form.resolve(snapshot, reference, mode)
        .map_or(0.0, |value| sum(form, field.id, &value))
}

fn sum(form: &Form, field: FieldId, value: &ResolvedValue) -> f64 {
    let format = form.number_format(field);
    value
        .iter()
        .map(|v| {
            format
                .parse(v)
                .or_else(|| NumberFormat::DecimalDot.parse(v))
                .unwrap_or(0.0)
        })
        .sum()
}

/// Sum of `price x quantity` over visible products. A product without a
/// visible quantity field counts once.
fn order_total<S: Snapshot + ?Sized>(form: &Form, snapshot: &S, state: &EvaluationState) -> f64 {
    let mut total = 0.0;
    for product in form
        .fields()
        .iter()
        .filter(|f| matches!(f.kind, FieldKind::Product { .. }))
    {
        if is_hidden(state, product.id) {
            continue;
        }
        let price = form
            .resolve(snapshot, FieldRef::whole(product.id), ValueMode::Price)
            .map_or(0.0, |v| sum(form, product.id, &v));
        let quantity_field = form.fields().iter().find(|f| {
            matches!(f.kind, FieldKind::Quantity { product_id } if product_id == product.id)
                && !is_hidden(state, f.id)
        });
        let quantity = quantity_field.map_or(1.0, |q| {
            form.resolve(snapshot, FieldRef::whole(q.id), ValueMode::Rule)
                .map_or(0.0, |v| sum(form, q.id, &v))
        });
        total += price * quantity;
    }
    total
}

fn format_result(value: f64, rounding: Option<usize>) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let text = match rounding {
        Some(decimals) => format!("{value:.decimals$}"),
        None => value.to_string(),
    };
    if text.strip_prefix('-').is_some_and(|rest| rest.chars().all(|c| c == '0' || c == '.')) {
        text[1..].to_owned()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{field, Choice, Field, FormBuilder, RuleGroup};

    fn calculation(id: FieldId, formula: &str, rounding: Option<usize>) -> Field {
        Field::new(
            id,
            FieldKind::Calculation {
                formula: formula.to_owned(),
                rounding,
            },
        )
    }

    fn values(pairs: &[(FieldId, &str)]) -> BTreeMap<FieldId, InputState> {
        pairs
            .iter()
            .map(|(id, v)| (*id, InputState::Text((*v).to_owned())))
            .collect()
    }

    #[test]
    fn formula_reads_fields_and_earlier_results() {
        let form = FormBuilder::new()
            .field(Field::text(1))
            .field(Field::text(2))
            .field(calculation(3, "{A:1} * {B:2}", None))
            .field(calculation(4, "{C:3} / 4", Some(2)))
            .compile()
            .unwrap();
        let out = recalculate(&form, &values(&[(1, "3"), (2, "2.5")]), &EvaluationState::new());
        assert_eq!(out[&3], "7.5");
        assert_eq!(out[&4], "1.88");
    }

    #[test]
    fn hidden_and_invalid_operands_count_as_zero() {
        let form = FormBuilder::new()
            .field(Field::text(1))
            .field(Field::text(2).logic(RuleGroup::show_if_all([field(1).is("show")])))
            .field(calculation(3, "{A:1} + {B:2} + 1", None))
            .compile()
            .unwrap();
        let mut state = EvaluationState::new();
        state.set(TargetId::Field(2), crate::types::Visibility::Hidden);
        let out = recalculate(&form, &values(&[(1, "abc"), (2, "5")]), &state);
        assert_eq!(out[&3], "1");
    }

    #[test]
    fn total_sums_visible_products() {
        let form = FormBuilder::new()
            .field(Field::new(
                1,
                FieldKind::Product {
                    base_price: None,
                    choices: vec![
                        Choice::new("Small").priced("$5.00"),
                        Choice::new("Large").priced("$8.00"),
                    ],
                },
            ))
            .field(Field::new(2, FieldKind::Quantity { product_id: 1 }))
            .field(Field::new(
                3,
                FieldKind::Product {
                    base_price: Some("$2.50".into()),
                    choices: Vec::new(),
                },
            ))
            .field(Field::new(4, FieldKind::Total))
            .compile()
            .unwrap();
        let snapshot = values(&[(1, "Large|$8.00"), (2, "3"), (3, "$2.50")]);
        let out = recalculate(&form, &snapshot, &EvaluationState::new());
        assert_eq!(out[&4], "$26.50");

        let mut state = EvaluationState::new();
        state.set(TargetId::Field(1), crate::types::Visibility::Hidden);
        let out = recalculate(&form, &snapshot, &state);
        assert_eq!(out[&4], "$2.50");
    }

    #[test]
    fn negative_zero_is_printed_as_zero() {
        assert_eq!(format_result(-0.0, Some(2)), "0.00");
        assert_eq!(format_result(-0.001, Some(2)), "0.00");
        assert_eq!(format_result(-1.5, None), "-1.5");
        assert_eq!(format_result(f64::NAN, None), "0");
    }
}
