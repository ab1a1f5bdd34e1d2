#![cfg(feature = "binary-cache")]

use std::collections::BTreeMap;

use formlogic::serial::{source_digest, DeserializeError};
use formlogic::{
    evaluate_form, field, input, Choice, CurrencyFormat, Field, FieldKind, Form, FormBuilder,
    InputState, NumberFormatKind, RuleGroup, SubInput,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn simple_form() -> Form {
    FormBuilder::new()
        .field(Field::select(1, ["No", "Yes"]))
        .field(Field::text(2).logic(RuleGroup::show_if_all([field(1).is("Yes")])))
        .compile()
        .unwrap()
}

fn complex_form() -> Form {
    FormBuilder::new()
        .id(12)
        .title("Order")
        .currency(CurrencyFormat::eur())
        .field(Field::radio(1, ["Business", "Personal"]))
        .field(Field::section(2).logic(RuleGroup::show_if_all([field(1).is("Business")])))
        .field(Field::new(
            3,
            FieldKind::Composite {
                inputs: vec![
                    SubInput::new(3, "First"),
                    SubInput::new(6, "Last").with_default("Doe"),
                ],
            },
        ))
        .field(Field::number(4, NumberFormatKind::DecimalComma).labeled("Seats"))
        .field(Field::page(5))
        .field(Field::new(
            6,
            FieldKind::Product {
                base_price: None,
                choices: vec![
                    Choice::new("Basic").priced("10,00 €"),
                    Choice::new("Pro").priced("25,00 €"),
                ],
            },
        ))
        .field(Field::new(7, FieldKind::Quantity { product_id: 6 }))
        .field(Field::new(
            8,
            FieldKind::Calculation {
                formula: "{Seats:4} * 2".to_owned(),
                rounding: Some(2),
            },
        ))
        .field(Field::new(9, FieldKind::Total))
        .field(
            Field::text(10)
                .required()
                .logic(RuleGroup::hide_if_any([input(3, 6).is("Doe"), field(4).greater_than("3")])),
        )
        .field(Field::text(11).honeypot())
        .compile()
        .unwrap()
}

fn snapshot() -> BTreeMap<u32, InputState> {
    [
        (1, InputState::Text("Business".into())),
        (4, InputState::Text("5".into())),
    ]
    .into_iter()
    .collect()
}

// ---------------------------------------------------------------------------
// Round trips
// ---------------------------------------------------------------------------

#[test]
fn round_trip_simple() {
    let original = simple_form();
    let bytes = original.to_bytes(None).unwrap();
    let restored = Form::from_bytes(&bytes).unwrap();
    assert_eq!(restored.definition(), original.definition());
    assert_eq!(restored.evaluation_order(), original.evaluation_order());
}

#[test]
fn round_trip_complex() {
    let original = complex_form();
    let bytes = original.to_bytes(None).unwrap();
    let restored = Form::from_bytes(&bytes).unwrap();
    assert_eq!(restored.definition(), original.definition());
    assert_eq!(
        evaluate_form(&restored, &snapshot()).state(),
        evaluate_form(&original, &snapshot()).state()
    );
}

#[test]
fn round_trip_with_source_digest() {
    let json = r#"{"fields": [{"id": 1, "type": "text"}]}"#;
    let original = Form::from_json(json).unwrap();
    let bytes = original.to_bytes(Some(json)).unwrap();
    assert_eq!(
        source_digest(&bytes).unwrap(),
        Some(*blake3::hash(json.as_bytes()).as_bytes())
    );
    assert_eq!(source_digest(&simple_form().to_bytes(None).unwrap()).unwrap(), None);
}

#[test]
fn encoding_is_deterministic() {
    let a = complex_form().to_bytes(None).unwrap();
    let b = complex_form().to_bytes(None).unwrap();
    assert_eq!(a, b);
}

// ---------------------------------------------------------------------------
// Corruption
// ---------------------------------------------------------------------------

#[test]
fn corruption_byte_flip() {
    let mut corrupted = simple_form().to_bytes(None).unwrap();
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0xFF;

    let err = Form::from_bytes(&corrupted).unwrap_err();
    assert!(
        matches!(err, DeserializeError::ChecksumMismatch),
        "expected ChecksumMismatch, got: {err}"
    );
}

#[test]
fn corruption_truncation() {
    let bytes = simple_form().to_bytes(None).unwrap();
    let err = Form::from_bytes(&bytes[..33]).unwrap_err();
    assert!(
        matches!(err, DeserializeError::LengthMismatch { .. }),
        "expected LengthMismatch, got: {err}"
    );
}

#[test]
fn bad_magic() {
    let mut bad = simple_form().to_bytes(None).unwrap();
    bad[0..4].copy_from_slice(b"BAAD");
    let err = Form::from_bytes(&bad).unwrap_err();
    assert!(matches!(err, DeserializeError::BadMagic), "expected BadMagic, got: {err}");
}

#[test]
fn version_mismatch() {
    let mut bad = simple_form().to_bytes(None).unwrap();
    bad[4] = 99;
    bad[5] = 0;
    let err = Form::from_bytes(&bad).unwrap_err();
    assert!(
        matches!(
            err,
            DeserializeError::IncompatibleVersion {
                blob: 99,
                supported: 1
            }
        ),
        "expected IncompatibleVersion, got: {err}"
    );
}
