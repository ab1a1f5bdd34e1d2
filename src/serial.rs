//! Binary cache for form definitions.
//!
//! A cached blob stores the definition in a compact, checksummed form so a
//! server can skip JSON parsing on every request. Decoding always recompiles
//! the definition, so a blob never bypasses the compile checks.
//!
//! ## Wire Format
//!
//! ```text
//! Offset  Size  Field
//! 0       4     Magic bytes: b"FLGF"
//! 4       2     Format version (u16, little-endian)
//! 6       2     Engine version (u16, little-endian)
//! 8       4     Flags (u32, reserved)
//! 12      4     Payload length in bytes (u32, little-endian)
//! 16      16    BLAKE3 hash of the payload (truncated to 16 bytes)
//! 32..    var   Bincode-encoded payload
//! ```
//!
//! The format version must match exactly; the engine version is informational.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    ActionType, Choice, CurrencyFormat, Field, FieldId, FieldKind, FieldRef, Form,
    FormDefinition, LogicType, NumberFormatKind, Operator, Rule, RuleGroup, SubInput,
};

const MAGIC: &[u8; 4] = b"FLGF";
const FORMAT_VERSION: u16 = 1;
const ENGINE_VERSION: u16 = 1;
const HEADER_SIZE: usize = 32;

/// Errors that can occur when writing a [`Form`] to bytes.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("failed to encode form: {0}")]
    Encode(#[from] bincode::error::EncodeError),
}

/// Errors that can occur when reading a [`Form`] back from bytes.
#[derive(Debug, Error)]
pub enum DeserializeError {
    #[error("not a formlogic binary: invalid magic bytes")]
    BadMagic,

    #[error("incompatible format version: blob is v{blob}, engine supports v{supported}")]
    IncompatibleVersion { blob: u16, supported: u16 },

    #[error("integrity check failed: BLAKE3 checksum mismatch")]
    ChecksumMismatch,

    #[error("payload length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: u32, actual: usize },

    #[error("failed to decode payload: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("validation failed: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Serialized type hierarchy
//
// The public types lean on serde features bincode cannot decode (flattened
// and internally tagged enums, untagged field references), so the payload
// goes through plain mirrors.
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct SerializedForm {
    metadata: FormMetadata,
    id: u32,
    title: String,
    currency: SerializedCurrency,
    fields: Vec<SerializedField>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FormMetadata {
    field_count: usize,
    rule_count: usize,
    target_count: usize,
    source_digest: Option<[u8; 32]>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedCurrency {
    symbol_left: String,
    symbol_right: String,
    thousand_separator: char,
    decimal_separator: char,
    decimals: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedField {
    id: FieldId,
    label: String,
    kind: SerializedKind,
    logic: Option<SerializedGroup>,
    default_value: Option<String>,
    is_required: bool,
    is_honeypot: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedChoice {
    text: String,
    value: String,
    is_selected: bool,
    price: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
enum SerializedKind {
    Text,
    Number(u8),
    Select(Vec<SerializedChoice>),
    Multiselect(Vec<SerializedChoice>),
    Radio {
        choices: Vec<SerializedChoice>,
        other: bool,
    },
    Checkbox(Vec<SerializedChoice>),
    Composite(Vec<(u32, String, String)>),
    List(u32),
    Section,
    Page,
    Product {
        base_price: Option<String>,
        choices: Vec<SerializedChoice>,
    },
    Quantity(FieldId),
    Total,
    Calculation {
        formula: String,
        rounding: Option<u32>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedGroup {
    enabled: bool,
    hide: bool,
    any: bool,
    rules: Vec<SerializedRule>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedRule {
    field: FieldId,
    input: Option<u32>,
    operator: u8,
    value: String,
}

// ---------------------------------------------------------------------------
// Small enum conversions
// ---------------------------------------------------------------------------

const OPERATORS: [Operator; 7] = [
    Operator::Is,
    Operator::IsNot,
    Operator::GreaterThan,
    Operator::LessThan,
    Operator::Contains,
    Operator::StartsWith,
    Operator::EndsWith,
];

const NUMBER_FORMATS: [NumberFormatKind; 3] = [
    NumberFormatKind::DecimalDot,
    NumberFormatKind::DecimalComma,
    NumberFormatKind::Currency,
];

fn tag_of<T: PartialEq>(table: &[T], item: &T) -> u8 {
    #[allow(clippy::cast_possible_truncation)] // tables are tiny
    let tag = table.iter().position(|t| t == item).unwrap_or(0) as u8;
    tag
}

fn from_tag<T: Copy>(table: &[T], tag: u8, what: &str) -> Result<T, DeserializeError> {
    table
        .get(usize::from(tag))
        .copied()
        .ok_or_else(|| DeserializeError::Validation(format!("unknown {what} tag {tag}")))
}

// ---------------------------------------------------------------------------
// Form -> SerializedForm
// ---------------------------------------------------------------------------

fn serialize_choices(choices: &[Choice]) -> Vec<SerializedChoice> {
    choices
        .iter()
        .map(|c| SerializedChoice {
            text: c.text.clone(),
            value: c.value.clone(),
            is_selected: c.is_selected,
            price: c.price.clone(),
        })
        .collect()
}

#[allow(clippy::cast_possible_truncation)] // rounding and decimals are small
fn serialize_kind(kind: &FieldKind) -> SerializedKind {
    match kind {
        FieldKind::Text => SerializedKind::Text,
        FieldKind::Number { number_format } => {
            SerializedKind::Number(tag_of(&NUMBER_FORMATS, number_format))
        }
        FieldKind::Select { choices } => SerializedKind::Select(serialize_choices(choices)),
        FieldKind::Multiselect { choices } => {
            SerializedKind::Multiselect(serialize_choices(choices))
        }
        FieldKind::Radio {
            choices,
            enable_other_choice,
        } => SerializedKind::Radio {
            choices: serialize_choices(choices),
            other: *enable_other_choice,
        },
        FieldKind::Checkbox { choices } => SerializedKind::Checkbox(serialize_choices(choices)),
        FieldKind::Composite { inputs } => SerializedKind::Composite(
            inputs
                .iter()
                .map(|i| (i.id, i.label.clone(), i.default_value.clone()))
                .collect(),
        ),
        FieldKind::List { columns } => SerializedKind::List(*columns),
        FieldKind::Section => SerializedKind::Section,
        FieldKind::Page => SerializedKind::Page,
        FieldKind::Product {
            base_price,
            choices,
        } => SerializedKind::Product {
            base_price: base_price.clone(),
            choices: serialize_choices(choices),
        },
        FieldKind::Quantity { product_id } => SerializedKind::Quantity(*product_id),
        FieldKind::Total => SerializedKind::Total,
        FieldKind::Calculation { formula, rounding } => SerializedKind::Calculation {
            formula: formula.clone(),
            rounding: rounding.map(|r| r as u32),
        },
    }
}

fn serialize_group(group: &RuleGroup) -> SerializedGroup {
    SerializedGroup {
        enabled: group.enabled,
        hide: group.action_type == ActionType::Hide,
        any: group.logic_type == LogicType::Any,
        rules: group
            .rules
            .iter()
            .map(|r| SerializedRule {
                field: r.field_id.field,
                input: r.field_id.input,
                operator: tag_of(&OPERATORS, &r.operator),
                value: r.value.clone(),
            })
            .collect(),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn form_to_serialized(form: &Form, source_text: Option<&str>) -> SerializedForm {
    let definition = form.definition();
    let source_digest = source_text.map(|s| *blake3::hash(s.as_bytes()).as_bytes());
    let rule_count = definition
        .fields
        .iter()
        .filter_map(|f| f.conditional_logic.as_ref())
        .map(|g| g.rules.len())
        .sum();

    SerializedForm {
        metadata: FormMetadata {
            field_count: definition.fields.len(),
            rule_count,
            target_count: form.evaluation_order().len(),
            source_digest,
        },
        id: definition.id,
        title: definition.title.clone(),
        currency: SerializedCurrency {
            symbol_left: definition.currency.symbol_left.clone(),
            symbol_right: definition.currency.symbol_right.clone(),
            thousand_separator: definition.currency.thousand_separator,
            decimal_separator: definition.currency.decimal_separator,
            decimals: definition.currency.decimals as u32,
        },
        fields: definition
            .fields
            .iter()
            .map(|f| SerializedField {
                id: f.id,
                label: f.label.clone(),
                kind: serialize_kind(&f.kind),
                logic: f.conditional_logic.as_ref().map(serialize_group),
                default_value: f.default_value.clone(),
                is_required: f.is_required,
                is_honeypot: f.is_honeypot,
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// SerializedForm -> Form
// ---------------------------------------------------------------------------

fn deserialize_choices(choices: Vec<SerializedChoice>) -> Vec<Choice> {
    choices
        .into_iter()
        .map(|c| Choice {
            text: c.text,
            value: c.value,
            is_selected: c.is_selected,
            price: c.price,
        })
        .collect()
}

fn deserialize_kind(kind: SerializedKind) -> Result<FieldKind, DeserializeError> {
    Ok(match kind {
        SerializedKind::Text => FieldKind::Text,
        SerializedKind::Number(tag) => FieldKind::Number {
            number_format: from_tag(&NUMBER_FORMATS, tag, "number format")?,
        },
        SerializedKind::Select(choices) => FieldKind::Select {
            choices: deserialize_choices(choices),
        },
        SerializedKind::Multiselect(choices) => FieldKind::Multiselect {
            choices: deserialize_choices(choices),
        },
        SerializedKind::Radio { choices, other } => FieldKind::Radio {
            choices: deserialize_choices(choices),
            enable_other_choice: other,
        },
        SerializedKind::Checkbox(choices) => FieldKind::Checkbox {
            choices: deserialize_choices(choices),
        },
        SerializedKind::Composite(inputs) => FieldKind::Composite {
            inputs: inputs
                .into_iter()
                .map(|(id, label, default)| SubInput::new(id, label).with_default(default))
                .collect(),
        },
        SerializedKind::List(columns) => FieldKind::List { columns },
        SerializedKind::Section => FieldKind::Section,
        SerializedKind::Page => FieldKind::Page,
        SerializedKind::Product {
            base_price,
            choices,
        } => FieldKind::Product {
            base_price,
            choices: deserialize_choices(choices),
        },
        SerializedKind::Quantity(product_id) => FieldKind::Quantity { product_id },
        SerializedKind::Total => FieldKind::Total,
        SerializedKind::Calculation { formula, rounding } => FieldKind::Calculation {
            formula,
            rounding: rounding.map(|r| r as usize),
        },
    })
}

fn deserialize_group(group: SerializedGroup) -> Result<RuleGroup, DeserializeError> {
    let rules = group
        .rules
        .into_iter()
        .map(|r| {
            Ok(Rule {
                field_id: FieldRef {
                    field: r.field,
                    input: r.input,
                },
                operator: from_tag(&OPERATORS, r.operator, "operator")?,
                value: r.value,
            })
        })
        .collect::<Result<Vec<_>, DeserializeError>>()?;
    let action_type = if group.hide {
        ActionType::Hide
    } else {
        ActionType::Show
    };
    let logic_type = if group.any { LogicType::Any } else { LogicType::All };
    Ok(RuleGroup {
        enabled: group.enabled,
        ..RuleGroup::new(action_type, logic_type, rules)
    })
}

fn serialized_to_form(ser: SerializedForm) -> Result<Form, DeserializeError> {
    validate(&ser)?;
    let target_count = ser.metadata.target_count;

    let fields = ser
        .fields
        .into_iter()
        .map(|f| {
            Ok(Field {
                id: f.id,
                label: f.label,
                kind: deserialize_kind(f.kind)?,
                conditional_logic: f.logic.map(deserialize_group).transpose()?,
                default_value: f.default_value,
                is_required: f.is_required,
                is_honeypot: f.is_honeypot,
            })
        })
        .collect::<Result<Vec<_>, DeserializeError>>()?;

    let definition = FormDefinition {
        id: ser.id,
        title: ser.title,
        currency: CurrencyFormat {
            symbol_left: ser.currency.symbol_left,
            symbol_right: ser.currency.symbol_right,
            thousand_separator: ser.currency.thousand_separator,
            decimal_separator: ser.currency.decimal_separator,
            decimals: ser.currency.decimals as usize,
        },
        fields,
    };

    let form = Form::compile(definition).map_err(|e| DeserializeError::Validation(e.to_string()))?;
    if form.evaluation_order().len() != target_count {
        return Err(DeserializeError::Validation(format!(
            "metadata says {} targets but the form compiles to {}",
            target_count,
            form.evaluation_order().len()
        )));
    }
    Ok(form)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(ser: &SerializedForm) -> Result<(), DeserializeError> {
    if ser.metadata.field_count != ser.fields.len() {
        return Err(DeserializeError::Validation(format!(
            "metadata says {} fields but payload has {}",
            ser.metadata.field_count,
            ser.fields.len()
        )));
    }

    let rule_count: usize = ser
        .fields
        .iter()
        .filter_map(|f| f.logic.as_ref())
        .map(|g| g.rules.len())
        .sum();
    if ser.metadata.rule_count != rule_count {
        return Err(DeserializeError::Validation(format!(
            "metadata says {} rules but payload has {}",
            ser.metadata.rule_count, rule_count
        )));
    }

    for field in &ser.fields {
        for rule in field.logic.iter().flat_map(|g| &g.rules) {
            if usize::from(rule.operator) >= OPERATORS.len() {
                return Err(DeserializeError::Validation(format!(
                    "field {} has a rule with unknown operator tag {}",
                    field.id, rule.operator
                )));
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Header I/O
// ---------------------------------------------------------------------------

fn write_header(buf: &mut Vec<u8>, payload: &[u8]) {
    let hash = blake3::hash(payload);
    let hash_bytes = hash.as_bytes();

    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&ENGINE_VERSION.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes()); // flags (reserved)
    #[allow(clippy::cast_possible_truncation)] // payload will never exceed 4 GiB
    let payload_len = payload.len() as u32;
    buf.extend_from_slice(&payload_len.to_le_bytes());
    buf.extend_from_slice(&hash_bytes[..16]);
}

#[allow(clippy::cast_possible_truncation)] // HEADER_SIZE is 32
fn read_header(bytes: &[u8]) -> Result<(u16, u32, [u8; 16]), DeserializeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DeserializeError::LengthMismatch {
            expected: HEADER_SIZE as u32,
            actual: bytes.len(),
        });
    }

    if &bytes[0..4] != MAGIC {
        return Err(DeserializeError::BadMagic);
    }

    let format_version = u16::from_le_bytes([bytes[4], bytes[5]]);
    let payload_len = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);

    let mut hash = [0u8; 16];
    hash.copy_from_slice(&bytes[16..32]);

    Ok((format_version, payload_len, hash))
}

// ---------------------------------------------------------------------------
// Public encode/decode
// ---------------------------------------------------------------------------

pub(crate) fn encode(form: &Form, source_text: Option<&str>) -> Result<Vec<u8>, SerializeError> {
    let serialized = form_to_serialized(form, source_text);
    let payload = bincode::serde::encode_to_vec(&serialized, bincode::config::standard())?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    write_header(&mut buf, &payload);
    buf.extend_from_slice(&payload);
    Ok(buf)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Form, DeserializeError> {
    let (format_version, payload_len, stored_hash) = read_header(bytes)?;

    if format_version != FORMAT_VERSION {
        return Err(DeserializeError::IncompatibleVersion {
            blob: format_version,
            supported: FORMAT_VERSION,
        });
    }

    let payload_end = HEADER_SIZE + payload_len as usize;
    if bytes.len() < payload_end {
        return Err(DeserializeError::LengthMismatch {
            expected: payload_len,
            actual: bytes.len() - HEADER_SIZE,
        });
    }
    let payload = &bytes[HEADER_SIZE..payload_end];

    if blake3::hash(payload).as_bytes()[..16] != stored_hash {
        return Err(DeserializeError::ChecksumMismatch);
    }

    let (serialized, _): (SerializedForm, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())?;

    serialized_to_form(serialized)
}

/// The BLAKE3 digest of the source text embedded in a blob, if any.
///
/// # Errors
///
/// Returns [`DeserializeError`] if the blob is malformed.
pub fn source_digest(bytes: &[u8]) -> Result<Option<[u8; 32]>, DeserializeError> {
    let (_, payload_len, _) = read_header(bytes)?;
    let payload_end = HEADER_SIZE + payload_len as usize;
    let payload = bytes
        .get(HEADER_SIZE..payload_end)
        .ok_or(DeserializeError::LengthMismatch {
            expected: payload_len,
            actual: bytes.len().saturating_sub(HEADER_SIZE),
        })?;
    let (serialized, _): (SerializedForm, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())?;
    Ok(serialized.metadata.source_digest)
}
