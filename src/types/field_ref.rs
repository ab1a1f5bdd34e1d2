use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Numeric identifier of a field within one form.
pub type FieldId = u32;

/// Reference to a whole field (`"5"`) or one of its sub-inputs (`"5.2"`).
///
/// Serialized as a string. Deserialization also accepts a bare JSON number,
/// which is how most stored form definitions spell whole-field references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawFieldRef", into = "String")]
pub struct FieldRef {
    pub field: FieldId,
    pub input: Option<u32>,
}

impl FieldRef {
    #[must_use]
    pub fn whole(field: FieldId) -> Self {
        Self { field, input: None }
    }

    #[must_use]
    pub fn sub(field: FieldId, input: u32) -> Self {
        Self {
            field,
            input: Some(input),
        }
    }
}

impl From<FieldId> for FieldRef {
    fn from(field: FieldId) -> Self {
        Self::whole(field)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.input {
            Some(input) => write!(f, "{}.{input}", self.field),
            None => write!(f, "{}", self.field),
        }
    }
}

/// Error returned when a field reference string is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid field reference '{0}'")]
pub struct InvalidFieldRef(pub String);

impl FromStr for FieldRef {
    type Err = InvalidFieldRef;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || InvalidFieldRef(s.to_owned());
        match trimmed.split_once('.') {
            Some((field, input)) => Ok(Self {
                field: field.parse().map_err(|_| invalid())?,
                input: Some(input.parse().map_err(|_| invalid())?),
            }),
            None => Ok(Self::whole(trimmed.parse().map_err(|_| invalid())?)),
        }
    }
}

impl From<FieldRef> for String {
    fn from(r: FieldRef) -> Self {
        r.to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFieldRef {
    Number(FieldId),
    Text(String),
}

impl TryFrom<RawFieldRef> for FieldRef {
    type Error = InvalidFieldRef;

    fn try_from(raw: RawFieldRef) -> Result<Self, Self::Error> {
        match raw {
            RawFieldRef::Number(id) => Ok(Self::whole(id)),
            RawFieldRef::Text(s) => s.parse(),
        }
    }
}
