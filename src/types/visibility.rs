use std::fmt;

use serde::{Deserialize, Serialize};

use super::field_ref::FieldId;

/// Final show/hide state of a field or page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[must_use]
pub enum Visibility {
    Shown,
    Hidden,
}

impl Visibility {
    pub fn inverse(self) -> Self {
        match self {
            Visibility::Shown => Visibility::Hidden,
            Visibility::Hidden => Visibility::Shown,
        }
    }

    #[must_use]
    pub fn is_hidden(self) -> bool {
        self == Visibility::Hidden
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Shown => f.write_str("show"),
            Visibility::Hidden => f.write_str("hide"),
        }
    }
}

/// Something whose visibility the engine decides.
///
/// Pages are numbered from 1; page 1 has no page break before it and can
/// therefore never carry conditional logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetId {
    Field(FieldId),
    Page(u32),
}

impl TargetId {
    #[must_use]
    pub fn field_id(self) -> Option<FieldId> {
        match self {
            TargetId::Field(id) => Some(id),
            TargetId::Page(_) => None,
        }
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetId::Field(id) => write!(f, "field {id}"),
            TargetId::Page(n) => write!(f, "page {n}"),
        }
    }
}
