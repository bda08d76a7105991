use std::fmt;

use compact_str::{CompactString, format_compact};
use serde::{Deserialize, Serialize};
use tangle_types::{Path, Value};

/// Identity of a record inside one normalization pass.
///
/// A document that carries the primary key names its record directly; any
/// other node gets a placeholder derived from its series and location, so the
/// same document always produces the same placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference {
    Placeholder {
        #[serde(rename = "$placeholder")]
        placeholder: CompactString,
    },
    Key(Value),
}

impl Reference {
    pub fn key(value: impl Into<Value>) -> Self {
        Reference::Key(value.into())
    }

    /// Placeholder for `series` at document `location`: `item@/children/0`.
    pub fn placeholder(series: &str, location: &Path) -> Self {
        Reference::Placeholder {
            placeholder: format_compact!("{series}@{}", location.pointer()),
        }
    }

    pub fn as_key(&self) -> Option<&Value> {
        match self {
            Reference::Key(value) => Some(value),
            Reference::Placeholder { .. } => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Reference::Placeholder { .. })
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Placeholder { placeholder } => f.write_str(placeholder),
            Reference::Key(value) => write!(f, "{value}"),
        }
    }
}
