//! Statements
//!
//! A [`Statement`] is the dialect-neutral description of one query: which
//! aliased models take part, how each joins to the one before it, which
//! storage paths are selected under which output names, and the filter,
//! sort and pagination to apply. Connectors turn it into query text.
//!
//! Build one with [`StatementBuilder`]:
//!
//! ```ignore
//! let statement = StatementBuilder::new(&registry, "post")
//!     .field("$post.title")
//!     .field("$post>$user.email@author")
//!     .filter("$post.published = true")
//!     .sort("-$post.createdAt")
//!     .limit(20)
//!     .build()?;
//! ```

mod builder;
mod plan;

pub use builder::{DEFAULT_MAX_DEPTH, StatementBuilder};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tangle_types::Path;

use crate::expression::{Expression, SortKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Create,
    #[default]
    Read,
    Update,
    Delete,
}

impl Method {
    pub const fn as_str(self) -> &'static str {
        match self {
            Method::Create => "create",
            Method::Read => "read",
            Method::Update => "update",
            Method::Delete => "delete",
        }
    }
}

/// Alias-qualified storage path used as a method argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub series: CompactString,
    pub path: Path,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMethod {
    pub name: CompactString,
    pub args: Vec<ColumnRef>,
}

/// One selected value and the name it is returned under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedField {
    /// Storage path on the owning alias; root for computed fields.
    #[serde(default, skip_serializing_if = "Path::is_root")]
    pub path: Path,
    #[serde(rename = "as")]
    pub output: CompactString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<FieldMethod>,
}

/// One join condition: `this.local = name.remote`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOn {
    /// Alias joined against; always declared earlier in the statement.
    pub name: CompactString,
    pub local: Path,
    pub remote: Path,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Joins {
    #[serde(default)]
    pub optional: bool,
    pub on: SmallVec<[JoinOn; 1]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementModel {
    /// Alias of this model in the statement.
    pub series: CompactString,
    /// Model name.
    pub schema: CompactString,
    pub fields: Vec<SelectedField>,
    /// `None` only for the base model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joins: Option<Joins>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub method: Method,
    /// Alias of the model every other model is joined onto.
    pub base: CompactString,
    /// Models in declaration order: a join only names aliases listed before it.
    pub models: Vec<StatementModel>,
    #[serde(default)]
    pub filters: Expression,
    #[serde(default)]
    pub params: Expression,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl Statement {
    pub fn model(&self, series: &str) -> Option<&StatementModel> {
        self.models.iter().find(|m| m.series == series)
    }

    /// Output names of every selected field, in declaration order.
    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.models
            .iter()
            .flat_map(|m| m.fields.iter().map(|f| f.output.as_str()))
    }

    pub fn join_count(&self) -> usize {
        self.models.iter().filter(|m| m.joins.is_some()).count()
    }

    pub fn to_json(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: serde_json::Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}
