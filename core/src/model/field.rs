use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tangle_types::Path;

use crate::error::{Result, TangleError};

/// How significant a change to a field is.
///
/// Ordered `None < Minor < Major`; the rank of a record or a document node
/// is the maximum over its changed fields and nested children.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ChangeRank {
    #[default]
    None,
    Minor,
    Major,
}

impl ChangeRank {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Minor => "minor",
            Self::Major => "major",
        }
    }
}

impl std::fmt::Display for ChangeRank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target of a foreign key: `model.field`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub model: CompactString,
    pub field: CompactString,
}

impl Relation {
    pub fn new(model: impl Into<CompactString>, field: impl Into<CompactString>) -> Self {
        Self {
            model: model.into(),
            field: field.into(),
        }
    }

    /// Parses `model.field`; the field part may itself be dotted.
    pub fn parse(text: &str) -> Result<Self> {
        match text.split_once('.') {
            Some((model, field)) if !model.is_empty() && !field.is_empty() => {
                Ok(Self::new(model, field))
            }
            _ => Err(TangleError::config(format!(
                "relation '{text}' must have the form model.field"
            ))),
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.model, self.field)
    }
}

/// A field declared on a model.
///
/// `name` is the external path callers use; `storage` is the path the
/// connector reads and writes. Fields are immutable once built: derive
/// variants with [`Field::with_overrides`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: CompactString,
    storage: Path,
    series: Option<CompactString>,
    relation: Option<Relation>,
    required: bool,
    queryable: bool,
    rank: ChangeRank,
}

impl Field {
    /// A queryable, optional field stored under its own name with minor rank.
    pub fn new(name: impl Into<CompactString>) -> Self {
        let name = name.into();
        Self {
            storage: Path::parse(&name),
            name,
            series: None,
            relation: None,
            required: false,
            queryable: true,
            rank: ChangeRank::Minor,
        }
    }

    pub fn storage(mut self, storage: impl Into<Path>) -> Self {
        self.storage = storage.into();
        self
    }

    /// Reads the field from another series of the same statement.
    pub fn series(mut self, series: impl Into<CompactString>) -> Self {
        self.series = Some(series.into());
        self
    }

    pub fn relation(mut self, model: impl Into<CompactString>, field: impl Into<CompactString>) -> Self {
        self.relation = Some(Relation::new(model, field));
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unqueryable(mut self) -> Self {
        self.queryable = false;
        self
    }

    pub fn rank(mut self, rank: ChangeRank) -> Self {
        self.rank = rank;
        self
    }

    /// Returns a new field equal to this one with every set patch entry applied.
    pub fn with_overrides(&self, patch: FieldPatch) -> Field {
        let mut field = self.clone();
        if let Some(name) = patch.name {
            field.name = name;
        }
        if let Some(storage) = patch.storage {
            field.storage = storage;
        }
        if let Some(series) = patch.series {
            field.series = series;
        }
        if let Some(relation) = patch.relation {
            field.relation = relation;
        }
        if let Some(required) = patch.required {
            field.required = required;
        }
        if let Some(queryable) = patch.queryable {
            field.queryable = queryable;
        }
        if let Some(rank) = patch.rank {
            field.rank = rank;
        }
        field
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Path {
        Path::parse(&self.name)
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage
    }

    pub fn series_name(&self) -> Option<&str> {
        self.series.as_deref()
    }

    pub fn relation_target(&self) -> Option<&Relation> {
        self.relation.as_ref()
    }

    pub const fn is_required(&self) -> bool {
        self.required
    }

    pub const fn is_queryable(&self) -> bool {
        self.queryable
    }

    pub const fn change_rank(&self) -> ChangeRank {
        self.rank
    }
}

/// Overrides applied by [`Field::with_overrides`]. Unset entries keep the
/// original value; `Some(None)` clears optional attributes.
#[derive(Debug, Clone, Default)]
pub struct FieldPatch {
    pub name: Option<CompactString>,
    pub storage: Option<Path>,
    pub series: Option<Option<CompactString>>,
    pub relation: Option<Option<Relation>>,
    pub required: Option<bool>,
    pub queryable: Option<bool>,
    pub rank: Option<ChangeRank>,
}

impl FieldPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<CompactString>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn storage(mut self, storage: impl Into<Path>) -> Self {
        self.storage = Some(storage.into());
        self
    }

    pub fn relation(mut self, relation: Option<Relation>) -> Self {
        self.relation = Some(relation);
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    pub fn rank(mut self, rank: ChangeRank) -> Self {
        self.rank = Some(rank);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let field = Field::new("address.city");
        assert_eq!(field.storage_path(), &Path::parse("address.city"));
        assert!(field.is_queryable());
        assert!(!field.is_required());
        assert_eq!(field.change_rank(), ChangeRank::Minor);
    }

    #[test]
    fn overrides_leave_original_untouched() {
        let base = Field::new("createdBy").relation("user", "id").required();
        let derived = base.with_overrides(
            FieldPatch::new()
                .name("updatedBy")
                .storage("updated_by")
                .required(false),
        );

        assert_eq!(base.name(), "createdBy");
        assert!(base.is_required());
        assert_eq!(derived.name(), "updatedBy");
        assert_eq!(derived.storage_path(), &Path::parse("updated_by"));
        assert!(!derived.is_required());
        assert_eq!(derived.relation_target(), base.relation_target());
    }

    #[test]
    fn relation_parse() {
        let rel = Relation::parse("category.id").unwrap();
        assert_eq!(rel.model, "category");
        assert_eq!(rel.field, "id");
        assert!(Relation::parse("category").is_err());
        assert!(Relation::parse(".id").is_err());
    }

    #[test]
    fn rank_ordering() {
        assert!(ChangeRank::None < ChangeRank::Minor);
        assert!(ChangeRank::Minor < ChangeRank::Major);
        assert_eq!(
            [ChangeRank::Minor, ChangeRank::Major, ChangeRank::None]
                .into_iter()
                .max(),
            Some(ChangeRank::Major)
        );
    }
}
