//! Model registry
//!
//! Named entity definitions (fields, declared relations). Building a
//! [`ModelRegistry`] validates every declaration and seeds the
//! [`RelationshipGraph`](crate::graph::RelationshipGraph) with one
//! connection pair per relation.

mod config;
mod field;
mod registry;

pub use config::{FieldConfig, ModelConfig, RegistryConfig, RelationConfig};
pub use field::{ChangeRank, Field, FieldPatch, Relation};
pub use registry::{ModelRegistry, RegistryBuilder};

use compact_str::CompactString;

/// An entity definition: ordered fields plus key declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    name: CompactString,
    fields: Vec<Field>,
    primary_key: Option<CompactString>,
    unique: Vec<Vec<CompactString>>,
}

impl Model {
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            primary_key: None,
            unique: Vec::new(),
        }
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields<I: IntoIterator<Item = Field>>(mut self, fields: I) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn primary_key(mut self, field: impl Into<CompactString>) -> Self {
        self.primary_key = Some(field.into());
        self
    }

    /// Declares a unique index over the given fields.
    pub fn unique<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.unique.push(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn all_fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn primary_key_field(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    pub fn unique_indexes(&self) -> &[Vec<CompactString>] {
        &self.unique
    }

    /// Fields carrying a relation, in declaration order.
    pub fn relations(&self) -> impl Iterator<Item = (&Field, &Relation)> {
        self.fields
            .iter()
            .filter_map(|f| f.relation_target().map(|r| (f, r)))
    }

    pub(crate) fn replace_field(&mut self, field: Field) {
        if let Some(slot) = self.fields.iter_mut().find(|f| f.name() == field.name()) {
            *slot = field;
        }
    }
}
