//! Document shapes
//!
//! A [`Shape`] says how the keys of a nested document map onto models: a
//! field entry routes a document key to `series.field` through a path
//! expression, a nested entry hands a sub-document (or each element of a
//! list) to a child shape.
//!
//! ```ignore
//! let shape = Shape::new()
//!     .field("title", "$post.title")
//!     .field("author", "$post>$user.name")
//!     .nested("tags", Shape::new().field("label", "$tag.label"));
//! ```

use compact_str::CompactString;
use tangle_core::{Accessor, Loader, ModelRegistry, Result, TangleError, accessors_to_path, compile};

use crate::datum::Action;

#[derive(Debug, Clone)]
pub enum Entry {
    /// Path expression ending in `series.field`.
    Field(String),
    Nested(Shape),
}

#[derive(Debug, Clone, Default)]
pub struct Shape {
    action: Action,
    entries: Vec<(CompactString, Entry)>,
}

impl Shape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Action requested for every datum this shape produces.
    pub fn action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    pub fn field(mut self, key: impl Into<CompactString>, path: impl Into<String>) -> Self {
        self.entries.push((key.into(), Entry::Field(path.into())));
        self
    }

    pub fn nested(mut self, key: impl Into<CompactString>, shape: Shape) -> Self {
        self.entries.push((key.into(), Entry::Nested(shape)));
        self
    }

    pub fn requested(&self) -> Action {
        self.action
    }

    pub fn entries(&self) -> &[(CompactString, Entry)] {
        &self.entries
    }

    /// Compiles every field entry against `registry`.
    pub(crate) fn mappings(&self, registry: &ModelRegistry) -> Result<Vec<Mapping>> {
        let mut mappings = Vec::new();
        for (key, entry) in &self.entries {
            if let Entry::Field(path) = entry {
                mappings.push(Mapping::compile(key, path, registry)?);
            }
        }
        Ok(mappings)
    }
}

/// A compiled field entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Mapping {
    pub key: CompactString,
    pub series: CompactString,
    pub model: CompactString,
    pub field: CompactString,
}

impl Mapping {
    fn compile(key: &str, path: &str, registry: &ModelRegistry) -> Result<Self> {
        let accessors = compile(path)?;
        let target = accessors.last().filter(|a| a.loader == Loader::Access);
        let Some(Accessor {
            series,
            model,
            field: Some(field),
            ..
        }) = target
        else {
            return Err(TangleError::Configuration(format!(
                "shape key '{key}' maps to '{}', which does not end in a field",
                accessors_to_path(&accessors)
            )));
        };
        registry.require_field(model, field)?;
        Ok(Self {
            key: key.into(),
            series: series.clone(),
            model: model.clone(),
            field: field.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tangle_core::{Field, Model};

    fn registry() -> ModelRegistry {
        ModelRegistry::builder()
            .model(Model::new("user").field(Field::new("id")).field(Field::new("name")))
            .model(
                Model::new("post")
                    .field(Field::new("title"))
                    .field(Field::new("authorId").relation("user", "id")),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn mappings_take_last_segment() {
        let shape = Shape::new()
            .field("title", "$post.title")
            .field("author", "$post>$writer:user.name")
            .nested("tags", Shape::new());
        let mappings = shape.mappings(&registry()).unwrap();
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[1].series, "writer");
        assert_eq!(mappings[1].model, "user");
        assert_eq!(mappings[1].field, "name");
    }

    #[test]
    fn rejects_bad_targets() {
        let registry = registry();
        for path in ["$post", "$post>#user", "$post.nope", "$post>$"] {
            assert!(Shape::new().field("x", path).mappings(&registry).is_err(), "{path}");
        }
    }
}
