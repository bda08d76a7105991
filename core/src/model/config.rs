//! TOML model definitions
//!
//! ```toml
//! [[model]]
//! name = "post"
//! primary_key = "id"
//! unique = [["slug"]]
//!
//! [[model.field]]
//! name = "id"
//!
//! [[model.field]]
//! name = "authorId"
//! storage = "author_id"
//! relation = "user.id"
//! required = true
//!
//! [[model.field]]
//! name = "editorId"
//! extends = "authorId"
//! storage = "editor_id"
//! required = false
//! ```

use compact_str::CompactString;
use serde::Deserialize;
use tangle_types::Path;

use super::{ChangeRank, Field, FieldPatch, Model, ModelRegistry, Relation};
use crate::error::{Result, TangleError};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    #[serde(default)]
    pub model: Vec<ModelConfig>,
    #[serde(default)]
    pub relation: Vec<RelationConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub unique: Vec<Vec<String>>,
    #[serde(default)]
    pub field: Vec<FieldConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldConfig {
    pub name: String,
    /// Copy every attribute of an earlier field of the same model, then
    /// apply the attributes set here.
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub storage: Option<String>,
    #[serde(default)]
    pub series: Option<String>,
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub queryable: Option<bool>,
    #[serde(default)]
    pub rank: Option<ChangeRank>,
}

/// Standalone relation: `from = "comment.postId"`, `to = "post.id"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationConfig {
    pub from: String,
    pub to: String,
}

impl RegistryConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn into_registry(self) -> Result<ModelRegistry> {
        let mut builder = ModelRegistry::builder();
        for model in self.model {
            builder = builder.model(model.into_model()?);
        }
        for relation in self.relation {
            let from = Relation::parse(&relation.from)?;
            let to = Relation::parse(&relation.to)?;
            builder = builder.relation(from.model, from.field, to.model, to.field);
        }
        builder.build()
    }
}

impl ModelConfig {
    fn into_model(self) -> Result<Model> {
        let mut model = Model::new(self.name.as_str());
        if let Some(pk) = self.primary_key {
            model = model.primary_key(pk);
        }
        for unique in self.unique {
            model = model.unique(unique);
        }

        let mut built: Vec<Field> = Vec::with_capacity(self.field.len());
        for config in self.field {
            let base = match &config.extends {
                Some(parent) => built
                    .iter()
                    .find(|f| f.name() == parent)
                    .cloned()
                    .ok_or_else(|| {
                        TangleError::config(format!(
                            "field '{}.{}' extends unknown field '{parent}'",
                            self.name, config.name
                        ))
                    })?,
                None => Field::new(config.name.as_str()),
            };
            built.push(base.with_overrides(config.into_patch()?));
        }

        Ok(model.fields(built))
    }
}

impl FieldConfig {
    fn into_patch(self) -> Result<FieldPatch> {
        let relation = self.relation.as_deref().map(Relation::parse).transpose()?;
        let storage = match (self.storage, self.extends.is_some()) {
            (Some(storage), _) => Some(Path::parse(&storage)),
            // An extending field without explicit storage is stored under its own name.
            (None, true) => Some(Path::parse(&self.name)),
            (None, false) => None,
        };
        Ok(FieldPatch {
            name: Some(CompactString::from(self.name)),
            storage,
            series: self.series.map(|s| Some(CompactString::from(s))),
            relation: relation.map(Some),
            required: self.required,
            queryable: self.queryable,
            rank: self.rank,
        })
    }
}

impl ModelRegistry {
    /// Builds a registry from TOML model definitions.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        RegistryConfig::from_toml_str(text)?.into_registry()
    }

    pub fn from_config(config: RegistryConfig) -> Result<Self> {
        config.into_registry()
    }
}
