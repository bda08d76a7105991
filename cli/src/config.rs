//! Configuration for the tangle CLI
//!
//! Handles loading `tangle.toml`: statement defaults plus the model
//! definitions the commands run against.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use tangle_core::model::{ModelConfig, RelationConfig};
use tangle_core::{ModelRegistry, RegistryConfig, StatementBuilder, TangleError};

pub const CONFIG_FILE: &str = "tangle.toml";

// ============================================================================
// Statement defaults
// ============================================================================

/// `[statement]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct StatementOptions {
    /// Hop budget when connecting an unjoined model.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Reject unknown and unqueryable fields in filters and sort keys.
    #[serde(default = "default_true")]
    pub validate: bool,
}

fn default_max_depth() -> usize {
    tangle_core::statement::DEFAULT_MAX_DEPTH
}

fn default_true() -> bool {
    true
}

impl Default for StatementOptions {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            validate: true,
        }
    }
}

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub statement: StatementOptions,
    #[serde(default)]
    pub model: Vec<ModelConfig>,
    #[serde(default)]
    pub relation: Vec<RelationConfig>,
}

impl Config {
    /// Load from `tangle.toml` in the working directory
    pub fn load() -> Result<Self, Error> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Load from specific path
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(path.into())
            } else {
                Error::Io(path.into(), e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| Error::Parse(path.into(), e))?;
        if config.model.is_empty() {
            return Err(Error::NoModels(path.into()));
        }
        Ok(config)
    }

    /// Builds the model registry the file declares.
    pub fn registry(&self) -> Result<ModelRegistry, Error> {
        let registry = RegistryConfig {
            model: self.model.clone(),
            relation: self.relation.clone(),
        };
        Ok(ModelRegistry::from_config(registry)?)
    }

    /// Statement builder carrying the configured defaults.
    pub fn statement<'r>(&self, registry: &'r ModelRegistry, base: &str) -> StatementBuilder<'r> {
        StatementBuilder::new(registry, base)
            .max_depth(self.statement.max_depth)
            .validate(self.statement.validate)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("no models declared in {}", .0.display())]
    NoModels(PathBuf),

    #[error("invalid models: {0}")]
    Registry(#[from] TangleError),
}

pub type ConfigError = Error;

#[cfg(test)]
mod tests {
    use super::*;

    const BLOG: &str = r#"
        [statement]
        maxDepth = 4

        [[model]]
        name = "user"
        primary_key = "id"
        [[model.field]]
        name = "id"

        [[model]]
        name = "post"
        primary_key = "id"
        [[model.field]]
        name = "id"
        [[model.field]]
        name = "authorId"
        relation = "user.id"
    "#;

    #[test]
    fn parses_statement_options_and_models() {
        let cfg: Config = toml::from_str(BLOG).unwrap();
        assert_eq!(cfg.statement.max_depth, 4);
        assert!(cfg.statement.validate);

        let registry = cfg.registry().unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.graph().between("post", "user").next().is_some());
    }

    #[test]
    fn defaults_without_statement_table() {
        let cfg: Config = toml::from_str("[[model]]\nname = \"a\"").unwrap();
        assert_eq!(cfg.statement, StatementOptions::default());
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(toml::from_str::<Config>("dialect = \"sqlite\"").is_err());
    }

    #[test]
    fn bad_relation_is_registry_error() {
        let cfg: Config = toml::from_str(
            r#"
            [[model]]
            name = "post"
            [[model.field]]
            name = "authorId"
            relation = "user.id"
            "#,
        )
        .unwrap();
        assert!(matches!(cfg.registry(), Err(Error::Registry(_))));
    }
}
