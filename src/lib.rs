//! # tangle
//!
//! Relational graph mapping: declare models and the foreign keys between
//! them once, then
//!
//! - address data across models with path expressions (`$post>$user.name`),
//! - build join-planned [`Statement`]s a [`Connector`] executes, and
//! - write nested documents back as dependency-ordered service calls.
//!
//! ## Quick Start
//!
//! ```ignore
//! use tangle::prelude::*;
//!
//! let registry = ModelRegistry::builder()
//!     .model(Model::new("user").field(Field::new("id")).field(Field::new("name")).primary_key("id"))
//!     .model(
//!         Model::new("post")
//!             .field(Field::new("id"))
//!             .field(Field::new("title"))
//!             .field(Field::new("authorId").relation("user", "id"))
//!             .primary_key("id"),
//!     )
//!     .build()?;
//!
//! let tangle = Tangle::builder(registry)
//!     .service("user", users)
//!     .service("post", posts)
//!     .connector(connector)
//!     .build();
//!
//! let statement = tangle.select("post").field("$post.title").field("$post>$user.name@author").build()?;
//! let rows = tangle.read(&statement).await?;
//!
//! let shape = Shape::new()
//!     .field("title", "$post.title")
//!     .nested("author", Shape::new().field("name", "$user.name"));
//! let log = tangle.push(&shape, &document).await?;
//! ```
//!
//! ## Crates
//!
//! | Crate              | Contents                                              |
//! |--------------------|-------------------------------------------------------|
//! | `tangle-types`     | [`Value`] tree and [`Path`]                           |
//! | `tangle-core`      | registry, graph, path expressions, statement building |
//! | `tangle-normalize` | nested document flattening and writes                 |
//!
//! ## Features
//!
//! - `tracing` - emit `tracing` events for planning and writes (default)

use std::sync::Arc;

use tangle_core::{Connector, ModelRegistry, Row, Statement, StatementBuilder, TangleError};
use tangle_normalize::{Batch, NormalizeConfig, Normalizer, Service, Services, Shape, WriteLog};

pub use tangle_core::error::Result;
pub use tangle_types::{Map, Path, Value};

/// Error types
pub mod error {
    pub use tangle_core::error::{TangleError, ValidationIssue};
}

/// Registry, graph, path expressions and statements.
pub mod core {
    pub use tangle_core::*;
}

/// Nested document flattening and dependency-ordered writes.
pub mod normalize {
    pub use tangle_normalize::*;
}

/// Commonly used types.
pub mod prelude {
    pub use crate::{Tangle, TangleBuilder};
    pub use tangle_core::{
        Accessor, ChangeRank, Connector, Field, Method, Model, ModelRegistry, Row, Statement,
        StatementBuilder, TangleError, compile,
    };
    pub use tangle_normalize::{
        Action, Batch, NormalizeConfig, Normalizer, Permission, Record, Service, Services, Shape,
        WriteLog,
    };
    pub use tangle_types::{Map, Path, Value};
}

/// A registry bound to the collaborators that read and write its models.
#[derive(Clone)]
pub struct Tangle {
    registry: Arc<ModelRegistry>,
    normalizer: Normalizer,
    connector: Option<Arc<dyn Connector>>,
}

impl Tangle {
    pub fn builder(registry: impl Into<Arc<ModelRegistry>>) -> TangleBuilder {
        TangleBuilder {
            registry: registry.into(),
            services: Services::new(),
            config: NormalizeConfig::default(),
            connector: None,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Starts a statement with `base` as its first model.
    pub fn select(&self, base: &str) -> StatementBuilder<'_> {
        StatementBuilder::new(&self.registry, base)
    }

    /// Runs a statement through the bound connector.
    pub async fn read(&self, statement: &Statement) -> Result<Vec<Row>> {
        let Some(connector) = &self.connector else {
            return Err(TangleError::Configuration("no connector bound".into()));
        };
        let rows = connector.execute(statement).await?;
        tangle_core::tangle_trace_plan!(
            base = %statement.base,
            rows = rows.len(),
            "tangle.read"
        );
        Ok(rows)
    }

    pub async fn flatten(&self, shape: &Shape, document: &Value) -> Result<Batch> {
        self.normalizer.flatten(shape, document).await
    }

    pub async fn write(&self, batch: Batch) -> Result<WriteLog> {
        self.normalizer.write(batch).await
    }

    /// Flattens `document` and writes it.
    pub async fn push(&self, shape: &Shape, document: &Value) -> Result<WriteLog> {
        self.normalizer.push(shape, document).await
    }

    pub async fn delete(&self, model: &str, key: &Value) -> Result<()> {
        self.normalizer.delete(model, key).await
    }
}

impl std::fmt::Debug for Tangle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tangle")
            .field("models", &self.registry.len())
            .field("services", self.normalizer.services())
            .field("connector", &self.connector.is_some())
            .finish()
    }
}

/// Builder for [`Tangle`].
pub struct TangleBuilder {
    registry: Arc<ModelRegistry>,
    services: Services,
    config: NormalizeConfig,
    connector: Option<Arc<dyn Connector>>,
}

impl TangleBuilder {
    /// Binds the service that stores `model` records.
    pub fn service(mut self, model: &str, service: Arc<dyn Service>) -> Self {
        self.services.insert(model, service);
        self
    }

    pub fn services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn config(mut self, config: NormalizeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Tangle {
        let normalizer = Normalizer::new(self.registry.clone(), self.services).with_config(self.config);
        Tangle {
            registry: self.registry,
            normalizer,
            connector: self.connector,
        }
    }
}
