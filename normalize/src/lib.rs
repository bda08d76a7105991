//! Nested document normalization for tangle
//!
//! A [`Normalizer`] takes a nested document and a [`Shape`] describing how
//! its keys map onto models, and turns it into dependency-ordered service
//! writes:
//!
//! 1. **Flatten** the document into per-model [`Datum`]s, linking foreign
//!    keys between datums that share a node or sit in a parent node, and
//!    settling each datum's existence through [`Service::discover`].
//! 2. **Order** the contributing models with
//!    [`dependency_order`](tangle_core::dependency_order).
//! 3. **Write** each datum through its [`Service`], resolving foreign keys
//!    from records stored earlier in the pass.
//!
//! The [`ChangeRank`](tangle_core::ChangeRank) of a flattened document is reported once through
//! [`NormalizeConfig::on_change`].
//!
//! ```ignore
//! let normalizer = Normalizer::new(registry, services);
//! let shape = Shape::new()
//!     .field("name", "$parent.name")
//!     .nested("child", Shape::new().field("name", "$child.name"));
//! let log = normalizer.push(&shape, &document).await?;
//! ```

mod catalog;
mod config;
mod datum;
mod flatten;
pub mod memory;
mod rank;
mod reference;
mod series;
mod service;
mod shape;
mod validate;
mod waitlist;
mod wire;
mod write;

use std::sync::Arc;

use tangle_core::{Method, ModelRegistry, Result, TangleError};
use tangle_types::Value;

use crate::catalog::{Catalog, assign};
use crate::flatten::Flattener;
use crate::write::Writer;

pub use config::{ChangeHook, DEFAULT_MAX_DEPTH, NormalizeConfig};
pub use datum::{Action, Datum, Slot};
pub use rank::rank_datum;
pub use reference::Reference;
pub use series::{Batch, Series};
pub use service::{Permission, Record, Service, Services};
pub use shape::{Entry, Shape};
pub use validate::validate;
pub use write::{WriteLog, Written};

/// Flattens nested documents and writes them through per-model services.
#[derive(Debug, Clone)]
pub struct Normalizer {
    registry: Arc<ModelRegistry>,
    services: Services,
    config: NormalizeConfig,
}

impl Normalizer {
    pub fn new(registry: Arc<ModelRegistry>, services: Services) -> Self {
        Self {
            registry,
            services,
            config: NormalizeConfig::default(),
        }
    }

    pub fn with_config(mut self, config: NormalizeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &NormalizeConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    fn catalog(&self) -> Catalog<'_> {
        Catalog::new(&self.registry, &self.services)
    }

    /// Flattens `document` without writing anything.
    pub async fn flatten(&self, shape: &Shape, document: &Value) -> Result<Batch> {
        let batch = Flattener::new(self.catalog(), self.config.max_depth)
            .flatten(shape, document)
            .await?;
        if let Some(hook) = &self.config.on_change {
            hook(batch.rank);
        }
        Ok(batch)
    }

    /// Writes a flattened batch in dependency order.
    pub async fn write(&self, batch: Batch) -> Result<WriteLog> {
        Writer::new(self.catalog(), self.config.permission.as_deref())
            .write(batch)
            .await
    }

    /// Flattens and writes `document`.
    pub async fn push(&self, shape: &Shape, document: &Value) -> Result<WriteLog> {
        let batch = self.flatten(shape, document).await?;
        self.write(batch).await
    }

    /// Deletes the `model` record with `key` (a primary key value, or a map
    /// of unique index fields).
    pub async fn delete(&self, model: &str, key: &Value) -> Result<()> {
        let catalog = self.catalog();
        let definition = catalog.model(model)?;
        let service = catalog.service(model)?;

        let content = match key {
            Value::Map(fields) => fields.clone(),
            key => {
                let Some(pk) = catalog.primary_key(definition) else {
                    return Err(TangleError::Configuration(format!(
                        "'{model}' has no primary key to delete by"
                    )));
                };
                let mut content = Record::new();
                assign(&mut content, catalog.storage(definition, pk)?, key.clone())?;
                content
            }
        };
        if let Some(permission) = &self.config.permission
            && !permission.allow(model, Method::Delete, &content).await
        {
            tangle_core::tangle_trace_abort!(model = %model, action = "delete", "tangle.normalize.denied");
            return Err(TangleError::Denied(format!("delete on '{model}'")));
        }

        service.delete(key).await?;
        tangle_core::tangle_trace_write!(model = %model, action = "delete", "tangle.normalize.write");
        Ok(())
    }
}
