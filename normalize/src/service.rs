//! Per-model storage collaborators.
//!
//! A [`Service`] owns the records of one model. The engine only ever talks to
//! it through these calls, which are also the only points where a pass can
//! suspend. Content is exchanged in storage layout: every field sits at its
//! storage path.

use std::sync::Arc;

use async_trait::async_trait;
use compact_str::CompactString;
use hashbrown::HashMap;
use tangle_core::{Method, Result, TangleError};
use tangle_types::{Map, Value};

/// A stored record in storage layout.
pub type Record = Map;

#[async_trait]
pub trait Service: Send + Sync {
    /// Primary key field name; `None` defers to the model definition.
    fn primary_key(&self) -> Option<&str> {
        None
    }

    /// Unique indexes as field names; empty defers to the model definition.
    fn unique_indexes(&self) -> &[Vec<CompactString>] {
        &[]
    }

    /// Finds the record matching every entry of `query`.
    async fn discover(&self, query: &Record) -> Result<Option<Record>>;

    async fn create(&self, content: &Record) -> Result<Record>;

    async fn update(&self, key: &Value, content: &Record) -> Result<Record>;

    async fn delete(&self, key: &Value) -> Result<()>;
}

/// Predicate consulted before every service write.
#[async_trait]
pub trait Permission: Send + Sync {
    async fn allow(&self, model: &str, method: Method, content: &Record) -> bool;
}

/// Services by model name.
#[derive(Clone, Default)]
pub struct Services {
    services: HashMap<CompactString, Arc<dyn Service>>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, model: impl Into<CompactString>, service: Arc<dyn Service>) -> Self {
        self.insert(model, service);
        self
    }

    pub fn insert(&mut self, model: impl Into<CompactString>, service: Arc<dyn Service>) {
        self.services.insert(model.into(), service);
    }

    pub fn get(&self, model: &str) -> Option<&Arc<dyn Service>> {
        self.services.get(model)
    }

    pub fn require(&self, model: &str) -> Result<&Arc<dyn Service>> {
        self.get(model)
            .ok_or_else(|| TangleError::Configuration(format!("no service registered for '{model}'")))
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(CompactString::as_str)
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("models", &self.services.keys().collect::<Vec<_>>())
            .finish()
    }
}
