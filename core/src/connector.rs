//! Connector seam
//!
//! A connector receives a finished [`Statement`], renders it for its backend
//! and returns one row per result, keyed by the statement's output names.

use async_trait::async_trait;
use tangle_types::Map;

use crate::error::Result;
use crate::statement::Statement;

/// One result row: output name to value.
pub type Row = Map;

#[async_trait]
pub trait Connector: Send + Sync {
    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>>;
}

#[async_trait]
impl<C: Connector + ?Sized> Connector for std::sync::Arc<C> {
    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>> {
        (**self).execute(statement).await
    }
}
