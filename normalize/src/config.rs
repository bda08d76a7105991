//! Normalizer configuration with a builder API.

use std::fmt;
use std::sync::Arc;

use tangle_core::ChangeRank;

use crate::service::Permission;

/// Callback receiving the rank of a flattened document.
pub type ChangeHook = Arc<dyn Fn(ChangeRank) + Send + Sync>;

/// Default limit on document nesting.
pub const DEFAULT_MAX_DEPTH: usize = 32;

#[derive(Clone)]
pub struct NormalizeConfig {
    /// Deepest nested node accepted, the root being depth 0.
    pub(crate) max_depth: usize,
    /// Consulted before every service write.
    pub(crate) permission: Option<Arc<dyn Permission>>,
    /// Fired once per flattened document with the root rank.
    pub(crate) on_change: Option<ChangeHook>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            permission: None,
            on_change: None,
        }
    }
}

impl NormalizeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deepest nesting level a document may reach.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the predicate awaited before each create, update and delete.
    pub fn permission(mut self, permission: Arc<dyn Permission>) -> Self {
        self.permission = Some(permission);
        self
    }

    /// Set the callback fired with the rank of every flattened document.
    pub fn on_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(ChangeRank) + Send + Sync + 'static,
    {
        self.on_change = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for NormalizeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizeConfig")
            .field("max_depth", &self.max_depth)
            .field("permission", &self.permission.is_some())
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}
