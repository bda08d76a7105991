use std::fmt;

use tangle_types::Path;
use thiserror::Error;

/// One structural problem found while validating content before a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Location of the offending value (document path, or `model.field`).
    pub path: Path,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<Path>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.pointer(), self.message)
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum TangleError {
    /// Unknown model or field, duplicate declaration, unjoined series
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Path, filter or sort expression could not be parsed
    #[error("Parse error at {position} in '{input}': {message}")]
    Parse {
        input: String,
        position: usize,
        message: String,
    },

    /// The requested models cannot be connected or ordered
    #[error("Graph unreachable: {0}")]
    GraphUnreachable(String),

    /// Content failed structural checks; nothing was written
    #[error("Validation failed: {}", join_issues(.0))]
    Validation(Vec<ValidationIssue>),

    /// A record expected to exist was not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The permission predicate refused a write
    #[error("Denied: {0}")]
    Denied(String),

    /// Error reported by a service collaborator
    #[error("Service error: {0}")]
    Service(String),

    /// Error reported by a connector collaborator
    #[error("Connector error: {0}")]
    Connector(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Path error: {0}")]
    Path(#[from] tangle_types::PathError),
}

impl TangleError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn parse(input: &str, position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            input: input.to_owned(),
            position,
            message: message.into(),
        }
    }
}

/// Result type for tangle operations
pub type Result<T> = std::result::Result<T, TangleError>;
