//! Shared type definitions for tangle
//!
//! This crate provides the dynamic data types used across the tangle crates:
//!
//! - [`Value`] - tagged-union tree used for documents, rows and record content
//! - [`Path`] - ordered string segments addressing a location inside a [`Value`]
//!
//! # Features
//!
//! - `serde` - serde support plus conversions to and from `serde_json::Value`
//!   (enabled by default)

mod path;
mod value;

pub use path::{Path, PathError};
pub use value::{Map, Value};

/// Prelude module for commonly used types
pub mod prelude {
    pub use crate::{Map, Path, Value};
}
