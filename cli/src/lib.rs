//! tangle CLI - inspect model registries from the command line
//!
//! Commands read their models from a `tangle.toml` file:
//!
//! ```toml
//! [statement]
//! maxDepth = 3
//!
//! [[model]]
//! name = "user"
//! primary_key = "id"
//!
//! [[model.field]]
//! name = "id"
//!
//! [[model]]
//! name = "post"
//! primary_key = "id"
//!
//! [[model.field]]
//! name = "id"
//!
//! [[model.field]]
//! name = "authorId"
//! storage = "author_id"
//! relation = "user.id"
//! ```
//!
//! # Commands
//!
//! - `tangle init` - Create a starter tangle.toml
//! - `tangle check` - Validate the models and list their connections
//! - `tangle path <expr>` - Compile a path expression
//! - `tangle route <from> <to>` - Shortest connection chain between two models
//! - `tangle order <models..>` - Write order and join anchor for a model set
//! - `tangle plan --base <model> ...` - Print the statement a selection builds

pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use config::{Config, Error as ConfigError, StatementOptions};
pub use error::CliError;
