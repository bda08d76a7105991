//! CLI command implementations

pub mod check;
pub mod order;
pub mod path;
pub mod plan;
pub mod route;
