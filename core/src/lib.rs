//! Core of tangle: the model registry, the relationship graph and its search
//! and ordering algorithms, the path-expression compiler, filter expressions
//! and the statement builder.

pub mod accessor;
pub mod connector;
pub mod error;
pub mod expression;
pub mod graph;
pub mod model;
pub mod statement;
pub mod tracing;

// Re-export key types
pub use accessor::{Accessor, Loader, MethodCall, accessors_to_path, compile};
pub use connector::{Connector, Row};
pub use error::{Result, TangleError, ValidationIssue};
pub use expression::{
    Expression, Group, Joiner, Operand, Operator, Predicate, SortKey, parse_filter, parse_sort,
};
pub use graph::{
    Chain, Connection, Direction, Hop, Network, RelationshipGraph, ResolveOptions, SearchScope,
    anchor_order, dependency_order, find_path, resolve_all,
};
pub use model::{
    ChangeRank, Field, FieldPatch, Model, ModelRegistry, RegistryBuilder, RegistryConfig, Relation,
};
pub use statement::{
    ColumnRef, FieldMethod, JoinOn, Joins, Method, Pagination, SelectedField, Statement,
    StatementBuilder, StatementModel,
};
pub use tangle_types::{Map, Path, Value};
