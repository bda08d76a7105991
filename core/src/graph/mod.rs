//! Relationship graph
//!
//! Per-model adjacency list of [`Connection`]s. Every foreign key
//! `a.field -> b.field` is stored twice: outgoing on `a`, incoming on `b`.
//! Connection order is insertion order, which makes path search and
//! ordering deterministic.

mod network;
mod path;

pub use network::{Network, ResolveOptions, anchor_order, anchor_walk, dependency_order, resolve_all};
pub use path::{Chain, Hop, SearchScope, find_path};

use compact_str::CompactString;
use hashbrown::HashMap;
use serde::Serialize;

/// Which side of the foreign key the owning model is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The owning model holds the foreign key.
    Outgoing,
    /// Another model's foreign key points at the owning model.
    Incoming,
}

/// One edge as seen from the model that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Connection {
    /// Field on the owning model.
    pub local: CompactString,
    /// Model on the other end.
    pub model: CompactString,
    /// Field on the other model.
    pub remote: CompactString,
    pub direction: Direction,
}

impl Connection {
    pub fn is_outgoing(&self) -> bool {
        self.direction == Direction::Outgoing
    }

    /// The same edge seen from the other model.
    pub fn mirrored(&self, owner: &str) -> Connection {
        Connection {
            local: self.remote.clone(),
            model: CompactString::from(owner),
            remote: self.local.clone(),
            direction: match self.direction {
                Direction::Outgoing => Direction::Incoming,
                Direction::Incoming => Direction::Outgoing,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    adjacency: HashMap<CompactString, Vec<Connection>>,
    order: Vec<CompactString>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model with no connections. Idempotent.
    pub fn add_model(&mut self, model: &str) {
        if !self.adjacency.contains_key(model) {
            self.adjacency.insert(CompactString::from(model), Vec::new());
            self.order.push(CompactString::from(model));
        }
    }

    /// Registers `model_a.field_a -> model_b.field_b` as an outgoing
    /// connection on `model_a` and an incoming one on `model_b`.
    /// Re-adding an existing direction is a no-op.
    pub fn add_connection(&mut self, model_a: &str, field_a: &str, model_b: &str, field_b: &str) {
        self.add_model(model_a);
        self.add_model(model_b);

        let outgoing = Connection {
            local: field_a.into(),
            model: model_b.into(),
            remote: field_b.into(),
            direction: Direction::Outgoing,
        };
        let incoming = outgoing.mirrored(model_a);

        self.push(model_a, outgoing);
        self.push(model_b, incoming);
    }

    fn push(&mut self, model: &str, connection: Connection) {
        if let Some(list) = self.adjacency.get_mut(model) {
            if !list.contains(&connection) {
                list.push(connection);
            }
        }
    }

    /// Connections owned by `model`, in insertion order.
    pub fn connections(&self, model: &str) -> &[Connection] {
        self.adjacency.get(model).map_or(&[], Vec::as_slice)
    }

    /// Foreign keys held by `model`.
    pub fn outgoing<'a>(&'a self, model: &str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections(model).iter().filter(|c| c.is_outgoing())
    }

    /// Direct connections from `from` to `to`, in insertion order.
    pub fn between<'a>(&'a self, from: &str, to: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections(from).iter().filter(move |c| c.model == to)
    }

    pub fn contains(&self, model: &str) -> bool {
        self.adjacency.contains_key(model)
    }

    /// Models in registration order.
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(CompactString::as_str)
    }
}
