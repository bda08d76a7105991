//! Bounded breadth-first path search over the relationship graph.

use std::collections::VecDeque;

use compact_str::CompactString;
use hashbrown::HashSet;

use super::{Connection, RelationshipGraph};

/// One traversed connection, seen from the model it leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub from: CompactString,
    pub connection: Connection,
}

impl Hop {
    pub fn to(&self) -> &str {
        &self.connection.model
    }
}

/// A connecting chain from `start` through `hops`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub start: CompactString,
    pub hops: Vec<Hop>,
}

impl Chain {
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn end(&self) -> &str {
        self.hops.last().map_or(self.start.as_str(), Hop::to)
    }

    /// Every model on the chain, start first.
    pub fn models(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.start.as_str()).chain(self.hops.iter().map(Hop::to))
    }
}

/// Restricts which models a search may pass through.
#[derive(Debug, Clone, Default)]
pub struct SearchScope {
    /// When set, only these models may be expanded as intermediate hops.
    pub allowed: Option<HashSet<CompactString>>,
    /// Never visited, not even as endpoints.
    pub blocked: HashSet<CompactString>,
}

impl SearchScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.allowed
            .get_or_insert_with(HashSet::new)
            .extend(models.into_iter().map(Into::into));
        self
    }

    pub fn block<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.blocked.extend(models.into_iter().map(Into::into));
        self
    }

    fn expandable(&self, model: &str) -> bool {
        self.allowed.as_ref().is_none_or(|allowed| allowed.contains(model))
    }
}

struct Visit<'g> {
    model: &'g str,
    via: Option<(usize, &'g Connection)>,
    depth: usize,
}

/// Finds the shortest chain from `from` to `to` of at most `max_hops`
/// connections.
///
/// Among chains of equal length the one discovered first wins; discovery
/// follows connection insertion order at every hop. `from == to` yields the
/// empty chain. Unknown or blocked endpoints yield `None`.
pub fn find_path(
    graph: &RelationshipGraph,
    from: &str,
    to: &str,
    max_hops: usize,
    scope: &SearchScope,
) -> Option<Chain> {
    if !graph.contains(from) || !graph.contains(to) {
        return None;
    }
    if scope.blocked.contains(from) || scope.blocked.contains(to) {
        return None;
    }
    if from == to {
        return Some(Chain {
            start: from.into(),
            hops: Vec::new(),
        });
    }

    let mut arena: Vec<Visit<'_>> = vec![Visit {
        model: from,
        via: None,
        depth: 0,
    }];
    let mut seen: HashSet<&str> = HashSet::new();
    seen.insert(from);
    let mut queue = VecDeque::from([0usize]);

    while let Some(idx) = queue.pop_front() {
        let (model, depth) = (arena[idx].model, arena[idx].depth);
        if depth >= max_hops {
            continue;
        }

        for connection in graph.connections(model) {
            let next = connection.model.as_str();
            if seen.contains(next) || scope.blocked.contains(next) {
                continue;
            }
            if next == to {
                let chain = unwind(&arena, idx, from, connection);
                crate::tangle_trace_plan!(from, to, hops = chain.len(), "tangle.path.found");
                return Some(chain);
            }
            if !scope.expandable(next) {
                continue;
            }
            seen.insert(next);
            arena.push(Visit {
                model: next,
                via: Some((idx, connection)),
                depth: depth + 1,
            });
            queue.push_back(arena.len() - 1);
        }
    }

    crate::tangle_trace_plan!(from, to, max_hops, "tangle.path.missing");
    None
}

fn unwind(arena: &[Visit<'_>], mut idx: usize, from: &str, last: &Connection) -> Chain {
    let mut hops = vec![Hop {
        from: arena[idx].model.into(),
        connection: last.clone(),
    }];
    while let Some((parent, connection)) = arena[idx].via {
        hops.push(Hop {
            from: arena[parent].model.into(),
            connection: connection.clone(),
        });
        idx = parent;
    }
    hops.reverse();
    Chain {
        start: from.into(),
        hops,
    }
}
