//! Network resolution: connectivity of a model set, write-safe dependency
//! order, and anchor order for join planning.

use std::collections::VecDeque;
use std::hash::Hash;

use compact_str::CompactString;
use hashbrown::HashSet;

use super::path::{Chain, SearchScope, find_path};
use super::RelationshipGraph;
use crate::error::{Result, TangleError};

/// Options for [`resolve_all`].
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// When set, the only models (besides the targets) a chain may pass through.
    pub join: Option<HashSet<CompactString>>,
    /// Models that may be reached but never originate a search.
    pub stub: HashSet<CompactString>,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.join
            .get_or_insert_with(HashSet::new)
            .extend(models.into_iter().map(Into::into));
        self
    }

    pub fn stub<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.stub.extend(models.into_iter().map(Into::into));
        self
    }
}

/// A connected model set: the targets plus every intermediate model found
/// on the chains that connect them.
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub models: Vec<CompactString>,
    pub chains: Vec<Chain>,
}

impl Network {
    pub fn contains(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }
}

/// Connects every model in `models`, widening the hop budget from 1 up to
/// `max_depth` until each target is reachable from the resolved set.
pub fn resolve_all<S: AsRef<str>>(
    graph: &RelationshipGraph,
    models: &[S],
    max_depth: usize,
    options: &ResolveOptions,
) -> Result<Network> {
    let mut network = Network::default();
    for model in models {
        let model = model.as_ref();
        if !graph.contains(model) {
            return Err(TangleError::config(format!("unknown model '{model}'")));
        }
        if !network.contains(model) {
            network.models.push(model.into());
        }
    }

    if network.models.len() <= 1 {
        return Ok(network);
    }

    let targets = network.models.clone();
    let scope = SearchScope {
        allowed: options
            .join
            .as_ref()
            .map(|join| join.iter().chain(targets.iter()).cloned().collect()),
        blocked: HashSet::new(),
    };

    let mut reached: Vec<CompactString> = Vec::new();
    let mut pending: Vec<CompactString> = Vec::new();
    for model in &targets {
        if reached.is_empty() && !options.stub.contains(model) {
            reached.push(model.clone());
        } else {
            pending.push(model.clone());
        }
    }
    if reached.is_empty() {
        return Err(TangleError::GraphUnreachable(
            "every model is a stub; nothing can originate a search".into(),
        ));
    }

    for depth in 1..=max_depth {
        loop {
            let found = pending.iter().enumerate().find_map(|(idx, target)| {
                reached
                    .iter()
                    .filter(|origin| !options.stub.contains(*origin))
                    .find_map(|origin| find_path(graph, origin, target, depth, &scope))
                    .map(|chain| (idx, chain))
            });
            let Some((idx, chain)) = found else { break };

            let target = pending.remove(idx);
            crate::tangle_trace_plan!(model = %target, depth, hops = chain.len(), "tangle.resolve.reached");
            for model in chain.models() {
                if !network.contains(model) {
                    network.models.push(model.into());
                }
                if !reached.iter().any(|r| r == model) {
                    reached.push(model.into());
                }
                pending.retain(|p| p != model);
            }
            network.chains.push(chain);
        }
        if pending.is_empty() {
            return Ok(network);
        }
    }

    if pending.is_empty() {
        return Ok(network);
    }
    Err(TangleError::GraphUnreachable(format!(
        "cannot connect {} within {max_depth} hops",
        pending.join(", ")
    )))
}

/// Orders `models` so every model follows the models its foreign keys point
/// at. Self references are ignored; a genuine cycle is an error.
pub fn dependency_order<S: AsRef<str>>(
    graph: &RelationshipGraph,
    models: &[S],
) -> Result<Vec<CompactString>> {
    let mut remaining: Vec<&str> = Vec::with_capacity(models.len());
    for model in models {
        let model = model.as_ref();
        if !remaining.contains(&model) {
            remaining.push(model);
        }
    }

    let mut ordered = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let ready: Vec<&str> = remaining
            .iter()
            .copied()
            .filter(|&model| {
                !graph
                    .outgoing(model)
                    .any(|c| c.model != model && remaining.contains(&c.model.as_str()))
            })
            .collect();

        if ready.is_empty() {
            return Err(TangleError::GraphUnreachable(format!(
                "cyclic dependency among {}",
                remaining.join(", ")
            )));
        }
        remaining.retain(|m| !ready.contains(m));
        ordered.extend(ready.into_iter().map(CompactString::from));
    }
    Ok(ordered)
}

/// Orders `models` for join planning: the best-connected model first, then
/// breadth-first outward.
pub fn anchor_order<S: AsRef<str>>(graph: &RelationshipGraph, models: &[S]) -> Vec<CompactString> {
    let nodes: Vec<CompactString> = models.iter().map(|m| m.as_ref().into()).collect();
    anchor_walk(
        &nodes,
        |_| true,
        |model| {
            graph
                .connections(model)
                .iter()
                .filter(|c| c.model != *model && nodes.contains(&c.model))
                .map(|c| c.model.clone())
                .collect()
        },
    )
    .into_iter()
    .map(|(node, _)| node)
    .collect()
}

/// Breadth-first walk from the anchor over `nodes`.
///
/// The anchor is the eligible node with the most neighbours (ties go to the
/// earliest). Each visited node is returned with the node it was reached
/// from; disconnected nodes start new walks in input order.
pub fn anchor_walk<N, E, F>(nodes: &[N], eligible: E, neighbors: F) -> Vec<(N, Option<N>)>
where
    N: Clone + Eq + Hash,
    E: Fn(&N) -> bool,
    F: Fn(&N) -> Vec<N>,
{
    let mut anchor: Option<(&N, usize)> = None;
    for node in nodes.iter().filter(|n| eligible(n)) {
        let degree = neighbors(node).len();
        if anchor.is_none_or(|(_, best)| degree > best) {
            anchor = Some((node, degree));
        }
    }

    let roots = anchor.map(|(node, _)| node).into_iter().chain(nodes.iter());
    let mut seen: HashSet<N> = HashSet::with_capacity(nodes.len());
    let mut walk = Vec::with_capacity(nodes.len());

    for root in roots {
        if !seen.insert(root.clone()) {
            continue;
        }
        walk.push((root.clone(), None));
        let mut queue = VecDeque::from([root.clone()]);
        while let Some(current) = queue.pop_front() {
            for next in neighbors(&current) {
                if nodes.contains(&next) && seen.insert(next.clone()) {
                    walk.push((next.clone(), Some(current.clone())));
                    queue.push_back(next);
                }
            }
        }
    }
    walk
}
