//! Alias tree construction.
//!
//! Every model use in a statement becomes an alias node hanging off the node
//! it was joined from. Reaching the same model over the same edge from the
//! same parent reuses the node; any other repeat gets an occurrence suffix.

use compact_str::{CompactString, format_compact};
use hashbrown::HashMap;
use tangle_types::Path;

use crate::accessor::Accessor;
use crate::error::{Result, TangleError};
use crate::graph::{Connection, Hop, SearchScope, find_path};
use crate::model::ModelRegistry;

use super::SelectedField;

/// Edge identity: (parent alias index, parent field, model, model field).
type EdgeKey = (usize, CompactString, CompactString, CompactString);

#[derive(Debug, Clone)]
pub(super) struct AliasNode {
    pub alias: CompactString,
    pub model: CompactString,
    pub parent: Option<usize>,
    /// Connection as seen from the parent.
    pub via: Option<Connection>,
    pub optional: bool,
    pub fields: Vec<SelectedField>,
}

#[derive(Debug)]
pub(super) struct AliasPlan<'r> {
    registry: &'r ModelRegistry,
    max_depth: usize,
    pub nodes: Vec<AliasNode>,
    index: HashMap<CompactString, usize>,
    occurrences: HashMap<CompactString, usize>,
    edges: HashMap<EdgeKey, usize>,
}

impl<'r> AliasPlan<'r> {
    pub fn new(registry: &'r ModelRegistry, base: &str, max_depth: usize) -> Result<Self> {
        registry.require_model(base)?;
        let mut plan = Self {
            registry,
            max_depth,
            nodes: Vec::new(),
            index: HashMap::new(),
            occurrences: HashMap::new(),
            edges: HashMap::new(),
        };
        plan.insert(base.into(), base.into(), None, None, false);
        Ok(plan)
    }

    pub fn lookup(&self, alias: &str) -> Option<usize> {
        self.index.get(alias).copied()
    }

    pub fn node(&self, idx: usize) -> &AliasNode {
        &self.nodes[idx]
    }

    pub fn node_mut(&mut self, idx: usize) -> &mut AliasNode {
        &mut self.nodes[idx]
    }

    /// Walks an accessor list and returns the alias index of every accessor.
    pub fn walk(&mut self, accessors: &[Accessor]) -> Result<Vec<usize>> {
        let mut resolved = Vec::with_capacity(accessors.len());
        let mut previous: Option<(usize, &Accessor)> = None;

        for accessor in accessors {
            let idx = match previous {
                None => self.mount(accessor)?,
                Some((from, prev)) => self.hop(from, prev.field.as_deref(), accessor)?,
            };
            resolved.push(idx);
            previous = Some((idx, accessor));
        }
        Ok(resolved)
    }

    /// Resolves a series name used by a filter or sort key, connecting the
    /// model when the name is an unjoined model.
    pub fn series(&mut self, series: &str) -> Result<usize> {
        if let Some(idx) = self.lookup(series) {
            return Ok(idx);
        }
        if self.registry.model(series).is_some() {
            return self.mount(&Accessor::access(series, None));
        }
        Err(TangleError::config(format!(
            "'{series}' is neither a joined series nor a model"
        )))
    }

    /// First accessor of a path: an existing alias, or a new model connected
    /// from the closest alias already in the plan.
    fn mount(&mut self, accessor: &Accessor) -> Result<usize> {
        self.registry.require_model(&accessor.model)?;
        if let Some(idx) = self.lookup(&accessor.series) {
            return self.reuse(idx, accessor);
        }

        let graph = self.registry.graph();
        for depth in 1..=self.max_depth {
            for from in 0..self.nodes.len() {
                let chain = find_path(
                    graph,
                    &self.nodes[from].model,
                    &accessor.model,
                    depth,
                    &SearchScope::new(),
                );
                if let Some(chain) = chain.filter(|c| !c.is_empty()) {
                    crate::tangle_trace_plan!(
                        model = %accessor.model,
                        from = %self.nodes[from].alias,
                        hops = chain.len(),
                        "tangle.statement.connect"
                    );
                    return self.follow(from, &chain.hops, accessor);
                }
            }
        }
        Err(TangleError::GraphUnreachable(format!(
            "'{}' cannot be connected to the statement within {} hops",
            accessor.model, self.max_depth
        )))
    }

    /// Joins `accessor` onto alias `from`.
    fn hop(&mut self, from: usize, prev_field: Option<&str>, accessor: &Accessor) -> Result<usize> {
        let registry = self.registry;
        registry.require_model(&accessor.model)?;
        let from_model = self.nodes[from].model.clone();
        let graph = registry.graph();

        let direct = if let Some(target) = &accessor.target {
            let found = graph
                .between(&from_model, &accessor.model)
                .find(|c| !c.is_outgoing() && c.local == *target);
            match found {
                Some(connection) => Some(connection.clone()),
                None => {
                    return Err(TangleError::config(format!(
                        "'{}' has no foreign key pointing at '{from_model}.{target}'",
                        accessor.model
                    )));
                }
            }
        } else {
            prev_field
                .and_then(|field| {
                    graph
                        .between(&from_model, &accessor.model)
                        .find(|c| c.is_outgoing() && c.local == field)
                })
                .or_else(|| graph.between(&from_model, &accessor.model).next())
                .cloned()
        };

        if let Some(connection) = direct {
            return self.step(from, connection, accessor, true);
        }

        let chain = find_path(
            graph,
            &from_model,
            &accessor.model,
            self.max_depth,
            &SearchScope::new(),
        )
        .ok_or_else(|| {
            TangleError::GraphUnreachable(format!(
                "no path from '{from_model}' to '{}' within {} hops",
                accessor.model, self.max_depth
            ))
        })?;
        if chain.is_empty() {
            return Err(TangleError::config(format!(
                "'{from_model}' cannot join itself without a connection"
            )));
        }
        self.follow(from, &chain.hops, accessor)
    }

    /// Materializes a multi-hop chain; intermediates take the accessor's
    /// optionality and default aliases.
    fn follow(&mut self, mut from: usize, hops: &[Hop], accessor: &Accessor) -> Result<usize> {
        let Some((last, intermediate)) = hops.split_last() else {
            return Ok(from);
        };
        for hop in intermediate {
            let step = Accessor {
                optional: accessor.optional,
                ..Accessor::access(hop.to(), None)
            };
            from = self.step(from, hop.connection.clone(), &step, false)?;
        }
        self.step(from, last.connection.clone(), accessor, true)
    }

    /// Joins `accessor` onto `from` over `connection`, reusing an existing
    /// node when the alias or the edge is already known.
    fn step(
        &mut self,
        from: usize,
        connection: Connection,
        accessor: &Accessor,
        explicit: bool,
    ) -> Result<usize> {
        if explicit && accessor.is_aliased() {
            if let Some(idx) = self.lookup(&accessor.series) {
                return self.reuse(idx, accessor);
            }
        }

        let key: EdgeKey = (
            from,
            connection.local.clone(),
            accessor.model.clone(),
            connection.remote.clone(),
        );
        if let Some(&idx) = self.edges.get(&key) {
            if !explicit || !accessor.is_aliased() {
                return self.reuse(idx, accessor);
            }
        }

        let alias = if explicit && accessor.is_aliased() {
            accessor.series.clone()
        } else {
            self.next_alias(&accessor.model)
        };
        let idx = self.insert(
            alias,
            accessor.model.clone(),
            Some(from),
            Some(connection),
            accessor.optional,
        );
        self.edges.entry(key).or_insert(idx);
        Ok(idx)
    }

    fn reuse(&mut self, idx: usize, accessor: &Accessor) -> Result<usize> {
        let node = &mut self.nodes[idx];
        if node.model != accessor.model {
            return Err(TangleError::config(format!(
                "alias '{}' already names model '{}', not '{}'",
                node.alias, node.model, accessor.model
            )));
        }
        // A required use wins over an optional one.
        node.optional &= accessor.optional;
        Ok(idx)
    }

    fn next_alias(&mut self, model: &str) -> CompactString {
        let count = self.occurrences.entry(model.into()).or_insert(0);
        loop {
            *count += 1;
            let alias = if *count == 1 {
                CompactString::from(model)
            } else {
                format_compact!("{model}_{count}")
            };
            if !self.index.contains_key(&alias) {
                return alias;
            }
        }
    }

    fn insert(
        &mut self,
        alias: CompactString,
        model: CompactString,
        parent: Option<usize>,
        via: Option<Connection>,
        optional: bool,
    ) -> usize {
        if parent.is_none() {
            *self.occurrences.entry(model.clone()).or_insert(0) += 1;
        }
        let idx = self.nodes.len();
        self.index.insert(alias.clone(), idx);
        self.nodes.push(AliasNode {
            alias,
            model,
            parent,
            via,
            optional,
            fields: Vec::new(),
        });
        idx
    }

    /// Storage path of `field` on `model`, allowing a path that continues
    /// below a declared field (`meta.color` under field `meta`).
    pub fn storage_path(&self, model: &str, field: &Path, validate: bool) -> Result<Path> {
        let declared = self.registry.require_model(model)?;
        for split in (1..=field.len()).rev() {
            let head = Path::from_segments(field.segments()[..split].iter().cloned());
            if let Some(found) = declared.get_field(&head.to_string()) {
                let rest = Path::from_segments(field.segments()[split..].iter().cloned());
                return Ok(found.storage_path().join(&rest));
            }
        }
        if validate {
            return Err(TangleError::config(format!("unknown field '{model}.{field}'")));
        }
        Ok(field.clone())
    }

    /// Like [`storage_path`](Self::storage_path), additionally rejecting
    /// fields declared unqueryable.
    pub fn queryable_path(&self, model: &str, field: &Path, validate: bool) -> Result<Path> {
        if validate {
            let declared = self.registry.require_model(model)?;
            let unqueryable = (1..=field.len()).rev().find_map(|split| {
                let head = Path::from_segments(field.segments()[..split].iter().cloned());
                declared
                    .get_field(&head.to_string())
                    .filter(|f| !f.is_queryable())
            });
            if let Some(f) = unqueryable {
                return Err(TangleError::config(format!(
                    "field '{model}.{}' cannot be filtered or sorted on",
                    f.name()
                )));
            }
        }
        self.storage_path(model, field, validate)
    }

    pub fn registry(&self) -> &'r ModelRegistry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::compile;
    use crate::model::{Field, Model};

    fn registry() -> ModelRegistry {
        ModelRegistry::builder()
            .model(Model::new("user").field(Field::new("id")).field(Field::new("name")))
            .model(
                Model::new("post")
                    .field(Field::new("id"))
                    .field(Field::new("authorId").relation("user", "id"))
                    .field(Field::new("editorId").relation("user", "id")),
            )
            .model(
                Model::new("comment")
                    .field(Field::new("postId").relation("post", "id"))
                    .field(Field::new("meta").storage("data.meta")),
            )
            .build()
            .unwrap()
    }

    fn aliases<'a>(plan: &'a AliasPlan<'_>) -> Vec<&'a str> {
        plan.nodes.iter().map(|n| n.alias.as_str()).collect()
    }

    #[test]
    fn reuses_same_edge_and_suffixes_repeats() {
        let registry = registry();
        let mut plan = AliasPlan::new(&registry, "post", 3).unwrap();

        plan.walk(&compile("$post>$user.name").unwrap()).unwrap();
        plan.walk(&compile("$post>$user.id").unwrap()).unwrap();
        assert_eq!(aliases(&plan), ["post", "user"]);

        plan.walk(&compile("$post.editorId>$user.name").unwrap()).unwrap();
        assert_eq!(aliases(&plan), ["post", "user", "user_2"]);
        assert_eq!(plan.nodes[2].via.as_ref().unwrap().local, "editorId");

        plan.walk(&compile("$post>$who:user").unwrap()).unwrap();
        assert_eq!(aliases(&plan), ["post", "user", "user_2", "who"]);
    }

    #[test]
    fn required_use_wins() {
        let registry = registry();
        let mut plan = AliasPlan::new(&registry, "post", 3).unwrap();
        plan.walk(&compile("$post>?$user").unwrap()).unwrap();
        assert!(plan.nodes[1].optional);
        plan.walk(&compile("$post>$user").unwrap()).unwrap();
        assert!(!plan.nodes[1].optional);
        plan.walk(&compile("$post>?$user").unwrap()).unwrap();
        assert!(!plan.nodes[1].optional);
    }

    #[test]
    fn auto_connects_through_intermediates() {
        let registry = registry();
        let mut plan = AliasPlan::new(&registry, "comment", 3).unwrap();
        let resolved = plan.walk(&compile("$user.name").unwrap()).unwrap();
        assert_eq!(aliases(&plan), ["comment", "post", "user"]);
        assert_eq!(resolved, [2]);
        assert_eq!(plan.nodes[2].parent, Some(1));
    }

    #[test]
    fn incoming_reference() {
        let registry = registry();
        let mut plan = AliasPlan::new(&registry, "user", 3).unwrap();
        plan.walk(&compile("$user>.id$post").unwrap()).unwrap();
        let via = plan.nodes[1].via.as_ref().unwrap();
        assert_eq!(via.local, "id");
        assert_eq!(via.remote, "authorId");

        assert!(plan.walk(&compile("$user>.name$post").unwrap()).is_err());
    }

    #[test]
    fn alias_model_mismatch() {
        let registry = registry();
        let mut plan = AliasPlan::new(&registry, "post", 3).unwrap();
        assert!(matches!(
            plan.walk(&compile("$post>$post:user").unwrap()),
            Err(TangleError::Configuration(_))
        ));
    }

    #[test]
    fn storage_paths() {
        let registry = registry();
        let plan = AliasPlan::new(&registry, "comment", 3).unwrap();
        assert_eq!(
            plan.storage_path("comment", &Path::parse("meta.color"), true).unwrap(),
            Path::parse("data.meta.color")
        );
        assert!(plan.storage_path("comment", &Path::parse("nope"), true).is_err());
        assert_eq!(
            plan.storage_path("comment", &Path::parse("nope"), false).unwrap(),
            Path::parse("nope")
        );
    }
}
