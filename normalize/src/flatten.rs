//! Flatten phase: nested document to per-model datums.
//!
//! Each node builds one datum per series it maps into, links foreign keys
//! between those datums and to the datums of its parent node, settles
//! existence through discovery and ranks the result. Children are flattened
//! concurrently in their own session layers, merged back in document order.

use compact_str::CompactString;
use futures_util::future::{BoxFuture, FutureExt, try_join_all};
use tangle_core::{ChangeRank, Result, TangleError, ValidationIssue};
use tangle_types::{Map, Path, Value};

use crate::catalog::Catalog;
use crate::datum::{Action, Datum, Slot};
use crate::rank::rank_datum;
use crate::reference::Reference;
use crate::series::{Batch, Layer, Session};
use crate::shape::{Entry, Shape};

/// A datum of the enclosing node, visible to its children.
#[derive(Debug, Clone)]
struct Link {
    model: CompactString,
    reference: Reference,
    /// Fields the document set explicitly.
    fields: Vec<CompactString>,
}

pub(crate) struct Flattener<'a> {
    catalog: Catalog<'a>,
    max_depth: usize,
}

impl<'a> Flattener<'a> {
    pub fn new(catalog: Catalog<'a>, max_depth: usize) -> Self {
        Self { catalog, max_depth }
    }

    pub async fn flatten(&self, shape: &Shape, document: &Value) -> Result<Batch> {
        let root = Session::root();
        let (layer, rank) = self
            .node(shape, document, Path::root(), Vec::new(), &root, 0)
            .await?;
        tangle_core::tangle_trace_plan!(
            datums = layer.len(),
            rank = %rank,
            "tangle.normalize.flatten"
        );
        Ok(Batch::new(layer, rank))
    }

    fn node<'s>(
        &'s self,
        shape: &'s Shape,
        document: &'s Value,
        location: Path,
        parents: Vec<Link>,
        session: &'s Session<'s>,
        depth: usize,
    ) -> BoxFuture<'s, Result<(Layer, ChangeRank)>> {
        async move {
            if depth > self.max_depth {
                return Err(TangleError::Configuration(format!(
                    "document nests deeper than {} levels at '{}'",
                    self.max_depth,
                    location.pointer()
                )));
            }
            let Some(fields) = document.as_map() else {
                return Err(TangleError::Validation(vec![ValidationIssue::new(
                    location,
                    format!("expected an object, found {}", document.kind()),
                )]));
            };

            let mut datums = self.collect(shape, fields, &location)?;
            self.link_siblings(&mut datums)?;
            let patches = self.link_parents(&mut datums, &parents)?;

            let mut here = session.child();
            let mut rank = ChangeRank::None;
            let mut links = Vec::with_capacity(datums.len());
            for mut datum in datums {
                self.settle(&here, &mut datum).await?;
                datum.rank = rank_datum(self.catalog.model(&datum.model)?, &datum);
                rank = rank.max(datum.rank);
                links.push(Link {
                    model: datum.model.clone(),
                    reference: datum.reference.clone(),
                    fields: datum.content.keys().cloned().collect(),
                });
                here.layer_mut().insert(datum);
            }
            for patch in patches {
                here.layer_mut().insert(patch);
            }

            let mut children = Vec::new();
            for (key, entry) in shape.entries() {
                let Entry::Nested(child) = entry else {
                    continue;
                };
                let at = location.child(key.as_str());
                match fields.get(key.as_str()) {
                    None | Some(Value::Null) => {}
                    Some(Value::List(items)) => {
                        for (idx, item) in items.iter().enumerate() {
                            children.push(self.node(
                                child,
                                item,
                                at.child(idx.to_string()),
                                links.clone(),
                                &here,
                                depth + 1,
                            ));
                        }
                    }
                    Some(value) => {
                        children.push(self.node(child, value, at, links.clone(), &here, depth + 1));
                    }
                }
            }

            let results = try_join_all(children).await?;
            for (layer, child_rank) in results {
                here.layer_mut().merge(layer);
                rank = rank.max(child_rank);
            }
            // Children may have patched foreign keys into this node's datums.
            for link in &links {
                if let Some(datum) = here.layer_mut().get_mut(&link.model, &link.reference) {
                    let ranked = rank_datum(self.catalog.model(&link.model)?, datum);
                    datum.rank = ranked;
                    rank = rank.max(ranked);
                }
            }
            Ok((here.into_layer(), rank))
        }
        .boxed()
    }

    /// One datum per series, in first-mapped order.
    fn collect(&self, shape: &Shape, fields: &Map, location: &Path) -> Result<Vec<Datum>> {
        let mut series: Vec<CompactString> = Vec::new();
        let mut datums: Vec<Datum> = Vec::new();

        for mapping in shape.mappings(self.catalog.registry)? {
            let Some(value) = fields.get(mapping.key.as_str()) else {
                continue;
            };
            let idx = match series.iter().position(|s| *s == mapping.series) {
                Some(idx) => idx,
                None => {
                    series.push(mapping.series.clone());
                    datums.push(
                        Datum::new(
                            mapping.model.clone(),
                            Reference::placeholder(&mapping.series, location),
                            shape.requested(),
                        )
                        .location(location.clone()),
                    );
                    datums.len() - 1
                }
            };
            if datums[idx].model != mapping.model {
                return Err(TangleError::Configuration(format!(
                    "series '{}' maps to both '{}' and '{}'",
                    mapping.series, datums[idx].model, mapping.model
                )));
            }
            datums[idx].set(mapping.field, value.clone());
        }

        // A document carrying the primary key names its record.
        for datum in &mut datums {
            let model = self.catalog.model(&datum.model)?;
            if let Some(pk) = self.catalog.primary_key(model)
                && let Some(Slot::Value(value)) = datum.get(pk)
                && !value.is_null()
            {
                datum.reference = Reference::Key(value.clone());
            }
        }
        Ok(datums)
    }

    /// Points each datum's foreign key at another datum of the same node.
    fn link_siblings(&self, datums: &mut [Datum]) -> Result<()> {
        let graph = self.catalog.registry.graph();
        for i in 0..datums.len() {
            for j in 0..datums.len() {
                let (from, to) = (&datums[i], &datums[j]);
                if i == j || from.model == to.model {
                    continue;
                }
                let Some(connection) = graph
                    .between(&from.model, &to.model)
                    .find(|c| c.is_outgoing())
                    .cloned()
                else {
                    continue;
                };
                let points_back = to.content.values().any(
                    |slot| matches!(slot, Slot::Pending { reference, .. } if *reference == from.reference),
                );
                if from.content.contains_key(&connection.local) || points_back {
                    continue;
                }
                let slot = self.pending(&to.model, &to.reference, &connection.remote)?;
                datums[i].set(connection.local, slot);
            }
        }
        Ok(())
    }

    /// Links this node's datums to the parent node's. A foreign key held by
    /// the parent comes back as a patch datum absorbed when layers merge.
    fn link_parents(&self, datums: &mut [Datum], parents: &[Link]) -> Result<Vec<Datum>> {
        let graph = self.catalog.registry.graph();
        let mut patches = Vec::new();
        for datum in datums.iter_mut() {
            for parent in parents {
                let outgoing = graph
                    .between(&datum.model, &parent.model)
                    .find(|c| c.is_outgoing())
                    .cloned();
                if let Some(connection) = outgoing {
                    if !datum.content.contains_key(&connection.local) {
                        let slot = self.pending(&parent.model, &parent.reference, &connection.remote)?;
                        datum.set(connection.local, slot);
                    }
                    continue;
                }

                let incoming = graph
                    .between(&parent.model, &datum.model)
                    .find(|c| c.is_outgoing())
                    .cloned();
                if let Some(connection) = incoming
                    && !parent.fields.contains(&connection.local)
                {
                    let mut patch = Datum::new(parent.model.clone(), parent.reference.clone(), Action::default());
                    patch.set(
                        connection.local,
                        self.pending(&datum.model, &datum.reference, &connection.remote)?,
                    );
                    patches.push(patch);
                }
            }
        }
        Ok(patches)
    }

    /// Foreign key slot towards `reference`, concrete when the reference is a
    /// key and the remote field is the primary key.
    fn pending(&self, model: &str, reference: &Reference, remote: &str) -> Result<Slot> {
        let target = self.catalog.model(model)?;
        if let Some(key) = reference.as_key()
            && self.catalog.primary_key(target) == Some(remote)
        {
            return Ok(Slot::Value(key.clone()));
        }
        Ok(Slot::Pending {
            reference: reference.clone(),
            field: remote.into(),
        })
    }

    /// Settles whether the datum's record exists.
    async fn settle(&self, session: &Session<'_>, datum: &mut Datum) -> Result<()> {
        let known = session
            .find(&datum.model, &datum.reference)
            .filter(|d| d.discovered)
            .map(|d| d.record.clone());

        datum.record = match known {
            Some(record) => record,
            None if datum.action.discovers() => self.catalog.discover(datum).await?,
            None => None,
        };
        datum.discovered = true;

        if datum.record.is_none() && !datum.action.may_create() {
            return Err(TangleError::NotFound(format!(
                "'{}' record for {} at '{}'",
                datum.model,
                datum.reference,
                datum.location.pointer()
            )));
        }
        Ok(())
    }
}
