use compact_str::CompactString;
use hashbrown::{HashMap, HashSet};

use super::{Field, FieldPatch, Model, Relation};
use crate::error::{Result, TangleError};
use crate::graph::RelationshipGraph;

/// Validated set of models plus the relationship graph they seed.
///
/// Built once at startup and read-only afterwards; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<Model>,
    index: HashMap<CompactString, usize>,
    graph: RelationshipGraph,
}

impl ModelRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn model(&self, name: &str) -> Option<&Model> {
        self.index.get(name).map(|&idx| &self.models[idx])
    }

    pub fn require_model(&self, name: &str) -> Result<&Model> {
        self.model(name)
            .ok_or_else(|| TangleError::config(format!("unknown model '{name}'")))
    }

    pub fn require_field(&self, model: &str, field: &str) -> Result<&Field> {
        self.require_model(model)?
            .get_field(field)
            .ok_or_else(|| TangleError::config(format!("unknown field '{model}.{field}'")))
    }

    /// Models in registration order.
    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }
}

/// Builder for [`ModelRegistry`].
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    models: Vec<Model>,
    relations: Vec<(Relation, Relation)>,
}

impl RegistryBuilder {
    pub fn model(mut self, model: Model) -> Self {
        self.models.push(model);
        self
    }

    /// Declares that `model.field` points at `target_model.target_field`
    /// without the field itself carrying the relation.
    pub fn relation(
        mut self,
        model: impl Into<CompactString>,
        field: impl Into<CompactString>,
        target_model: impl Into<CompactString>,
        target_field: impl Into<CompactString>,
    ) -> Self {
        self.relations.push((
            Relation::new(model, field),
            Relation::new(target_model, target_field),
        ));
        self
    }

    pub fn build(self) -> Result<ModelRegistry> {
        let mut models = self.models;
        let mut index = HashMap::with_capacity(models.len());

        for (idx, model) in models.iter().enumerate() {
            if index.insert(CompactString::from(model.name()), idx).is_some() {
                return Err(TangleError::config(format!(
                    "model '{}' declared twice",
                    model.name()
                )));
            }
            validate_model(model)?;
        }

        // Explicit relations are folded into the owning field so every
        // connection has a field-level declaration behind it.
        for (source, target) in &self.relations {
            let Some(&idx) = index.get(source.model.as_str()) else {
                return Err(TangleError::config(format!(
                    "relation from unknown model '{}'",
                    source.model
                )));
            };
            let model = &mut models[idx];
            let field = model.get_field(&source.field).ok_or_else(|| {
                TangleError::config(format!("unknown field '{source}' in relation"))
            })?;
            match field.relation_target() {
                Some(existing) if existing != target => {
                    return Err(TangleError::config(format!(
                        "field '{source}' already relates to '{existing}'"
                    )));
                }
                Some(_) => {}
                None => {
                    let patched =
                        field.with_overrides(FieldPatch::new().relation(Some(target.clone())));
                    model.replace_field(patched);
                }
            }
        }

        let mut graph = RelationshipGraph::new();
        for model in &models {
            graph.add_model(model.name());
        }
        for model in &models {
            for (field, relation) in model.relations() {
                let target = index
                    .get(relation.model.as_str())
                    .map(|&idx| &models[idx])
                    .ok_or_else(|| {
                        TangleError::config(format!(
                            "'{}.{}' relates to unknown model '{}'",
                            model.name(),
                            field.name(),
                            relation.model
                        ))
                    })?;
                if target.get_field(&relation.field).is_none() {
                    return Err(TangleError::config(format!(
                        "'{}.{}' relates to unknown field '{relation}'",
                        model.name(),
                        field.name()
                    )));
                }
                graph.add_connection(model.name(), field.name(), &relation.model, &relation.field);
            }
        }

        Ok(ModelRegistry {
            models,
            index,
            graph,
        })
    }
}

fn validate_model(model: &Model) -> Result<()> {
    let mut seen = HashSet::new();
    for field in model.all_fields() {
        if !seen.insert(field.name()) {
            return Err(TangleError::config(format!(
                "field '{}.{}' declared twice",
                model.name(),
                field.name()
            )));
        }
    }

    if let Some(pk) = model.primary_key_field() {
        if !seen.contains(pk) {
            return Err(TangleError::config(format!(
                "primary key '{}.{pk}' is not a declared field",
                model.name()
            )));
        }
    }

    for unique in model.unique_indexes() {
        if unique.is_empty() {
            return Err(TangleError::config(format!(
                "empty unique index on '{}'",
                model.name()
            )));
        }
        if let Some(missing) = unique.iter().find(|f| !seen.contains(f.as_str())) {
            return Err(TangleError::config(format!(
                "unique index on '{}' names unknown field '{missing}'",
                model.name()
            )));
        }
    }

    Ok(())
}
