use compact_str::{CompactString, format_compact};
use hashbrown::HashSet;
use smallvec::smallvec;
use tangle_types::Path;

use super::plan::AliasPlan;
use super::{
    ColumnRef, FieldMethod, JoinOn, Joins, Method, Pagination, SelectedField, Statement,
    StatementModel,
};
use crate::accessor::{Accessor, Loader, compile};
use crate::error::{Result, TangleError};
use crate::expression::{Expression, Operand, Predicate, SortKey, parse_filter, parse_sort};
use crate::graph::anchor_walk;
use crate::model::ModelRegistry;

/// Default hop budget when connecting a model named by a selection or filter.
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// Builder for [`Statement`].
///
/// Inputs are collected as given and compiled together by
/// [`build`](Self::build), so every error surfaces there.
#[derive(Debug, Clone)]
pub struct StatementBuilder<'r> {
    registry: &'r ModelRegistry,
    base: CompactString,
    method: Method,
    fields: Vec<String>,
    joins: Vec<String>,
    filters: Vec<Filter>,
    params: Vec<Filter>,
    sort: Vec<String>,
    pagination: Option<Pagination>,
    max_depth: usize,
    validate: bool,
}

#[derive(Debug, Clone)]
enum Filter {
    Text(String),
    Built(Expression),
}

impl Filter {
    fn expression(&self) -> Result<Expression> {
        match self {
            Filter::Text(text) => parse_filter(text),
            Filter::Built(expr) => Ok(expr.clone()),
        }
    }
}

impl<'r> StatementBuilder<'r> {
    pub fn new(registry: &'r ModelRegistry, base: impl Into<CompactString>) -> Self {
        Self {
            registry,
            base: base.into(),
            method: Method::Read,
            fields: Vec::new(),
            joins: Vec::new(),
            filters: Vec::new(),
            params: Vec::new(),
            sort: Vec::new(),
            pagination: None,
            max_depth: DEFAULT_MAX_DEPTH,
            validate: true,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Selects a field: `$post.title`, `$post>$user.email@author`, `#tag`,
    /// `=concat($user.first,$user.last)@name`.
    pub fn field(mut self, path: impl Into<String>) -> Self {
        self.fields.push(path.into());
        self
    }

    pub fn fields<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Adds a join path without selecting anything (unless it includes).
    pub fn join(mut self, path: impl Into<String>) -> Self {
        self.joins.push(path.into());
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filters.push(Filter::Text(filter.into()));
        self
    }

    pub fn filter_expr(mut self, expr: Expression) -> Self {
        self.filters.push(Filter::Built(expr));
        self
    }

    /// Adds predicates bound by the connector (`$user.id = :id`).
    pub fn params(mut self, filter: impl Into<String>) -> Self {
        self.params.push(Filter::Text(filter.into()));
        self
    }

    pub fn params_expr(mut self, expr: Expression) -> Self {
        self.params.push(Filter::Built(expr));
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort.push(sort.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.pagination.get_or_insert_with(Pagination::default).limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.pagination.get_or_insert_with(Pagination::default).offset = Some(offset);
        self
    }

    /// Hop budget for connecting models that are not joined explicitly.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Disables field validation of filters and sort keys.
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn build(&self) -> Result<Statement> {
        let mut plan = AliasPlan::new(self.registry, &self.base, self.max_depth)?;

        for path in &self.joins {
            let accessors = compile(path)?;
            let resolved = plan.walk(&accessors)?;
            self.attach_includes(&mut plan, &accessors, &resolved)?;
        }

        for path in &self.fields {
            let accessors = compile(path)?;
            self.select(&mut plan, &accessors)?;
        }

        let filters = self.resolve_filters(&mut plan, &self.filters)?;
        let params = self.resolve_filters(&mut plan, &self.params)?;
        let sort = self.resolve_sort(&mut plan)?;

        let mut seen = HashSet::new();
        for node in &plan.nodes {
            for field in &node.fields {
                if !seen.insert(field.output.clone()) {
                    return Err(TangleError::config(format!(
                        "output name '{}' is selected twice",
                        field.output
                    )));
                }
            }
        }

        let models = order(&plan)?;
        let statement = Statement {
            method: self.method,
            base: models.first().map(|m| m.series.clone()).unwrap_or_default(),
            models,
            filters,
            params,
            sort,
            pagination: self.pagination,
        };

        crate::tangle_trace_plan!(
            base = %statement.base,
            aliases = statement.models.len(),
            joins = statement.join_count(),
            "tangle.statement.build"
        );
        Ok(statement)
    }

    // =========================================================================
    // Selections
    // =========================================================================

    fn select(&self, plan: &mut AliasPlan<'_>, accessors: &[Accessor]) -> Result<()> {
        let Some(last) = accessors.last() else {
            return Ok(());
        };

        if last.loader == Loader::Method {
            let (head, _) = accessors.split_at(accessors.len() - 1);
            let owner = if head.is_empty() {
                plan.lookup(&self.base).unwrap_or(0)
            } else {
                let resolved = plan.walk(head)?;
                self.attach_includes(plan, head, &resolved)?;
                resolved.last().copied().unwrap_or(0)
            };
            let field = self.method_field(plan, last)?;
            plan.node_mut(owner).fields.push(field);
            return Ok(());
        }

        let resolved = plan.walk(accessors)?;
        self.attach_includes(plan, accessors, &resolved)?;
        let idx = resolved.last().copied().unwrap_or(0);

        match (last.loader, &last.field) {
            (Loader::Include, _) => Ok(()),
            (_, Some(field)) => {
                let model = plan.node(idx).model.clone();
                let declared = plan.registry().require_field(&model, field)?;
                let owner = match declared.series_name() {
                    Some(series) => plan.lookup(series).ok_or_else(|| {
                        TangleError::config(format!(
                            "field '{model}.{field}' reads from series '{series}', which is not joined"
                        ))
                    })?,
                    None => idx,
                };
                let storage = declared.storage_path().clone();
                let output = last
                    .bind
                    .clone()
                    .unwrap_or_else(|| CompactString::from(storage.to_string()));
                plan.node_mut(owner).fields.push(SelectedField {
                    path: storage,
                    output,
                    method: None,
                });
                Ok(())
            }
            (_, None) => Err(TangleError::config(format!(
                "selection '{}' does not name a field",
                crate::accessor::accessors_to_path(accessors)
            ))),
        }
    }

    /// Include accessors select every field as `series.storage`.
    fn attach_includes(
        &self,
        plan: &mut AliasPlan<'_>,
        accessors: &[Accessor],
        resolved: &[usize],
    ) -> Result<()> {
        for (accessor, &idx) in accessors.iter().zip(resolved) {
            if accessor.loader != Loader::Include {
                continue;
            }
            let node = plan.node(idx);
            let prefix = accessor.bind.clone().unwrap_or_else(|| node.alias.clone());
            let model = plan.registry().require_model(&node.model)?;
            let selected: Vec<SelectedField> = model
                .all_fields()
                .iter()
                .map(|field| SelectedField {
                    path: field.storage_path().clone(),
                    output: format_compact!("{prefix}.{}", field.storage_path()),
                    method: None,
                })
                .collect();

            let fields = &mut plan.node_mut(idx).fields;
            for field in selected {
                if !fields.contains(&field) {
                    fields.push(field);
                }
            }
        }
        Ok(())
    }

    fn method_field(&self, plan: &mut AliasPlan<'_>, accessor: &Accessor) -> Result<SelectedField> {
        let Some(call) = &accessor.method else {
            return Err(TangleError::config("method accessor without a call"));
        };

        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            let resolved = plan.walk(arg)?;
            let (Some(last), Some(&idx)) = (arg.last(), resolved.last()) else {
                continue;
            };
            let node = plan.node(idx);
            let path = match &last.field {
                Some(field) => plan
                    .registry()
                    .require_field(&node.model, field)?
                    .storage_path()
                    .clone(),
                None => Path::root(),
            };
            args.push(ColumnRef {
                series: node.alias.clone(),
                path,
            });
        }

        Ok(SelectedField {
            path: Path::root(),
            output: accessor.bind.clone().unwrap_or_else(|| call.name.clone()),
            method: Some(FieldMethod {
                name: call.name.clone(),
                args,
            }),
        })
    }

    // =========================================================================
    // Filters and sort
    // =========================================================================

    fn resolve_filters(&self, plan: &mut AliasPlan<'_>, filters: &[Filter]) -> Result<Expression> {
        let mut merged = Expression::default();
        for filter in filters {
            let expr = self.resolve_expression(plan, &filter.expression()?)?;
            merged = merged.merge(&expr);
        }
        Ok(merged)
    }

    fn resolve_expression(&self, plan: &mut AliasPlan<'_>, expr: &Expression) -> Result<Expression> {
        match expr {
            Expression::Predicate(predicate) => {
                let (series, path) = self.resolve_column(plan, &predicate.series, &predicate.path)?;
                if predicate.operation.takes_list()
                    && matches!(&predicate.value, Operand::Value(v) if v.as_list().is_none())
                {
                    return Err(TangleError::config(format!(
                        "operator '{}' on '{series}.{path}' needs a list",
                        predicate.operation.as_str()
                    )));
                }
                Ok(Expression::Predicate(Predicate {
                    series,
                    path,
                    operation: predicate.operation,
                    value: predicate.value.clone(),
                }))
            }
            Expression::Group(group) => {
                let mut children = Vec::with_capacity(group.expressables.len());
                for child in &group.expressables {
                    children.push(self.resolve_expression(plan, child)?);
                }
                Ok(Expression::group(group.join, children))
            }
        }
    }

    fn resolve_sort(&self, plan: &mut AliasPlan<'_>) -> Result<Vec<SortKey>> {
        let mut keys = Vec::new();
        for text in &self.sort {
            for key in parse_sort(text)? {
                let (series, path) = self.resolve_column(plan, &key.series, &key.path)?;
                keys.push(SortKey {
                    series,
                    path,
                    descending: key.descending,
                });
            }
        }
        Ok(keys)
    }

    /// Maps `$series.path` onto a joined alias and its storage path.
    fn resolve_column(
        &self,
        plan: &mut AliasPlan<'_>,
        series: &str,
        path: &Path,
    ) -> Result<(CompactString, Path)> {
        let idx = plan.series(series)?;
        let node = plan.node(idx);
        let storage = plan.queryable_path(&node.model, path, self.validate)?;
        Ok((node.alias.clone(), storage))
    }
}

// =============================================================================
// Ordering
// =============================================================================

/// Orders the alias tree by the anchor walk and re-points every join at the
/// alias it is reached from.
fn order(plan: &AliasPlan<'_>) -> Result<Vec<StatementModel>> {
    let nodes = &plan.nodes;
    let indices: Vec<usize> = (0..nodes.len()).collect();
    // Anything below an outer join is nullable, whatever its own join says.
    let outer: Vec<bool> = (0..nodes.len())
        .map(|idx| {
            let mut cursor = Some(idx);
            while let Some(at) = cursor {
                if nodes[at].optional {
                    return true;
                }
                cursor = nodes[at].parent;
            }
            false
        })
        .collect();
    let has_required = outer.iter().any(|o| !o);

    let neighbors = |&idx: &usize| -> Vec<usize> {
        let mut out: Vec<usize> = nodes[idx].parent.into_iter().collect();
        out.extend(
            nodes
                .iter()
                .enumerate()
                .filter(|(_, n)| n.parent == Some(idx))
                .map(|(child, _)| child),
        );
        out
    };
    let walk = anchor_walk(&indices, |&idx| !has_required || !outer[idx], neighbors);

    let mut models = Vec::with_capacity(walk.len());
    for (idx, reached_from) in walk {
        let node = &nodes[idx];
        let joins = match reached_from {
            None => None,
            Some(from) => Some(join_between(plan, idx, from)?),
        };
        models.push(StatementModel {
            series: node.alias.clone(),
            schema: node.model.clone(),
            fields: node.fields.clone(),
            joins,
        });
    }
    Ok(models)
}

/// Join of node `idx` onto node `from`; the two are adjacent in the tree.
fn join_between(plan: &AliasPlan<'_>, idx: usize, from: usize) -> Result<Joins> {
    let nodes = &plan.nodes;
    // The tree edge lives on the child; flip it when walking child to parent.
    let (child, parent, flipped) = if nodes[idx].parent == Some(from) {
        (idx, from, false)
    } else {
        (from, idx, true)
    };
    let Some(via) = &nodes[child].via else {
        return Err(TangleError::config(format!(
            "alias '{}' has no join",
            nodes[child].alias
        )));
    };

    let registry = plan.registry();
    let parent_path = registry
        .require_field(&nodes[parent].model, &via.local)?
        .storage_path()
        .clone();
    let child_path = registry
        .require_field(&nodes[child].model, &via.remote)?
        .storage_path()
        .clone();

    let on = if flipped {
        JoinOn {
            name: nodes[child].alias.clone(),
            local: parent_path,
            remote: child_path,
        }
    } else {
        JoinOn {
            name: nodes[parent].alias.clone(),
            local: child_path,
            remote: parent_path,
        }
    };
    Ok(Joins {
        optional: nodes[child].optional,
        on: smallvec![on],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Operator;
    use crate::model::{Field, Model};
    use serde_json::json;

    fn shop() -> ModelRegistry {
        ModelRegistry::builder()
            .model(
                Model::new("category")
                    .primary_key("id")
                    .field(Field::new("id"))
                    .field(Field::new("name")),
            )
            .model(
                Model::new("item")
                    .primary_key("id")
                    .field(Field::new("id"))
                    .field(Field::new("name"))
                    .field(Field::new("secret").unqueryable())
                    .field(
                        Field::new("categoryId")
                            .storage("category_id")
                            .relation("category", "id"),
                    ),
            )
            .model(
                Model::new("tag")
                    .field(Field::new("id"))
                    .field(Field::new("label"))
                    .field(Field::new("itemId").storage("item_id").relation("item", "id")),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn anchors_middle_model() {
        // tag -> item -> category; fields only on tag and category.
        let registry = shop();
        let statement = StatementBuilder::new(&registry, "tag")
            .field("$tag.label")
            .field("$tag>$item>$category.name@categoryName")
            .build()
            .unwrap();

        assert_eq!(statement.base, "item");
        let order: Vec<&str> = statement.models.iter().map(|m| m.series.as_str()).collect();
        assert_eq!(order, ["item", "tag", "category"]);
        assert!(statement.model("item").unwrap().fields.is_empty());

        let tag = statement.model("tag").unwrap().joins.as_ref().unwrap();
        assert_eq!(tag.on[0].name, "item");
        assert_eq!(tag.on[0].local, Path::parse("item_id"));
        assert_eq!(tag.on[0].remote, Path::parse("id"));

        let category = statement.model("category").unwrap().joins.as_ref().unwrap();
        assert_eq!(category.on[0].name, "item");
        assert_eq!(category.on[0].local, Path::parse("id"));
        assert_eq!(category.on[0].remote, Path::parse("category_id"));
    }

    #[test]
    fn shared_path_collapses_into_one_join() {
        let registry = shop();
        let statement = StatementBuilder::new(&registry, "item")
            .field("$item>$category.name")
            .field("$item>$category.id@categoryId")
            .build()
            .unwrap();
        assert_eq!(statement.models.len(), 2);
        let names: Vec<&str> = statement.output_names().collect();
        assert_eq!(names, ["name", "categoryId"]);
    }

    #[test]
    fn duplicate_outputs_rejected() {
        let registry = shop();
        let result = StatementBuilder::new(&registry, "item")
            .field("$item.name")
            .field("$item>$category.name")
            .build();
        assert!(matches!(result, Err(TangleError::Configuration(_))));
    }

    #[test]
    fn include_selects_every_field() {
        let registry = shop();
        let statement = StatementBuilder::new(&registry, "item")
            .join("$item>?#category")
            .build()
            .unwrap();
        let category = statement.model("category").unwrap();
        let outputs: Vec<&str> = category.fields.iter().map(|f| f.output.as_str()).collect();
        assert_eq!(outputs, ["category.id", "category.name"]);
        assert!(category.joins.as_ref().unwrap().optional);
    }

    #[test]
    fn filters_resolve_storage_and_connect_models() {
        let registry = shop();
        let statement = StatementBuilder::new(&registry, "tag")
            .field("$tag.label")
            .filter("$category.name = 'books' & $item.categoryId in [1, 2]")
            .params("$tag.id = :id")
            .sort("-$item.name")
            .limit(10)
            .offset(20)
            .build()
            .unwrap();

        assert_eq!(statement.models.len(), 3);
        let predicates = statement.filters.predicates();
        assert_eq!(predicates[0].series, "category");
        assert_eq!(predicates[1].path, Path::parse("category_id"));
        assert_eq!(predicates[1].operation, Operator::In);
        assert_eq!(statement.params.predicates().len(), 1);
        assert!(statement.sort[0].descending);
        assert_eq!(
            statement.pagination,
            Some(Pagination {
                limit: Some(10),
                offset: Some(20)
            })
        );
    }

    #[test]
    fn validation_rejects_unknown_and_unqueryable() {
        let registry = shop();
        let unknown = StatementBuilder::new(&registry, "item").filter("$item.nope = 1").build();
        assert!(matches!(unknown, Err(TangleError::Configuration(_))));

        let secret = StatementBuilder::new(&registry, "item").sort("$item.secret").build();
        assert!(matches!(secret, Err(TangleError::Configuration(_))));

        let unjoined = StatementBuilder::new(&registry, "item").filter("$ghost.id = 1").build();
        assert!(matches!(unjoined, Err(TangleError::Configuration(_))));

        let relaxed = StatementBuilder::new(&registry, "item")
            .filter("$item.nope = 1")
            .validate(false)
            .build()
            .unwrap();
        assert_eq!(relaxed.filters.predicates()[0].path, Path::parse("nope"));

        let list = StatementBuilder::new(&registry, "item").filter("$item.id in 3").build();
        assert!(list.is_err());
    }

    #[test]
    fn computed_fields() {
        let registry = shop();
        let statement = StatementBuilder::new(&registry, "item")
            .field("=concat($item.name, $item>$category.name)@title")
            .build()
            .unwrap();
        let item = statement.model("item").unwrap();
        let method = item.fields[0].method.as_ref().unwrap();
        assert_eq!(item.fields[0].output, "title");
        assert_eq!(method.args[1].series, "category");
        assert_eq!(statement.models.len(), 2);
    }

    #[test]
    fn optional_aliases_never_anchor() {
        let registry = shop();
        // category would win on degree, but it is only reachable optionally.
        let statement = StatementBuilder::new(&registry, "item")
            .join("$item>?$category")
            .join("$item>?$category>.id$other:item")
            .build()
            .unwrap();
        assert_eq!(statement.base, "item");

        // `other` is joined plainly but sits below the outer join on category,
        // and has the most connections.
        let statement = StatementBuilder::new(&registry, "item")
            .field("$item.name")
            .join("$item>?$category>.id$other:item>.id$tag")
            .join("$item>?$category>.id$other:item>.id$t2:tag")
            .build()
            .unwrap();
        assert_eq!(statement.base, "item");
        assert!(statement.model("item").unwrap().joins.is_none());
        let category = statement.model("category").unwrap().joins.as_ref().unwrap();
        assert!(category.optional);
        assert_eq!(category.on[0].name, "item");
    }

    #[test]
    fn wire_shape() {
        let registry = shop();
        let statement = StatementBuilder::new(&registry, "item")
            .field("$item.name")
            .field("$item>$category.name@category")
            .build()
            .unwrap();
        let json = statement.to_json().unwrap();
        assert_eq!(
            json,
            json!({
                "method": "read",
                "base": "item",
                "models": [
                    {"series": "item", "schema": "item", "fields": [{"path": "name", "as": "name"}]},
                    {
                        "series": "category",
                        "schema": "category",
                        "fields": [{"path": "name", "as": "category"}],
                        "joins": {"optional": false, "on": [{"name": "item", "local": "id", "remote": "category_id"}]}
                    }
                ],
                "filters": {"join": "and", "expressables": []},
                "params": {"join": "and", "expressables": []}
            })
        );
        assert_eq!(Statement::from_json(json).unwrap(), statement);
    }
}
