//! Model and service lookups shared by the flatten and write phases.

use std::sync::Arc;

use compact_str::CompactString;
use tangle_core::{Model, ModelRegistry, Result, TangleError};
use tangle_types::{Map, Path, Value};

use crate::datum::Datum;
use crate::service::{Record, Service, Services};

#[derive(Clone, Copy)]
pub(crate) struct Catalog<'a> {
    pub registry: &'a ModelRegistry,
    pub services: &'a Services,
}

impl<'a> Catalog<'a> {
    pub fn new(registry: &'a ModelRegistry, services: &'a Services) -> Self {
        Self { registry, services }
    }

    pub fn model(&self, name: &str) -> Result<&'a Model> {
        self.registry.require_model(name)
    }

    pub fn service(&self, name: &str) -> Result<&'a Arc<dyn Service>> {
        self.services.require(name)
    }

    /// Primary key field; the service's declaration wins over the model's.
    pub fn primary_key(&self, model: &'a Model) -> Option<&'a str> {
        self.services
            .get(model.name())
            .and_then(|service| service.primary_key())
            .or_else(|| model.primary_key_field())
    }

    pub fn unique_indexes(&self, model: &'a Model) -> &'a [Vec<CompactString>] {
        match self.services.get(model.name()).map(|s| s.unique_indexes()) {
            Some(indexes) if !indexes.is_empty() => indexes,
            _ => model.unique_indexes(),
        }
    }

    pub fn storage(&self, model: &'a Model, field: &str) -> Result<&'a Path> {
        model
            .get_field(field)
            .map(|f| f.storage_path())
            .ok_or_else(|| {
                TangleError::Configuration(format!("unknown field '{}.{field}'", model.name()))
            })
    }

    /// Value of `field` in a stored record.
    pub fn read<'r>(&self, model: &'a Model, record: &'r Record, field: &str) -> Result<Option<&'r Value>> {
        Ok(lookup(record, self.storage(model, field)?))
    }

    /// Value a foreign key copies out of the stored record it points at.
    pub fn remote_value(&self, model: &'a Model, record: &Record, field: &str) -> Result<Value> {
        self.read(model, record, field)?.cloned().ok_or_else(|| {
            TangleError::Service(format!(
                "stored '{}' record has no '{field}' for a foreign key",
                model.name()
            ))
        })
    }

    /// Key passed to `update`/`delete`: the primary key value, else the
    /// values of the first unique index as a map.
    pub fn record_key(&self, model: &'a Model, record: &Record) -> Result<Value> {
        if let Some(pk) = self.primary_key(model) {
            return self
                .read(model, record, pk)?
                .cloned()
                .ok_or_else(|| TangleError::Service(format!("'{}' record without '{pk}'", model.name())));
        }
        if let Some(index) = self.unique_indexes(model).first() {
            let mut key = Map::new();
            for field in index {
                let value = self.read(model, record, field)?.cloned().unwrap_or_default();
                key.insert(field.to_string(), value);
            }
            return Ok(Value::Map(key));
        }
        Err(TangleError::Configuration(format!(
            "'{}' has neither a primary key nor a unique index",
            model.name()
        )))
    }

    /// Looks the datum's record up by primary key, else by the first unique
    /// index whose fields all hold values.
    pub async fn discover(&self, datum: &Datum) -> Result<Option<Record>> {
        let model = self.model(&datum.model)?;
        let Some(query) = self.discovery_query(model, datum)? else {
            return Ok(None);
        };
        let found = self.service(&datum.model)?.discover(&query).await?;
        tangle_core::tangle_trace_plan!(
            model = %datum.model,
            reference = %datum.reference,
            found = found.is_some(),
            "tangle.normalize.discover"
        );
        Ok(found)
    }

    fn discovery_query(&self, model: &'a Model, datum: &Datum) -> Result<Option<Record>> {
        let concrete = |field: &str| match datum.get(field).and_then(|s| s.as_value()) {
            Some(Value::Null) | None => None,
            Some(value) => Some(value.clone()),
        };

        if let Some(pk) = self.primary_key(model)
            && let Some(value) = concrete(pk)
        {
            let mut query = Map::new();
            assign(&mut query, self.storage(model, pk)?, value)?;
            return Ok(Some(query));
        }

        for index in self.unique_indexes(model) {
            let values: Option<Vec<Value>> = index.iter().map(|f| concrete(f)).collect();
            if let Some(values) = values {
                let mut query = Map::new();
                for (field, value) in index.iter().zip(values) {
                    assign(&mut query, self.storage(model, field)?, value)?;
                }
                return Ok(Some(query));
            }
        }
        Ok(None)
    }
}

/// Reads `path` from a record.
pub(crate) fn lookup<'r>(record: &'r Record, path: &Path) -> Option<&'r Value> {
    let (first, rest) = path.segments().split_first()?;
    let value = record.get(first)?;
    Path::from_segments(rest.iter().cloned()).get(value)
}

/// Writes `value` at `path` in a record, creating maps on the way.
pub(crate) fn assign(record: &mut Record, path: &Path, value: Value) -> Result<()> {
    let Some((first, rest)) = path.segments().split_first() else {
        return Err(tangle_types::PathError::Root.into());
    };
    if rest.is_empty() {
        record.insert(first.clone(), value);
        return Ok(());
    }
    let slot = record.entry(first.clone()).or_insert_with(Value::map);
    Path::from_segments(rest.iter().cloned()).set(slot, value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_storage_paths() {
        let mut record = Map::new();
        assign(&mut record, &Path::parse("meta.color"), Value::from("red")).unwrap();
        assign(&mut record, &Path::parse("meta.size"), Value::from(3)).unwrap();
        assign(&mut record, &Path::parse("id"), Value::from(1)).unwrap();

        assert_eq!(lookup(&record, &Path::parse("meta.color")), Some(&Value::from("red")));
        assert_eq!(lookup(&record, &Path::parse("id")), Some(&Value::from(1)));
        assert_eq!(lookup(&record, &Path::parse("meta.weight")), None);
        assert!(assign(&mut record, &Path::root(), Value::Null).is_err());
    }
}
