//! In-process [`Service`] keeping records in a vector.
//!
//! Useful in tests and for prototyping a registry before a real store is
//! wired in. Keys are handed out from a counter when created content does not
//! carry one.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use compact_str::CompactString;
use tangle_core::{Method, Result, TangleError};
use tangle_types::Value;

use crate::service::{Record, Service};

#[derive(Debug, Default)]
struct Store {
    rows: Vec<Record>,
    next_key: i64,
    calls: Vec<(Method, Record)>,
}

#[derive(Debug)]
pub struct MemoryService {
    /// Storage key holding the record key.
    column: CompactString,
    unique: Vec<Vec<CompactString>>,
    fail_discovery: bool,
    store: Mutex<Store>,
}

impl MemoryService {
    pub fn new(column: impl Into<CompactString>) -> Self {
        Self {
            column: column.into(),
            unique: Vec::new(),
            fail_discovery: false,
            store: Mutex::new(Store {
                next_key: 1,
                ..Store::default()
            }),
        }
    }

    /// Unique index reported to the engine, overriding the model's.
    pub fn unique<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.unique.push(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Makes every discovery call fail.
    pub fn failing_discovery(mut self) -> Self {
        self.fail_discovery = true;
        self
    }

    /// Stores a record without logging a call.
    pub fn seed(self, record: Record) -> Self {
        if let Ok(mut store) = self.store.lock() {
            if let Some(Value::Int(key)) = record.get(self.column.as_str()) {
                store.next_key = store.next_key.max(key + 1);
            }
            store.rows.push(record);
        }
        self
    }

    pub fn rows(&self) -> Vec<Record> {
        self.store.lock().map(|s| s.rows.clone()).unwrap_or_default()
    }

    /// Writes received so far, in call order.
    pub fn calls(&self) -> Vec<(Method, Record)> {
        self.store.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Store>> {
        self.store
            .lock()
            .map_err(|_| TangleError::Service("memory store poisoned".into()))
    }

    fn position(&self, rows: &[Record], key: &Value) -> Option<usize> {
        rows.iter().position(|row| match key {
            Value::Map(fields) => contains(row, fields),
            key => row.get(self.column.as_str()) == Some(key),
        })
    }
}

#[async_trait]
impl Service for MemoryService {
    fn unique_indexes(&self) -> &[Vec<CompactString>] {
        &self.unique
    }

    async fn discover(&self, query: &Record) -> Result<Option<Record>> {
        if self.fail_discovery {
            return Err(TangleError::Service("discovery unavailable".into()));
        }
        let store = self.lock()?;
        Ok(store.rows.iter().find(|row| contains(row, query)).cloned())
    }

    async fn create(&self, content: &Record) -> Result<Record> {
        let mut store = self.lock()?;
        let mut record = content.clone();
        match record.get(self.column.as_str()) {
            Some(Value::Int(key)) => store.next_key = store.next_key.max(key + 1),
            Some(value) if !value.is_null() => {}
            _ => {
                record.insert(self.column.to_string(), Value::Int(store.next_key));
                store.next_key += 1;
            }
        }
        store.calls.push((Method::Create, content.clone()));
        store.rows.push(record.clone());
        Ok(record)
    }

    async fn update(&self, key: &Value, content: &Record) -> Result<Record> {
        let mut store = self.lock()?;
        let Some(idx) = self.position(&store.rows, key) else {
            return Err(TangleError::Service(format!("no record with key {key}")));
        };
        merge(&mut store.rows[idx], content);
        let record = store.rows[idx].clone();
        store.calls.push((Method::Update, content.clone()));
        Ok(record)
    }

    async fn delete(&self, key: &Value) -> Result<()> {
        let mut store = self.lock()?;
        let Some(idx) = self.position(&store.rows, key) else {
            return Err(TangleError::Service(format!("no record with key {key}")));
        };
        let removed = store.rows.remove(idx);
        store.calls.push((Method::Delete, removed));
        Ok(())
    }
}

/// Whether `row` holds every value of `query`, nested maps compared partially.
fn contains(row: &Record, query: &Record) -> bool {
    query.iter().all(|(name, wanted)| match (row.get(name), wanted) {
        (Some(Value::Map(inner)), Value::Map(wanted)) => contains(inner, wanted),
        (Some(value), wanted) => value == wanted,
        (None, wanted) => wanted.is_null(),
    })
}

fn merge(row: &mut Record, content: &Record) {
    for (name, value) in content {
        match (row.get_mut(name), value) {
            (Some(Value::Map(inner)), Value::Map(patch)) => merge(inner, patch),
            _ => {
                row.insert(name.clone(), value.clone());
            }
        }
    }
}
