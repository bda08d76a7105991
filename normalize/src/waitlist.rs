use compact_str::CompactString;
use hashbrown::HashMap;

use crate::reference::Reference;
use crate::service::Record;

type Slot = (CompactString, Reference);

/// A field write deferred until the record it points at is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Waiter {
    /// Model and reference of the datum holding the foreign key.
    pub model: CompactString,
    pub reference: Reference,
    pub field: CompactString,
    /// Field of the awaited record the foreign key takes its value from.
    pub remote: CompactString,
}

/// Records stored so far in one write pass, and the writes parked on records
/// not stored yet.
#[derive(Debug, Default)]
pub struct Waitlist {
    records: HashMap<Slot, Record>,
    waiting: HashMap<Slot, Vec<Waiter>>,
}

impl Waitlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, model: &str, reference: &Reference) -> Option<&Record> {
        self.records.get(&(CompactString::from(model), reference.clone()))
    }

    pub fn park(&mut self, model: &str, reference: &Reference, waiter: Waiter) {
        self.waiting
            .entry((model.into(), reference.clone()))
            .or_default()
            .push(waiter);
    }

    /// Stores a written record and hands back everything that waited on it.
    pub fn record(&mut self, model: &str, reference: &Reference, record: Record) -> Vec<Waiter> {
        let slot: Slot = (model.into(), reference.clone());
        let waiters = self.waiting.remove(&slot).unwrap_or_default();
        self.records.insert(slot, record);
        waiters
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    /// Awaited `(model, reference)` pairs that never got a record.
    pub fn unresolved(&self) -> impl Iterator<Item = (&str, &Reference)> {
        self.waiting.keys().map(|(model, reference)| (model.as_str(), reference))
    }
}
