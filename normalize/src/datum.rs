use std::collections::BTreeMap;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tangle_core::ChangeRank;
use tangle_types::{Map, Path, Value};

use crate::reference::Reference;

/// Requested write behaviour for a datum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Action {
    /// Always create; never looks for an existing record.
    #[serde(rename = "create")]
    Create,
    /// The record must exist.
    #[serde(rename = "update")]
    Update,
    /// Update when found, create otherwise.
    #[default]
    #[serde(rename = "update-create")]
    Upsert,
    /// The record must exist; nothing is written.
    #[serde(rename = "read")]
    Read,
    /// Create only when missing.
    #[serde(rename = "read-create")]
    ReadOrCreate,
}

impl Action {
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Upsert => "update-create",
            Action::Read => "read",
            Action::ReadOrCreate => "read-create",
        }
    }

    pub const fn discovers(self) -> bool {
        !matches!(self, Action::Create)
    }

    pub const fn may_create(self) -> bool {
        matches!(self, Action::Create | Action::Upsert | Action::ReadOrCreate)
    }

    pub const fn may_update(self) -> bool {
        matches!(self, Action::Update | Action::Upsert)
    }
}

/// One field of a datum: a value, or a foreign key still waiting on the
/// record it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Value(Value),
    Pending {
        reference: Reference,
        /// Field on the referenced model whose value this slot takes.
        field: CompactString,
    },
}

impl Slot {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Slot::Value(value) => Some(value),
            Slot::Pending { .. } => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Slot::Pending { .. })
    }
}

impl From<Value> for Slot {
    fn from(value: Value) -> Self {
        Slot::Value(value)
    }
}

/// One record-to-be for one model, produced while flattening a document node.
#[derive(Debug, Clone, PartialEq)]
pub struct Datum {
    pub model: CompactString,
    pub reference: Reference,
    pub action: Action,
    /// Field name to slot, ordered by field name.
    pub content: BTreeMap<CompactString, Slot>,
    /// Document location the datum was read from.
    pub location: Path,
    /// Existing record found by discovery, in storage layout.
    pub record: Option<Map>,
    /// Set once existence is settled, by discovery or because the action
    /// never looks.
    pub discovered: bool,
    pub rank: ChangeRank,
}

impl Datum {
    pub fn new(model: impl Into<CompactString>, reference: Reference, action: Action) -> Self {
        Self {
            model: model.into(),
            reference,
            action,
            content: BTreeMap::new(),
            location: Path::root(),
            record: None,
            discovered: false,
            rank: ChangeRank::None,
        }
    }

    pub fn location(mut self, location: Path) -> Self {
        self.location = location;
        self
    }

    pub fn set(&mut self, field: impl Into<CompactString>, slot: impl Into<Slot>) {
        self.content.insert(field.into(), slot.into());
    }

    pub fn get(&self, field: &str) -> Option<&Slot> {
        self.content.get(field)
    }

    /// True once discovery found the record.
    pub fn exists(&self) -> bool {
        self.record.is_some()
    }

    /// Folds a later occurrence of the same record into this one.
    pub fn absorb(&mut self, other: Datum) {
        self.content.extend(other.content);
        if !self.discovered {
            self.record = other.record;
            self.discovered = other.discovered;
        }
        self.rank = self.rank.max(other.rank);
    }

    /// Fields holding concrete values.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.content
            .iter()
            .filter_map(|(name, slot)| slot.as_value().map(|v| (name.as_str(), v)))
    }
}
