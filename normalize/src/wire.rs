//! Normalized wire shape
//!
//! ```text
//! { "<model>": [ { "$ref": <key> | {"$placeholder": "..."},
//!                  "$type": "create" | "read" | "update" | "update-create" | "read-create",
//!                  "<field>": <value> | { "$ref": <reference>, "$field": "<remote>" } } ] }
//! ```
//!
//! Discovery results and ranks stay behind: a batch read back from the wire
//! settles existence again when it is written.

use serde_json::{Map as JsonMap, Value as Json, json};
use tangle_core::{ChangeRank, Result, TangleError};
use tangle_types::{Path, Value};

use crate::datum::{Action, Datum, Slot};
use crate::reference::Reference;
use crate::series::{Batch, Layer};

const REF: &str = "$ref";
const TYPE: &str = "$type";
const FIELD: &str = "$field";

impl Batch {
    pub fn to_wire(&self) -> Result<Json> {
        let mut out = JsonMap::new();
        for series in self.series() {
            let mut items = Vec::with_capacity(series.len());
            for datum in series.iter() {
                items.push(datum_to_wire(datum)?);
            }
            out.insert(series.model().to_owned(), Json::Array(items));
        }
        Ok(Json::Object(out))
    }

    pub fn from_wire(wire: &Json) -> Result<Self> {
        let Some(models) = wire.as_object() else {
            return Err(malformed("expected an object of models"));
        };
        let mut layer = Layer::new();
        for (model, items) in models {
            let Some(items) = items.as_array() else {
                return Err(malformed(&format!("'{model}' is not a list")));
            };
            for (idx, item) in items.iter().enumerate() {
                let location = Path::from_segments([model.clone(), idx.to_string()]);
                layer.insert(datum_from_wire(model, item, location)?);
            }
        }
        Ok(Batch::new(layer, ChangeRank::None))
    }
}

fn datum_to_wire(datum: &Datum) -> Result<Json> {
    let mut item = JsonMap::new();
    item.insert(REF.into(), serde_json::to_value(&datum.reference)?);
    item.insert(TYPE.into(), serde_json::to_value(datum.action)?);
    for (name, slot) in &datum.content {
        let value = match slot {
            Slot::Value(value) => Json::from(value.clone()),
            Slot::Pending { reference, field } => json!({
                REF: serde_json::to_value(reference)?,
                FIELD: field.as_str(),
            }),
        };
        item.insert(name.to_string(), value);
    }
    Ok(Json::Object(item))
}

fn datum_from_wire(model: &str, item: &Json, location: Path) -> Result<Datum> {
    let Some(fields) = item.as_object() else {
        return Err(malformed(&format!("'{model}' entry {} is not an object", location.pointer())));
    };
    let reference: Reference = match fields.get(REF) {
        Some(reference) => serde_json::from_value(reference.clone())?,
        None => return Err(malformed(&format!("'{model}' entry {} has no $ref", location.pointer()))),
    };
    let action: Action = match fields.get(TYPE) {
        Some(action) => serde_json::from_value(action.clone())?,
        None => Action::default(),
    };

    let mut datum = Datum::new(model, reference, action).location(location);
    for (name, value) in fields {
        if name == REF || name == TYPE {
            continue;
        }
        let slot = match value.as_object() {
            Some(pending) if pending.contains_key(REF) && pending.contains_key(FIELD) => {
                let reference = serde_json::from_value(pending[REF].clone())?;
                let Some(field) = pending[FIELD].as_str() else {
                    return Err(malformed(&format!("'{model}.{name}' has a non-text $field")));
                };
                Slot::Pending {
                    reference,
                    field: field.into(),
                }
            }
            _ => Slot::Value(Value::from(value.clone())),
        };
        datum.set(name.as_str(), slot);
    }
    Ok(datum)
}

fn malformed(message: &str) -> TangleError {
    TangleError::Configuration(format!("malformed normalized batch: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> Batch {
        let category = Reference::placeholder("category", &Path::parse("category"));
        let mut item = Datum::new("item", Reference::key(3), Action::Upsert);
        item.set("name", Value::from("lamp"));
        item.set(
            "categoryId",
            Slot::Pending {
                reference: category.clone(),
                field: "id".into(),
            },
        );
        let mut cat = Datum::new("category", category, Action::ReadOrCreate);
        cat.set("name", Value::from("home"));

        let mut layer = Layer::new();
        layer.insert(item);
        layer.insert(cat);
        Batch::new(layer, ChangeRank::Major)
    }

    #[test]
    fn emits_documented_shape() {
        let wire = batch().to_wire().unwrap();
        assert_eq!(
            wire,
            json!({
                "item": [{
                    "$ref": 3,
                    "$type": "update-create",
                    "categoryId": {"$ref": {"$placeholder": "category@/category"}, "$field": "id"},
                    "name": "lamp"
                }],
                "category": [{
                    "$ref": {"$placeholder": "category@/category"},
                    "$type": "read-create",
                    "name": "home"
                }]
            })
        );
    }

    #[test]
    fn reads_back_content_and_actions() {
        let original = batch();
        let back = Batch::from_wire(&original.to_wire().unwrap()).unwrap();
        let pairs: Vec<(&Datum, &Datum)> = original.datums().zip(back.datums()).collect();
        assert_eq!(pairs.len(), 2);
        for (a, b) in pairs {
            assert_eq!(a.reference, b.reference);
            assert_eq!(a.action, b.action);
            assert_eq!(a.content, b.content);
        }
    }

    #[test]
    fn rejects_malformed() {
        assert!(Batch::from_wire(&json!([])).is_err());
        assert!(Batch::from_wire(&json!({"item": {}})).is_err());
        assert!(Batch::from_wire(&json!({"item": [{"name": "x"}]})).is_err());
        assert!(Batch::from_wire(&json!({"item": [{"$ref": 1, "$type": "bogus"}]})).is_err());
    }
}
