//! Change ranking
//!
//! A created record ranks major and a record that is only read ranks none.
//! An update ranks as the highest [`ChangeRank`] among the fields whose new
//! value differs from the discovered record. A foreign key still pending on
//! another datum counts as changed.

use tangle_core::{ChangeRank, Model};

use crate::catalog::lookup;
use crate::datum::{Datum, Slot};

pub fn rank_datum(model: &Model, datum: &Datum) -> ChangeRank {
    let Some(record) = &datum.record else {
        return if datum.action.may_create() {
            ChangeRank::Major
        } else {
            ChangeRank::None
        };
    };
    if !datum.action.may_update() {
        return ChangeRank::None;
    }

    datum
        .content
        .iter()
        .filter_map(|(name, slot)| {
            let field = model.get_field(name)?;
            let stored = lookup(record, field.storage_path());
            let changed = match (slot, stored) {
                // The key is only known once the target is written.
                (Slot::Pending { .. }, _) => true,
                (Slot::Value(value), Some(stored)) => stored != value,
                (Slot::Value(value), None) => !value.is_null(),
            };
            changed.then(|| field.change_rank())
        })
        .max()
        .unwrap_or(ChangeRank::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::Action;
    use crate::reference::Reference;
    use tangle_core::Field;
    use tangle_types::{Map, Value};

    fn model() -> Model {
        Model::new("post")
            .field(Field::new("title").rank(ChangeRank::Major))
            .field(Field::new("views").storage("stats.views").rank(ChangeRank::None))
            .field(Field::new("note"))
    }

    fn existing() -> Map {
        let mut stats = Map::new();
        stats.insert("views".into(), Value::from(10));
        let mut record = Map::new();
        record.insert("title".into(), Value::from("a"));
        record.insert("stats".into(), Value::Map(stats));
        record
    }

    fn datum(action: Action, record: Option<Map>) -> Datum {
        let mut datum = Datum::new("post", Reference::key(1), action);
        datum.record = record;
        datum
    }

    #[test]
    fn creates_and_reads() {
        let model = model();
        assert_eq!(rank_datum(&model, &datum(Action::Upsert, None)), ChangeRank::Major);
        assert_eq!(rank_datum(&model, &datum(Action::Read, Some(existing()))), ChangeRank::None);

        let mut read_create = datum(Action::ReadOrCreate, Some(existing()));
        read_create.set("title", Value::from("b"));
        assert_eq!(rank_datum(&model, &read_create), ChangeRank::None);
    }

    #[test]
    fn update_takes_highest_changed_field() {
        let model = model();
        let mut update = datum(Action::Update, Some(existing()));
        update.set("title", Value::from("a"));
        update.set("views", Value::from(11));
        assert_eq!(rank_datum(&model, &update), ChangeRank::None);

        update.set("note", Value::from("new"));
        assert_eq!(rank_datum(&model, &update), ChangeRank::Minor);

        update.set("title", Value::from("b"));
        assert_eq!(rank_datum(&model, &update), ChangeRank::Major);

        let mut unchanged = datum(Action::Upsert, Some(existing()));
        unchanged.set("note", Value::Null);
        assert_eq!(rank_datum(&model, &unchanged), ChangeRank::None);
    }

    #[test]
    fn pending_foreign_key_is_a_change() {
        let model = model();
        let mut update = datum(Action::Upsert, Some(existing()));
        update.set(
            "note",
            Slot::Pending {
                reference: Reference::placeholder("note", &tangle_types::Path::root()),
                field: "id".into(),
            },
        );
        assert_eq!(rank_datum(&model, &update), ChangeRank::Minor);
    }
}
