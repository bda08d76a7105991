//! Datum collections: per-model series, layered sessions and the flattened batch.

use compact_str::CompactString;
use hashbrown::HashMap;
use tangle_core::ChangeRank;

use crate::datum::Datum;
use crate::reference::Reference;

/// Ordered datums of one model, keyed by reference.
#[derive(Debug, Clone, Default)]
pub struct Series {
    model: CompactString,
    datums: Vec<Datum>,
    index: HashMap<Reference, usize>,
}

impl Series {
    pub fn new(model: impl Into<CompactString>) -> Self {
        Self {
            model: model.into(),
            datums: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn len(&self) -> usize {
        self.datums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datums.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Datum> {
        self.datums.iter()
    }

    pub fn get(&self, reference: &Reference) -> Option<&Datum> {
        self.index.get(reference).map(|&idx| &self.datums[idx])
    }

    pub fn get_mut(&mut self, reference: &Reference) -> Option<&mut Datum> {
        self.index.get(reference).map(|&idx| &mut self.datums[idx])
    }

    /// Adds a datum, folding it into an existing one with the same reference.
    pub fn insert(&mut self, datum: Datum) -> usize {
        if let Some(&idx) = self.index.get(&datum.reference) {
            self.datums[idx].absorb(datum);
            return idx;
        }
        let idx = self.datums.len();
        self.index.insert(datum.reference.clone(), idx);
        self.datums.push(datum);
        idx
    }

    pub fn into_datums(self) -> Vec<Datum> {
        self.datums
    }
}

/// Series by model, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct Layer {
    series: Vec<Series>,
    index: HashMap<CompactString, usize>,
}

impl Layer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, model: &str, reference: &Reference) -> Option<&Datum> {
        self.series(model)?.get(reference)
    }

    pub fn get_mut(&mut self, model: &str, reference: &Reference) -> Option<&mut Datum> {
        let idx = *self.index.get(model)?;
        self.series[idx].get_mut(reference)
    }

    pub fn series(&self, model: &str) -> Option<&Series> {
        self.index.get(model).map(|&idx| &self.series[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Series> {
        self.series.iter()
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(Series::model)
    }

    pub fn insert(&mut self, datum: Datum) {
        let idx = match self.index.get(datum.model.as_str()) {
            Some(&idx) => idx,
            None => {
                let idx = self.series.len();
                self.index.insert(datum.model.clone(), idx);
                self.series.push(Series::new(datum.model.clone()));
                idx
            }
        };
        self.series[idx].insert(datum);
    }

    /// Appends every datum of `other`, series by series.
    pub fn merge(&mut self, other: Layer) {
        for series in other.series {
            for datum in series.datums {
                self.insert(datum);
            }
        }
    }

    pub fn into_series(self) -> Vec<Series> {
        self.series
    }

    pub fn len(&self) -> usize {
        self.series.iter().map(Series::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parent-chained view over layers.
///
/// Sibling nodes flatten into their own child sessions; each sees its own
/// datums plus everything its ancestors hold.
#[derive(Debug)]
pub struct Session<'p> {
    parent: Option<&'p Session<'p>>,
    layer: Layer,
}

impl Session<'static> {
    pub fn root() -> Self {
        Session {
            parent: None,
            layer: Layer::new(),
        }
    }
}

impl<'p> Session<'p> {
    pub fn child<'a>(&'a self) -> Session<'a> {
        Session {
            parent: Some(self),
            layer: Layer::new(),
        }
    }

    /// Looks a datum up in this layer, then in each ancestor.
    pub fn find(&self, model: &str, reference: &Reference) -> Option<&Datum> {
        let mut session = Some(self);
        while let Some(current) = session {
            if let Some(datum) = current.layer.get(model, reference) {
                return Some(datum);
            }
            session = current.parent;
        }
        None
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    pub fn layer_mut(&mut self) -> &mut Layer {
        &mut self.layer
    }

    pub fn into_layer(self) -> Layer {
        self.layer
    }
}

/// Result of flattening a document: every datum by model, plus the rank of
/// the whole tree.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub(crate) layer: Layer,
    pub rank: ChangeRank,
}

impl Batch {
    pub fn new(layer: Layer, rank: ChangeRank) -> Self {
        Self { layer, rank }
    }

    pub fn series(&self) -> impl Iterator<Item = &Series> {
        self.layer.iter()
    }

    pub fn get(&self, model: &str) -> Option<&Series> {
        self.layer.series(model)
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.layer.models()
    }

    pub fn datums(&self) -> impl Iterator<Item = &Datum> {
        self.layer.iter().flat_map(Series::iter)
    }

    pub fn len(&self) -> usize {
        self.layer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layer.is_empty()
    }

    pub fn into_series(self) -> Vec<Series> {
        self.layer.into_series()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::Action;
    use tangle_types::Value;

    fn datum(model: &str, key: i64) -> Datum {
        Datum::new(model, Reference::key(key), Action::Upsert)
    }

    #[test]
    fn series_reuses_reference() {
        let mut series = Series::new("tag");
        assert_eq!(series.insert(datum("tag", 1)), 0);
        assert_eq!(series.insert(datum("tag", 2)), 1);

        let mut again = datum("tag", 1);
        again.set("label", Value::from("x"));
        assert_eq!(series.insert(again), 0);
        assert_eq!(series.len(), 2);
        assert!(series.get(&Reference::key(1)).unwrap().get("label").is_some());
    }

    #[test]
    fn sessions_see_ancestors_only() {
        let mut root = Session::root();
        root.layer_mut().insert(datum("user", 1));

        let mut left = root.child();
        left.layer_mut().insert(datum("post", 10));
        let right = root.child();

        assert!(left.find("user", &Reference::key(1)).is_some());
        assert!(left.find("post", &Reference::key(10)).is_some());
        assert!(right.find("post", &Reference::key(10)).is_none());

        let left = left.into_layer();
        let right = right.into_layer();
        let mut merged = Layer::new();
        merged.merge(left);
        merged.merge(right);
        assert_eq!(merged.models().collect::<Vec<_>>(), ["post"]);
    }
}
