//! Kubeflat core types: documents, label sets, samples and metric families.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub mod aggregate;
pub mod collect;
pub mod flatten;
pub mod labels;

pub use collect::{Kind, ResourceLister};

/// One resource instance's full structured definition (spec + status + metadata).
pub type Document = serde_json::Value;

pub mod prelude {
    pub use super::aggregate::GaugeAggregator;
    pub use super::collect::{collect_cycle, CollectError, Kind, ResourceLister};
    pub use super::flatten::{flatten, Flatten};
    pub use super::labels::{sanitize_label_key, LabelJoinEmitter};
    pub use super::{base_labels, Document, LabelSet, MetricFamily, Sample};
}

/// Ordered label map. Keys are unique; inserting an existing key overwrites
/// its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSet(SmallVec<[(String, String); 8]>);

impl LabelSet {
    pub fn new() -> Self { Self(SmallVec::new()) }

    /// Last write wins; the key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Copy with one more label, leaving `self` untouched.
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.insert(key, value);
        next
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ { self.0.iter().map(|(k, _)| k.as_str()) }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = LabelSet::new();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

/// One numeric leaf: `(metric name, labels, value)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub name: String,
    pub labels: LabelSet,
    pub value: f64,
}

/// All samples sharing one metric name within a single collection cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricFamily {
    pub name: String,
    pub help: String,
    pub samples: Vec<(LabelSet, f64)>,
}

impl MetricFamily {
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self { name: name.into(), help: help.into(), samples: Vec::new() }
    }
}

/// Walk `keys` into nested mappings; `None` as soon as a segment is absent.
pub fn safe_lookup<'a>(doc: &'a Document, keys: &[&str]) -> Option<&'a Document> {
    let mut cur = doc;
    for k in keys {
        cur = cur.as_object()?.get(*k)?;
    }
    Some(cur)
}

/// String at `keys`, or `default` when the path is missing or the leaf is not a string.
pub fn lookup_str<'a>(doc: &'a Document, keys: &[&str], default: &'a str) -> &'a str {
    safe_lookup(doc, keys).and_then(|v| v.as_str()).unwrap_or(default)
}

/// Identity labels every flattened sample starts from.
pub fn base_labels(doc: &Document) -> LabelSet {
    let mut labels = LabelSet::new();
    labels.insert("namespace", lookup_str(doc, &["metadata", "namespace"], "default"));
    labels.insert("name", lookup_str(doc, &["metadata", "name"], ""));
    labels
}
