//! Structural flattening of one resource document into numeric samples.
//!
//! Mappings extend the path with their key. Sequences never put an index into
//! the path: the last path segment stays in the name and also becomes a label
//! key, with the position as its value, so the metric name does not depend on
//! the sequence length. Only numeric leaves are emitted; strings, booleans and
//! nulls are skipped.

use crate::{Document, LabelSet, Sample};

/// Label key used when a sequence sits at the root of an empty path.
pub const ROOT_INDEX_LABEL: &str = "index";

struct Frame<'a> {
    node: &'a Document,
    path: Vec<String>,
    labels: LabelSet,
}

/// Lazy depth-first pre-order walk over a single document.
pub struct Flatten<'a> {
    stack: Vec<Frame<'a>>,
}

/// Flatten `doc` starting from `labels` and a path prefix such as `["k8s", "deployment"]`.
pub fn flatten<'a, S: AsRef<str>>(doc: &'a Document, labels: LabelSet, prefix: &[S]) -> Flatten<'a> {
    let path = prefix.iter().map(|s| s.as_ref().to_string()).collect();
    Flatten { stack: vec![Frame { node: doc, path, labels }] }
}

impl<'a> Iterator for Flatten<'a> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        while let Some(Frame { node, path, labels }) = self.stack.pop() {
            match node {
                Document::Object(map) => {
                    // reversed so the first key is popped first
                    for (key, child) in map.iter().rev() {
                        let mut child_path = path.clone();
                        child_path.push(key.clone());
                        self.stack.push(Frame { node: child, path: child_path, labels: labels.clone() });
                    }
                }
                Document::Array(items) => {
                    let index_key = path.last().map(String::as_str).unwrap_or(ROOT_INDEX_LABEL).to_string();
                    for (i, child) in items.iter().enumerate().rev() {
                        self.stack.push(Frame {
                            node: child,
                            path: path.clone(),
                            labels: labels.with(index_key.as_str(), i.to_string()),
                        });
                    }
                }
                Document::Number(n) => {
                    if let Some(value) = n.as_f64() {
                        return Some(Sample { name: path.join("_"), labels, value });
                    }
                }
                Document::String(_) | Document::Bool(_) | Document::Null => {}
            }
        }
        None
    }
}
