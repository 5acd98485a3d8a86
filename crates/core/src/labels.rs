//! Pod label join metric and label key sanitization.

use crate::{lookup_str, safe_lookup, Document, LabelSet, MetricFamily};

pub const POD_LABELS_METRIC: &str = "k8s_pod_labels";
const POD_LABELS_HELP: &str = "Pod labels, constant 1, for joining against other k8s_pod_* series";

/// Replace `-`, `/` and `.` with `_`. Values are never sanitized.
pub fn sanitize_label_key(key: &str) -> String {
    key.chars().map(|c| if matches!(c, '-' | '/' | '.') { '_' } else { c }).collect()
}

/// Label set for one pod: its `metadata.labels`, then `namespace` and
/// `pod_name`, every key sanitized. Colliding keys keep the last value.
pub fn pod_join_labels(pod: &Document) -> LabelSet {
    let mut labels = LabelSet::new();
    if let Some(map) = safe_lookup(pod, &["metadata", "labels"]).and_then(|v| v.as_object()) {
        for (k, v) in map {
            if let Some(v) = v.as_str() {
                labels.insert(sanitize_label_key(k), v);
            }
        }
    }
    labels.insert("namespace", lookup_str(pod, &["metadata", "namespace"], "default"));
    labels.insert("pod_name", lookup_str(pod, &["metadata", "name"], ""));
    labels
}

/// Builds the single `k8s_pod_labels` family, one sample per observed pod.
pub struct LabelJoinEmitter {
    family: MetricFamily,
}

impl Default for LabelJoinEmitter {
    fn default() -> Self { Self::new() }
}

impl LabelJoinEmitter {
    pub fn new() -> Self { Self { family: MetricFamily::new(POD_LABELS_METRIC, POD_LABELS_HELP) } }

    pub fn observe(&mut self, pod: &Document) {
        self.family.samples.push((pod_join_labels(pod), 1.0));
    }

    /// `None` when no pod was observed.
    pub fn finish(self) -> Option<MetricFamily> {
        if self.family.samples.is_empty() { None } else { Some(self.family) }
    }
}
