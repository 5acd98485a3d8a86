//! Per-cycle gauge aggregation keyed by metric name.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::{LabelSet, MetricFamily, Sample};

pub const FLATTENED_HELP: &str = "Numeric field flattened from a Kubernetes resource document";

struct Slot {
    family: MetricFamily,
    keys: Vec<String>,
}

/// Collects samples into one family per metric name.
///
/// The first sample for a name declares the family's label keys. A later
/// sample with a different key set is skipped and counted as an anomaly;
/// the same keys in another order are reordered to the declared order.
#[derive(Default)]
pub struct GaugeAggregator {
    index: FxHashMap<String, usize>,
    slots: Vec<Slot>,
    anomalies: u64,
}

impl GaugeAggregator {
    pub fn new_cycle() -> Self { Self::default() }

    pub fn record(&mut self, sample: Sample) {
        let Sample { name, labels, value } = sample;
        match self.index.get(&name) {
            Some(&i) => {
                let slot = &mut self.slots[i];
                match conform(&slot.keys, labels) {
                    Some(labels) => slot.family.samples.push((labels, value)),
                    None => {
                        self.anomalies += 1;
                        metrics::counter!("kubeflat_label_mismatch_total", 1u64);
                        debug!(metric = %name, declared = ?slot.keys, "label keys differ from family; sample skipped");
                    }
                }
            }
            None => {
                let keys = labels.keys().map(str::to_string).collect();
                let mut family = MetricFamily::new(name.clone(), FLATTENED_HELP);
                family.samples.push((labels, value));
                self.index.insert(name, self.slots.len());
                self.slots.push(Slot { family, keys });
            }
        }
    }

    /// Samples rejected for label key mismatch during this cycle.
    pub fn anomalies(&self) -> u64 { self.anomalies }

    pub fn len(&self) -> usize { self.slots.len() }
    pub fn is_empty(&self) -> bool { self.slots.is_empty() }

    /// Families in first-creation order.
    pub fn finish(self) -> impl Iterator<Item = MetricFamily> {
        self.slots.into_iter().map(|s| s.family)
    }
}

fn conform(keys: &[String], labels: LabelSet) -> Option<LabelSet> {
    if labels.len() != keys.len() {
        return None;
    }
    if labels.keys().zip(keys).all(|(a, b)| a == b.as_str()) {
        return Some(labels);
    }
    let ordered: Option<Vec<(&str, &str)>> = keys.iter().map(|k| labels.get(k).map(|v| (k.as_str(), v))).collect();
    ordered.map(|pairs| pairs.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str, labels: &[(&str, &str)], value: f64) -> Sample {
        Sample { name: name.to_string(), labels: labels.iter().copied().collect(), value }
    }

    #[test]
    fn merges_by_name_in_creation_order() {
        let mut agg = GaugeAggregator::new_cycle();
        agg.record(sample("b", &[("name", "x")], 1.0));
        agg.record(sample("a", &[("name", "x")], 2.0));
        agg.record(sample("b", &[("name", "y")], 3.0));
        let fams: Vec<_> = agg.finish().collect();
        assert_eq!(fams.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(fams[0].samples.len(), 2);
        assert_eq!(fams[0].samples[1].0.get("name"), Some("y"));
        assert_eq!(fams[0].help, FLATTENED_HELP);
    }

    #[test]
    fn mismatched_keys_are_skipped_and_counted() {
        let mut agg = GaugeAggregator::new_cycle();
        agg.record(sample("m", &[("namespace", "d"), ("name", "x")], 1.0));
        agg.record(sample("m", &[("namespace", "d"), ("name", "y"), ("containers", "0")], 2.0));
        agg.record(sample("m", &[("namespace", "d")], 3.0));
        assert_eq!(agg.anomalies(), 2);
        let fams: Vec<_> = agg.finish().collect();
        assert_eq!(fams.len(), 1);
        assert_eq!(fams[0].samples.len(), 1);
    }

    #[test]
    fn same_keys_other_order_are_reordered() {
        let mut agg = GaugeAggregator::new_cycle();
        agg.record(sample("m", &[("namespace", "d"), ("name", "x")], 1.0));
        agg.record(sample("m", &[("name", "y"), ("namespace", "e")], 2.0));
        assert_eq!(agg.anomalies(), 0);
        let fams: Vec<_> = agg.finish().collect();
        let keys: Vec<_> = fams[0].samples[1].0.keys().collect();
        assert_eq!(keys, vec!["namespace", "name"]);
        assert_eq!(fams[0].samples[1].0.get("namespace"), Some("e"));
    }
}
