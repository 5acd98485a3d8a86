//! One collection cycle: list every watched kind, flatten, aggregate.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use tracing::debug;

use crate::aggregate::GaugeAggregator;
use crate::flatten::flatten;
use crate::labels::LabelJoinEmitter;
use crate::{base_labels, Document, MetricFamily};

/// Watched resource kinds. The tag is the metric-name segment after `k8s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Deployment,
    Pod,
    Job,
    ReplicationController,
    DaemonSet,
}

impl Kind {
    pub const ALL: [Kind; 5] = [Kind::Deployment, Kind::Pod, Kind::Job, Kind::ReplicationController, Kind::DaemonSet];

    pub fn tag(self) -> &'static str {
        match self {
            Kind::Deployment => "deployment",
            Kind::Pod => "pod",
            Kind::Job => "job",
            Kind::ReplicationController => "rc",
            Kind::DaemonSet => "ds",
        }
    }

    pub fn path_prefix(self) -> [&'static str; 2] { ["k8s", self.tag()] }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.tag()) }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown kind: {0} (expect one of deployment, pod, job, rc, ds)")]
pub struct UnknownKind(pub String);

impl FromStr for Kind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .into_iter()
            .find(|k| k.tag() == s.trim())
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// Enumerates all instances of a kind, cluster-wide.
#[async_trait::async_trait]
pub trait ResourceLister: Send + Sync {
    async fn list(&self, kind: Kind) -> anyhow::Result<Vec<Document>>;
}

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("listing {kind} failed")]
    Fetch {
        kind: Kind,
        #[source]
        source: anyhow::Error,
    },
}

/// Run one full cycle. Any fetch failure aborts the cycle with no partial result.
pub async fn collect_cycle(lister: &dyn ResourceLister, kinds: &[Kind]) -> Result<Vec<MetricFamily>, CollectError> {
    let started = Instant::now();
    let mut agg = GaugeAggregator::new_cycle();
    let mut join = kinds.contains(&Kind::Pod).then(LabelJoinEmitter::new);

    for &kind in kinds {
        let docs = match lister.list(kind).await {
            Ok(docs) => docs,
            Err(source) => {
                metrics::counter!("kubeflat_fetch_errors_total", 1u64, "kind" => kind.tag());
                return Err(CollectError::Fetch { kind, source });
            }
        };
        debug!(kind = %kind, count = docs.len(), "listed");
        for doc in &docs {
            for sample in flatten(doc, base_labels(doc), &kind.path_prefix()) {
                agg.record(sample);
            }
            if kind == Kind::Pod {
                if let Some(join) = join.as_mut() {
                    join.observe(doc);
                }
            }
        }
    }

    let anomalies = agg.anomalies();
    let mut families: Vec<MetricFamily> = agg.finish().collect();
    families.extend(join.and_then(LabelJoinEmitter::finish));

    metrics::histogram!("kubeflat_cycle_ms", started.elapsed().as_secs_f64() * 1000.0);
    metrics::gauge!("kubeflat_families", families.len() as f64);
    debug!(families = families.len(), anomalies, elapsed_ms = started.elapsed().as_millis() as u64, "cycle complete");
    Ok(families)
}
