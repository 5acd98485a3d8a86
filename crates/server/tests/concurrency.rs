#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kubeflat_core::prelude::*;
use kubeflat_server::Exporter;
use serde_json::json;

/// Records how many `list` calls are running at the same time.
#[derive(Default)]
struct SlowCluster {
    inflight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl ResourceLister for SlowCluster {
    async fn list(&self, _kind: Kind) -> anyhow::Result<Vec<Document>> {
        let now = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.inflight.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![json!({ "metadata": { "name": "web" }, "status": { "replicas": 1 } })])
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_collects_never_interleave() {
    let cluster = Arc::new(SlowCluster::default());
    let exporter = Arc::new(Exporter::new(cluster.clone(), vec![Kind::Deployment, Kind::Job]));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let exporter = Arc::clone(&exporter);
            tokio::spawn(async move { exporter.collect().await })
        })
        .collect();
    let mut results = Vec::new();
    for h in handles {
        results.push(h.await.unwrap().unwrap());
    }

    assert_eq!(cluster.peak.load(Ordering::SeqCst), 1);
    assert_eq!(cluster.calls.load(Ordering::SeqCst), 8);
    // each cycle starts from an empty aggregator
    for fams in &results {
        assert_eq!(fams, &results[0]);
        let replicas = fams.iter().find(|f| f.name == "k8s_deployment_status_replicas").unwrap();
        assert_eq!(replicas.samples.len(), 1);
    }
}
