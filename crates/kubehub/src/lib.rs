//! Kubeflat kubehub: cluster-wide listing of watched kinds as raw documents.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use k8s_openapi::api::{
    apps::v1::{DaemonSet, Deployment},
    batch::v1::Job,
    core::v1::{Pod, ReplicationController},
};
use kube::{
    api::{Api, ApiResource, DynamicObject, ListParams},
    Client,
};
use kubeflat_core::{Document, Kind, ResourceLister};
use tracing::{debug, info};

fn api_resource(kind: Kind) -> ApiResource {
    match kind {
        Kind::Deployment => ApiResource::erase::<Deployment>(&()),
        Kind::Pod => ApiResource::erase::<Pod>(&()),
        Kind::Job => ApiResource::erase::<Job>(&()),
        Kind::ReplicationController => ApiResource::erase::<ReplicationController>(&()),
        Kind::DaemonSet => ApiResource::erase::<DaemonSet>(&()),
    }
}

/// Remove `metadata.managedFields` in place.
pub fn strip_managed_fields(v: &mut serde_json::Value) {
    if let Some(meta) = v.get_mut("metadata") {
        if let Some(obj) = meta.as_object_mut() {
            obj.remove("managedFields");
        }
    }
}

/// `ResourceLister` backed by the Kubernetes API server.
pub struct KubeLister {
    client: Client,
    strip_managed: bool,
}

impl KubeLister {
    pub fn new(client: Client, strip_managed: bool) -> Self { Self { client, strip_managed } }

    /// In-cluster service account or local kubeconfig.
    pub async fn try_default(strip_managed: bool) -> Result<Self> {
        let client = Client::try_default().await.context("building kube client")?;
        info!(strip_managed, "kube client ready");
        Ok(Self::new(client, strip_managed))
    }
}

#[async_trait::async_trait]
impl ResourceLister for KubeLister {
    async fn list(&self, kind: Kind) -> Result<Vec<Document>> {
        let ar = api_resource(kind);
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &ar);
        let list = api
            .list(&ListParams::default())
            .await
            .with_context(|| format!("listing {} ({}/{})", ar.plural, ar.api_version, ar.kind))?;
        debug!(kind = %kind, items = list.items.len(), "list ok");
        list.items
            .iter()
            .map(|obj| {
                let mut raw = serde_json::to_value(obj).context("serializing DynamicObject")?;
                if self.strip_managed {
                    strip_managed_fields(&mut raw);
                }
                Ok::<_, anyhow::Error>(raw)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_resources_match_kinds() {
        let ar = api_resource(Kind::ReplicationController);
        assert_eq!(ar.kind, "ReplicationController");
        assert_eq!(ar.api_version, "v1");
        let ar = api_resource(Kind::DaemonSet);
        assert_eq!(ar.group, "apps");
        assert_eq!(ar.plural, "daemonsets");
        assert_eq!(api_resource(Kind::Job).api_version, "batch/v1");
    }

    #[test]
    fn strips_only_managed_fields() {
        let mut v = json!({ "metadata": { "name": "a", "generation": 2, "managedFields": [{ "manager": "kubectl" }] } });
        strip_managed_fields(&mut v);
        assert_eq!(v, json!({ "metadata": { "name": "a", "generation": 2 } }));
        let mut bare = json!({ "spec": {} });
        strip_managed_fields(&mut bare);
        assert_eq!(bare, json!({ "spec": {} }));
    }
}
