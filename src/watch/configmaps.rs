//! ConfigMap watch loop. Same shape as the secret loop, driven by the
//! configmap watch list.

use futures::future::join_all;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::Api;
use tracing::{debug, error, info};

use super::{classify, record_outcome, CheckOutcome, Watcher};
use crate::scrape::{WatchedResource, WATCHED_CONFIGMAPS_KEY};

impl Watcher {
    pub(super) async fn configmap_cycle(&self) {
        let Some(watched) = self.cache.get_config(WATCHED_CONFIGMAPS_KEY) else {
            debug!("no configmap watch list configured, nothing to check");
            return;
        };
        join_all(watched.into_iter().map(|entry| self.check_configmap(entry))).await;
    }

    async fn check_configmap(&self, entry: WatchedResource) {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &entry.namespace);
        let key = format!("configmaps.{}/{}", entry.namespace, entry.name);
        let outcome = classify(&api.get(&entry.name).await);
        match outcome {
            CheckOutcome::Healthy => {
                debug!(configmap = %entry.name, namespace = %entry.namespace, "configmap found");
            }
            CheckOutcome::Missing => {
                info!(configmap = %entry.name, namespace = %entry.namespace, "configmap not found");
            }
            CheckOutcome::Errored => {
                error!(configmap = %entry.name, namespace = %entry.namespace, "error retrieving configmap");
            }
        }
        record_outcome(&self.cache, key, outcome);
    }
}
