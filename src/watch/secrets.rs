//! Secret watch loop.
//!
//! Targets come from the dynamic watch list maintained by the scrape-config
//! synchronizer, not from a label selector: a missing list means nothing is
//! configured for monitoring yet, which is not an error.

use futures::future::join_all;
use k8s_openapi::api::core::v1::Secret;
use kube::Api;
use tracing::{debug, error, info};

use super::{classify, record_outcome, CheckOutcome, Watcher};
use crate::scrape::{WatchedResource, WATCHED_SECRETS_KEY};

impl Watcher {
    pub(super) async fn secret_cycle(&self) {
        let Some(watched) = self.cache.get_config(WATCHED_SECRETS_KEY) else {
            debug!("no secret watch list configured, nothing to check");
            return;
        };
        join_all(watched.into_iter().map(|entry| self.check_secret(entry))).await;
    }

    async fn check_secret(&self, entry: WatchedResource) {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &entry.namespace);
        let key = format!("secrets.{}/{}", entry.namespace, entry.name);
        let outcome = classify(&api.get(&entry.name).await);
        match outcome {
            CheckOutcome::Healthy => {
                debug!(secret = %entry.name, namespace = %entry.namespace, "secret found");
            }
            CheckOutcome::Missing => {
                info!(secret = %entry.name, namespace = %entry.namespace, "secret not found");
            }
            CheckOutcome::Errored => {
                error!(secret = %entry.name, namespace = %entry.namespace, "error retrieving secret");
            }
        }
        record_outcome(&self.cache, key, outcome);
    }
}
