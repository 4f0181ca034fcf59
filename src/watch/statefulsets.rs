//! StatefulSet watch loop.

use futures::future::join_all;
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::api::{Api, ListParams};
use kube::ResourceExt;
use tracing::{debug, error, warn};

use super::Watcher;
use crate::cache::StatusValue;

/// A statefulset is healthy when every desired replica is both ready and
/// on the current revision.
pub fn statefulset_is_healthy(statefulset: &StatefulSet) -> bool {
    let desired = statefulset
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or_default();
    let status = statefulset.status.as_ref();
    let ready = status
        .and_then(|status| status.ready_replicas)
        .unwrap_or_default();
    let current = status
        .and_then(|status| status.current_replicas)
        .unwrap_or_default();
    ready == desired && current == desired
}

impl Watcher {
    pub(super) async fn statefulset_cycle(&self) {
        let api: Api<StatefulSet> = Api::all(self.client.clone());
        let params = ListParams::default().labels(&self.settings.workload_selector);
        let statefulsets = match api.list(&params).await {
            Ok(list) => list.items,
            Err(err) => {
                warn!(error = %err, "failed to list statefulsets, retrying next cycle");
                return;
            }
        };
        join_all(
            statefulsets
                .iter()
                .map(|statefulset| self.check_statefulset(statefulset)),
        )
        .await;
    }

    async fn check_statefulset(&self, statefulset: &StatefulSet) {
        tokio::select! {
            () = self.token.cancelled() => return,
            () = tokio::time::sleep(self.settings.settle_delay) => {}
        }

        let name = statefulset.name_any();
        let key = format!("statefulset.apps/{name}");
        if statefulset_is_healthy(statefulset) {
            debug!(
                statefulset = %name,
                namespace = statefulset.namespace().as_deref().unwrap_or_default(),
                "statefulset is healthy"
            );
            self.cache.clear_status(&key);
        } else {
            let desired = statefulset
                .spec
                .as_ref()
                .and_then(|spec| spec.replicas)
                .unwrap_or_default();
            let status = statefulset.status.as_ref();
            let ready = status
                .and_then(|status| status.ready_replicas)
                .unwrap_or_default();
            let current = status
                .and_then(|status| status.current_replicas)
                .unwrap_or_default();
            error!(
                statefulset = %name,
                namespace = statefulset.namespace().as_deref().unwrap_or_default(),
                desired,
                ready,
                current,
                "statefulset is not healthy"
            );
            self.cache.set_status(key, StatusValue::Unavailable);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{StatefulSetSpec, StatefulSetStatus};

    fn statefulset(desired: i32, ready: i32, current: i32) -> StatefulSet {
        StatefulSet {
            spec: Some(StatefulSetSpec {
                replicas: Some(desired),
                ..StatefulSetSpec::default()
            }),
            status: Some(StatefulSetStatus {
                ready_replicas: Some(ready),
                current_replicas: Some(current),
                ..StatefulSetStatus::default()
            }),
            ..StatefulSet::default()
        }
    }

    #[test]
    fn fully_ready_statefulset_is_healthy() {
        assert!(statefulset_is_healthy(&statefulset(3, 3, 3)));
    }

    #[test]
    fn not_ready_replica_is_unhealthy() {
        assert!(!statefulset_is_healthy(&statefulset(3, 2, 3)));
    }

    #[test]
    fn stale_revision_replica_is_unhealthy() {
        assert!(!statefulset_is_healthy(&statefulset(3, 3, 2)));
    }

    #[test]
    fn scale_down_with_surplus_replicas_is_unhealthy() {
        // current > desired mid scale-down; still converging.
        assert!(!statefulset_is_healthy(&statefulset(2, 2, 3)));
    }
}
