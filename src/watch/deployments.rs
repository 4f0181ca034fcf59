//! Deployment watch loop.

use futures::future::join_all;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, ListParams};
use kube::ResourceExt;
use tracing::{debug, error, warn};

use super::Watcher;
use crate::cache::StatusValue;

/// A deployment is healthy when every desired replica is available and
/// none are reported unavailable.
pub fn deployment_is_healthy(deploy: &Deployment) -> bool {
    let desired = deploy
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or_default();
    let status = deploy.status.as_ref();
    let available = status
        .and_then(|status| status.available_replicas)
        .unwrap_or_default();
    let unavailable = status
        .and_then(|status| status.unavailable_replicas)
        .unwrap_or_default();
    available == desired && unavailable == 0
}

impl Watcher {
    pub(super) async fn deployment_cycle(&self) {
        let api: Api<Deployment> = Api::all(self.client.clone());
        let params = ListParams::default().labels(&self.settings.workload_selector);
        let deployments = match api.list(&params).await {
            Ok(list) => list.items,
            Err(err) => {
                warn!(error = %err, "failed to list deployments, retrying next cycle");
                return;
            }
        };
        join_all(
            deployments
                .iter()
                .map(|deploy| self.check_deployment(deploy)),
        )
        .await;
    }

    async fn check_deployment(&self, deploy: &Deployment) {
        // Let an in-flight rollout settle before reading replica counts.
        tokio::select! {
            () = self.token.cancelled() => return,
            () = tokio::time::sleep(self.settings.settle_delay) => {}
        }

        let name = deploy.name_any();
        let key = format!("deployment.apps/{name}");
        if deployment_is_healthy(deploy) {
            debug!(
                deployment = %name,
                namespace = deploy.namespace().as_deref().unwrap_or_default(),
                "deployment is healthy"
            );
            self.cache.clear_status(&key);
        } else {
            let unavailable = deploy
                .status
                .as_ref()
                .and_then(|status| status.unavailable_replicas)
                .unwrap_or_default();
            error!(
                deployment = %name,
                namespace = deploy.namespace().as_deref().unwrap_or_default(),
                unavailable,
                "deployment is not healthy"
            );
            self.cache.set_status(key, StatusValue::Unavailable);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{DeploymentSpec, DeploymentStatus};

    fn deployment(desired: i32, available: i32, unavailable: i32) -> Deployment {
        Deployment {
            spec: Some(DeploymentSpec {
                replicas: Some(desired),
                ..DeploymentSpec::default()
            }),
            status: Some(DeploymentStatus {
                available_replicas: Some(available),
                unavailable_replicas: Some(unavailable),
                ..DeploymentStatus::default()
            }),
            ..Deployment::default()
        }
    }

    #[test]
    fn fully_available_deployment_is_healthy() {
        assert!(deployment_is_healthy(&deployment(3, 3, 0)));
    }

    #[test]
    fn partially_available_deployment_is_unhealthy() {
        assert!(!deployment_is_healthy(&deployment(3, 2, 1)));
    }

    #[test]
    fn surplus_unavailable_replica_is_unhealthy() {
        // Replica counts can match while an old pod is still winding down.
        assert!(!deployment_is_healthy(&deployment(3, 3, 1)));
    }

    #[test]
    fn missing_status_counts_as_zero_replicas() {
        let deploy = Deployment {
            spec: Some(DeploymentSpec {
                replicas: Some(2),
                ..DeploymentSpec::default()
            }),
            ..Deployment::default()
        };
        assert!(!deployment_is_healthy(&deploy));
    }
}
