//! Resource watch loops and their coordinator.
//!
//! One interval-driven loop per resource kind, all sharing the same
//! skeleton: sleep, discover targets, check each target concurrently, write
//! or clear status entries, repeat until cancelled. Deployments and
//! statefulsets are discovered by label selector across the cluster;
//! secrets and configmaps come from the dynamic watch lists kept fresh by
//! the scrape-config synchronizer.

pub mod configmaps;
pub mod deployments;
pub mod liveness;
pub mod secrets;
pub mod statefulsets;

use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::cache::{HealthCache, StatusValue};
use crate::scrape;

/// Tunables shared by every watch loop.
#[derive(Debug, Clone)]
pub struct WatchSettings {
    /// Label selector picking out the workloads to monitor.
    pub workload_selector: String,
    /// Label selector picking out the scrape-configuration object.
    pub config_selector: String,
    /// Sleep between cycles of every watch loop.
    pub poll_interval: Duration,
    /// Pause before evaluating a just-listed workload's replica counts, so
    /// a rollout that only just started is not flagged unhealthy.
    pub settle_delay: Duration,
    /// Sleep between liveness probes against the API server.
    pub liveness_interval: Duration,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            workload_selector: "k8sclustervitals.io/scrape=true".to_string(),
            config_selector: "k8sclustervitals.io/config=exists".to_string(),
            poll_interval: Duration::from_secs(15),
            settle_delay: Duration::from_secs(3),
            liveness_interval: Duration::from_secs(10),
        }
    }
}

/// Result of one per-target health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Healthy,
    Missing,
    Errored,
}

/// Map a retrieval result onto a check outcome: success is healthy, an API
/// 404 means the target is gone, anything else is a transient failure.
pub(crate) fn classify<T>(result: &Result<T, kube::Error>) -> CheckOutcome {
    match result {
        Ok(_) => CheckOutcome::Healthy,
        Err(kube::Error::Api(response)) if response.code == 404 => CheckOutcome::Missing,
        Err(_) => CheckOutcome::Errored,
    }
}

/// Apply a check outcome to the status store under `key`.
pub(crate) fn record_outcome(cache: &HealthCache, key: String, outcome: CheckOutcome) {
    match outcome {
        CheckOutcome::Healthy => cache.clear_status(&key),
        CheckOutcome::Missing => cache.set_status(key, StatusValue::Unavailable),
        CheckOutcome::Errored => cache.set_status(key, StatusValue::Invalid),
    }
}

/// Common loop skeleton: sleep one interval, run one cycle, repeat.
/// Cancellation is observed at the sleep boundary, so a loop exits within
/// one interval of the shutdown signal.
pub(crate) async fn poll_loop<C, Fut>(
    name: &str,
    interval: Duration,
    token: &CancellationToken,
    mut cycle: C,
) where
    C: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        tokio::select! {
            () = token.cancelled() => {
                info!(watch = name, "gracefully shutting down watch loop");
                return;
            }
            () = tokio::time::sleep(interval) => {}
        }
        cycle().await;
    }
}

/// Shared state for the per-kind watch loops.
pub struct Watcher {
    client: Client,
    cache: Arc<HealthCache>,
    settings: WatchSettings,
    token: CancellationToken,
}

impl Watcher {
    pub fn new(
        client: Client,
        cache: Arc<HealthCache>,
        settings: WatchSettings,
        token: CancellationToken,
    ) -> Self {
        Self {
            client,
            cache,
            settings,
            token,
        }
    }

    pub async fn watch_deployments(&self) {
        poll_loop(
            "deployment",
            self.settings.poll_interval,
            &self.token,
            || self.deployment_cycle(),
        )
        .await;
    }

    pub async fn watch_statefulsets(&self) {
        poll_loop(
            "statefulset",
            self.settings.poll_interval,
            &self.token,
            || self.statefulset_cycle(),
        )
        .await;
    }

    pub async fn watch_secrets(&self) {
        poll_loop("secrets", self.settings.poll_interval, &self.token, || {
            self.secret_cycle()
        })
        .await;
    }

    pub async fn watch_configmaps(&self) {
        poll_loop(
            "configmaps",
            self.settings.poll_interval,
            &self.token,
            || self.configmap_cycle(),
        )
        .await;
    }
}

/// Owns the lifecycle of every concurrent unit: the scrape-config
/// synchronizer, the four watch loops, the liveness probe, and the cache
/// sweeper. `shutdown` cancels all of them and waits for each to exit.
pub struct Coordinator {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl Coordinator {
    pub fn start(
        client: Client,
        cache: Arc<HealthCache>,
        ready: Arc<AtomicBool>,
        settings: WatchSettings,
    ) -> Self {
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        info!("starting to watch resources");

        tracker.spawn(scrape::run_scrape_config_watch(
            client.clone(),
            cache.clone(),
            settings.config_selector.clone(),
            token.clone(),
        ));

        let watcher = Arc::new(Watcher::new(
            client.clone(),
            cache.clone(),
            settings.clone(),
            token.clone(),
        ));
        tracker.spawn({
            let watcher = watcher.clone();
            async move { watcher.watch_deployments().await }
        });
        tracker.spawn({
            let watcher = watcher.clone();
            async move { watcher.watch_statefulsets().await }
        });
        tracker.spawn({
            let watcher = watcher.clone();
            async move { watcher.watch_secrets().await }
        });
        tracker.spawn({
            let watcher = watcher.clone();
            async move { watcher.watch_configmaps().await }
        });

        tracker.spawn(liveness::run_liveness_probe(
            client,
            ready,
            settings.liveness_interval,
            token.clone(),
        ));

        tracker.spawn(run_cache_sweeper(cache, token.clone()));

        tracker.close();
        Self { token, tracker }
    }

    /// Propagate the shutdown signal and block until every unit has exited.
    pub async fn shutdown(self) {
        self.token.cancel();
        self.tracker.wait().await;
        info!("all watch loops stopped");
    }
}

/// Periodic cleanup pass over expired status entries.
async fn run_cache_sweeper(cache: Arc<HealthCache>, token: CancellationToken) {
    let interval = cache.sweep_interval();
    poll_loop("cache-sweeper", interval, &token, || {
        let cache = cache.clone();
        async move {
            cache.sweep_expired();
        }
    })
    .await;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::http::{Request, Response};
    use kube::client::Body;
    use kube::Client;
    use tower::service_fn;

    /// Client over an in-process service that answers every request with a
    /// not-found Status and counts how many requests were issued.
    pub(crate) fn counting_not_found_client(requests: Arc<AtomicUsize>) -> Client {
        let service = service_fn(move |_request: Request<Body>| {
            let requests = requests.clone();
            async move {
                requests.fetch_add(1, Ordering::SeqCst);
                let status = serde_json::json!({
                    "kind": "Status",
                    "apiVersion": "v1",
                    "metadata": {},
                    "status": "Failure",
                    "message": "not found",
                    "reason": "NotFound",
                    "code": 404,
                })
                .to_string();
                Ok::<_, Infallible>(
                    Response::builder()
                        .status(404)
                        .header("content-type", "application/json")
                        .body(Body::from(status.into_bytes()))
                        .expect("response construction"),
                )
            }
        });
        Client::new(service, "default")
    }
}
