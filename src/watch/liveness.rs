//! Liveness probe against the cluster control plane.
//!
//! A cheap read on a fixed interval flips the process-wide ready flag; the
//! HTTP layer reports it as-is. No hysteresis: one success is ready, one
//! failure is not.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::poll_loop;
use crate::error::Result;

async fn probe(client: &Client) -> Result<()> {
    client.apiserver_version().await?;
    Ok(())
}

pub async fn run_liveness_probe(
    client: Client,
    ready: Arc<AtomicBool>,
    interval: Duration,
    token: CancellationToken,
) {
    poll_loop("liveness", interval, &token, || {
        let client = client.clone();
        let ready = ready.clone();
        async move {
            match probe(&client).await {
                Ok(()) => {
                    debug!("api server reachable");
                    ready.store(true, Ordering::Relaxed);
                }
                Err(err) => {
                    warn!(error = %err, "api server unreachable, marking not ready");
                    ready.store(false, Ordering::Relaxed);
                }
            }
        }
    })
    .await;
}
