//! Runtime settings.
//!
//! Everything is a flag with an environment fallback so the same binary
//! runs locally and in-cluster. Kubernetes credentials are not configured
//! here; `kube::Client::try_default` infers kubeconfig vs in-cluster
//! service account on its own.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::cache::CacheConfig;
use crate::watch::WatchSettings;

/// Cluster workload health monitor
#[derive(Parser, Debug, Clone)]
#[command(name = "cluster-vitals")]
#[command(about = "Monitor cluster workload health and serve an aggregated health view")]
#[command(version)]
pub struct Settings {
    /// Bind address for the health reporting HTTP server
    #[arg(long, env = "VITALS_BIND_ADDR", default_value = "0.0.0.0:1323")]
    pub bind_addr: SocketAddr,

    /// Label selector picking out deployments and statefulsets to monitor
    #[arg(
        long,
        env = "VITALS_SCRAPE_SELECTOR",
        default_value = "k8sclustervitals.io/scrape=true"
    )]
    pub workload_selector: String,

    /// Label selector picking out the scrape-configuration ConfigMap
    #[arg(
        long,
        env = "VITALS_CONFIG_SELECTOR",
        default_value = "k8sclustervitals.io/config=exists"
    )]
    pub config_selector: String,

    /// Seconds between watch-loop cycles
    #[arg(long, env = "VITALS_POLL_INTERVAL", default_value = "15")]
    pub poll_interval_secs: u64,

    /// Seconds to let a workload settle before evaluating replica counts
    #[arg(long, env = "VITALS_SETTLE_DELAY", default_value = "3")]
    pub settle_delay_secs: u64,

    /// Seconds between control-plane liveness probes
    #[arg(long, env = "VITALS_LIVENESS_INTERVAL", default_value = "10")]
    pub liveness_interval_secs: u64,

    /// Seconds an unhealthy finding stays in the cache without a rewrite
    #[arg(long, env = "VITALS_STATUS_TTL", default_value = "45")]
    pub status_ttl_secs: u64,

    /// Seconds between cleanup passes over expired findings
    #[arg(long, env = "VITALS_SWEEP_INTERVAL", default_value = "60")]
    pub sweep_interval_secs: u64,
}

impl Settings {
    pub fn watch_settings(&self) -> WatchSettings {
        WatchSettings {
            workload_selector: self.workload_selector.clone(),
            config_selector: self.config_selector.clone(),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            settle_delay: Duration::from_secs(self.settle_delay_secs),
            liveness_interval: Duration::from_secs(self.liveness_interval_secs),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            status_ttl: Duration::from_secs(self.status_ttl_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_tuning() {
        let settings = Settings::parse_from(["cluster-vitals"]);
        assert_eq!(settings.bind_addr.port(), 1323);
        assert_eq!(settings.poll_interval_secs, 15);
        assert_eq!(settings.settle_delay_secs, 3);
        assert_eq!(settings.status_ttl_secs, 45);
        assert_eq!(settings.sweep_interval_secs, 60);
        assert_eq!(
            settings.workload_selector,
            "k8sclustervitals.io/scrape=true"
        );
    }

    #[test]
    fn flags_override_defaults() {
        let settings = Settings::parse_from([
            "cluster-vitals",
            "--poll-interval-secs",
            "5",
            "--workload-selector",
            "team=payments",
        ]);
        assert_eq!(settings.watch_settings().poll_interval.as_secs(), 5);
        assert_eq!(settings.workload_selector, "team=payments");
    }
}
