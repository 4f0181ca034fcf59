//! Cluster workload health monitor.
//!
//! Continuously samples the health of selected deployments, statefulsets,
//! secrets and configmaps, records findings in a shared TTL-bound cache,
//! and serves an aggregated health view over HTTP. Which secrets and
//! configmaps to monitor is hot-reloadable through a labelled ConfigMap.

pub mod cache;
pub mod error;
pub mod scrape;
pub mod server;
pub mod settings;
pub mod watch;

pub use cache::{CacheConfig, HealthCache, StatusValue};
pub use error::{Error, Result};
pub use scrape::WatchedResource;
