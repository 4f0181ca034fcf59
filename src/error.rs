use thiserror::Error;

/// Errors surfaced by the monitoring library.
///
/// Per-target and per-cycle failures are contained inside their watch loop
/// iteration and only show up in logs; these variants exist for the few
/// paths that do propagate (liveness probe, watch-list parsing).
#[derive(Debug, Error)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Scrape configuration parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
