//! Scrape-configuration synchronizer.
//!
//! A single ConfigMap, selected by label, carries the lists of secrets and
//! configmaps to monitor. This module watches that object and republishes
//! the parsed lists into the health cache whenever it is created, updated,
//! or deleted, so every watch loop sees the latest lists without restarts.

use std::sync::Arc;

use futures::TryStreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::runtime::{watcher, watcher::Event};
use kube::{Api, Client, ResourceExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cache::HealthCache;
use crate::error::Result;

/// Config entry holding the secret watch list.
pub const WATCHED_SECRETS_KEY: &str = "watch.secrets.config";
/// Config entry holding the configmap watch list.
pub const WATCHED_CONFIGMAPS_KEY: &str = "watch.configmaps.config";

/// ConfigMap data field naming the secrets to monitor.
pub const WATCHED_SECRETS_FIELD: &str = "watched-secrets";
/// ConfigMap data field naming the configmaps to monitor.
pub const WATCHED_CONFIGMAPS_FIELD: &str = "watched-configmaps";

/// One secret or configmap to monitor. Parsed from the configuration
/// object's YAML fields; equality is by (name, namespace).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedResource {
    pub name: String,
    pub namespace: String,
}

/// Parse one watch-list field into an ordered list of resources.
pub fn parse_watch_list(raw: &str) -> Result<Vec<WatchedResource>> {
    Ok(serde_yaml::from_str(raw)?)
}

/// Republish both watch lists from a scrape-configuration object.
///
/// A field that is absent means "stop monitoring that kind" and clears the
/// entry; a field that is present but malformed is logged and the previous
/// list stays in place, so a bad edit never wipes out a good configuration.
pub fn apply_scrape_config(cache: &HealthCache, config_map: &ConfigMap) {
    apply_field(cache, config_map, WATCHED_SECRETS_FIELD, WATCHED_SECRETS_KEY);
    apply_field(
        cache,
        config_map,
        WATCHED_CONFIGMAPS_FIELD,
        WATCHED_CONFIGMAPS_KEY,
    );
}

fn apply_field(cache: &HealthCache, config_map: &ConfigMap, field: &str, entry: &str) {
    let Some(raw) = config_map.data.as_ref().and_then(|data| data.get(field)) else {
        cache.delete_config(entry);
        return;
    };
    match parse_watch_list(raw) {
        Ok(list) => {
            info!(field, entries = list.len(), "updating watch list from scrape config");
            cache.set_config(entry, list);
        }
        Err(err) => {
            warn!(
                field,
                error = %err,
                "malformed scrape configuration field, keeping previous watch list"
            );
        }
    }
}

/// Clear both watch lists. Monitoring of secrets and configmaps stops until
/// a new scrape-configuration object appears.
pub fn remove_scrape_config(cache: &HealthCache) {
    cache.delete_config(WATCHED_SECRETS_KEY);
    cache.delete_config(WATCHED_CONFIGMAPS_KEY);
}

/// Watch the scrape-configuration ConfigMap and keep the cache in sync.
///
/// Runs until the cancellation token fires. Watch stream errors are logged
/// and the stream resumes; the watcher re-establishes itself with backoff.
pub async fn run_scrape_config_watch(
    client: Client,
    cache: Arc<HealthCache>,
    selector: String,
    token: CancellationToken,
) {
    info!(selector = %selector, "monitoring scrape configuration object");
    let api: Api<ConfigMap> = Api::all(client);
    let stream = watcher(api, watcher::Config::default().labels(&selector));
    let mut stream = Box::pin(stream);

    loop {
        tokio::select! {
            () = token.cancelled() => {
                info!("gracefully shutting down scrape config watch");
                return;
            }
            event = stream.try_next() => match event {
                Ok(Some(Event::Apply(config_map) | Event::InitApply(config_map))) => {
                    info!(
                        name = %config_map.name_any(),
                        namespace = config_map.namespace().as_deref().unwrap_or_default(),
                        "identified scrape configuration"
                    );
                    apply_scrape_config(&cache, &config_map);
                }
                Ok(Some(Event::Delete(config_map))) => {
                    info!(
                        name = %config_map.name_any(),
                        namespace = config_map.namespace().as_deref().unwrap_or_default(),
                        "scrape configuration deleted, clearing watch lists"
                    );
                    remove_scrape_config(&cache);
                }
                Ok(Some(Event::Init | Event::InitDone)) => {}
                Ok(None) => {
                    warn!("scrape config watch stream ended");
                    return;
                }
                Err(err) => {
                    error!(error = %err, "scrape config watch error");
                }
            }
        }
    }
}
