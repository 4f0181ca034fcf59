//! Shared health cache.
//!
//! Two independent stores live behind one handle: transient *status entries*
//! that record an unhealthy finding and expire on their own, and durable
//! *config entries* that hold the current watch lists. Status entries expire
//! so a crashed watch loop eventually stops reporting stale failures; config
//! entries never expire because losing the watch list mid-run would silently
//! stop monitoring.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::scrape::WatchedResource;

/// Value recorded against an unhealthy resource.
///
/// The underlying cause is only visible in logs; the cache distinguishes
/// "the resource is gone" from "we could not evaluate it" and nothing more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusValue {
    Unavailable,
    Invalid,
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusValue::Unavailable => write!(f, "unavailable"),
            StatusValue::Invalid => write!(f, "invalid"),
        }
    }
}

/// Tunables for the status store.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Lifetime of a status entry. Entries not rewritten within this window
    /// vanish, reverting the resource to "healthy" on sustained silence.
    pub status_ttl: Duration,
    /// How often the coordinator runs the cleanup pass over expired entries.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            status_ttl: Duration::from_secs(45),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

struct StatusSlot {
    value: StatusValue,
    expires_at: Instant,
}

/// Concurrency-safe key/value store backing the health view.
///
/// Constructed once at bootstrap and handed to every component by `Arc`;
/// the cache is the single source of truth for both health findings and the
/// dynamic watch lists.
pub struct HealthCache {
    status: Mutex<HashMap<String, StatusSlot>>,
    config: Mutex<HashMap<String, Vec<WatchedResource>>>,
    ttl: Duration,
    sweep_interval: Duration,
}

impl Default for HealthCache {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthCache {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            status: Mutex::new(HashMap::new()),
            config: Mutex::new(HashMap::new()),
            ttl: config.status_ttl,
            sweep_interval: config.sweep_interval,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    fn status_guard(&self) -> MutexGuard<'_, HashMap<String, StatusSlot>> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn config_guard(&self) -> MutexGuard<'_, HashMap<String, Vec<WatchedResource>>> {
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Upsert a status entry with the fixed lifetime. Writing an existing
    /// key replaces the value and restarts its lifetime.
    pub fn set_status(&self, key: impl Into<String>, value: StatusValue) {
        let slot = StatusSlot {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.status_guard().insert(key.into(), slot);
    }

    /// Remove a status entry. No-op if the key is absent.
    pub fn clear_status(&self, key: &str) {
        self.status_guard().remove(key);
    }

    /// Number of currently-live status entries. Anything >= 1 means the
    /// system is reporting at least one unhealthy resource.
    pub fn count_live(&self) -> usize {
        let now = Instant::now();
        self.status_guard()
            .values()
            .filter(|slot| slot.expires_at > now)
            .count()
    }

    /// Materialized view of all live status entries. Expired keys are
    /// dropped from the index here rather than by callback; enumeration is
    /// rare enough that lazy eviction is the simpler discipline.
    pub fn snapshot(&self) -> BTreeMap<String, StatusValue> {
        let now = Instant::now();
        let mut guard = self.status_guard();
        guard.retain(|_, slot| slot.expires_at > now);
        guard
            .iter()
            .map(|(key, slot)| (key.clone(), slot.value))
            .collect()
    }

    /// Cleanup pass over expired entries, run periodically by the
    /// coordinator so the index does not grow between snapshots.
    pub fn sweep_expired(&self) {
        let now = Instant::now();
        self.status_guard().retain(|_, slot| slot.expires_at > now);
    }

    /// Replace a config entry wholesale. Last write wins.
    pub fn set_config(&self, name: &str, list: Vec<WatchedResource>) {
        self.config_guard().insert(name.to_string(), list);
    }

    /// Remove a config entry. No-op if the key is absent.
    pub fn delete_config(&self, name: &str) {
        self.config_guard().remove(name);
    }

    /// Current watch list under `name`. `None` means no watch list has been
    /// configured yet (or the configuration object was deleted); callers
    /// treat that as "nothing to check this cycle".
    pub fn get_config(&self, name: &str) -> Option<Vec<WatchedResource>> {
        self.config_guard().get(name).cloned()
    }

    /// All config entries, for diagnostic exposure over HTTP.
    pub fn dump_config(&self) -> BTreeMap<String, Vec<WatchedResource>> {
        self.config_guard()
            .iter()
            .map(|(key, list)| (key.clone(), list.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watched(name: &str, namespace: &str) -> WatchedResource {
        WatchedResource {
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }

    #[tokio::test]
    async fn set_status_replaces_never_duplicates() {
        let cache = HealthCache::new();
        cache.set_status("deployment.apps/foo", StatusValue::Unavailable);
        cache.set_status("deployment.apps/foo", StatusValue::Invalid);

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot.get("deployment.apps/foo"),
            Some(&StatusValue::Invalid)
        );
    }

    #[tokio::test]
    async fn clear_status_removes_entry() {
        let cache = HealthCache::new();
        cache.set_status("secrets.prod/db-secret", StatusValue::Unavailable);
        cache.clear_status("secrets.prod/db-secret");

        assert!(cache.snapshot().is_empty());
        assert_eq!(cache.count_live(), 0);

        // Clearing an absent key is a no-op.
        cache.clear_status("secrets.prod/db-secret");
    }

    #[tokio::test]
    async fn count_live_matches_snapshot() {
        let cache = HealthCache::new();
        cache.set_status("deployment.apps/a", StatusValue::Unavailable);
        cache.set_status("statefulset.apps/b", StatusValue::Unavailable);
        cache.set_status("configmaps.prod/c", StatusValue::Invalid);

        assert_eq!(cache.count_live(), cache.snapshot().len());
        assert_eq!(cache.count_live(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn status_entries_expire_after_ttl() {
        let cache = HealthCache::with_config(CacheConfig {
            status_ttl: Duration::from_secs(45),
            sweep_interval: Duration::from_secs(60),
        });
        cache.set_status("deployment.apps/foo", StatusValue::Unavailable);

        tokio::time::advance(Duration::from_secs(44)).await;
        assert_eq!(
            cache.snapshot().get("deployment.apps/foo"),
            Some(&StatusValue::Unavailable)
        );

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.snapshot().is_empty());
        assert_eq!(cache.count_live(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rewriting_a_key_restarts_its_lifetime() {
        let cache = HealthCache::new();
        cache.set_status("secrets.prod/db-secret", StatusValue::Unavailable);

        tokio::time::advance(Duration::from_secs(30)).await;
        cache.set_status("secrets.prod/db-secret", StatusValue::Unavailable);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.count_live(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_expired_entries() {
        let cache = HealthCache::new();
        cache.set_status("deployment.apps/foo", StatusValue::Unavailable);

        tokio::time::advance(Duration::from_secs(46)).await;
        cache.sweep_expired();
        assert_eq!(cache.count_live(), 0);
    }

    #[test]
    fn config_entries_do_not_expire_and_round_trip() {
        let cache = HealthCache::new();
        let list = vec![watched("db-secret", "prod"), watched("tls-cert", "edge")];
        cache.set_config("watch.secrets.config", list.clone());

        assert_eq!(cache.get_config("watch.secrets.config"), Some(list));
        assert_eq!(cache.get_config("watch.configmaps.config"), None);

        cache.delete_config("watch.secrets.config");
        assert_eq!(cache.get_config("watch.secrets.config"), None);
    }

    #[test]
    fn dump_config_exposes_all_entries() {
        let cache = HealthCache::new();
        cache.set_config("watch.secrets.config", vec![watched("a", "ns1")]);
        cache.set_config("watch.configmaps.config", vec![watched("b", "ns2")]);

        let dump = cache.dump_config();
        assert_eq!(dump.len(), 2);
        assert_eq!(dump["watch.secrets.config"], vec![watched("a", "ns1")]);
    }
}
