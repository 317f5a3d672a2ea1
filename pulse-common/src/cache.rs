//! Process-wide demand cache
//!
//! Key-value store holding the latest extrema/distribution records for the
//! current semester, with per-entry expiry and named advisory locks. Entry
//! lifetimes are tied to recomputation: a recompute run for the current
//! semester replaces or removes its keys, so expiry is only a backstop.

use crate::time::Clock;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Cache key for the latest extrema snapshot of the current semester
pub const CURRENT_DEMAND_EXTREMA: &str = "current_demand_extrema";

/// Cache key for the latest distribution estimate of the current semester
pub const CURRENT_DEMAND_DISTRIBUTION_ESTIMATE: &str = "current_demand_distribution_estimate";

struct Entry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

/// In-process key-value cache with advisory locks
pub struct DemandCache {
    clock: Clock,
    entries: Mutex<HashMap<String, Entry>>,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl DemandCache {
    pub fn new(clock: Clock) -> DemandCache {
        DemandCache {
            clock,
            entries: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Get a live (non-expired) entry
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_at(key, self.clock.now())
    }

    fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<Value> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.expires_at.is_some_and(|at| at <= now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Set an entry; `timeout` of `None` means no expiry
    pub fn set(&self, key: &str, value: Value, timeout: Option<Duration>) {
        let expires_at = timeout.map(|t| self.clock.now() + t);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), Entry { value, expires_at });
    }

    /// Remove an entry if present
    pub fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }

    /// Acquire a named advisory lock.
    ///
    /// The guard may be held across await points; concurrent holders of the
    /// same name serialize, distinct names do not interact.
    pub async fn lock(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(
                locks
                    .entry(name.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}
