//! Per-resource mutual exclusion
//!
//! A non-blocking, in-memory lock table keyed by resource key. A rejected
//! `acquire` is the caller's signal to abort with "already in progress";
//! callers never queue or block. Every acquisition schedules a TTL-based
//! forced release as a safety net against locks leaked by crashed or hung
//! attempts.
//!
//! The table is process-local only. A crash mid-download drops the lock
//! silently; the eventual retry relies on file-existence checks instead.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct LockEntry {
    held_since: DateTime<Utc>,
    auto_release_at: DateTime<Utc>,
    reaper: JoinHandle<()>,
}

/// Snapshot of one held lock, for the operational surface
#[derive(Debug, Clone, Serialize)]
pub struct LockInfo {
    pub key: String,
    pub held_since: DateTime<Utc>,
    pub auto_release_at: DateTime<Utc>,
}

/// Process-wide lock service, constructed once and shared by handle
#[derive(Clone)]
pub struct ResourceLock {
    ttl: Duration,
    table: Arc<Mutex<HashMap<String, LockEntry>>>,
}

impl ResourceLock {
    /// Create a lock service with the given auto-release TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            table: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Try to acquire the lock for `key`
    ///
    /// Returns false immediately if the key is already held. On success,
    /// spawns a reaper task that force-releases the key after the TTL.
    /// Must be called from within a tokio runtime.
    pub fn acquire(&self, key: &str) -> bool {
        let mut table = self.lock_table();
        if table.contains_key(key) {
            debug!(key = %key, "lock acquisition rejected, already held");
            return false;
        }

        let now = Utc::now();
        let ttl = self.ttl;
        let reaper = {
            let table = Arc::clone(&self.table);
            let key = key.to_string();
            tokio::spawn(async move {
                tokio::time::sleep(ttl).await;
                let removed = match table.lock() {
                    Ok(mut t) => t.remove(&key).is_some(),
                    Err(poisoned) => poisoned.into_inner().remove(&key).is_some(),
                };
                if removed {
                    warn!(
                        key = %key,
                        ttl_secs = ttl.as_secs(),
                        "lock auto-released after TTL; the owning attempt may still be running"
                    );
                }
            })
        };

        table.insert(
            key.to_string(),
            LockEntry {
                held_since: now,
                auto_release_at: now
                    + ChronoDuration::seconds(ttl.as_secs().min(i64::MAX as u64) as i64),
                reaper,
            },
        );
        debug!(key = %key, "lock acquired");
        true
    }

    /// Release the lock for `key`
    ///
    /// Idempotent: releasing an unheld key is a no-op. Cancels the pending
    /// auto-release reaper.
    pub fn release(&self, key: &str) {
        if let Some(entry) = self.lock_table().remove(key) {
            entry.reaper.abort();
            debug!(key = %key, "lock released");
        }
    }

    /// Whether `key` is currently held
    pub fn is_locked(&self, key: &str) -> bool {
        self.lock_table().contains_key(key)
    }

    /// Snapshot of all currently held locks
    pub fn entries(&self) -> Vec<LockInfo> {
        let table = self.lock_table();
        let mut entries: Vec<LockInfo> = table
            .iter()
            .map(|(key, entry)| LockInfo {
                key: key.clone(),
                held_since: entry.held_since,
                auto_release_at: entry.auto_release_at,
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    /// Currently held keys, for operational debugging
    pub fn held_keys(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.key).collect()
    }

    // Lock critical sections never suspend, so a poisoned mutex only means a
    // panic elsewhere; the table itself stays structurally valid.
    fn lock_table(&self) -> MutexGuard<'_, HashMap<String, LockEntry>> {
        match self.table.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_with_ttl(secs: u64) -> ResourceLock {
        ResourceLock::new(Duration::from_secs(secs))
    }

    #[tokio::test]
    async fn test_acquire_then_reject() {
        let lock = lock_with_ttl(1800);
        assert!(lock.acquire("drive-abc"));
        assert!(!lock.acquire("drive-abc"));
        assert!(lock.is_locked("drive-abc"));
    }

    #[tokio::test]
    async fn test_release_allows_reacquire() {
        let lock = lock_with_ttl(1800);
        assert!(lock.acquire("drive-abc"));
        lock.release("drive-abc");
        assert!(!lock.is_locked("drive-abc"));
        assert!(lock.acquire("drive-abc"));
    }

    #[tokio::test]
    async fn test_release_unheld_is_noop() {
        let lock = lock_with_ttl(1800);
        lock.release("never-held");
        assert!(!lock.is_locked("never-held"));
    }

    #[tokio::test]
    async fn test_distinct_keys_are_independent() {
        let lock = lock_with_ttl(1800);
        assert!(lock.acquire("drive-a"));
        assert!(lock.acquire("drive-b"));
        lock.release("drive-a");
        assert!(!lock.is_locked("drive-a"));
        assert!(lock.is_locked("drive-b"));
    }

    #[tokio::test]
    async fn test_concurrent_acquire_exactly_one_wins() {
        let lock = lock_with_ttl(1800);
        let mut handles = Vec::new();
        for _ in 0..16 {
            let lock = lock.clone();
            handles.push(tokio::spawn(async move { lock.acquire("drive-contended") }));
        }
        let mut won = 0;
        for handle in handles {
            if handle.await.unwrap() {
                won += 1;
            }
        }
        assert_eq!(won, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_auto_release() {
        let lock = lock_with_ttl(1800);
        assert!(lock.acquire("drive-stale"));

        // Just before the TTL the lock is still held
        tokio::time::sleep(Duration::from_secs(1799)).await;
        assert!(lock.is_locked("drive-stale"));

        // Past the TTL the reaper has fired
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!lock.is_locked("drive-stale"));
        assert!(lock.acquire("drive-stale"));
    }

    #[tokio::test]
    async fn test_entries_snapshot() {
        let lock = lock_with_ttl(1800);
        assert!(lock.acquire("drive-b"));
        assert!(lock.acquire("drive-a"));

        let entries = lock.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "drive-a");
        assert_eq!(entries[1].key, "drive-b");
        assert!(entries[0].auto_release_at > entries[0].held_since);
        assert_eq!(lock.held_keys(), vec!["drive-a", "drive-b"]);
    }
}
