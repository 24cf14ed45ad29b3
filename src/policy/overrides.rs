//! Short-lived, per-hostname exceptions to the active policy.
//!
//! Two kinds of override exist: duration-bound ("allow this host for N
//! minutes") and one-shot ("allow this host once"). Duration entries are
//! evicted lazily on read; the store is small and consulted on every
//! decision, so staleness is bounded by inter-decision latency. One-shot
//! entries survive until consumed, and consumption removes them after a
//! grace delay rather than synchronously so the entry stays visible to any
//! duplicate event raised for the same navigation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::debug;

/// Expiry policy of a single override entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OverrideKind {
    /// Valid until the deadline passes.
    Until(DateTime<Utc>),
    /// Valid until consumed by a single navigation.
    Once,
}

#[derive(Debug, Clone)]
struct OverrideEntry {
    id: u64,
    hostname: String,
    kind: OverrideKind,
}

/// Tracks temporary per-hostname exceptions with independent expiry.
///
/// Hostnames are compared case-insensitively and host-only; extracting the
/// host from a URL is the caller's job. Multiple entries for the same
/// hostname coexist; "exists a matching entry" means allow.
pub struct TemporaryOverrideStore {
    entries: Arc<Mutex<Vec<OverrideEntry>>>,
    next_id: AtomicU64,
    cleanups: Mutex<Vec<JoinHandle<()>>>,
}

impl TemporaryOverrideStore {
    pub fn new() -> Self {
        TemporaryOverrideStore {
            entries: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
            cleanups: Mutex::new(Vec::new()),
        }
    }

    /// Allow `hostname` for the given number of minutes from `now`.
    pub fn allow_for(&self, hostname: &str, minutes: u64, now: DateTime<Utc>) {
        let deadline = now + chrono::Duration::minutes(minutes as i64);
        self.insert(hostname, OverrideKind::Until(deadline));
        debug!(hostname, minutes, "inserted duration override");
    }

    /// Allow exactly one navigation to `hostname`.
    pub fn allow_once(&self, hostname: &str) {
        self.insert(hostname, OverrideKind::Once);
        debug!(hostname, "inserted one-shot override");
    }

    fn insert(&self, hostname: &str, kind: OverrideKind) {
        let entry = OverrideEntry {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            hostname: hostname.to_ascii_lowercase(),
            kind,
        };
        self.entries.lock().unwrap().push(entry);
    }

    /// Whether any live entry matches `hostname` at `now`.
    ///
    /// Expired duration entries are evicted before the membership test.
    /// One-shot entries are never evicted here; they persist until consumed.
    pub fn is_allowed(&self, hostname: &str, now: DateTime<Utc>) -> bool {
        let hostname = hostname.to_ascii_lowercase();
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|entry| match entry.kind {
            OverrideKind::Until(deadline) => deadline > now,
            OverrideKind::Once => true,
        });
        entries.iter().any(|entry| entry.hostname == hostname)
    }

    /// Schedule removal of one matching one-shot entry after `grace`.
    ///
    /// The removal runs on the async runtime and never blocks the decision
    /// path. The delay guarantees the entry is still visible to any other
    /// decision evaluated for the same navigation within the grace window
    /// (duplicate events for one request). Outside a runtime there is no
    /// second in-flight event to protect, so the entry is dropped right away.
    pub fn consume_once_if_present(&self, hostname: &str, grace: Duration) {
        let hostname = hostname.to_ascii_lowercase();
        let id = {
            let entries = self.entries.lock().unwrap();
            match entries
                .iter()
                .find(|e| e.kind == OverrideKind::Once && e.hostname == hostname)
            {
                Some(entry) => entry.id,
                None => return,
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let entries = Arc::clone(&self.entries);
                let task = handle.spawn(async move {
                    tokio::time::sleep(grace).await;
                    entries.lock().unwrap().retain(|e| e.id != id);
                    debug!(id, "removed consumed one-shot override");
                });
                let mut cleanups = self.cleanups.lock().unwrap();
                cleanups.retain(|t| !t.is_finished());
                cleanups.push(task);
            }
            Err(_) => {
                self.entries.lock().unwrap().retain(|e| e.id != id);
            }
        }
    }

    /// Number of live entries, expired duration entries included until the
    /// next read evicts them.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl Default for TemporaryOverrideStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TemporaryOverrideStore {
    // Pending removals must not outlive the store; engine restarts in tests
    // would otherwise leak timers.
    fn drop(&mut self) {
        for task in self.cleanups.lock().unwrap().drain(..) {
            task.abort();
        }
    }
}
