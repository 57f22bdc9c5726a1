//! Time-bounded buffer of the latest exposition text per VM.
//!
//! [`MetricsCache`] holds at most one entry per [`VmId`]. Writes come from
//! the collector's probe workers, reads come from the scrape handler. An
//! entry is fresh while its age is at most the configured TTL; freshness is
//! only evaluated when the cache is read; there is no background sweep.
//!
//! Reading is *not* a drain: fresh entries survive any number of scrapes
//! and keep being served until they either get replaced by a newer probe
//! or outlive the TTL, at which point the read that notices removes them.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::types::VmId;

/// Default time-to-live for a cached reading.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct CacheEntry {
    captured_at: Instant,
    text: Arc<str>,
}

/// Latest-known-good exposition text per VM, bounded by a TTL.
///
/// Designed to be wrapped in `Arc` and shared between the collector and the
/// HTTP handlers. The lock only guards map mutation; callers never hold it
/// across remote I/O.
#[derive(Debug)]
pub struct MetricsCache {
    ttl: Duration,
    entries: Mutex<HashMap<VmId, CacheEntry>>,
}

impl Default for MetricsCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl MetricsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert or replace the reading for `vm_id`, stamped with the current
    /// time. Last write wins; no history is kept.
    pub async fn store(&self, vm_id: VmId, text: impl Into<Arc<str>>) {
        let entry = CacheEntry {
            captured_at: Instant::now(),
            text: text.into(),
        };
        self.entries.lock().await.insert(vm_id, entry);
    }

    /// Return every fresh reading, ordered by VM id, and evict every entry
    /// found stale.
    ///
    /// Fresh entries stay in place. The returned map is ordered so that
    /// rendering a snapshot is deterministic.
    pub async fn snapshot_fresh(&self) -> BTreeMap<VmId, Arc<str>> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let mut fresh = BTreeMap::new();

        entries.retain(|vm_id, entry| {
            if now.saturating_duration_since(entry.captured_at) <= self.ttl {
                fresh.insert(*vm_id, Arc::clone(&entry.text));
                true
            } else {
                false
            }
        });

        fresh
    }

    /// Number of entries currently held, fresh or not.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
