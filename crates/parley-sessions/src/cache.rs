//! TTL-bounded session token cache.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use parley_core::{Clock, SystemClock, ThreadId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{Result, SessionStoreError};
use crate::persist;

/// One thread's resumable agent session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    /// Opaque token handed back by the agent; replayed to resume.
    #[serde(rename = "sessionId")]
    pub token: String,
    /// When the entry was first created (epoch ms). Preserved across updates.
    pub created_at: i64,
    /// When the token was last refreshed by a successful round trip (epoch ms).
    pub last_used: i64,
}

/// Process-wide cache of session tokens keyed by thread.
///
/// Every mutation is persisted before the call returns. The internal lock
/// is held across the write, so snapshots reach disk in mutation order.
pub struct SessionCache {
    path: PathBuf,
    ttl_ms: i64,
    clock: Arc<dyn Clock>,
    entries: Mutex<BTreeMap<ThreadId, SessionEntry>>,
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("path", &self.path)
            .field("ttl_ms", &self.ttl_ms)
            .finish_non_exhaustive()
    }
}

impl SessionCache {
    /// Open the cache at `path` using the system clock.
    pub fn open(path: impl Into<PathBuf>, ttl: Duration) -> Result<Self> {
        Self::open_with_clock(path, ttl, Arc::new(SystemClock))
    }

    /// Open the cache at `path` with an explicit clock.
    ///
    /// A missing or corrupt file yields an empty cache; only a zero TTL is
    /// an error.
    pub fn open_with_clock(
        path: impl Into<PathBuf>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if ttl.is_zero() {
            return Err(SessionStoreError::InvalidTtl);
        }
        let path = path.into();
        let entries = persist::load_snapshot(&path);
        info!(path = %path.display(), entries = entries.len(), "session store loaded");

        Ok(Self {
            path,
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            clock,
            entries: Mutex::new(entries),
        })
    }

    /// Current token for `thread`, or `None`.
    ///
    /// An expired entry is removed (and the removal persisted) before
    /// returning `None`. Reading never extends the TTL.
    pub fn get(&self, thread: &ThreadId) -> Result<Option<String>> {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock();

        let Some(entry) = entries.get(thread) else {
            return Ok(None);
        };
        if !self.is_expired(entry, now) {
            return Ok(Some(entry.token.clone()));
        }

        let _ = entries.remove(thread);
        debug!(thread_id = %thread, "session expired on read");
        persist::save_snapshot(&self.path, &entries)?;
        Ok(None)
    }

    /// Create or refresh `thread`'s entry with a new token.
    pub fn set(&self, thread: &ThreadId, token: impl Into<String>) -> Result<()> {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock();

        let created_at = entries.get(thread).map_or(now, |e| e.created_at);
        let _ = entries.insert(
            thread.clone(),
            SessionEntry {
                token: token.into(),
                created_at,
                last_used: now.max(created_at),
            },
        );
        persist::save_snapshot(&self.path, &entries)
    }

    /// Forget `thread`'s entry. Returns whether one existed.
    pub fn delete(&self, thread: &ThreadId) -> Result<bool> {
        let mut entries = self.entries.lock();
        if entries.remove(thread).is_none() {
            return Ok(false);
        }
        persist::save_snapshot(&self.path, &entries)?;
        Ok(true)
    }

    /// Remove every expired entry, persisting once if anything changed.
    pub fn prune(&self) -> Result<usize> {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock();

        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        let removed = before - entries.len();

        if removed > 0 {
            persist::save_snapshot(&self.path, &entries)?;
        }
        Ok(removed)
    }

    /// Snapshot of one entry, without expiry side effects.
    pub fn entry(&self, thread: &ThreadId) -> Option<SessionEntry> {
        self.entries.lock().get(thread).cloned()
    }

    /// Number of entries currently held, including not-yet-pruned expired ones.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_expired(&self, entry: &SessionEntry, now: i64) -> bool {
        now.saturating_sub(entry.last_used) > self.ttl_ms
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
