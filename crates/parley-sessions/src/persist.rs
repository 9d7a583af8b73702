//! Snapshot file I/O.
//!
//! [`write_atomic`] creates a temp file next to the target and renames it
//! into place. Both files live in the same directory, so the rename is
//! atomic and readers only ever observe the old or the new snapshot.

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::Path;

use parley_core::ThreadId;
use tracing::{debug, warn};

use crate::cache::SessionEntry;
use crate::errors::{Result, SessionStoreError};

/// Write `bytes` to `path` via temp file + rename, creating the parent
/// directory if needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let io_err = |source| SessionStoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(parent).map_err(io_err)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".sessions-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(io_err)?;
    temp.write_all(bytes).map_err(io_err)?;
    temp.as_file().sync_all().map_err(io_err)?;

    let _ = temp.persist(path).map_err(|e| SessionStoreError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// Serialize a snapshot and write it atomically.
pub fn save_snapshot(path: &Path, entries: &BTreeMap<ThreadId, SessionEntry>) -> Result<()> {
    let json = serde_json::to_vec_pretty(entries)?;
    write_atomic(path, &json)?;
    debug!(path = %path.display(), entries = entries.len(), "session store persisted");
    Ok(())
}

/// Read a snapshot, degrading to an empty map on any problem.
///
/// A missing file is the normal first-run case. An unreadable or corrupt
/// file is logged and discarded: stale sessions are cheap to lose, a
/// service that refuses to start is not.
pub fn load_snapshot(path: &Path) -> BTreeMap<ThreadId, SessionEntry> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no session store yet, starting empty");
            return BTreeMap::new();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read session store, starting empty");
            return BTreeMap::new();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt session store, starting empty");
            BTreeMap::new()
        }
    }
}
