//! Exclusive writer lock on an index location.
//!
//! The marker `write.lock` holds the pid of the process that owns the index,
//! and the owner keeps an OS-level exclusive lock on it. The kernel drops
//! that lock when the owner dies, so a marker that can be locked by us was
//! left behind by a process that did not close the index (a stale lock).

use std::fs::{File, OpenOptions, TryLockError};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{EmlError, Result};
use crate::index::format::LOCK_FILE;

/// Held writer lock. Releasing (or dropping) removes the marker.
#[derive(Debug)]
pub(crate) struct IndexLock {
    path: PathBuf,
    file: File,
}

impl IndexLock {
    /// Try once to take the lock of the index in `dir`.
    ///
    /// Returns `Ok(None)` when a live process holds it. A stale marker is
    /// cleared and taken over.
    pub fn try_acquire(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| EmlError::io(&path, e))?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => return Ok(None),
            Err(TryLockError::Error(e)) => return Err(EmlError::io(&path, e)),
        }

        // The previous owner removes the marker just before unlocking it. If
        // that happened after our open, we hold a lock on an unlinked file and
        // the path may already name a fresh marker owned by someone else.
        if !is_current_marker(&file, &path) {
            debug!(path = %path.display(), "Lock marker replaced while locking");
            return Ok(None);
        }

        let mut previous = String::new();
        file.read_to_string(&mut previous)
            .map_err(|e| EmlError::io(&path, e))?;
        let previous = previous.trim();
        if !previous.is_empty() {
            warn!(
                path = %path.display(),
                previous_pid = previous,
                "Cleared stale index lock left by a process that did not shut down cleanly"
            );
        }

        let pid = std::process::id().to_string();
        file.set_len(0)
            .and_then(|()| file.seek(SeekFrom::Start(0)))
            .and_then(|_| file.write_all(pid.as_bytes()))
            .and_then(|()| file.sync_all())
            .map_err(|e| EmlError::io(&path, e))?;

        debug!(path = %path.display(), pid = %pid, "Index lock acquired");
        Ok(Some(Self { path, file }))
    }
}

/// Whether `file` is still the file linked at `path`.
#[cfg(unix)]
fn is_current_marker(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), std::fs::metadata(path)) {
        (Ok(held), Ok(linked)) => held.dev() == linked.dev() && held.ino() == linked.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_current_marker(_file: &File, path: &Path) -> bool {
    path.exists()
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        // Remove before unlocking so a waiter never takes over a marker we still own.
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Could not remove lock marker");
            }
        }
        if let Err(e) = self.file.unlock() {
            warn!(path = %self.path.display(), error = %e, "Could not release index lock");
        }
        debug!(path = %self.path.display(), "Index lock released");
    }
}
