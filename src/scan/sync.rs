//! Scan driver: extract every email file under a root and upsert it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{EmlError, Result};
use crate::index::IndexStore;
use crate::model::folder::FolderNode;
use crate::model::record::{FileStamp, SearchResult};
use crate::parser::eml::extract_email;
use crate::scan::walker::build_tree;
use crate::scan::ScanOptions;

/// A file the scan could not index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of [`scan_and_index`].
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Email files found under the root.
    pub files_seen: usize,
    /// Files extracted and written to the index.
    pub indexed: usize,
    /// Files skipped because they are already indexed and unchanged.
    pub unchanged: usize,
    /// Files that could not be extracted.
    pub failed: Vec<ScanFailure>,
    /// Records removed because their file is gone.
    pub pruned: usize,
    /// The progress callback stopped the scan early.
    pub cancelled: bool,
    pub elapsed: Duration,
}

enum Synced {
    Indexed,
    Unchanged,
    Failed(String),
}

/// Walk `root`, then extract and index every email file found.
///
/// A file that fails to parse is logged, recorded in the report and
/// skipped; the scan goes on. Index errors abort the scan. Re-running a
/// scan is safe: records are upserted by path, and files whose size and
/// modification time match the indexed record are not read again unless
/// `options.force` is set.
///
/// `progress` receives `(processed, total)` before each file and after the
/// last one; returning `false` stops the scan. Records indexed so far stay
/// indexed, and pruning is skipped.
pub fn scan_and_index(
    root: &Path,
    store: &mut IndexStore,
    options: &ScanOptions,
    progress: Option<&dyn Fn(usize, usize) -> bool>,
) -> Result<(FolderNode, ScanReport)> {
    let start = Instant::now();
    let tree = build_tree(root, options)?;
    let files = tree.all_email_files();

    let mut report = ScanReport {
        files_seen: files.len(),
        ..ScanReport::default()
    };
    info!(root = %tree.path.display(), files = files.len(), "Scanning");

    let keep_going = |done: usize| progress.is_none_or(|cb| cb(done, files.len()));

    for (i, path) in files.iter().enumerate() {
        if !keep_going(i) {
            report.cancelled = true;
            break;
        }
        match sync_file(store, path, options.force)? {
            Synced::Indexed => report.indexed += 1,
            Synced::Unchanged => report.unchanged += 1,
            Synced::Failed(reason) => report.failed.push(ScanFailure {
                path: path.to_path_buf(),
                reason,
            }),
        }
    }
    if !report.cancelled && !keep_going(files.len()) {
        report.cancelled = true;
    }

    if options.prune_missing && !report.cancelled {
        let seen: HashSet<&Path> = files.iter().copied().collect();
        report.pruned = prune_missing(store, &tree.path, &seen)?;
    }

    report.elapsed = start.elapsed();
    info!(
        root = %tree.path.display(),
        indexed = report.indexed,
        unchanged = report.unchanged,
        failed = report.failed.len(),
        pruned = report.pruned,
        cancelled = report.cancelled,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Scan complete"
    );
    Ok((tree, report))
}

/// Index the email files directly inside `dir` (no recursion) and return
/// them as results, ordered by path with a score of `0.0`.
///
/// Unparseable files are logged and left out.
pub fn index_folder(
    dir: &Path,
    store: &mut IndexStore,
    options: &ScanOptions,
) -> Result<Vec<SearchResult>> {
    let folder_error = |e: std::io::Error| match e.kind() {
        std::io::ErrorKind::NotFound => EmlError::FileNotFound(dir.to_path_buf()),
        _ => EmlError::io(dir, e),
    };
    // Records are keyed by path, so use the same spelling as a full scan.
    let dir = std::fs::canonicalize(dir).map_err(folder_error)?;
    let entries = std::fs::read_dir(&dir).map_err(folder_error)?;

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && options.is_email_file(p))
        .collect();
    files.sort();

    let mut results = Vec::with_capacity(files.len());
    for path in &files {
        if let Synced::Failed(_) = sync_file(store, path, options.force)? {
            continue;
        }
        if let Some(record) = store.get(path)? {
            results.push(SearchResult::from_record(record, 0.0));
        }
    }
    debug!(dir = %dir.display(), emails = results.len(), "Folder indexed");
    Ok(results)
}

fn sync_file(store: &mut IndexStore, path: &Path, force: bool) -> Result<Synced> {
    if !force {
        let current = std::fs::metadata(path).ok().map(|m| FileStamp::of(&m));
        if let Some(existing) = store.get(path)? {
            if existing.stamp.is_some() && existing.stamp == current {
                return Ok(Synced::Unchanged);
            }
        }
    }

    match extract_email(path) {
        Ok(record) => {
            store.index_record(record)?;
            Ok(Synced::Indexed)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping email that could not be parsed");
            Ok(Synced::Failed(e.to_string()))
        }
    }
}

/// Remove records under `root` whose path was not seen by the scan.
fn prune_missing(store: &mut IndexStore, root: &Path, seen: &HashSet<&Path>) -> Result<usize> {
    let stale: Vec<PathBuf> = store
        .records()?
        .into_iter()
        .filter(|r| r.path.starts_with(root) && !seen.contains(r.path.as_path()))
        .map(|r| r.path.clone())
        .collect();

    for path in &stale {
        store.remove(path)?;
        debug!(path = %path.display(), "Pruned missing email");
    }
    Ok(stale.len())
}
