//! Directory scanner: walks a `<client>/<project>/*.eml` tree and keeps the
//! index in sync with it.

pub mod sync;
pub mod walker;

use std::path::{Path, PathBuf};

pub use self::sync::{index_folder, scan_and_index, ScanFailure, ScanReport};
pub use self::walker::build_tree;

/// What a scan looks at and how it updates the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Email file extensions, lowercase and without the dot.
    pub extensions: Vec<String>,
    /// Skip directories whose name starts with a dot.
    pub skip_hidden: bool,
    /// After a complete scan, remove indexed records under the root whose file is gone.
    pub prune_missing: bool,
    /// Re-extract files even when their size and modification time are unchanged.
    pub force: bool,
    /// Directories never descended into (the index location, for one).
    pub exclude: Vec<PathBuf>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["eml".to_string()],
            skip_hidden: true,
            prune_missing: false,
            force: false,
            exclude: Vec::new(),
        }
    }
}

impl ScanOptions {
    /// Whether `path` has one of the email extensions (case-insensitive).
    pub fn is_email_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.exclude.iter().any(|x| path.starts_with(x))
    }
}
