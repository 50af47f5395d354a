//! Application session: ties configuration, index, scanner and reader together.
//!
//! Opening a session never fails because of the index. If the index cannot
//! be opened (locked by another process, corrupt, unwritable location) the
//! session runs degraded: browsing and reading emails work, searching and
//! indexing return [`EmlError::SearchDisabled`].

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::{self, Config};
use crate::error::{EmlError, Result};
use crate::index::stats::IndexStats;
use crate::index::IndexStore;
use crate::model::folder::FolderNode;
use crate::model::record::SearchResult;
use crate::scan::{self, ScanOptions, ScanReport};
use crate::search::{self, SearchRequest};
use crate::store::reader::{MessageReader, MessageView};
use crate::store::recent::RecentEmails;

/// Number of senders listed by [`Session::stats`].
const TOP_SENDERS: usize = 10;

pub struct Session {
    config: Config,
    store: Option<IndexStore>,
    disabled_reason: Option<String>,
    reader: MessageReader,
    recent: RecentEmails,
}

impl Session {
    /// Open the index configured in `config`, or start degraded.
    pub fn open(config: Config) -> Self {
        let location = config::index_location(&config);
        let mut store = IndexStore::new(&location, config.index.store_options());
        let (store, disabled_reason) = match store.open() {
            Ok(()) => (Some(store), None),
            Err(e) => {
                warn!(
                    location = %location.display(),
                    error = %e,
                    "Index unavailable, search is disabled for this session"
                );
                (None, Some(e.to_string()))
            }
        };

        Self {
            recent: RecentEmails::load(config::recent_file_path(&config)),
            reader: MessageReader::new(),
            config,
            store,
            disabled_reason,
        }
    }

    /// `true` when the index could not be opened.
    pub fn is_degraded(&self) -> bool {
        self.store.is_none()
    }

    /// Why the index is unavailable, when degraded.
    pub fn degraded_reason(&self) -> Option<&str> {
        self.disabled_reason.as_deref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The open index, if any.
    pub fn store(&self) -> Option<&IndexStore> {
        self.store.as_ref()
    }

    fn store_mut(&mut self) -> Result<&mut IndexStore> {
        let reason = self.disabled_reason.clone();
        self.store
            .as_mut()
            .ok_or_else(|| EmlError::SearchDisabled(reason.unwrap_or_default()))
    }

    fn store_ref(&self) -> Result<&IndexStore> {
        self.store.as_ref().ok_or_else(|| {
            EmlError::SearchDisabled(self.disabled_reason.clone().unwrap_or_default())
        })
    }

    fn scan_options(&self, force: bool) -> ScanOptions {
        let mut options = self.config.scan.scan_options();
        options.force = force;
        let location = config::index_location(&self.config);
        options
            .exclude
            .push(std::fs::canonicalize(&location).unwrap_or(location));
        options
    }

    /// Search the index.
    pub fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        search::execute(self.store_ref()?, request)
    }

    /// Scan `root` and bring the index up to date.
    pub fn sync(
        &mut self,
        root: &Path,
        force: bool,
        progress: Option<&dyn Fn(usize, usize) -> bool>,
    ) -> Result<(FolderNode, ScanReport)> {
        let options = self.scan_options(force);
        let store = self.store_mut()?;
        scan::scan_and_index(root, store, &options, progress)
    }

    /// Build the folder tree of `root` without touching the index.
    pub fn browse(&self, root: &Path) -> Result<FolderNode> {
        scan::build_tree(root, &self.scan_options(false))
    }

    /// Index the emails directly inside `dir` and list them.
    pub fn load_folder(&mut self, dir: &Path) -> Result<Vec<SearchResult>> {
        let options = self.scan_options(false);
        let store = self.store_mut()?;
        scan::index_folder(dir, store, &options)
    }

    /// Read an email for display and remember it as recently viewed.
    pub fn show(&mut self, path: &Path) -> Result<MessageView> {
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let view = self.reader.read(&path)?.clone();
        if let Err(e) = self.recent.add(&view.path) {
            warn!(error = %e, "Could not update recent emails");
        }
        Ok(view)
    }

    /// Recently viewed emails, newest first.
    pub fn recent(&self) -> &[PathBuf] {
        self.recent.entries()
    }

    /// Statistics of the open index.
    pub fn stats(&self) -> Result<IndexStats> {
        IndexStats::collect(self.store_ref()?, TOP_SENDERS)
    }

    /// Close the index. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut store) = self.store.take() {
            self.disabled_reason = Some("the session is closed".to_string());
            store.close()?;
            info!("Session closed");
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "Error closing session");
        }
    }
}
