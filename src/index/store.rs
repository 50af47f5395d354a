//! The index store: lifecycle, durable mutations and ranked search.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::{EmlError, Result};
use crate::index::format::JOURNAL_FILE;
use crate::index::journal::{Journal, JournalOp};
use crate::index::lock::IndexLock;
use crate::index::postings::{FieldWeights, InvertedIndex};
use crate::index::segment;
use crate::model::record::{EmailRecord, SearchResult};
use crate::search::query::{parse_query, ParsedQuery};

/// Lifecycle of an [`IndexStore`].
///
/// ```text
/// Unopened ─open─▶ Opening ─▶ Open ─close─▶ Closed
///                    │  ▲
///                    ▼  │ (lock busy, retry)
///                RetryingLock
/// ```
///
/// A failed open returns to `Unopened`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Unopened,
    Opening,
    RetryingLock { attempt: u32 },
    Open,
    Closed,
}

impl std::fmt::Display for IndexState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unopened => f.write_str("unopened"),
            Self::Opening => f.write_str("opening"),
            Self::RetryingLock { attempt } => write!(f, "retrying lock (attempt {attempt})"),
            Self::Open => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Tuning for an [`IndexStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoreOptions {
    /// Attempts made to take the lock before failing with `IndexUnavailable`.
    pub lock_retries: u32,
    /// Wait between lock attempts.
    pub lock_retry_delay: Duration,
    /// Journal entries that trigger a compaction into a new snapshot.
    pub compact_after: usize,
    /// Ranking weight of subject matches.
    pub subject_weight: f32,
    /// Ranking weight of body matches.
    pub body_weight: f32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            lock_retries: 3,
            lock_retry_delay: Duration::from_secs(1),
            compact_after: 512,
            subject_weight: 2.0,
            body_weight: 1.0,
        }
    }
}

/// State that only exists while the store is open.
struct OpenIndex {
    // Declared first so the lock is released only after the journal is closed.
    journal: Journal,
    index: InvertedIndex,
    _lock: IndexLock,
}

/// Durable inverted index of [`EmailRecord`]s, keyed by path.
///
/// Only one process can have a location open at a time. Every mutation is
/// journaled and synced before it returns. Dropping an open store closes it.
pub struct IndexStore {
    location: PathBuf,
    options: StoreOptions,
    state: IndexState,
    inner: Option<OpenIndex>,
}

impl IndexStore {
    /// A handle on the index at `location`. Nothing is touched until [`open`](Self::open).
    pub fn new(location: impl Into<PathBuf>, options: StoreOptions) -> Self {
        Self {
            location: location.into(),
            options,
            state: IndexState::Unopened,
            inner: None,
        }
    }

    /// Create a handle and open it.
    pub fn open_at(location: impl Into<PathBuf>, options: StoreOptions) -> Result<Self> {
        let mut store = Self::new(location, options);
        store.open()?;
        Ok(store)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> IndexState {
        self.state
    }

    /// Directory holding the index files.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Acquire the index, creating it if absent.
    ///
    /// A stale lock is cleared. A lock held by a live process is retried
    /// `lock_retries` times, `lock_retry_delay` apart, before failing with
    /// [`EmlError::IndexUnavailable`]. On any failure the store is back in
    /// [`IndexState::Unopened`] with nothing held.
    pub fn open(&mut self) -> Result<()> {
        if self.state != IndexState::Unopened {
            return Err(invalid_state("open", self.state));
        }
        self.state = IndexState::Opening;
        match self.acquire() {
            Ok(inner) => {
                info!(
                    location = %self.location.display(),
                    docs = inner.index.len(),
                    "Index opened"
                );
                self.inner = Some(inner);
                self.state = IndexState::Open;
                Ok(())
            }
            Err(e) => {
                self.state = IndexState::Unopened;
                Err(e)
            }
        }
    }

    fn acquire(&mut self) -> Result<OpenIndex> {
        std::fs::create_dir_all(&self.location).map_err(|e| EmlError::io(&self.location, e))?;

        let attempts = self.options.lock_retries.max(1);
        let mut attempt = 1;
        let lock = loop {
            if let Some(lock) = IndexLock::try_acquire(&self.location)? {
                break lock;
            }
            if attempt >= attempts {
                error!(
                    location = %self.location.display(),
                    attempts,
                    "Index is locked by another process"
                );
                return Err(EmlError::IndexUnavailable {
                    path: self.location.clone(),
                    attempts,
                });
            }
            self.state = IndexState::RetryingLock { attempt };
            warn!(
                location = %self.location.display(),
                attempt,
                delay_ms = self.options.lock_retry_delay.as_millis() as u64,
                "Index is locked, retrying"
            );
            std::thread::sleep(self.options.lock_retry_delay);
            attempt += 1;
        };

        let mut index = segment::load(&self.location)?.unwrap_or_default();
        let (journal, ops) = Journal::open(&self.location.join(JOURNAL_FILE))?;
        if !ops.is_empty() {
            debug!(ops = ops.len(), "Replaying journal");
        }
        for op in ops {
            match op {
                JournalOp::Upsert(record) => {
                    index.upsert(record);
                }
                JournalOp::Remove(path) => {
                    index.remove(&path);
                }
            }
        }

        Ok(OpenIndex {
            journal,
            index,
            _lock: lock,
        })
    }

    /// Insert or replace the record stored under `record.path`.
    ///
    /// The record is on disk when this returns `Ok`. On error the index is
    /// unchanged.
    pub fn index_record(&mut self, record: EmailRecord) -> Result<()> {
        let compact_after = self.options.compact_after;
        let inner = self.open_mut("index a record")?;

        inner.journal.append(&JournalOp::Upsert(record.clone()))?;
        let path = record.path.clone();
        let replaced = inner.index.upsert(record);
        debug!(path = %path.display(), replaced, "Record indexed");

        if inner.journal.entries() >= compact_after {
            self.compact_quietly();
        }
        Ok(())
    }

    /// Remove the record stored under `path`. Returns `false` if there was none.
    pub fn remove(&mut self, path: &Path) -> Result<bool> {
        let compact_after = self.options.compact_after;
        let inner = self.open_mut("remove a record")?;
        if !inner.index.contains(path) {
            return Ok(false);
        }

        inner
            .journal
            .append(&JournalOp::Remove(path.to_path_buf()))?;
        inner.index.remove(path);
        debug!(path = %path.display(), "Record removed");

        if inner.journal.entries() >= compact_after {
            self.compact_quietly();
        }
        Ok(true)
    }

    /// Write a fresh snapshot and empty the journal.
    pub fn commit(&mut self) -> Result<()> {
        let location = self.location.clone();
        let inner = self.open_mut("commit")?;
        compact(&location, inner)
    }

    // The mutation is already durable in the journal; a failed compaction
    // only means the next open replays more.
    fn compact_quietly(&mut self) {
        if let Err(e) = self.commit() {
            warn!(error = %e, "Index compaction failed; journal kept");
        }
    }

    /// Ranked search over subject and body.
    ///
    /// `text` uses the query syntax of [`parse_query`]. A blank query
    /// returns no results.
    pub fn search(&self, text: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        self.search_where(text, max_results, |_| true)
    }

    /// Ranked search keeping only records accepted by `filter`.
    ///
    /// The filter runs before the result bound, so up to `max_results`
    /// accepted records are returned.
    pub fn search_where(
        &self,
        text: &str,
        max_results: usize,
        filter: impl Fn(&EmailRecord) -> bool,
    ) -> Result<Vec<SearchResult>> {
        self.open_ref("search")?;
        let query = parse_query(text)?;
        self.search_parsed(&query, max_results, filter)
    }

    /// Ranked search with an already parsed query.
    ///
    /// Results are ordered by score, best first, then by path.
    pub fn search_parsed(
        &self,
        query: &ParsedQuery,
        max_results: usize,
        filter: impl Fn(&EmailRecord) -> bool,
    ) -> Result<Vec<SearchResult>> {
        let inner = self.open_ref("search")?;
        if query.is_empty() || max_results == 0 {
            return Ok(Vec::new());
        }

        let weights = FieldWeights {
            subject: self.options.subject_weight,
            body: self.options.body_weight,
        };
        let mut hits: Vec<(&EmailRecord, f32)> = inner
            .index
            .score(query, weights)
            .into_iter()
            .filter_map(|(id, score)| inner.index.record(id).map(|r| (r, score)))
            .filter(|(record, _)| filter(record))
            .collect();

        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.path.cmp(&b.0.path)));
        hits.truncate(max_results);

        debug!(hits = hits.len(), "Search complete");
        Ok(hits
            .into_iter()
            .map(|(record, score)| SearchResult::from_record(record, score))
            .collect())
    }

    /// Every live record, ordered by path.
    pub fn records(&self) -> Result<Vec<&EmailRecord>> {
        let inner = self.open_ref("list records")?;
        let mut records: Vec<&EmailRecord> = inner.index.records().collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(records)
    }

    /// The record stored under `path`.
    pub fn get(&self, path: &Path) -> Result<Option<&EmailRecord>> {
        Ok(self.open_ref("get a record")?.index.get(path))
    }

    pub fn contains(&self, path: &Path) -> Result<bool> {
        Ok(self.open_ref("look up a record")?.index.contains(path))
    }

    /// Number of live records.
    pub fn len(&self) -> Result<usize> {
        Ok(self.open_ref("count records")?.index.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Compact pending journal entries, then release the lock.
    ///
    /// Idempotent. Closing a store that was never opened just marks it closed.
    /// The lock is released even when the final compaction fails; the
    /// journal then still holds every mutation.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut inner) = self.inner.take() else {
            self.state = IndexState::Closed;
            return Ok(());
        };

        let flushed = if inner.journal.entries() > 0 {
            compact(&self.location, &mut inner)
        } else {
            Ok(())
        };
        drop(inner);
        self.state = IndexState::Closed;
        info!(location = %self.location.display(), "Index closed");
        flushed
    }

    /// Delete the index at `location`.
    ///
    /// Fails with [`EmlError::IndexUnavailable`] if a live process has it open.
    pub fn destroy(location: impl AsRef<Path>) -> Result<()> {
        let location = location.as_ref();
        if !location.exists() {
            return Ok(());
        }
        let Some(lock) = IndexLock::try_acquire(location)? else {
            return Err(EmlError::IndexUnavailable {
                path: location.to_path_buf(),
                attempts: 1,
            });
        };
        std::fs::remove_dir_all(location).map_err(|e| EmlError::io(location, e))?;
        drop(lock);
        info!(location = %location.display(), "Index destroyed");
        Ok(())
    }

    fn open_ref(&self, operation: &'static str) -> Result<&OpenIndex> {
        let state = self.state;
        self.inner
            .as_ref()
            .ok_or_else(|| invalid_state(operation, state))
    }

    fn open_mut(&mut self, operation: &'static str) -> Result<&mut OpenIndex> {
        let state = self.state;
        self.inner
            .as_mut()
            .ok_or_else(|| invalid_state(operation, state))
    }
}

fn invalid_state(operation: &'static str, state: IndexState) -> EmlError {
    error!(operation, state = %state, "Index operation in invalid state");
    EmlError::InvalidState { operation, state }
}

fn compact(location: &Path, inner: &mut OpenIndex) -> Result<()> {
    let fresh = inner.index.compacted();
    segment::write(location, &fresh)?;
    inner.index = fresh;
    inner.journal.reset()
}

impl Drop for IndexStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(location = %self.location.display(), error = %e, "Error closing index");
        }
    }
}

impl std::fmt::Debug for IndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexStore")
            .field("location", &self.location)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
