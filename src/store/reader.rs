//! Message reader: loads full emails for display, with LRU caching.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::Serialize;
use tracing::debug;

use crate::error::{EmlError, Result};
use crate::model::address::EmailAddress;
use crate::model::record::{client_of, project_of, FileStamp};
use crate::parser::eml::load_message;

/// Default number of decoded messages to keep in the LRU cache.
const DEFAULT_CACHE_SIZE: usize = 50;

/// A decoded email ready to display.
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub path: PathBuf,
    pub from: String,
    pub to: Vec<EmailAddress>,
    pub subject: String,
    pub date: DateTime<Utc>,
    pub body: String,
    /// Attachment file names.
    pub attachments: Vec<String>,
    pub client: String,
    pub project: String,
    #[serde(skip)]
    stamp: Option<FileStamp>,
}

/// Reads email files for display.
///
/// Maintains an LRU cache of decoded [`MessageView`]s so that going back and
/// forth between messages does not re-parse them. A cached view is dropped
/// when the file's size or modification time changes.
pub struct MessageReader {
    cache: LruCache<PathBuf, MessageView>,
}

impl Default for MessageReader {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageReader {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_SIZE)
    }

    /// A reader caching up to `capacity` messages (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
        }
    }

    /// Read and decode a message. Fresh cached results are returned immediately.
    pub fn read(&mut self, path: &Path) -> Result<&MessageView> {
        let current = std::fs::metadata(path).ok().map(|m| FileStamp::of(&m));
        let fresh = self
            .cache
            .peek(path)
            .is_some_and(|view| view.stamp.is_some() && view.stamp == current);

        if !fresh {
            debug!(path = %path.display(), "Loading message");
            let view = load_view(path)?;
            self.cache.put(path.to_path_buf(), view);
        }
        self.cache
            .get(path)
            .ok_or_else(|| EmlError::parse(path, "message evicted from cache"))
    }

    /// Number of cached messages.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

fn load_view(path: &Path) -> Result<MessageView> {
    let loaded = load_message(path)?;
    let record = loaded.record;
    Ok(MessageView {
        client: client_of(&record.path).to_string(),
        project: project_of(&record.path).to_string(),
        path: record.path,
        from: record.sender,
        to: loaded.to,
        subject: record.subject,
        date: record.date,
        body: record.body,
        attachments: loaded.attachments,
        stamp: record.stamp,
    })
}
