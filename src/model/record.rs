//! Email records as stored in the index, and the search results projected from them.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Size and modification time of an email file when it was extracted.
///
/// Lets a re-scan skip files that have not changed since they were indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FileStamp {
    /// File length in bytes.
    pub size: u64,
    /// Modification time in milliseconds since the Unix epoch.
    pub modified_ms: i64,
}

impl FileStamp {
    /// Read the stamp of a file from its metadata.
    pub fn of(metadata: &std::fs::Metadata) -> Self {
        let modified_ms = metadata
            .modified()
            .ok()
            .map(|t| DateTime::<Utc>::from(t).timestamp_millis())
            .unwrap_or(0);
        Self {
            size: metadata.len(),
            modified_ms,
        }
    }
}

/// One parsed email message.
///
/// `path` is the primary key: the index holds at most one live record per path.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EmailRecord {
    /// Location of the `.eml` file.
    pub path: PathBuf,
    /// Decoded `Subject:` header (may be empty).
    pub subject: String,
    /// `From:` header rendered for display, e.g. `Alice <alice@x.com>`.
    pub sender: String,
    /// Primary text body (plain-text part, or text converted from HTML).
    pub body: String,
    /// Message date, stored with millisecond precision.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
    /// File stamp at extraction time; `None` for records built in memory.
    #[serde(default)]
    pub stamp: Option<FileStamp>,
}

impl EmailRecord {
    /// Build a record from its fields. The date is truncated to milliseconds.
    pub fn new(
        path: impl Into<PathBuf>,
        subject: impl Into<String>,
        sender: impl Into<String>,
        body: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            path: path.into(),
            subject: subject.into(),
            sender: sender.into(),
            body: body.into(),
            date: truncate_to_millis(date),
            stamp: None,
        }
    }

    /// Client name: the directory two levels above the file.
    pub fn client(&self) -> &str {
        client_of(&self.path)
    }

    /// Project name: the directory directly containing the file.
    pub fn project(&self) -> &str {
        project_of(&self.path)
    }
}

/// A matched record plus fields derived for display.
///
/// Built fresh for every query; it has no identity beyond `path`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SearchResult {
    pub path: PathBuf,
    pub client: String,
    pub project: String,
    pub subject: String,
    pub sender: String,
    pub date: DateTime<Utc>,
    /// Relevance score; `0.0` when the query had no free text.
    pub score: f32,
}

impl SearchResult {
    /// Project a record into a result.
    pub fn from_record(record: &EmailRecord, score: f32) -> Self {
        Self {
            path: record.path.clone(),
            client: record.client().to_string(),
            project: record.project().to_string(),
            subject: record.subject.clone(),
            sender: record.sender.clone(),
            date: record.date,
            score,
        }
    }
}

/// Name of the parent directory of `path`, or `""`.
pub fn project_of(path: &Path) -> &str {
    path.parent()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .unwrap_or("")
}

/// Name of the grandparent directory of `path`, or `""`.
pub fn client_of(path: &Path) -> &str {
    path.parent()
        .and_then(Path::parent)
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .unwrap_or("")
}

/// Drop sub-millisecond precision so in-memory and persisted dates compare equal.
pub fn truncate_to_millis(date: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(date.timestamp_millis()).unwrap_or(date)
}
