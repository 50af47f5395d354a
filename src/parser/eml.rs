//! Document extractor for individual `.eml` files (RFC 5322 messages).

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use mail_parser::{Address, MessageParser};
use tracing::{debug, warn};

use crate::error::{EmlError, Result};
use crate::model::address::EmailAddress;
use crate::model::record::{EmailRecord, FileStamp};
use crate::parser::{header, mime};

/// Everything read from one email file: the indexable record plus the
/// display-only details the index does not keep.
#[derive(Debug, Clone)]
pub struct LoadedMessage {
    pub record: EmailRecord,
    /// Primary recipients (`To:`).
    pub to: Vec<EmailAddress>,
    /// Attachment file names.
    pub attachments: Vec<String>,
}

/// Parse a single `.eml` file into an [`EmailRecord`].
///
/// Pure transform from file content to record. Unreadable files and data
/// that is not an RFC 5322 message fail with [`EmlError::Parse`] carrying the path.
pub fn extract_email(path: impl AsRef<Path>) -> Result<EmailRecord> {
    load_message(path).map(|m| m.record)
}

/// Parse a single `.eml` file, keeping recipients and attachment names too.
pub fn load_message(path: impl AsRef<Path>) -> Result<LoadedMessage> {
    let path = path.as_ref();
    let unreadable = |e: std::io::Error| EmlError::parse(path, format!("cannot read file: {e}"));

    let metadata = std::fs::metadata(path).map_err(unreadable)?;
    if !metadata.is_file() {
        return Err(EmlError::parse(path, "not a regular file"));
    }
    let raw = std::fs::read(path).map_err(unreadable)?;
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(EmlError::parse(path, "empty file"));
    }

    let data = header::normalize_message_bytes(skip_from_line(&raw)).into_owned();
    if !header::starts_with_header(&data) {
        return Err(EmlError::parse(path, "no RFC 5322 header block"));
    }

    let msg = MessageParser::default()
        .parse(data.as_slice())
        .ok_or_else(|| EmlError::parse(path, "not a valid RFC 5322 message"))?;

    let stamp = FileStamp::of(&metadata);
    let date = message_date(&msg, &data).unwrap_or_else(|| {
        warn!(path = %path.display(), "No usable Date header, using file modification time");
        DateTime::from_timestamp_millis(stamp.modified_ms).unwrap_or(DateTime::UNIX_EPOCH)
    });

    let sender = msg
        .from()
        .map(|from| EmailAddress::render_list(&addresses(from)))
        .unwrap_or_default();

    let mut record = EmailRecord::new(
        path,
        msg.subject().unwrap_or("").trim(),
        sender,
        mime::primary_text(&msg),
        date,
    );
    record.stamp = Some(stamp);

    debug!(path = %path.display(), subject = %record.subject, "Extracted email");

    Ok(LoadedMessage {
        to: msg.to().map(addresses).unwrap_or_default(),
        attachments: mime::attachment_names(&msg),
        record,
    })
}

/// Message date from `mail-parser`, falling back to the tolerant parser on
/// the raw `Date:` header.
fn message_date(msg: &mail_parser::Message<'_>, data: &[u8]) -> Option<DateTime<Utc>> {
    msg.date()
        .filter(|d| d.year > 0)
        .and_then(|d| Utc.timestamp_opt(d.to_timestamp(), 0).single())
        .or_else(|| header::raw_header(data, "date").and_then(|raw| header::parse_date(&raw)))
}

fn addresses(addr: &Address<'_>) -> Vec<EmailAddress> {
    addr.iter()
        .map(|a| EmailAddress::from_parts(a.name(), a.address()))
        .collect()
}

/// Skip an mbox-style `From ` envelope line some exporters leave at the top.
fn skip_from_line(data: &[u8]) -> &[u8] {
    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}
