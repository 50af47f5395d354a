//! Snapshot persistence: `segment.idx` load and atomic write.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{EmlError, Result};
use crate::index::format::{SegmentHeader, HEADER_SIZE, MAGIC, SEGMENT_FILE, VERSION};
use crate::index::postings::InvertedIndex;

/// Load the snapshot in `dir`. Returns `None` if there is none yet.
///
/// A snapshot that exists but fails validation is an error: it is never
/// silently discarded.
pub(crate) fn load(dir: &Path) -> Result<Option<InvertedIndex>> {
    let path = dir.join(SEGMENT_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let invalid = |reason: String| EmlError::InvalidIndex {
        path: path.clone(),
        reason,
    };

    let data = std::fs::read(&path).map_err(|e| EmlError::io(&path, e))?;
    if data.len() < HEADER_SIZE {
        return Err(invalid(format!("File too small ({} bytes)", data.len())));
    }

    let header: SegmentHeader = bincode::deserialize(&data[..HEADER_SIZE])
        .map_err(|e| invalid(format!("Header deserialization failed: {e}")))?;
    header.validate().map_err(invalid)?;

    let payload = &data[HEADER_SIZE..];
    let digest: [u8; 32] = Sha256::digest(payload).into();
    if digest != header.payload_sha256 {
        return Err(invalid("Payload checksum mismatch".into()));
    }

    let mut index: InvertedIndex = bincode::deserialize(payload)
        .map_err(|e| invalid(format!("Payload deserialization failed: {e}")))?;
    if index.len() as u64 != header.doc_count {
        return Err(invalid(format!(
            "Document count mismatch: header says {}, payload has {}",
            header.doc_count,
            index.len()
        )));
    }
    index.rebuild_lookup();

    debug!(path = %path.display(), docs = index.len(), "Loaded index snapshot");
    Ok(Some(index))
}

/// Write `index` as the snapshot of `dir`.
///
/// The snapshot goes to a temporary file that is synced and then renamed over
/// `segment.idx`, so a crash leaves either the old or the new snapshot.
pub(crate) fn write(dir: &Path, index: &InvertedIndex) -> Result<()> {
    let path = dir.join(SEGMENT_FILE);
    let tmp_path = dir.join(format!("{SEGMENT_FILE}.tmp"));
    let encode = |e: bincode::Error| EmlError::InvalidIndex {
        path: path.clone(),
        reason: format!("Cannot encode snapshot: {e}"),
    };

    let payload = bincode::serialize(index).map_err(encode)?;
    let header = SegmentHeader {
        magic: *MAGIC,
        version: VERSION,
        flags: 0,
        doc_count: index.len() as u64,
        term_count: index.term_count() as u64,
        created_at: chrono::Utc::now().timestamp_millis(),
        payload_sha256: Sha256::digest(&payload).into(),
    };
    let header_bytes = bincode::serialize(&header).map_err(encode)?;

    // Pad header to HEADER_SIZE
    let mut padded_header = vec![0u8; HEADER_SIZE];
    let copy_len = header_bytes.len().min(HEADER_SIZE);
    padded_header[..copy_len].copy_from_slice(&header_bytes[..copy_len]);

    let mut file = File::create(&tmp_path).map_err(|e| EmlError::io(&tmp_path, e))?;
    file.write_all(&padded_header)
        .and_then(|()| file.write_all(&payload))
        .and_then(|()| file.sync_all())
        .map_err(|e| EmlError::io(&tmp_path, e))?;
    drop(file);

    std::fs::rename(&tmp_path, &path).map_err(|e| EmlError::io(&path, e))?;
    sync_dir(dir);

    info!(
        path = %path.display(),
        docs = header.doc_count,
        terms = header.term_count,
        "Index snapshot written"
    );
    Ok(())
}

/// Persist the rename itself. Not every platform can open a directory.
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        debug!(path = %dir.display(), error = %e, "Directory sync skipped");
    }
}
