//! Write-ahead journal of index mutations.
//!
//! Every mutation is appended and synced before the in-memory index changes,
//! so a mutation that returned `Ok` survives a crash. On open the journal is
//! replayed; a torn or corrupt frame at the tail (crash mid-append) is cut off.

use std::fs::{File, OpenOptions};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{EmlError, Result};
use crate::index::format::{FRAME_CHECKSUM_LEN, FRAME_HEADER_LEN};
use crate::model::record::EmailRecord;

/// One journaled mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum JournalOp {
    Upsert(EmailRecord),
    Remove(PathBuf),
}

/// Append handle on `journal.log`.
pub(crate) struct Journal {
    path: PathBuf,
    file: File,
    /// Length of the valid prefix, which is where the next frame goes.
    len: u64,
    entries: usize,
}

impl Journal {
    /// Open (or create) the journal and return the operations it holds.
    pub fn open(path: &Path) -> Result<(Self, Vec<JournalOp>)> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| EmlError::io(path, e))?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| EmlError::io(path, e))?;

        let (ops, valid_len) = decode_frames(&data);
        if valid_len < data.len() as u64 {
            warn!(
                path = %path.display(),
                kept = ops.len(),
                dropped_bytes = data.len() as u64 - valid_len,
                "Journal has a torn tail, truncating"
            );
            file.set_len(valid_len)
                .and_then(|()| file.sync_all())
                .map_err(|e| EmlError::io(path, e))?;
        }
        debug!(path = %path.display(), ops = ops.len(), "Journal replayed");

        let journal = Self {
            path: path.to_path_buf(),
            file,
            len: valid_len,
            entries: ops.len(),
        };
        Ok((journal, ops))
    }

    /// Number of frames since the last reset.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Append one operation and sync it to disk.
    ///
    /// On failure the partial frame is cut off again so the journal stays
    /// a clean sequence of frames.
    pub fn append(&mut self, op: &JournalOp) -> Result<()> {
        let frame = encode_frame(op).map_err(|e| EmlError::InvalidIndex {
            path: self.path.clone(),
            reason: format!("Cannot encode journal entry: {e}"),
        })?;

        let written = self
            .file
            .seek(SeekFrom::Start(self.len))
            .and_then(|_| self.file.write_all(&frame))
            .and_then(|()| self.file.sync_data());

        if let Err(e) = written {
            if let Err(rollback) = self.file.set_len(self.len) {
                warn!(path = %self.path.display(), error = %rollback, "Journal rollback failed");
            }
            return Err(EmlError::io(&self.path, e));
        }

        self.len += frame.len() as u64;
        self.entries += 1;
        Ok(())
    }

    /// Drop every frame; called once they are part of a snapshot.
    pub fn reset(&mut self) -> Result<()> {
        self.file
            .set_len(0)
            .and_then(|()| self.file.sync_all())
            .map_err(|e| EmlError::io(&self.path, e))?;
        self.len = 0;
        self.entries = 0;
        Ok(())
    }
}

fn checksum(payload: &[u8]) -> [u8; FRAME_CHECKSUM_LEN] {
    let digest = Sha256::digest(payload);
    let mut out = [0u8; FRAME_CHECKSUM_LEN];
    out.copy_from_slice(&digest[..FRAME_CHECKSUM_LEN]);
    out
}

fn encode_frame(op: &JournalOp) -> std::result::Result<Vec<u8>, bincode::Error> {
    let payload = bincode::serialize(op)?;
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.write_u32::<LittleEndian>(payload.len() as u32)?;
    frame.extend_from_slice(&checksum(&payload));
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode frames until the data ends or a frame is incomplete or corrupt.
/// Returns the operations and the byte length of the valid prefix.
fn decode_frames(data: &[u8]) -> (Vec<JournalOp>, u64) {
    let mut ops = Vec::new();
    let mut cursor = Cursor::new(data);

    loop {
        let start = cursor.position();
        let remaining = data.len() as u64 - start;
        if remaining < FRAME_HEADER_LEN as u64 {
            return (ops, start);
        }
        let Ok(len) = cursor.read_u32::<LittleEndian>() else {
            return (ops, start);
        };
        let mut expected = [0u8; FRAME_CHECKSUM_LEN];
        if cursor.read_exact(&mut expected).is_err() {
            return (ops, start);
        }

        let body_start = cursor.position() as usize;
        let Some(payload) = data.get(body_start..body_start + len as usize) else {
            return (ops, start);
        };
        if checksum(payload) != expected {
            return (ops, start);
        }
        match bincode::deserialize::<JournalOp>(payload) {
            Ok(op) => ops.push(op),
            Err(_) => return (ops, start),
        }
        cursor.set_position((body_start + payload.len()) as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn upsert(path: &str) -> JournalOp {
        JournalOp::Upsert(EmailRecord::new(path, "subject", "sender", "body", Utc::now()))
    }

    #[test]
    fn test_append_and_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.log");
        {
            let (mut journal, ops) = Journal::open(&path).unwrap();
            assert!(ops.is_empty());
            journal.append(&upsert("a.eml")).unwrap();
            journal.append(&JournalOp::Remove(PathBuf::from("a.eml"))).unwrap();
            assert_eq!(journal.entries(), 2);
        }
        let (journal, ops) = Journal::open(&path).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1], JournalOp::Remove(PathBuf::from("a.eml")));
        assert_eq!(journal.entries(), 2);
    }

    #[test]
    fn test_torn_tail_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.log");
        {
            let (mut journal, _) = Journal::open(&path).unwrap();
            journal.append(&upsert("a.eml")).unwrap();
        }
        let good_len = std::fs::metadata(&path).unwrap().len();
        let partial = encode_frame(&upsert("b.eml")).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&partial[..partial.len() / 2]).unwrap();
        drop(file);

        let (mut journal, ops) = Journal::open(&path).unwrap();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], JournalOp::Upsert(r) if r.path == Path::new("a.eml")));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), good_len);

        journal.append(&upsert("c.eml")).unwrap();
        let (_, ops) = Journal::open(&path).unwrap();
        assert_eq!(ops.len(), 2);
    }

    #[test]
    fn test_corrupt_frame_stops_replay() {
        let mut data = encode_frame(&upsert("a.eml")).unwrap();
        let second = encode_frame(&upsert("b.eml")).unwrap();
        let first_len = data.len() as u64;
        data.extend_from_slice(&second);
        let last = data.len() - 1;
        data[last] ^= 0xFF;

        let (ops, valid) = decode_frames(&data);
        assert_eq!(ops.len(), 1);
        assert_eq!(valid, first_len);
    }

    #[test]
    fn test_reset_empties_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.log");
        let (mut journal, _) = Journal::open(&path).unwrap();
        journal.append(&upsert("a.eml")).unwrap();
        journal.reset().unwrap();
        assert_eq!(journal.entries(), 0);
        journal.append(&upsert("b.eml")).unwrap();
        drop(journal);

        let (_, ops) = Journal::open(&path).unwrap();
        assert_eq!(ops.len(), 1);
    }
}
