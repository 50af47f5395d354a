//! On-disk index layout.
//!
//! An index location is a directory holding three files:
//!
//! ```text
//! <location>/
//! ├── segment.idx    snapshot of the whole index
//! ├── journal.log    mutations applied since the snapshot
//! └── write.lock     lock marker (pid of the holder)
//! ```
//!
//! `segment.idx`:
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ HEADER (128 bytes, fixed)            │
//! │  magic: [u8; 8] = b"EMLIDX\0\0"      │
//! │  version: u32                        │
//! │  flags: u32                          │
//! │  doc_count: u64                      │
//! │  term_count: u64                     │
//! │  created_at: i64                     │
//! │  payload_sha256: [u8; 32]            │
//! │  (padding to 128 bytes)              │
//! ├──────────────────────────────────────┤
//! │ PAYLOAD (variable)                   │
//! │  bincode-serialized inverted index   │
//! └──────────────────────────────────────┘
//! ```
//!
//! `journal.log` is a sequence of frames:
//!
//! ```text
//! [len: u32 LE][sha256(op)[..8]][op: bincode, len bytes]
//! ```

/// Magic bytes identifying an emlsearch segment file.
pub const MAGIC: &[u8; 8] = b"EMLIDX\0\0";

/// Current index format version.
pub const VERSION: u32 = 1;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 128;

/// Snapshot file name inside the index location.
pub const SEGMENT_FILE: &str = "segment.idx";

/// Journal file name inside the index location.
pub const JOURNAL_FILE: &str = "journal.log";

/// Lock marker file name inside the index location.
pub const LOCK_FILE: &str = "write.lock";

/// Bytes of the SHA-256 digest kept per journal frame.
pub const FRAME_CHECKSUM_LEN: usize = 8;

/// Length prefix plus checksum.
pub const FRAME_HEADER_LEN: usize = 4 + FRAME_CHECKSUM_LEN;

/// Serializable segment header.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct SegmentHeader {
    /// Magic bytes (must equal [`MAGIC`]).
    pub magic: [u8; 8],
    /// Format version (must equal [`VERSION`]).
    pub version: u32,
    /// Reserved flags (currently unused).
    pub flags: u32,
    /// Number of live documents in the snapshot.
    pub doc_count: u64,
    /// Number of distinct terms in the snapshot.
    pub term_count: u64,
    /// When the snapshot was written (Unix timestamp in milliseconds).
    pub created_at: i64,
    /// SHA-256 of the payload that follows the header.
    pub payload_sha256: [u8; 32],
}

impl SegmentHeader {
    /// Validate that the header is well-formed and matches the current format.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.magic != *MAGIC {
            return Err("Invalid magic bytes".into());
        }
        if self.version != VERSION {
            return Err(format!(
                "Incompatible version: expected {VERSION}, found {}",
                self.version
            ));
        }
        Ok(())
    }
}
