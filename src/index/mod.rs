//! Index store: on-disk format, write-ahead journal, locking, postings and statistics.

pub mod format;
mod journal;
mod lock;
mod postings;
mod segment;
pub mod stats;
mod store;
pub mod tokenizer;

pub use store::{IndexState, IndexStore, StoreOptions};
