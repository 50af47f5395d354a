//! `emlsearch`: full-text indexing and search over a folder tree of `.eml`
//! files organised as `<root>/<client>/<project>/*.eml`.
//!
//! The crate extracts searchable fields from email files, keeps them in a
//! persistent inverted index guarded by an inter-process lock, and answers
//! ranked free-text queries combined with structured filters.

pub mod config;
pub mod error;
pub mod index;
pub mod model;
pub mod parser;
pub mod scan;
pub mod search;
pub mod session;
pub mod store;
