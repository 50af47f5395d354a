//! Email parsing: the `.eml` document extractor, tolerant header helpers and MIME body handling.

pub mod eml;
pub mod header;
pub mod mime;
