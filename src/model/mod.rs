//! Core data model: email records, search results, addresses and the folder tree.

pub mod address;
pub mod folder;
pub mod record;
