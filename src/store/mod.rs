//! Display-side storage: the cached message reader and the recently viewed list.

pub mod reader;
pub mod recent;
