//! Summary statistics over indexed records.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::index::IndexStore;
use crate::model::address::EmailAddress;
use crate::model::record::EmailRecord;

/// Overview of an open index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub documents: usize,
    /// Oldest and newest message dates.
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub top_senders: Vec<(String, usize)>,
    /// Message count per client folder, largest first.
    pub clients: Vec<(String, usize)>,
    /// Bytes used by the index files.
    pub size_on_disk: u64,
}

impl IndexStats {
    /// Compute statistics for `store`, listing up to `top_n` senders.
    pub fn collect(store: &IndexStore, top_n: usize) -> Result<Self> {
        let records = store.records()?;
        Ok(Self {
            documents: records.len(),
            date_range: date_range(&records),
            top_senders: top_senders(&records, top_n),
            clients: count_by_client(&records),
            size_on_disk: index_size_on_disk(store.location()),
        })
    }
}

/// Return the date range (oldest, newest) across the given records.
pub fn date_range(records: &[&EmailRecord]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let first = records.first()?;
    let mut min = first.date;
    let mut max = first.date;
    for r in records.iter().skip(1) {
        if r.date < min {
            min = r.date;
        }
        if r.date > max {
            max = r.date;
        }
    }
    Some((min, max))
}

/// Return the top N senders by message count.
///
/// Senders are grouped by address, case-insensitively; a message with
/// several senders counts for each of them.
pub fn top_senders(records: &[&EmailRecord], n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in records {
        for sender in EmailAddress::parse_list(&record.sender) {
            if sender.address.is_empty() {
                continue;
            }
            *counts.entry(sender.address.to_lowercase()).or_default() += 1;
        }
    }
    sorted_counts(counts, n)
}

/// Message count per client folder.
pub fn count_by_client(records: &[&EmailRecord]) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.client().to_string()).or_default() += 1;
    }
    sorted_counts(counts, usize::MAX)
}

fn sorted_counts(counts: HashMap<String, usize>, n: usize) -> Vec<(String, usize)> {
    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(n);
    sorted
}

/// Total size in bytes of the files in an index directory (0 if missing).
pub fn index_size_on_disk(location: &Path) -> u64 {
    std::fs::read_dir(location)
        .map(|entries| {
            entries
                .flatten()
                .filter_map(|e| e.metadata().ok())
                .filter(|m| m.is_file())
                .map(|m| m.len())
                .sum()
        })
        .unwrap_or(0)
}
