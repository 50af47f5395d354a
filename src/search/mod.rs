//! Query engine: free-text parsing, structured filters and result ranking.

pub mod filter;
pub mod query;

use tracing::debug;

use crate::error::Result;
use crate::index::IndexStore;
use crate::model::record::SearchResult;

pub use self::filter::SearchFilters;
pub use self::query::{parse_query, ParsedQuery};

/// Default bound on the number of results.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// A user-facing search: free text plus structured filters.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Free-text expression (see [`query`] for the syntax). May be blank.
    pub text: String,
    pub filters: SearchFilters,
    pub max_results: usize,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            text: String::new(),
            filters: SearchFilters::default(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl SearchRequest {
    /// A free-text search with no filters.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Run `request` against `store`.
///
/// - Text and filters: ranked text matches that also pass every filter,
///   best first.
/// - Blank text with filters: every record passing the filters, ordered by
///   path, with a score of `0.0`.
/// - Blank text without filters: nothing.
///
/// A malformed text expression fails with `QuerySyntax` before the index is
/// read.
pub fn execute(store: &IndexStore, request: &SearchRequest) -> Result<Vec<SearchResult>> {
    let query = parse_query(&request.text)?;

    let results = if query.is_empty() {
        if request.filters.is_empty() {
            // Still a state check: a closed store must not answer.
            store.len()?;
            Vec::new()
        } else {
            store
                .records()?
                .into_iter()
                .filter(|r| request.filters.matches(r))
                .take(request.max_results)
                .map(|r| SearchResult::from_record(r, 0.0))
                .collect()
        }
    } else {
        store.search_parsed(&query, request.max_results, |r| request.filters.matches(r))?
    };

    debug!(
        text = %request.text,
        filtered = !request.filters.is_empty(),
        results = results.len(),
        "Search executed"
    );
    Ok(results)
}
