//! In-memory inverted index and BM25 scoring.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::index::tokenizer::{positioned_tokens, tokenize};
use crate::model::record::EmailRecord;
use crate::search::query::{Clause, Occur, ParsedQuery, SearchField};

/// BM25 term-frequency saturation.
const K1: f32 = 1.2;
/// BM25 length normalisation.
const B: f32 = 0.75;

/// Position of a document in [`InvertedIndex::docs`].
pub(crate) type DocId = u32;

/// Ranking weight per tokenized field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FieldWeights {
    pub subject: f32,
    pub body: f32,
}

impl FieldWeights {
    fn of(&self, field: SearchField) -> f32 {
        match field {
            SearchField::Subject => self.subject,
            SearchField::Body => self.body,
        }
    }
}

fn slot(field: SearchField) -> usize {
    match field {
        SearchField::Subject => 0,
        SearchField::Body => 1,
    }
}

/// Occurrences of one term in one field of one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Posting {
    pub doc: DocId,
    pub field: SearchField,
    /// Token positions within the field, ascending. Term frequency is the length.
    pub positions: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDoc {
    record: EmailRecord,
    /// Token count of subject and body.
    lengths: [u32; 2],
}

/// Stored records plus postings for their subject and body.
///
/// Removed documents leave a `None` slot until the index is compacted, so
/// [`DocId`]s stay stable between compactions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct InvertedIndex {
    docs: Vec<Option<StoredDoc>>,
    postings: HashMap<String, Vec<Posting>>,
    /// Sum of field lengths over live documents.
    total_lengths: [u64; 2],
    live: usize,
    #[serde(skip)]
    by_path: HashMap<PathBuf, DocId>,
}

impl InvertedIndex {
    /// Rebuild the path lookup after deserializing.
    pub fn rebuild_lookup(&mut self) {
        self.by_path = self
            .docs
            .iter()
            .enumerate()
            .filter_map(|(id, doc)| doc.as_ref().map(|d| (d.record.path.clone(), id as DocId)))
            .collect();
    }

    /// Number of live documents.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Number of distinct terms.
    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    pub fn get(&self, path: &Path) -> Option<&EmailRecord> {
        self.by_path.get(path).and_then(|&id| self.record(id))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.by_path.contains_key(path)
    }

    pub fn record(&self, id: DocId) -> Option<&EmailRecord> {
        self.docs
            .get(id as usize)
            .and_then(Option::as_ref)
            .map(|d| &d.record)
    }

    /// Live records in storage order.
    pub fn records(&self) -> impl Iterator<Item = &EmailRecord> {
        self.docs.iter().flatten().map(|d| &d.record)
    }

    /// Insert `record`, replacing any live document with the same path.
    /// Returns `true` when a document was replaced.
    pub fn upsert(&mut self, record: EmailRecord) -> bool {
        let replaced = self.remove(&record.path).is_some();

        let id = self.docs.len() as DocId;
        let mut lengths = [0u32; 2];
        for field in SearchField::ALL {
            let mut positions: HashMap<String, Vec<u32>> = HashMap::new();
            for (pos, token) in positioned_tokens(field_text(&record, field)) {
                lengths[slot(field)] += 1;
                positions.entry(token).or_default().push(pos);
            }
            for (term, positions) in positions {
                self.postings.entry(term).or_default().push(Posting {
                    doc: id,
                    field,
                    positions,
                });
            }
        }

        for (total, len) in self.total_lengths.iter_mut().zip(lengths) {
            *total += u64::from(len);
        }
        self.by_path.insert(record.path.clone(), id);
        self.docs.push(Some(StoredDoc { record, lengths }));
        self.live += 1;
        replaced
    }

    /// Remove the document stored under `path`, returning its record.
    pub fn remove(&mut self, path: &Path) -> Option<EmailRecord> {
        let id = self.by_path.remove(path)?;
        let doc = self.docs.get_mut(id as usize)?.take()?;

        let terms: HashSet<String> = SearchField::ALL
            .iter()
            .flat_map(|&f| tokenize(field_text(&doc.record, f)))
            .collect();
        for term in terms {
            if let Some(list) = self.postings.get_mut(&term) {
                list.retain(|p| p.doc != id);
                if list.is_empty() {
                    self.postings.remove(&term);
                }
            }
        }

        for (total, len) in self.total_lengths.iter_mut().zip(doc.lengths) {
            *total -= u64::from(len);
        }
        self.live -= 1;
        Some(doc.record)
    }

    /// A copy without removed slots, documents renumbered in path order.
    pub fn compacted(&self) -> InvertedIndex {
        let mut live: Vec<&EmailRecord> = self.records().collect();
        live.sort_by(|a, b| a.path.cmp(&b.path));

        let mut fresh = InvertedIndex::default();
        for record in live {
            fresh.upsert(record.clone());
        }
        fresh
    }

    /// Score every document matching `query`.
    ///
    /// Excluded clauses remove documents. When any clause is required, a
    /// document must match all required clauses; otherwise it must match at
    /// least one optional clause. The score is the sum over matching clauses.
    pub fn score(&self, query: &ParsedQuery, weights: FieldWeights) -> Vec<(DocId, f32)> {
        let excluded: HashSet<DocId> = query
            .negative()
            .flat_map(|c| self.clause_scores(c, weights).into_keys())
            .collect();

        let positive: Vec<(Occur, HashMap<DocId, f32>)> = query
            .positive()
            .map(|c| (c.occur, self.clause_scores(c, weights)))
            .collect();

        let has_required = positive.iter().any(|(occur, _)| *occur == Occur::Must);
        let mut candidates: HashSet<DocId> = if has_required {
            let mut required = positive.iter().filter(|(occur, _)| *occur == Occur::Must);
            let mut set: HashSet<DocId> = required
                .next()
                .map(|(_, scores)| scores.keys().copied().collect())
                .unwrap_or_default();
            for (_, scores) in required {
                set.retain(|id| scores.contains_key(id));
            }
            set
        } else {
            positive
                .iter()
                .flat_map(|(_, scores)| scores.keys().copied())
                .collect()
        };
        candidates.retain(|id| !excluded.contains(id));

        candidates
            .into_iter()
            .map(|id| {
                let total: f32 = positive
                    .iter()
                    .filter_map(|(_, scores)| scores.get(&id))
                    .sum();
                (id, total)
            })
            .collect()
    }

    /// BM25 score of one clause for every document it matches.
    fn clause_scores(&self, clause: &Clause, weights: FieldWeights) -> HashMap<DocId, f32> {
        let mut scores: HashMap<DocId, f32> = HashMap::new();
        let Some(first) = clause.terms.first() else {
            return scores;
        };
        let Some(first_postings) = self.postings.get(first) else {
            return scores;
        };

        // A phrase weighs as much as its words together.
        let idf: f32 = clause.terms.iter().map(|t| self.idf(t)).sum();

        let rest: Vec<HashMap<(DocId, SearchField), &[u32]>> = clause.terms[1..]
            .iter()
            .map(|term| {
                self.postings
                    .get(term)
                    .map(|list| {
                        list.iter()
                            .map(|p| ((p.doc, p.field), p.positions.as_slice()))
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect();

        for posting in first_postings {
            if !clause.covers(posting.field) {
                continue;
            }
            let Some(doc) = self.docs.get(posting.doc as usize).and_then(Option::as_ref) else {
                continue;
            };

            let tf = if rest.is_empty() {
                posting.positions.len()
            } else {
                phrase_frequency(&posting.positions, posting.doc, posting.field, &rest)
            };
            if tf == 0 {
                continue;
            }

            let field_len = doc.lengths[slot(posting.field)] as f32;
            let score = weights.of(posting.field)
                * idf
                * saturate(tf as f32, field_len, self.average_length(posting.field));
            *scores.entry(posting.doc).or_default() += score;
        }
        scores
    }

    /// Inverse document frequency of `term` over live documents.
    fn idf(&self, term: &str) -> f32 {
        let df = self
            .postings
            .get(term)
            .map(|list| {
                let mut docs: Vec<DocId> = list.iter().map(|p| p.doc).collect();
                docs.dedup();
                docs.len()
            })
            .unwrap_or(0) as f32;
        let n = self.live as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    fn average_length(&self, field: SearchField) -> f32 {
        if self.live == 0 {
            return 1.0;
        }
        let avg = self.total_lengths[slot(field)] as f32 / self.live as f32;
        if avg > 0.0 {
            avg
        } else {
            1.0
        }
    }
}

fn field_text(record: &EmailRecord, field: SearchField) -> &str {
    match field {
        SearchField::Subject => &record.subject,
        SearchField::Body => &record.body,
    }
}

fn saturate(tf: f32, field_len: f32, avg_len: f32) -> f32 {
    tf * (K1 + 1.0) / (tf + K1 * (1.0 - B + B * field_len / avg_len))
}

/// Number of positions in `starts` where the remaining phrase words follow
/// in order in the same field of the same document.
fn phrase_frequency(
    starts: &[u32],
    doc: DocId,
    field: SearchField,
    rest: &[HashMap<(DocId, SearchField), &[u32]>],
) -> usize {
    let mut following = Vec::with_capacity(rest.len());
    for term in rest {
        match term.get(&(doc, field)) {
            Some(positions) => following.push(*positions),
            None => return 0,
        }
    }
    starts
        .iter()
        .filter(|&&start| {
            following
                .iter()
                .enumerate()
                .all(|(offset, positions)| {
                    positions.binary_search(&(start + offset as u32 + 1)).is_ok()
                })
        })
        .count()
}
