//! Search expression parser.
//!
//! Parses the free-text part of a search into a structured [`ParsedQuery`].
//!
//! # Supported syntax
//!
//! - `term`: optional clause; documents matching more clauses rank higher
//! - `+term`: required
//! - `-term`: excluded
//! - `"exact phrase"`: words must appear next to each other in one field
//! - `subject:term`, `body:"some phrase"`: restrict a clause to one field
//! - `a AND b`: both sides required; `OR` is the default and may be written explicitly
//!
//! Terms go through the index tokenizer, so `Project-Update` is the phrase
//! `"project update"` and `$$$` contributes nothing.

use serde::{Deserialize, Serialize};

use crate::error::{EmlError, Result};
use crate::index::tokenizer::tokenize;

/// Tokenized fields of an indexed email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchField {
    Subject,
    Body,
}

impl SearchField {
    /// Every tokenized field, in index order.
    pub const ALL: [SearchField; 2] = [SearchField::Subject, SearchField::Body];

    /// Field named by a `name:` query prefix.
    pub fn from_prefix(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("subject") {
            Some(Self::Subject)
        } else if name.eq_ignore_ascii_case("body") {
            Some(Self::Body)
        } else {
            None
        }
    }
}

/// How a clause takes part in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    /// Optional; at least one optional clause must match when nothing is required.
    Should,
    /// Required.
    Must,
    /// Excluded.
    MustNot,
}

/// One term or phrase of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub occur: Occur,
    /// Field restriction; `None` searches subject and body.
    pub field: Option<SearchField>,
    /// Tokenized words. More than one word is a phrase.
    pub terms: Vec<String>,
}

impl Clause {
    /// Whether the clause is a multi-word phrase.
    pub fn is_phrase(&self) -> bool {
        self.terms.len() > 1
    }

    /// Whether `field` is searched by this clause.
    pub fn covers(&self, field: SearchField) -> bool {
        self.field.is_none_or(|f| f == field)
    }
}

/// A parsed free-text query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedQuery {
    pub clauses: Vec<Clause>,
}

impl ParsedQuery {
    /// `true` for a blank query (no clauses at all).
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Required and optional clauses.
    pub fn positive(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter().filter(|c| c.occur != Occur::MustNot)
    }

    /// Excluded clauses.
    pub fn negative(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter().filter(|c| c.occur == Occur::MustNot)
    }
}

/// Parse a search expression.
///
/// A blank input yields an empty query. Malformed input (unterminated quote,
/// dangling operator or field prefix, only excluded terms) fails with
/// [`EmlError::QuerySyntax`].
pub fn parse_query(input: &str) -> Result<ParsedQuery> {
    let syntax = |reason: &str| EmlError::QuerySyntax {
        query: input.to_string(),
        reason: reason.to_string(),
    };

    let tokens = split_respecting_quotes(input).ok_or_else(|| syntax("unterminated quote"))?;

    let mut clauses: Vec<Clause> = Vec::new();
    let mut pending_and = false;
    let mut prev_was_operator = true;

    for (i, token) in tokens.iter().enumerate() {
        let is_last = i + 1 == tokens.len();

        if token == "AND" || token == "OR" {
            if prev_was_operator || is_last {
                return Err(syntax(&format!("'{token}' needs a term on both sides")));
            }
            if token == "AND" {
                pending_and = true;
                if let Some(last) = clauses.last_mut() {
                    if last.occur == Occur::Should {
                        last.occur = Occur::Must;
                    }
                }
            }
            prev_was_operator = true;
            continue;
        }
        prev_was_operator = false;

        let (mut occur, rest) = match token.as_bytes()[0] {
            b'+' => (Occur::Must, &token[1..]),
            b'-' => (Occur::MustNot, &token[1..]),
            _ => (Occur::Should, token.as_str()),
        };
        if rest.is_empty() {
            return Err(syntax(&format!("'{token}' is not followed by a term")));
        }

        let (field, value) = match rest.split_once(':') {
            Some((name, value)) => match SearchField::from_prefix(name) {
                Some(_) if value.is_empty() => {
                    return Err(syntax(&format!("'{name}:' has no value")));
                }
                Some(field) => (Some(field), value),
                None => (None, rest),
            },
            None => (None, rest),
        };

        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);

        if pending_and && occur == Occur::Should {
            occur = Occur::Must;
        }
        pending_and = false;

        let terms = tokenize(value);
        if terms.is_empty() {
            continue;
        }
        clauses.push(Clause {
            occur,
            field,
            terms,
        });
    }

    if !clauses.is_empty() && clauses.iter().all(|c| c.occur == Occur::MustNot) {
        return Err(syntax("only excluded terms; add a term to search for"));
    }

    Ok(ParsedQuery { clauses })
}

/// Split on whitespace outside double quotes. `None` if a quote is left open.
fn split_respecting_quotes(input: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
            current.push(ch);
        } else if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
    }
    if in_quotes {
        return None;
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Some(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(q: &ParsedQuery) -> Vec<Vec<&str>> {
        q.clauses
            .iter()
            .map(|c| c.terms.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn test_parse_simple_terms() {
        let q = parse_query("Project timeline").unwrap();
        assert_eq!(terms(&q), vec![vec!["project"], vec!["timeline"]]);
        assert!(q.clauses.iter().all(|c| c.occur == Occur::Should));
        assert!(q.clauses.iter().all(|c| c.field.is_none()));
    }

    #[test]
    fn test_parse_blank_is_empty() {
        assert!(parse_query("").unwrap().is_empty());
        assert!(parse_query("   \t").unwrap().is_empty());
    }

    #[test]
    fn test_parse_required_and_excluded() {
        let q = parse_query("+budget -draft report").unwrap();
        let occurs: Vec<Occur> = q.clauses.iter().map(|c| c.occur).collect();
        assert_eq!(occurs, vec![Occur::Must, Occur::MustNot, Occur::Should]);
    }

    #[test]
    fn test_parse_phrase_and_field() {
        let q = parse_query("subject:\"Project Update\" body:sprint").unwrap();
        assert_eq!(q.clauses[0].field, Some(SearchField::Subject));
        assert!(q.clauses[0].is_phrase());
        assert_eq!(q.clauses[0].terms, vec!["project", "update"]);
        assert_eq!(q.clauses[1].field, Some(SearchField::Body));
    }

    #[test]
    fn test_parse_and_promotes_both_sides() {
        let q = parse_query("alpha AND beta OR gamma").unwrap();
        let occurs: Vec<Occur> = q.clauses.iter().map(|c| c.occur).collect();
        assert_eq!(occurs, vec![Occur::Must, Occur::Must, Occur::Should]);
    }

    #[test]
    fn test_unknown_prefix_is_plain_text() {
        let q = parse_query("re:meeting").unwrap();
        assert_eq!(terms(&q), vec![vec!["re", "meeting"]]);
        assert_eq!(q.clauses[0].field, None);
    }

    #[test]
    fn test_symbol_only_terms_are_dropped() {
        let q = parse_query("$$$ invoice").unwrap();
        assert_eq!(terms(&q), vec![vec!["invoice"]]);
        assert!(parse_query("$$$").unwrap().is_empty());
    }

    #[test]
    fn test_syntax_errors() {
        for bad in [
            "\"unterminated phrase",
            "alpha +",
            "-",
            "subject:",
            "AND beta",
            "alpha OR",
            "alpha AND OR beta",
            "-spam -junk",
        ] {
            let err = parse_query(bad).unwrap_err();
            assert!(
                matches!(err, EmlError::QuerySyntax { .. }),
                "expected syntax error for {bad:?}, got {err:?}"
            );
        }
    }
}
