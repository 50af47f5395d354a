//! Structured filters over record metadata.
//!
//! Filters are evaluated against the record itself and the folder names in
//! its path, never against the tokenized index. All set filters must match.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::model::record::EmailRecord;

/// Structured part of a search. `None` (or an empty string) means "any".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    /// Client folder name (grandparent directory), case-insensitive exact match.
    pub client: Option<String>,
    /// Project folder name (parent directory), case-insensitive exact match.
    pub project: Option<String>,
    /// Case-insensitive substring of the sender.
    pub sender: Option<String>,
    /// Inclusive lower bound on the message date.
    pub start_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the message date.
    pub end_date: Option<DateTime<Utc>>,
}

impl SearchFilters {
    /// Whether no filter is set.
    pub fn is_empty(&self) -> bool {
        non_empty(&self.client).is_none()
            && non_empty(&self.project).is_none()
            && non_empty(&self.sender).is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
    }

    /// Whether `record` satisfies every set filter.
    pub fn matches(&self, record: &EmailRecord) -> bool {
        // Date bounds first (cheapest to check)
        if let Some(start) = self.start_date {
            if record.date < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if record.date > end {
                return false;
            }
        }

        if let Some(client) = non_empty(&self.client) {
            if !eq_ignore_case(record.client(), client) {
                return false;
            }
        }
        if let Some(project) = non_empty(&self.project) {
            if !eq_ignore_case(record.project(), project) {
                return false;
            }
        }
        if let Some(sender) = non_empty(&self.sender) {
            if !record.sender.to_lowercase().contains(&sender.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Parse a date-range bound.
///
/// Accepts an RFC 3339 timestamp, `YYYY-MM-DD`, `YYYY-MM` or `YYYY`. With
/// `end = false` a partial date means the start of the period; with
/// `end = true` the last millisecond of it, so `--before 2024-03` includes
/// all of March.
pub fn parse_date_bound(value: &str, end: bool) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let day = if end {
        parse_flexible_date_end(value)?
    } else {
        parse_flexible_date_start(value)?
    };
    let time = if end {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)?
    };
    Some(day.and_time(time).and_utc())
}

fn parse_naive_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Parse a flexible date, returning the first day of the period.
fn parse_flexible_date_start(s: &str) -> Option<NaiveDate> {
    if let Some(d) = parse_naive_date(s) {
        return Some(d);
    }
    let parts: Vec<&str> = s.split('-').collect();
    match parts.as_slice() {
        [year, month] => NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1),
        [year] => NaiveDate::from_ymd_opt(year.parse().ok()?, 1, 1),
        _ => None,
    }
}

/// Parse a flexible date, returning the last day of the period.
fn parse_flexible_date_end(s: &str) -> Option<NaiveDate> {
    if let Some(d) = parse_naive_date(s) {
        return Some(d);
    }
    let parts: Vec<&str> = s.split('-').collect();
    match parts.as_slice() {
        [year, month] => {
            let year: i32 = year.parse().ok()?;
            let month: u32 = month.parse().ok()?;
            // Last day of month: go to first of next month, subtract 1 day
            let (ny, nm) = if month == 12 {
                (year + 1, 1)
            } else {
                (year, month + 1)
            };
            NaiveDate::from_ymd_opt(ny, nm, 1)?.pred_opt()
        }
        [year] => NaiveDate::from_ymd_opt(year.parse().ok()?, 12, 31),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rec(path: &str, sender: &str, y: i32, m: u32, d: u32) -> EmailRecord {
        let date = Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap();
        EmailRecord::new(path, "subject", sender, "body", date)
    }

    #[test]
    fn test_empty_filters_match_everything() {
        let filters = SearchFilters {
            client: Some("  ".into()),
            ..Default::default()
        };
        assert!(filters.is_empty());
        assert!(filters.matches(&rec("/r/A/P/1.eml", "a@x.com", 2024, 1, 1)));
    }

    #[test]
    fn test_client_and_project_case_insensitive_exact() {
        let r = rec("/r/Acme/Website/1.eml", "a@x.com", 2024, 1, 1);
        let hit = SearchFilters {
            client: Some("acme".into()),
            project: Some("WEBSITE".into()),
            ..Default::default()
        };
        assert!(hit.matches(&r));

        let partial = SearchFilters {
            client: Some("Acm".into()),
            ..Default::default()
        };
        assert!(!partial.matches(&r));
    }

    #[test]
    fn test_sender_substring() {
        let r = rec("1.eml", "Alice Smith <alice@x.com>", 2024, 1, 1);
        let f = |s: &str| SearchFilters {
            sender: Some(s.into()),
            ..Default::default()
        };
        assert!(f("SMITH").matches(&r));
        assert!(f("@x.com").matches(&r));
        assert!(!f("bob").matches(&r));
    }

    #[test]
    fn test_date_bounds_inclusive() {
        let r = rec("1.eml", "a@x.com", 2024, 3, 15);
        let exact = SearchFilters {
            start_date: Some(r.date),
            end_date: Some(r.date),
            ..Default::default()
        };
        assert!(exact.matches(&r));

        let before = SearchFilters {
            end_date: parse_date_bound("2024-03-14", true),
            ..Default::default()
        };
        assert!(!before.matches(&r));
    }

    #[test]
    fn test_parse_date_bound_periods() {
        let start = parse_date_bound("2024-02", false).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());

        let end = parse_date_bound("2024-02", true).unwrap();
        assert_eq!(end.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-02-29 23:59:59");

        let year_end = parse_date_bound("2023", true).unwrap();
        assert_eq!(year_end.format("%m-%d").to_string(), "12-31");

        assert!(parse_date_bound("2024-01-05T08:00:00Z", false).is_some());
        assert!(parse_date_bound("yesterday", false).is_none());
    }
}
