//! Tolerant header helpers: raw byte decoding and `Date:` parsing for the
//! broken real-world formats `mail-parser` rejects.

use std::borrow::Cow;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::debug;

/// Formats tried after RFC 2822 / RFC 3339 fail, on the normalized candidate.
const DATE_FORMATS: [&str; 10] = [
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S",
    "%b %d %H:%M:%S %Y",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const NAMED_ZONES: [(&str, &str); 13] = [
    ("CEST", "+0200"),
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("MST", "-0700"),
    ("MDT", "-0600"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
    ("GMT", "+0000"),
    ("UTC", "+0000"),
    ("CET", "+0100"),
    ("JST", "+0900"),
];

/// Make raw message bytes safe for MIME parsing.
///
/// Valid UTF-8, or bytes whose parts declare a `charset=`, are passed through
/// untouched. Undeclared 8-bit content is assumed to be Windows-1252, which
/// accepts every byte.
pub fn normalize_message_bytes(bytes: &[u8]) -> Cow<'_, [u8]> {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    if std::str::from_utf8(bytes).is_ok() || declares_charset(bytes) {
        return Cow::Borrowed(bytes);
    }
    let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    Cow::Owned(decoded.into_owned().into_bytes())
}

fn declares_charset(bytes: &[u8]) -> bool {
    bytes
        .windows(8)
        .any(|w| w.eq_ignore_ascii_case(b"charset="))
}

/// First value of header `name` (case-insensitive) in the header block of
/// `data`, with folded continuation lines joined by a single space.
pub fn raw_header(data: &[u8], name: &str) -> Option<String> {
    let text = String::from_utf8_lossy(data);
    let mut value: Option<String> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            break;
        }
        let folded = line.starts_with(' ') || line.starts_with('\t');
        match (&mut value, folded) {
            (Some(v), true) => {
                v.push(' ');
                v.push_str(line.trim());
            }
            (Some(_), false) => break,
            (None, true) => {}
            (None, false) => {
                if let Some((key, rest)) = line.split_once(':') {
                    if key.trim().eq_ignore_ascii_case(name) {
                        value = Some(rest.trim().to_string());
                    }
                }
            }
        }
    }
    value
}

/// Whether `data` opens with an RFC 5322 header field (`Name: value`).
pub fn starts_with_header(data: &[u8]) -> bool {
    let first_line = data.split(|&b| b == b'\n').next().unwrap_or_default();
    let Some(colon) = first_line.iter().position(|&b| b == b':') else {
        return false;
    };
    colon > 0 && first_line[..colon].iter().all(|&b| (33..=126).contains(&b))
}

/// Parse an email date string in the formats seen in the wild.
///
/// Handles RFC 2822, RFC 3339, a leading day of week, IMAP-style
/// `16-JUL-2025 03:01:03`, and trailing named time zones. Dates without a
/// zone are taken as UTC.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let base = normalize_imap_date(strip_day_of_week(trimmed));
    let zoned = replace_named_zone(&base);

    for candidate in [base.as_str(), zoned.as_str()] {
        for fmt in DATE_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(ndt) = NaiveDateTime::parse_from_str(candidate, fmt) {
                return Some(Utc.from_utc_datetime(&ndt));
            }
        }
    }

    debug!(date = trimmed, "Unrecognised date format");
    None
}

/// `"Thu, 04 Jan 2024 …"` → `"04 Jan 2024 …"`.
fn strip_day_of_week(s: &str) -> &str {
    let Some(head) = s.get(..3) else {
        return s;
    };
    let is_day = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
        .iter()
        .any(|d| d.eq_ignore_ascii_case(head));
    if !is_day {
        return s;
    }
    s[3..].trim_start_matches(',').trim_start()
}

/// `"16-JUL-2025 03:01:03"` → `"16 Jul 2025 03:01:03"`.
///
/// chrono's `%b` wants title-case months separated by spaces.
fn normalize_imap_date(s: &str) -> String {
    let Some((day, rest)) = s.split_once('-') else {
        return s.to_string();
    };
    let Some((month, tail)) = rest.split_once('-') else {
        return s.to_string();
    };
    if !day.chars().all(|c| c.is_ascii_digit()) {
        return s.to_string();
    }
    match MONTHS.iter().find(|m| m.eq_ignore_ascii_case(month)) {
        Some(title) => format!("{day} {title} {tail}"),
        None => s.to_string(),
    }
}

/// Replace a trailing zone abbreviation with its numeric offset.
fn replace_named_zone(s: &str) -> String {
    for (name, offset) in NAMED_ZONES {
        if let Some(head) = s.strip_suffix(name) {
            return format!("{head}{offset}");
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_rfc2822() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0000").expect("rfc2822");
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2024-01-04");
    }

    #[test]
    fn test_parse_date_without_dow() {
        assert!(parse_date("04 Jan 2024 10:00:00 +0000").is_some());
    }

    #[test]
    fn test_parse_date_named_tz() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 EST").expect("named zone");
        assert_eq!(dt.format("%H").to_string(), "15");
    }

    #[test]
    fn test_parse_date_iso8601() {
        assert!(parse_date("2024-01-04T10:00:00Z").is_some());
    }

    #[test]
    fn test_parse_date_imap_style() {
        let dt = parse_date("16-JUL-2025 03:01:03").expect("imap date");
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2025-07-16");
    }

    #[test]
    fn test_parse_date_garbage() {
        assert!(parse_date("not a date").is_none());
        assert!(parse_date("   ").is_none());
    }

    #[test]
    fn test_normalize_imap_date_passthrough() {
        assert_eq!(
            normalize_imap_date("04 Jan 2024 10:00:00"),
            "04 Jan 2024 10:00:00"
        );
        assert_eq!(normalize_imap_date("2024-01-04"), "2024-01-04");
    }

    #[test]
    fn test_raw_header_unfolds() {
        let data = b"Subject: Hi\r\nDate: Thu, 04 Jan 2024\r\n 10:00:00 +0000\r\nFrom: a@b\r\n\r\nDate: body";
        assert_eq!(
            raw_header(data, "date").as_deref(),
            Some("Thu, 04 Jan 2024 10:00:00 +0000")
        );
        assert_eq!(raw_header(data, "cc"), None);
    }

    #[test]
    fn test_starts_with_header() {
        assert!(starts_with_header(b"From: a@b.com\n\nbody"));
        assert!(starts_with_header(b"X-Custom-Header:value"));
        assert!(!starts_with_header(b"Hello there, this is not a message"));
        assert!(!starts_with_header(b": no name"));
        assert!(!starts_with_header(b"Not A Header: value"));
    }

    #[test]
    fn test_normalize_utf8_passthrough() {
        let data = "Subject: café\n\nhola".as_bytes();
        assert!(matches!(normalize_message_bytes(data), Cow::Borrowed(_)));
    }

    #[test]
    fn test_normalize_undeclared_latin1() {
        let data = b"Subject: caf\xe9\n\nna\xefve";
        let out = normalize_message_bytes(data);
        let text = std::str::from_utf8(&out).expect("utf-8 after normalizing");
        assert!(text.contains("café"));
        assert!(text.contains("naïve"));
    }

    #[test]
    fn test_normalize_keeps_declared_charset() {
        let data = b"Content-Type: text/plain; charset=iso-8859-1\n\ncaf\xe9";
        assert!(matches!(normalize_message_bytes(data), Cow::Borrowed(_)));
    }
}
