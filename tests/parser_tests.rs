//! Integration tests for the document extractor and header decoding.

use assert_fs::prelude::*;
use assert_fs::TempDir;
use chrono::Utc;

use emlsearch::error::EmlError;
use emlsearch::parser::eml::{extract_email, load_message};
use emlsearch::parser::header::parse_date;

fn write_email(dir: &TempDir, rel: &str, contents: &[u8]) -> std::path::PathBuf {
    let file = dir.child(rel);
    file.write_binary(contents).unwrap();
    file.path().to_path_buf()
}

// ─── Plain message in a client/project folder ───────────────────────

#[test]
fn test_extract_plain_message() {
    let dir = TempDir::new().unwrap();
    let path = write_email(
        &dir,
        "Acme/Website/1.eml",
        b"From: \"Jane Doe\" <jane@acme.com>\r\n\
          To: team@acme.com\r\n\
          Subject: Requesting time off next week\r\n\
          Date: Mon, 05 Feb 2024 09:30:00 +0100\r\n\
          \r\n\
          I will be away from Monday to Wednesday.\r\n",
    );

    let record = extract_email(&path).unwrap();
    assert_eq!(record.path, path);
    assert_eq!(record.subject, "Requesting time off next week");
    assert_eq!(record.sender, "Jane Doe <jane@acme.com>");
    assert_eq!(record.body, "I will be away from Monday to Wednesday.");
    assert_eq!(
        record.date.format("%Y-%m-%d %H:%M").to_string(),
        "2024-02-05 08:30"
    );
    assert_eq!(record.client(), "Acme");
    assert_eq!(record.project(), "Website");
}

// ─── multipart/alternative prefers text/plain ───────────────────────

#[test]
fn test_multipart_prefers_plain_text() {
    let dir = TempDir::new().unwrap();
    let path = write_email(
        &dir,
        "Acme/Website/2.eml",
        b"From: bob@acme.com\r\n\
          Subject: Progress on the current sprint\r\n\
          Date: Tue, 06 Feb 2024 10:00:00 +0000\r\n\
          MIME-Version: 1.0\r\n\
          Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
          \r\n\
          --b1\r\n\
          Content-Type: text/plain; charset=utf-8\r\n\
          \r\n\
          Sprint is on track.\r\n\
          --b1\r\n\
          Content-Type: text/html; charset=utf-8\r\n\
          \r\n\
          <p>Sprint is <b>on track</b>.</p>\r\n\
          --b1--\r\n",
    );

    let record = extract_email(&path).unwrap();
    assert_eq!(record.body, "Sprint is on track.");
    assert!(!record.body.contains('<'));
}

// ─── HTML-only body is flattened ────────────────────────────────────

#[test]
fn test_html_only_body_is_flattened() {
    let dir = TempDir::new().unwrap();
    let path = write_email(
        &dir,
        "Beta/App/3.eml",
        b"From: carol@beta.io\r\n\
          Subject: Release notes\r\n\
          Date: Wed, 07 Feb 2024 12:00:00 +0000\r\n\
          MIME-Version: 1.0\r\n\
          Content-Type: text/html; charset=utf-8\r\n\
          \r\n\
          <html><head><style>p { color: red; }</style></head>\
          <body><p>Version 2.1 is out</p><div>Fixes &amp; features</div></body></html>\r\n",
    );

    let record = extract_email(&path).unwrap();
    assert!(record.body.contains("Version 2.1 is out"), "{}", record.body);
    assert!(record.body.contains("Fixes & features"), "{}", record.body);
    assert!(!record.body.contains("color"));
    assert!(!record.body.contains('<'));
}

// ─── Missing Date falls back to the file modification time ──────────

#[test]
fn test_missing_date_uses_modification_time() {
    let dir = TempDir::new().unwrap();
    let before = Utc::now() - chrono::Duration::seconds(5);
    let path = write_email(
        &dir,
        "Acme/Website/4.eml",
        b"From: jane@acme.com\r\nSubject: No date here\r\n\r\nBody\r\n",
    );

    let record = extract_email(&path).unwrap();
    let after = Utc::now() + chrono::Duration::seconds(5);
    assert!(
        record.date >= before && record.date <= after,
        "date {} should be the file mtime",
        record.date
    );
}

// ─── Encoded words and undeclared 8-bit headers ─────────────────────

#[test]
fn test_encoded_word_subject() {
    let dir = TempDir::new().unwrap();
    let path = write_email(
        &dir,
        "Acme/Website/5.eml",
        b"From: =?UTF-8?B?Sm9zw6kgR2FyY8OtYQ==?= <jose@acme.com>\r\n\
          Subject: =?ISO-8859-1?Q?R=E9sum=E9_du_projet?=\r\n\
          Date: Thu, 08 Feb 2024 08:00:00 +0000\r\n\
          \r\n\
          Bonjour\r\n",
    );

    let record = extract_email(&path).unwrap();
    assert_eq!(record.subject, "Résumé du projet");
    assert!(record.sender.starts_with("José García"), "{}", record.sender);
}

#[test]
fn test_undeclared_latin1_is_decoded() {
    let dir = TempDir::new().unwrap();
    let path = write_email(
        &dir,
        "Acme/Website/6.eml",
        b"From: muller@acme.de\r\n\
          Subject: M\xfcller caf\xe9\r\n\
          Date: Fri, 09 Feb 2024 08:00:00 +0000\r\n\
          \r\n\
          Gr\xfc\xdfe\r\n",
    );

    let record = extract_email(&path).unwrap();
    assert_eq!(record.subject, "Müller café");
    assert_eq!(record.body, "Grüße");
}

// ─── Recipients and attachments for display ─────────────────────────

#[test]
fn test_load_message_keeps_recipients_and_attachments() {
    let dir = TempDir::new().unwrap();
    let path = write_email(
        &dir,
        "Acme/Website/7.eml",
        b"From: jane@acme.com\r\n\
          To: Bob <bob@acme.com>, carol@acme.com\r\n\
          Subject: Contract\r\n\
          Date: Fri, 09 Feb 2024 08:00:00 +0000\r\n\
          MIME-Version: 1.0\r\n\
          Content-Type: multipart/mixed; boundary=\"m\"\r\n\
          \r\n\
          --m\r\n\
          Content-Type: text/plain\r\n\
          \r\n\
          Signed copy attached.\r\n\
          --m\r\n\
          Content-Type: application/pdf; name=\"contract.pdf\"\r\n\
          Content-Disposition: attachment; filename=\"contract.pdf\"\r\n\
          Content-Transfer-Encoding: base64\r\n\
          \r\n\
          JVBERi0xLjQK\r\n\
          --m--\r\n",
    );

    let loaded = load_message(&path).unwrap();
    assert_eq!(loaded.record.body, "Signed copy attached.");
    assert_eq!(loaded.to.len(), 2);
    assert_eq!(loaded.to[0].address, "bob@acme.com");
    assert_eq!(loaded.attachments, vec!["contract.pdf".to_string()]);
}

// ─── Failures carry the path ────────────────────────────────────────

#[test]
fn test_garbage_file_fails_with_path() {
    let dir = TempDir::new().unwrap();
    let path = write_email(&dir, "Acme/Website/bad.eml", &[0x00, 0x9f, 0x92, 0x96, 0xff]);

    match extract_email(&path) {
        Err(EmlError::Parse { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected a parse error, got {other:?}"),
    }
}

// ─── Date parsing in multiple formats ───────────────────────────────

#[test]
fn test_date_parsing_formats() {
    // RFC 2822 with day-of-week
    let d1 = parse_date("Thu, 04 Jan 2024 10:00:00 +0000");
    assert!(d1.is_some(), "Failed to parse RFC 2822 date");

    // Without day-of-week
    let d2 = parse_date("04 Jan 2024 10:00:00 +0000");
    assert!(d2.is_some(), "Failed to parse date without day-of-week");

    // Named timezone
    let d3 = parse_date("Thu, 04 Jan 2024 10:00:00 CEST");
    assert!(d3.is_some(), "Failed to parse date with named timezone");

    // ISO 8601
    let d4 = parse_date("2024-01-04T10:00:00Z");
    assert!(d4.is_some(), "Failed to parse ISO 8601 date");

    assert!(parse_date("next tuesday").is_none());
}
