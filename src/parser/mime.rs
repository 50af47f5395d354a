//! MIME body handling: picking the primary text part and flattening HTML.

use mail_parser::{Message, MimeHeaders, PartType};

/// Primary text body of a parsed message.
///
/// Prefers the first `text/plain` part; falls back to the first `text/html`
/// part converted to text. A message with neither yields an empty string.
pub fn primary_text(msg: &Message<'_>) -> String {
    match msg.text_bodies().next().map(|part| &part.body) {
        Some(PartType::Text(text)) => text.trim_end().to_string(),
        Some(PartType::Html(html)) => html_to_text(html),
        _ => msg
            .body_html(0)
            .map(|html| html_to_text(&html))
            .unwrap_or_default(),
    }
}

/// File names of the attachments of a parsed message.
pub fn attachment_names(msg: &Message<'_>) -> Vec<String> {
    msg.attachments()
        .enumerate()
        .map(|(idx, part)| {
            part.attachment_name()
                .map(String::from)
                .unwrap_or_else(|| format!("attachment_{idx}"))
        })
        .collect()
}

/// Convert HTML to plain text for indexing and display.
///
/// Block elements become line breaks, `<script>`/`<style>` blocks are dropped,
/// remaining tags are stripped and common entities decoded. Runs of blank
/// lines collapse to one.
pub fn html_to_text(html: &str) -> String {
    let without_code = remove_tag_block(&remove_tag_block(html, "script"), "style");

    let mut flat = String::with_capacity(without_code.len());
    let mut tag = String::new();
    let mut in_tag = false;
    for ch in without_code.chars() {
        match ch {
            '<' => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                if is_block_tag(&tag) {
                    flat.push('\n');
                }
            }
            _ if in_tag => tag.push(ch),
            _ => flat.push(ch),
        }
    }

    let decoded = decode_entities(&flat);

    let mut cleaned = String::with_capacity(decoded.len());
    let mut prev_blank = false;
    for line in decoded.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !prev_blank && !cleaned.is_empty() {
                cleaned.push('\n');
            }
            prev_blank = true;
        } else {
            cleaned.push_str(line);
            cleaned.push('\n');
            prev_blank = false;
        }
    }
    cleaned.trim().to_string()
}

fn is_block_tag(tag: &str) -> bool {
    let name = tag
        .trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    matches!(
        name.as_str(),
        "br" | "p" | "div" | "tr" | "li" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "table"
    )
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Remove every `<tag …>…</tag>` block, case-insensitively.
fn remove_tag_block(html: &str, tag: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let mut result = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(start) = lower[pos..].find(&open).map(|i| pos + i) {
        result.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(end) => pos = start + end + close.len(),
            None => {
                pos = html.len();
                break;
            }
        }
    }
    result.push_str(&html[pos..]);
    result
}
