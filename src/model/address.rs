//! Sender addresses (RFC 5322 §3.4) and their display form.

/// A single mailbox: optional display name plus address.
///
/// # Examples
/// - `"Alice Smith <alice@example.com>"` → `display_name = "Alice Smith"`, `address = "alice@example.com"`
/// - `"bob@example.com"` → `display_name = ""`, `address = "bob@example.com"`
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`).
    pub address: String,
}

impl EmailAddress {
    /// Build from the fields `mail-parser` exposes for an `Addr`.
    pub fn from_parts(name: Option<&str>, address: Option<&str>) -> Self {
        Self {
            display_name: name.map(|n| unquote(n).to_string()).unwrap_or_default(),
            address: address.map(|a| a.trim().to_string()).unwrap_or_default(),
        }
    }

    /// Parse one mailbox from its display form.
    ///
    /// Accepts `user@domain`, `<user@domain>`, `Name <user@domain>` and
    /// `"Last, First" <user@domain>`. Anything else is kept verbatim as the address.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let angle = trimmed
            .rfind('<')
            .zip(trimmed.rfind('>'))
            .filter(|(open, close)| close > open);

        match angle {
            Some((open, close)) => Self {
                display_name: unquote(&trimmed[..open]).to_string(),
                address: trimmed[open + 1..close].trim().to_string(),
            },
            None => Self {
                display_name: String::new(),
                address: trimmed.to_string(),
            },
        }
    }

    /// Split a rendered sender list (`a, "Last, First" <b@c>`) back into mailboxes.
    ///
    /// Commas inside quotes or angle brackets do not separate entries.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut start = 0;
        let mut in_quotes = false;
        let mut in_angle = false;

        for (i, ch) in raw.char_indices() {
            match ch {
                '"' => in_quotes = !in_quotes,
                '<' if !in_quotes => in_angle = true,
                '>' if !in_quotes => in_angle = false,
                ',' if !in_quotes && !in_angle => {
                    results.push(Self::parse(&raw[start..i]));
                    start = i + 1;
                }
                _ => {}
            }
        }
        results.push(Self::parse(&raw[start..]));
        results.retain(|a| !a.address.is_empty());
        results
    }

    /// Render several mailboxes as one sender string, joined with `", "`.
    pub fn render_list(addresses: &[Self]) -> String {
        addresses
            .iter()
            .map(Self::display)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Format for display: `"Display Name <address>"` or just `"address"`.
    pub fn display(&self) -> String {
        match (self.display_name.is_empty(), self.address.is_empty()) {
            (true, _) => self.address.clone(),
            (false, true) => self.display_name.clone(),
            (false, false) => format!("{} <{}>", self.display_name, self.address),
        }
    }
}

/// Trim whitespace and one pair of surrounding double quotes.
fn unquote(s: &str) -> &str {
    let trimmed = s.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .map(str::trim)
        .unwrap_or(trimmed)
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_address() {
        let addr = EmailAddress::parse("alice@example.com");
        assert_eq!(addr.address, "alice@example.com");
        assert_eq!(addr.display_name, "");
    }

    #[test]
    fn test_parse_name_and_address() {
        let addr = EmailAddress::parse("Sender Name <sender1@example.com>");
        assert_eq!(addr.address, "sender1@example.com");
        assert_eq!(addr.display_name, "Sender Name");
    }

    #[test]
    fn test_parse_quoted_name() {
        let addr = EmailAddress::parse("\"Last, First\" <user@example.com>");
        assert_eq!(addr.display_name, "Last, First");
        assert_eq!(addr.address, "user@example.com");
    }

    #[test]
    fn test_parse_list_keeps_quoted_commas() {
        let list = EmailAddress::parse_list("\"Last, First\" <a@b.com>, other@c.com");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].display_name, "Last, First");
        assert_eq!(list[1].address, "other@c.com");
    }

    #[test]
    fn test_render_list_roundtrips_through_parse_list() {
        let list = vec![
            EmailAddress::from_parts(Some("Alice"), Some("alice@x.com")),
            EmailAddress::from_parts(None, Some("bob@x.com")),
        ];
        let rendered = EmailAddress::render_list(&list);
        assert_eq!(rendered, "Alice <alice@x.com>, bob@x.com");
        assert_eq!(EmailAddress::parse_list(&rendered), list);
    }

    #[test]
    fn test_display_name_only() {
        let addr = EmailAddress::from_parts(Some("\"Undisclosed\""), None);
        assert_eq!(addr.display(), "Undisclosed");
    }

    #[test]
    fn test_parse_empty() {
        assert!(EmailAddress::parse_list("  ").is_empty());
    }
}
