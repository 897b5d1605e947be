//! Email address extraction from `From:` / `To:` header values (RFC 5322 §3.4).

/// A mailbox taken from a header value.
///
/// # Examples
/// - `"Ana <ana+fa@example.org>"` → `display_name = "Ana"`, `address = "ana+fa@example.org"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare address (`local@domain`).
    pub address: String,
}

impl EmailAddress {
    /// Extract a single mailbox from a header value.
    ///
    /// Accepts `user@host`, `<user@host>`, `Name <user@host>` and
    /// `"Quoted, Name" <user@host>`. Returns `None` when nothing usable remains.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if close > open {
                let address = trimmed[open + 1..close].trim();
                if address.is_empty() {
                    return None;
                }
                return Some(Self {
                    display_name: strip_quotes(&trimmed[..open]),
                    address: address.to_string(),
                });
            }
        }

        Some(Self {
            display_name: String::new(),
            address: trimmed.to_string(),
        })
    }

    /// Split a comma-separated header value into mailboxes.
    ///
    /// Commas inside quotes or angle brackets do not separate entries.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;

        for ch in raw.chars() {
            match ch {
                '"' => in_quotes = !in_quotes,
                '<' if !in_quotes => in_angle = true,
                '>' if !in_quotes => in_angle = false,
                ',' if !in_quotes && !in_angle => {
                    results.extend(Self::parse(&current));
                    current.clear();
                    continue;
                }
                _ => {}
            }
            current.push(ch);
        }
        results.extend(Self::parse(&current));

        results
    }

    /// Everything before the last `@`, or the whole address if there is none.
    pub fn local_part(&self) -> &str {
        match self.address.rfind('@') {
            Some(at) => &self.address[..at],
            None => &self.address,
        }
    }
}

fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}
