//! MIME header handling.

use crate::address::clean_header_value;
use std::fmt;

/// Ordered collection of email headers.
///
/// Headers keep insertion order. Values never contain CR or LF: both are
/// removed on insertion, so a value cannot start a new header line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header.
    pub fn add(&mut self, name: impl Into<String>, value: impl AsRef<str>) {
        self.headers
            .push((name.into(), clean_header_value(value.as_ref())));
    }

    /// Gets the first value for a header (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the header names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.headers.iter().map(|(n, _)| n.as_str())
    }

    /// Returns an iterator over all headers.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Returns the number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.headers {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_headers_new() {
        let headers = Headers::new();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain")); // Case insensitive
        assert_eq!(headers.get("Subject"), None);
    }

    #[test]
    fn test_headers_keep_order() {
        let mut headers = Headers::new();
        headers.add("To", "b@example.com");
        headers.add("From", "a@example.com");
        headers.add("Subject", "Hi");
        assert_eq!(headers.names().collect::<Vec<_>>(), ["To", "From", "Subject"]);
        assert_eq!(
            headers.to_string(),
            "To: b@example.com\r\nFrom: a@example.com\r\nSubject: Hi\r\n"
        );
    }

    #[test]
    fn test_header_injection_stripped() {
        let mut headers = Headers::new();
        headers.add("Subject", "Hello\r\nBcc: victim@example.com");
        assert_eq!(headers.get("Subject"), Some("HelloBcc: victim@example.com"));
        assert_eq!(headers.to_string().matches("\r\n").count(), 1);
    }

    proptest! {
        #[test]
        fn prop_values_never_break_lines(value in "(\\PC|\r|\n){0,100}") {
            let mut headers = Headers::new();
            headers.add("X-Test", &value);
            let rendered = headers.to_string();
            prop_assert!(rendered.ends_with("\r\n"));
            prop_assert_eq!(rendered.matches('\r').count(), 1);
            prop_assert_eq!(rendered.matches('\n').count(), 1);
        }
    }
}
