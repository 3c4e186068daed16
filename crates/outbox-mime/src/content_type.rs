//! `Content-Type` values.

use std::collections::BTreeMap;
use std::fmt;

/// Characters that force a parameter value into quotes (RFC 2045 `tspecials`).
const TSPECIALS: &str = "()<>@,;:\\\"/[]?=";

/// A media type plus parameters, e.g. `text/plain; charset=utf-8`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    essence: String,
    parameters: BTreeMap<String, String>,
}

impl ContentType {
    /// Creates a content type from `type/subtype`. Lower-cased.
    #[must_use]
    pub fn new(essence: &str) -> Self {
        Self {
            essence: essence.trim().to_ascii_lowercase(),
            parameters: BTreeMap::new(),
        }
    }

    /// `text/plain; charset=...`
    #[must_use]
    pub fn text_plain(charset: &str) -> Self {
        Self::new("text/plain").with_parameter("charset", charset)
    }

    /// `text/html; charset=...`
    #[must_use]
    pub fn text_html(charset: &str) -> Self {
        Self::new("text/html").with_parameter("charset", charset)
    }

    /// `multipart/alternative; boundary="..."`
    #[must_use]
    pub fn multipart_alternative(boundary: impl Into<String>) -> Self {
        Self::new("multipart/alternative").with_parameter("boundary", boundary)
    }

    /// Sets a parameter. Names are lower-cased.
    #[must_use]
    pub fn with_parameter(mut self, name: &str, value: impl Into<String>) -> Self {
        self.parameters.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// The `type/subtype` part.
    #[must_use]
    pub fn essence(&self) -> &str {
        &self.essence
    }

    /// Looks up a parameter.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The `charset` parameter.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameter("charset")
    }

    /// The `boundary` parameter.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameter("boundary")
    }

    /// True for `multipart/*`.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.essence.starts_with("multipart/")
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.essence)?;
        for (name, value) in &self.parameters {
            let quote = name == "boundary"
                || value.is_empty()
                || value.contains(|c: char| c.is_whitespace() || TSPECIALS.contains(c));
            if quote {
                let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "; {name}=\"{escaped}\"")?;
            } else {
                write!(f, "; {name}={value}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_text_types() {
        assert_eq!(ContentType::text_plain("utf-8").to_string(), "text/plain; charset=utf-8");
        assert_eq!(
            ContentType::text_html("ISO-8859-1").to_string(),
            "text/html; charset=ISO-8859-1"
        );
        assert_eq!(ContentType::text_plain("utf-8").charset(), Some("utf-8"));
        assert!(!ContentType::text_plain("utf-8").is_multipart());
    }

    #[test]
    fn test_boundary_always_quoted() {
        let ct = ContentType::multipart_alternative("b1_abc");
        assert!(ct.is_multipart());
        assert_eq!(ct.essence(), "multipart/alternative");
        assert_eq!(ct.boundary(), Some("b1_abc"));
        assert_eq!(ct.to_string(), "multipart/alternative; boundary=\"b1_abc\"");
    }

    #[test]
    fn test_parameter_quoting() {
        let ct = ContentType::new("Text/Plain").with_parameter("Name", "a \"b\".txt");
        assert_eq!(ct.parameter("name"), Some("a \"b\".txt"));
        assert_eq!(ct.to_string(), "text/plain; name=\"a \\\"b\\\".txt\"");
    }
}
