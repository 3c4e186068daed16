//! SMTP connection management with type-state pattern.

mod client;
mod stream;

pub use client::{Authenticated, Client, Connected, MailTransaction};
pub use stream::{SmtpStream, connect, connect_tls};

use crate::types::{AuthMechanism, Capabilities, Extension};

/// What the server told us about itself.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Domain from the greeting, replaced by the one in the hello reply.
    pub hostname: String,
    /// Capabilities from the last hello reply.
    pub capabilities: Capabilities,
    /// True if the server accepted EHLO, false after a HELO fallback.
    pub esmtp: bool,
}

impl ServerInfo {
    /// Checks if the server advertised `keyword`.
    #[must_use]
    pub fn supports(&self, keyword: &str) -> bool {
        self.capabilities.contains(keyword)
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports("STARTTLS")
    }

    /// Returns the maximum message size, if advertised.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.capabilities
            .get("SIZE")
            .flatten()
            .and_then(|args| args.first())
            .and_then(|size| size.parse().ok())
    }

    /// Returns supported authentication mechanisms.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        self.capabilities
            .get("AUTH")
            .flatten()
            .map(|args| args.iter().filter_map(|m| AuthMechanism::parse(m)).collect())
            .unwrap_or_default()
    }

    /// Returns the typed extensions.
    #[must_use]
    pub fn extensions(&self) -> Vec<Extension> {
        self.capabilities.extensions().collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn info(lines: &[&str]) -> ServerInfo {
        let lines: Vec<String> = lines.iter().map(ToString::to_string).collect();
        ServerInfo {
            hostname: "mx.example.com".into(),
            capabilities: Capabilities::from_hello_lines(&lines),
            esmtp: true,
        }
    }

    #[test]
    fn test_server_info_queries() {
        let info = info(&["mx.example.com hi", "SIZE 1024", "AUTH PLAIN LOGIN", "starttls"]);
        assert!(info.supports_starttls());
        assert_eq!(info.max_message_size(), Some(1024));
        assert_eq!(
            info.auth_mechanisms(),
            vec![AuthMechanism::Plain, AuthMechanism::Login]
        );
        assert_eq!(info.extensions().len(), 3);
    }

    #[test]
    fn test_server_info_without_extensions() {
        let info = info(&["mx.example.com hi", "SIZE"]);
        assert!(!info.supports_starttls());
        assert_eq!(info.max_message_size(), None);
        assert!(info.auth_mechanisms().is_empty());
    }
}
