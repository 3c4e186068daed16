//! Envelope address types.

use crate::error::{Error, Result};

/// Maximum length of a forward or reverse path (RFC 5321 section 4.5.3.1.3).
const MAX_PATH_LENGTH: usize = 254;

/// Email address for the SMTP envelope (`MAIL FROM` / `RCPT TO`).
///
/// Only checks what the envelope needs to stay well-formed on the wire;
/// mailbox syntax is validated by the message composer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the domain part.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.rsplit_once('@').map_or("", |(_, domain)| domain)
    }

    fn validate(addr: &str) -> Result<()> {
        match Self::problem(addr) {
            Some(reason) => Err(Error::InvalidAddress(format!("{addr:?}: {reason}"))),
            None => Ok(()),
        }
    }

    // Anything that could end or extend the command line is refused.
    fn problem(addr: &str) -> Option<&'static str> {
        if addr.len() > MAX_PATH_LENGTH {
            return Some("longer than 254 bytes");
        }
        if addr
            .chars()
            .any(|c| c.is_control() || c.is_whitespace() || matches!(c, '<' | '>'))
        {
            return Some("contains whitespace, control or angle bracket characters");
        }
        match addr.split_once('@') {
            None => Some("missing @"),
            Some((_, domain)) if domain.contains('@') => Some("more than one @"),
            Some((local, domain)) if local.is_empty() || domain.is_empty() => {
                Some("empty local part or domain")
            }
            Some(_) => None,
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
