//! Mailboxes and address validation.

use crate::encoding::{encode_rfc2047, needs_encoding};
use crate::error::{Error, Result};
use std::fmt;

/// Maximum length of a whole address (RFC 5321 section 4.5.3.1.3).
const MAX_ADDRESS_LENGTH: usize = 254;
/// Maximum length of the local part (RFC 5321 section 4.5.3.1.1).
const MAX_LOCAL_LENGTH: usize = 64;
/// Maximum length of one domain label.
const MAX_LABEL_LENGTH: usize = 63;

/// Characters that force a display name into a quoted string (RFC 5322).
const SPECIALS: &[char] = &['(', ')', '<', '>', '[', ']', ':', ';', '@', '\\', ',', '.', '"'];

/// Checks `address` against the RFC 5321 mailbox shape.
///
/// # Errors
///
/// Returns [`Error::InvalidAddress`] naming the first rule that failed.
pub fn validate_address(address: &str) -> Result<()> {
    let fail = |reason| Err(Error::invalid_address(address, reason));

    if address.is_empty() {
        return fail("address is empty");
    }
    if address.len() > MAX_ADDRESS_LENGTH {
        return fail("address is longer than 254 bytes");
    }
    if address
        .chars()
        .any(|c| c.is_control() || c.is_whitespace())
    {
        return fail("address contains whitespace or control characters");
    }

    let Some((local, domain)) = address.rsplit_once('@') else {
        return fail("address has no @");
    };
    if local.contains('@') {
        return fail("address has more than one @");
    }

    validate_local_part(local)
        .and_then(|()| validate_domain(domain))
        .map_err(|reason| Error::invalid_address(address, reason))
}

fn validate_local_part(local: &str) -> std::result::Result<(), &'static str> {
    if local.is_empty() {
        return Err("local part is empty");
    }
    if local.len() > MAX_LOCAL_LENGTH {
        return Err("local part is longer than 64 bytes");
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return Err("local part has a misplaced dot");
    }
    if !local.chars().all(is_atext_or_dot) {
        return Err("local part contains an invalid character");
    }
    Ok(())
}

const fn is_atext_or_dot(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '/' | '=' | '?' | '^' | '_'
                | '`' | '{' | '|' | '}' | '~' | '.'
        )
}

fn validate_domain(domain: &str) -> std::result::Result<(), &'static str> {
    if domain.is_empty() {
        return Err("domain is empty");
    }

    if let Some(literal) = domain.strip_prefix('[') {
        let Some(inner) = literal.strip_suffix(']') else {
            return Err("address literal is not closed");
        };
        if inner.is_empty() || inner.contains(['[', ']', '\\']) {
            return Err("address literal is malformed");
        }
        return Ok(());
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err("domain needs at least two labels");
    }
    for label in labels {
        if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
            return Err("domain label must be 1 to 63 characters");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err("domain label starts or ends with a hyphen");
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err("domain label contains an invalid character");
        }
    }
    Ok(())
}

/// A mailbox with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mailbox {
    address: String,
    name: Option<String>,
}

impl Mailbox {
    /// Creates a mailbox after validating `address`.
    ///
    /// Surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(address: impl AsRef<str>) -> Result<Self> {
        let address = address.as_ref().trim();
        validate_address(address)?;
        Ok(Self {
            address: address.to_string(),
            name: None,
        })
    }

    /// Creates a mailbox with a display name.
    ///
    /// CR and LF are removed from the name and it is trimmed; an empty name
    /// is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn with_name(address: impl AsRef<str>, name: impl AsRef<str>) -> Result<Self> {
        let mut mailbox = Self::new(address)?;
        let name = clean_header_value(name.as_ref());
        mailbox.name = (!name.is_empty()).then_some(name);
        Ok(mailbox)
    }

    /// Returns the bare address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the display name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Renders the mailbox for a header, encoding the name with `charset`.
    #[must_use]
    pub fn render(&self, charset: &str) -> String {
        match &self.name {
            None => self.address.clone(),
            Some(name) if needs_encoding(name) => {
                format!("{} <{}>", encode_rfc2047(name, charset), self.address)
            }
            Some(name) if name.contains(SPECIALS) => {
                let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{escaped}\" <{}>", self.address)
            }
            Some(name) => format!("{name} <{}>", self.address),
        }
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render("utf-8"))
    }
}

/// Removes CR and LF and trims surrounding whitespace.
pub(crate) fn clean_header_value(value: &str) -> String {
    value.replace(['\r', '\n'], "").trim().to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_addresses() {
        for addr in [
            "user@example.com",
            "first.last+tag@sub.example.co.uk",
            "o'brien@example.org",
            "x@[192.0.2.1]",
            "a-b@my-host.example",
        ] {
            assert!(validate_address(addr).is_ok(), "{addr} should be valid");
        }
    }

    #[test]
    fn test_invalid_addresses() {
        for addr in [
            "",
            "userexample.com",
            "user@",
            "@example.com",
            "user@localhost",
            "a@b@example.com",
            ".user@example.com",
            "us..er@example.com",
            "user.@example.com",
            "user@-example.com",
            "user@example-.com",
            "user@exa_mple.com",
            "us er@example.com",
            "user@example.com\r\nBcc: x@y.com",
            "user@[1.2.3.4",
            "usér@example.com",
        ] {
            assert!(validate_address(addr).is_err(), "{addr:?} should be invalid");
        }
    }

    #[test]
    fn test_length_limits() {
        let local = "a".repeat(65);
        assert!(validate_address(&format!("{local}@example.com")).is_err());
        let label = "b".repeat(63);
        let long = format!("a@{label}.{label}.{label}.{label}.com");
        assert!(long.len() > 254);
        assert!(validate_address(&long).is_err());
        assert!(validate_address(&format!("a@{label}.com")).is_ok());
    }

    #[test]
    fn test_error_names_reason() {
        let err = validate_address("user@localhost").unwrap_err();
        assert!(err.to_string().contains("two labels"));
    }

    #[test]
    fn test_mailbox_trims_address() {
        let mailbox = Mailbox::new("  user@example.com ").unwrap();
        assert_eq!(mailbox.address(), "user@example.com");
        assert_eq!(mailbox.name(), None);
        assert_eq!(mailbox.to_string(), "user@example.com");
    }

    #[test]
    fn test_display_name_cleaned() {
        let mailbox = Mailbox::with_name("user@example.com", " Jane\r\n Doe ").unwrap();
        assert_eq!(mailbox.name(), Some("Jane Doe"));
        assert_eq!(mailbox.to_string(), "Jane Doe <user@example.com>");

        let mailbox = Mailbox::with_name("user@example.com", "\r\n").unwrap();
        assert_eq!(mailbox.name(), None);
    }

    #[test]
    fn test_display_name_quoted() {
        let mailbox = Mailbox::with_name("user@example.com", "Doe, Jane \"JD\"").unwrap();
        assert_eq!(
            mailbox.to_string(),
            "\"Doe, Jane \\\"JD\\\"\" <user@example.com>"
        );
    }

    #[test]
    fn test_display_name_encoded() {
        let mailbox = Mailbox::with_name("user@example.com", "Jürgen").unwrap();
        assert_eq!(mailbox.render("utf-8"), "=?utf-8?B?SsO8cmdlbg==?= <user@example.com>");
    }

    proptest! {
        #[test]
        fn prop_simple_addresses_valid(
            local in "[a-z0-9]{1,20}(\\.[a-z0-9]{1,10}){0,2}",
            domain in "[a-z0-9]{1,20}\\.[a-z]{2,6}",
        ) {
            let address = format!("{local}@{domain}");
            prop_assert!(validate_address(&address).is_ok());
        }

        #[test]
        fn prop_line_breaks_rejected(
            before in "[a-z]{1,10}@[a-z]{1,10}\\.com",
            after in "[a-zA-Z: ]{0,20}",
            brk in prop::sample::select(vec!["\r", "\n", "\r\n"]),
        ) {
            let address = format!("{before}{brk}{after}");
            prop_assert!(validate_address(&address).is_err());
        }
    }
}
