//! SMTP service extensions and the capability table from the hello reply.

use std::collections::BTreeMap;

/// Typed view of one advertised keyword.
///
/// Only keywords this client may act on get their own variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// `STARTTLS` (RFC 3207).
    StartTls,
    /// `AUTH` with the mechanisms this client recognizes.
    Auth(Vec<AuthMechanism>),
    /// `SIZE`, with the limit in octets when one was given.
    Size(Option<usize>),
    /// `8BITMIME`
    EightBitMime,
    /// `PIPELINING`
    Pipelining,
    /// `CHUNKING` (RFC 3030).
    Chunking,
    /// `SMTPUTF8`
    SmtpUtf8,
    /// `DSN` (RFC 3461).
    Dsn,
    /// `BINARYMIME`
    BinaryMime,
    /// Any other keyword, kept with its arguments.
    Other {
        /// Upper-cased keyword.
        keyword: String,
        /// Arguments as advertised.
        args: Vec<String>,
    },
}

impl Extension {
    /// Parses one capability line such as `SIZE 35882577`.
    ///
    /// Returns `None` for a blank line.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let keyword = fields.next()?.to_uppercase();
        let args: Vec<&str> = fields.collect();
        Some(Self::from_keyword(&keyword, &args))
    }

    fn from_keyword(keyword: &str, args: &[&str]) -> Self {
        match keyword {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(args.iter().filter_map(|m| AuthMechanism::parse(m)).collect()),
            "SIZE" => Self::Size(args.first().and_then(|n| n.parse().ok())),
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "CHUNKING" => Self::Chunking,
            "SMTPUTF8" => Self::SmtpUtf8,
            "DSN" => Self::Dsn,
            "BINARYMIME" => Self::BinaryMime,
            _ => Self::Other {
                keyword: keyword.to_string(),
                args: args.iter().map(ToString::to_string).collect(),
            },
        }
    }
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN - plaintext authentication
    Plain,
    /// LOGIN - legacy plaintext
    Login,
    /// CRAM-MD5 - challenge-response
    CramMd5,
    /// `XOAUTH2` - `OAuth2` (Google/Microsoft)
    XOAuth2,
    /// `OAUTHBEARER` - RFC 7628 `OAuth2`
    OAuthBearer,
}

impl AuthMechanism {
    /// Parses an authentication mechanism name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            "CRAM-MD5" => Some(Self::CramMd5),
            "XOAUTH2" => Some(Self::XOAuth2),
            "OAUTHBEARER" => Some(Self::OAuthBearer),
            _ => None,
        }
    }

    /// Returns the mechanism name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::XOAuth2 => "XOAUTH2",
            Self::OAuthBearer => "OAUTHBEARER",
        }
    }
}

/// Capability table advertised in a hello reply.
///
/// Keys are upper-cased keywords. A value of `None` means the keyword was
/// advertised without arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    entries: BTreeMap<String, Option<Vec<String>>>,
}

impl Capabilities {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the table from the text lines of a hello reply.
    ///
    /// The first line carries the server's domain and greeting, not a
    /// capability, and is skipped.
    #[must_use]
    pub fn from_hello_lines(lines: &[String]) -> Self {
        let mut caps = Self::new();
        for line in lines.iter().skip(1) {
            caps.insert_line(line);
        }
        caps
    }

    /// Adds one capability line such as `AUTH PLAIN LOGIN`.
    pub fn insert_line(&mut self, line: &str) {
        let mut fields = line.split_whitespace();
        let Some(name) = fields.next() else {
            return;
        };
        let args: Vec<String> = fields.map(str::to_string).collect();
        let value = if args.is_empty() { None } else { Some(args) };
        self.entries.insert(name.to_uppercase(), value);
    }

    /// Returns true if `keyword` was advertised (case-insensitive).
    #[must_use]
    pub fn contains(&self, keyword: &str) -> bool {
        self.entries.contains_key(&keyword.to_uppercase())
    }

    /// Returns the arguments advertised for `keyword`.
    ///
    /// `Some(None)` means the keyword was advertised without arguments.
    #[must_use]
    pub fn get(&self, keyword: &str) -> Option<Option<&[String]>> {
        self.entries
            .get(&keyword.to_uppercase())
            .map(|args| args.as_deref())
    }

    /// Returns true if no capability was advertised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of advertised keywords.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates over keywords and their arguments in keyword order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&[String]>)> {
        self.entries
            .iter()
            .map(|(name, args)| (name.as_str(), args.as_deref()))
    }

    /// Returns the typed view of every advertised keyword.
    pub fn extensions(&self) -> impl Iterator<Item = Extension> + '_ {
        self.entries.iter().map(|(name, args)| {
            let args: Vec<&str> = args
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(String::as_str)
                .collect();
            Extension::from_keyword(name, &args)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    mod extension_parse_tests {
        use super::*;

        #[test]
        fn parse_is_case_insensitive() {
            assert_eq!(Extension::parse("starttls"), Some(Extension::StartTls));
            assert_eq!(Extension::parse("8bitmime"), Some(Extension::EightBitMime));
            assert_eq!(Extension::parse("Chunking"), Some(Extension::Chunking));
        }

        #[test]
        fn parse_auth_keeps_known_mechanisms() {
            assert_eq!(
                Extension::parse("AUTH PLAIN GSSAPI LOGIN"),
                Some(Extension::Auth(vec![AuthMechanism::Plain, AuthMechanism::Login]))
            );
        }

        #[test]
        fn parse_size_limit() {
            assert_eq!(Extension::parse("SIZE 52428800"), Some(Extension::Size(Some(52_428_800))));
            assert_eq!(Extension::parse("SIZE"), Some(Extension::Size(None)));
            assert_eq!(Extension::parse("SIZE lots"), Some(Extension::Size(None)));
        }

        #[test]
        fn parse_other_and_blank() {
            assert_eq!(
                Extension::parse("x-custom a b"),
                Some(Extension::Other {
                    keyword: "X-CUSTOM".to_string(),
                    args: vec!["a".to_string(), "b".to_string()],
                })
            );
            assert_eq!(Extension::parse("   "), None);
        }
    }

    mod auth_mechanism_tests {
        use super::*;

        #[test]
        fn parse_round_trip() {
            for mech in [
                AuthMechanism::Plain,
                AuthMechanism::Login,
                AuthMechanism::CramMd5,
                AuthMechanism::XOAuth2,
                AuthMechanism::OAuthBearer,
            ] {
                assert_eq!(AuthMechanism::parse(mech.as_str()), Some(mech));
            }
            assert_eq!(AuthMechanism::parse("login"), Some(AuthMechanism::Login));
            assert_eq!(AuthMechanism::parse("UNKNOWN"), None);
        }
    }

    mod capabilities_tests {
        use super::*;

        fn hello_lines() -> Vec<String> {
            [
                "smtp.example.com Hello client.example.com",
                "SIZE 35882577",
                "8bitmime",
                "AUTH LOGIN PLAIN",
                "STARTTLS",
                "",
            ]
            .iter()
            .map(ToString::to_string)
            .collect()
        }

        #[test]
        fn from_hello_lines_skips_greeting() {
            let caps = Capabilities::from_hello_lines(&hello_lines());
            assert_eq!(caps.len(), 4);
            assert!(!caps.contains("SMTP.EXAMPLE.COM"));
        }

        #[test]
        fn keywords_are_uppercased() {
            let caps = Capabilities::from_hello_lines(&hello_lines());
            assert!(caps.contains("8BITMIME"));
            assert!(caps.contains("8bitmime"));
        }

        #[test]
        fn arguments_or_presence() {
            let caps = Capabilities::from_hello_lines(&hello_lines());
            assert_eq!(
                caps.get("AUTH"),
                Some(Some(&["LOGIN".to_string(), "PLAIN".to_string()][..]))
            );
            assert_eq!(caps.get("STARTTLS"), Some(None));
            assert_eq!(caps.get("PIPELINING"), None);
        }

        #[test]
        fn typed_extensions() {
            let caps = Capabilities::from_hello_lines(&hello_lines());
            let exts: Vec<Extension> = caps.extensions().collect();
            assert!(exts.contains(&Extension::StartTls));
            assert!(exts.contains(&Extension::Size(Some(35_882_577))));
            assert!(exts.contains(&Extension::Auth(vec![
                AuthMechanism::Login,
                AuthMechanism::Plain
            ])));
        }
    }
}
