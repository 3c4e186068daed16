//! Transport configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ErrorKind, SendError};

/// Seconds allowed for the connect and for each read or write.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HELO name used when neither the configuration nor the system has one.
const FALLBACK_HELO_NAME: &str = "localhost.localdomain";

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// Plaintext for the whole session.
    #[default]
    None,
    /// Plaintext connect, then upgrade with STARTTLS.
    StartTls,
    /// TLS from the first byte.
    Tls,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Tls => 465,
        }
    }

    /// Maps a host-entry scheme to a mode.
    ///
    /// `ssl` and `smtps` mean implicit TLS, `tls` means STARTTLS.
    #[must_use]
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "ssl" | "smtps" => Some(Self::Tls),
            "tls" => Some(Self::StartTls),
            _ => None,
        }
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::StartTls => write!(f, "starttls"),
            Self::Tls => write!(f, "tls"),
        }
    }
}

/// SASL mechanism used to log in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// `AUTH LOGIN`.
    #[default]
    Login,
    /// `AUTH PLAIN` with an initial response.
    Plain,
}

/// Username and password for SMTP authentication.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One server from the `;`-separated host list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    /// Hostname or IP address, without brackets.
    pub host: String,
    /// Port to dial.
    pub port: u16,
    /// Security mode for this server.
    pub security: Security,
}

impl HostEntry {
    /// Parses `[scheme://]host[:port]`.
    ///
    /// Without a scheme the entry uses `default_security`; without a port it
    /// uses `default_port`. IPv6 literals go in brackets (`[::1]:25`).
    /// Returns `None` for an empty host, an unknown scheme or a bad port.
    #[must_use]
    pub fn parse(entry: &str, default_port: u16, default_security: Security) -> Option<Self> {
        let entry = entry.trim();

        let (security, rest) = match entry.split_once("://") {
            Some((scheme, rest)) => (Security::from_scheme(scheme)?, rest),
            None => (default_security, entry),
        };

        let (host, port) = if let Some(literal) = rest.strip_prefix('[') {
            let (host, after) = literal.split_once(']')?;
            let port = match after {
                "" => None,
                after => Some(after.strip_prefix(':')?),
            };
            (host, port)
        } else {
            match rest.rsplit_once(':') {
                Some((host, port)) if !host.contains(':') => (host, Some(port)),
                _ => (rest, None),
            }
        };

        if host.is_empty() || host.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return None;
        }
        let port = match port {
            Some(port) => port.parse().ok().filter(|&p| p != 0)?,
            None => default_port,
        };

        Some(Self {
            host: host.to_string(),
            port,
            security,
        })
    }
}

impl fmt::Display for HostEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// How to reach and talk to the submission server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// One or more servers, `;`-separated, each `[scheme://]host[:port]`.
    /// They are tried in order until one completes the greeting.
    pub host: String,
    /// Port for entries that do not name one.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Security for entries without a scheme.
    #[serde(default)]
    pub security: Security,
    /// Deadline for the connect and for every read and write.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Logs in when set.
    #[serde(default)]
    pub credentials: Option<Credentials>,
    /// Mechanism for [`credentials`](Self::credentials).
    #[serde(default)]
    pub auth_method: AuthMethod,
    /// Parameters appended to every `RCPT TO`, e.g. `NOTIFY=SUCCESS,FAILURE`.
    #[serde(default)]
    pub dsn: Option<String>,
    /// Name announced in EHLO/HELO. Defaults to the local hostname.
    #[serde(default)]
    pub helo_name: Option<String>,
    /// Skips certificate verification. Only for testing.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

const fn default_port() -> u16 {
    Security::None.default_port()
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl TransportConfig {
    /// Creates a plaintext configuration on port 25.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self::builder(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> TransportConfigBuilder {
        TransportConfigBuilder::new(host)
    }

    /// The I/O deadline as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parses the host list, skipping entries that do not parse.
    #[must_use]
    pub fn hosts(&self) -> Vec<HostEntry> {
        self.host
            .split(';')
            .filter(|entry| !entry.trim().is_empty())
            .filter_map(|entry| {
                let parsed = HostEntry::parse(entry, self.port, self.security);
                if parsed.is_none() {
                    warn!(entry, "Skipping malformed SMTP host entry");
                }
                parsed
            })
            .collect()
    }

    /// Checks the settings that are written into SMTP commands.
    ///
    /// The HELO name must be a single token; DSN parameters may contain
    /// spaces but no control characters.
    ///
    /// # Errors
    ///
    /// Returns a [`ErrorKind::Validation`] error naming the bad setting.
    pub fn validate(&self) -> Result<(), SendError> {
        if let Some(name) = self.helo_name.as_deref().map(str::trim) {
            if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
                return Err(SendError::new(
                    ErrorKind::Validation,
                    format!("HELO name {name:?} contains whitespace or control characters"),
                ));
            }
        }
        if let Some(dsn) = &self.dsn {
            if dsn.chars().any(char::is_control) {
                return Err(SendError::new(
                    ErrorKind::Validation,
                    format!("DSN parameters {dsn:?} contain control characters"),
                ));
            }
        }
        Ok(())
    }

    /// Name to announce in EHLO/HELO.
    #[must_use]
    pub fn helo_name(&self) -> String {
        self.helo_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(ToString::to_string)
            .or_else(|| {
                hostname::get()
                    .ok()
                    .and_then(|name| name.into_string().ok())
                    .filter(|name| !name.is_empty())
            })
            .unwrap_or_else(|| FALLBACK_HELO_NAME.to_string())
    }
}

/// Builder for [`TransportConfig`].
#[derive(Debug, Clone)]
pub struct TransportConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    timeout: Duration,
    credentials: Option<Credentials>,
    auth_method: AuthMethod,
    dsn: Option<String>,
    helo_name: Option<String>,
    accept_invalid_certs: bool,
}

impl TransportConfigBuilder {
    /// Creates a new builder with the given host list.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            credentials: None,
            auth_method: AuthMethod::Login,
            dsn: None,
            helo_name: None,
            accept_invalid_certs: false,
        }
    }

    /// Sets the port. Defaults to the security mode's port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the I/O deadline. Rounded down to whole seconds, at least one.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Logs in with `username` and `password`.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Sets the SASL mechanism.
    #[must_use]
    pub const fn auth_method(mut self, method: AuthMethod) -> Self {
        self.auth_method = method;
        self
    }

    /// Sets the parameters appended to every `RCPT TO`.
    #[must_use]
    pub fn dsn(mut self, params: impl Into<String>) -> Self {
        let params = params.into();
        self.dsn = (!params.trim().is_empty()).then(|| params.trim().to_string());
        self
    }

    /// Sets the name announced in EHLO/HELO.
    #[must_use]
    pub fn helo_name(mut self, name: impl Into<String>) -> Self {
        self.helo_name = Some(name.into());
        self
    }

    /// Skips certificate verification.
    #[must_use]
    pub const fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> TransportConfig {
        TransportConfig {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            timeout_secs: self.timeout.as_secs().max(1),
            credentials: self.credentials,
            auth_method: self.auth_method,
            dsn: self.dsn,
            helo_name: self.helo_name,
            accept_invalid_certs: self.accept_invalid_certs,
        }
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

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 25);
        assert_eq!(Security::StartTls.default_port(), 587);
        assert_eq!(Security::Tls.default_port(), 465);
    }

    #[test]
    fn test_builder_defaults() {
        let config = TransportConfig::new("smtp.example.com");
        assert_eq!(config.port, 25);
        assert_eq!(config.security, Security::None);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.credentials.is_none());
        assert_eq!(config.auth_method, AuthMethod::Login);
        assert!(!config.accept_invalid_certs);
    }

    #[test]
    fn test_builder_port_follows_security() {
        let config = TransportConfig::builder("smtp.example.com")
            .security(Security::Tls)
            .build();
        assert_eq!(config.port, 465);

        let config = TransportConfig::builder("smtp.example.com")
            .security(Security::Tls)
            .port(2465)
            .build();
        assert_eq!(config.port, 2465);
    }

    #[test]
    fn test_builder_all_fields() {
        let config = TransportConfig::builder("smtp.example.com")
            .security(Security::StartTls)
            .timeout(Duration::from_millis(2500))
            .credentials("user", "secret")
            .auth_method(AuthMethod::Plain)
            .dsn(" NOTIFY=FAILURE ")
            .helo_name("web.example.com")
            .accept_invalid_certs(true)
            .build();
        assert_eq!(config.port, 587);
        assert_eq!(config.timeout_secs, 2);
        assert_eq!(config.credentials.as_ref().unwrap().username, "user");
        assert_eq!(config.auth_method, AuthMethod::Plain);
        assert_eq!(config.dsn.as_deref(), Some("NOTIFY=FAILURE"));
        assert_eq!(config.helo_name(), "web.example.com");
        assert!(config.accept_invalid_certs);
    }

    #[test]
    fn test_blank_dsn_ignored() {
        let config = TransportConfig::builder("h").dsn("  ").build();
        assert!(config.dsn.is_none());
    }

    #[test]
    fn test_helo_name_falls_back() {
        let config = TransportConfig::builder("h").helo_name("  ").build();
        assert!(!config.helo_name().is_empty());
    }

    #[test]
    fn test_validate_refuses_line_breaks_in_commands() {
        let config = TransportConfig::builder("h")
            .helo_name("web.example.com\r\nRSET")
            .build();
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.detail.contains("HELO name"));

        let config = TransportConfig::builder("h")
            .dsn("NOTIFY=NEVER\r\nDATA")
            .build();
        assert!(config.validate().unwrap_err().detail.contains("DSN"));

        let config = TransportConfig::builder("h").helo_name("web example").build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_ordinary_settings() {
        let config = TransportConfig::builder("h")
            .helo_name(" web.example.com ")
            .dsn("NOTIFY=SUCCESS,FAILURE ORCPT=rfc822;b@x.com")
            .build();
        assert!(config.validate().is_ok());
        assert!(TransportConfig::new("h").validate().is_ok());
    }

    #[test]
    fn test_validate_covers_deserialized_config() {
        let config: TransportConfig =
            serde_json::from_str(r#"{"host":"h","helo_name":"a\nQUIT"}"#).unwrap();
        assert_eq!(config.validate().unwrap_err().kind, ErrorKind::Validation);
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let debug = format!("{:?}", Credentials::new("user", "hunter2"));
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_host_entry_plain() {
        let entry = HostEntry::parse("smtp.example.com", 25, Security::None).unwrap();
        assert_eq!(entry.host, "smtp.example.com");
        assert_eq!(entry.port, 25);
        assert_eq!(entry.security, Security::None);
        assert_eq!(entry.to_string(), "smtp.example.com:25");
    }

    #[test]
    fn test_host_entry_scheme_and_port() {
        let entry = HostEntry::parse(" ssl://mail.example.com:2465 ", 25, Security::None).unwrap();
        assert_eq!(entry.host, "mail.example.com");
        assert_eq!(entry.port, 2465);
        assert_eq!(entry.security, Security::Tls);

        let entry = HostEntry::parse("tls://mail.example.com", 587, Security::None).unwrap();
        assert_eq!(entry.security, Security::StartTls);
        assert_eq!(entry.port, 587);

        let entry = HostEntry::parse("smtps://mail.example.com", 465, Security::None).unwrap();
        assert_eq!(entry.security, Security::Tls);
    }

    #[test]
    fn test_host_entry_ipv6() {
        let entry = HostEntry::parse("[::1]:2525", 25, Security::None).unwrap();
        assert_eq!(entry.host, "::1");
        assert_eq!(entry.port, 2525);
        assert_eq!(entry.to_string(), "[::1]:2525");

        let entry = HostEntry::parse("[::1]", 25, Security::None).unwrap();
        assert_eq!(entry.port, 25);
    }

    #[test]
    fn test_host_entry_invalid() {
        assert!(HostEntry::parse("", 25, Security::None).is_none());
        assert!(HostEntry::parse("ftp://host", 25, Security::None).is_none());
        assert!(HostEntry::parse("host:port", 25, Security::None).is_none());
        assert!(HostEntry::parse("host:0", 25, Security::None).is_none());
        assert!(HostEntry::parse("[::1", 25, Security::None).is_none());
        assert!(HostEntry::parse("bad host", 25, Security::None).is_none());
    }

    #[test]
    fn test_hosts_list() {
        let config = TransportConfig::builder("a.example.com; ssl://b.example.com:465;;bad host")
            .port(587)
            .security(Security::StartTls)
            .build();
        let hosts = config.hosts();
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].to_string(), "a.example.com:587");
        assert_eq!(hosts[0].security, Security::StartTls);
        assert_eq!(hosts[1].security, Security::Tls);
    }

    #[test]
    fn test_config_serde() {
        let json = r#"{
            "host": "smtp.example.com",
            "security": "starttls",
            "credentials": {"username": "u", "password": "p"},
            "auth_method": "plain"
        }"#;
        let config: TransportConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.security, Security::StartTls);
        assert_eq!(config.port, 25);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.auth_method, AuthMethod::Plain);
        assert_eq!(config.credentials.unwrap().password, "p");
    }
}
