//! SMTP commands and their wire form.

use crate::types::{Address, AuthMechanism};

/// A command line sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `HELO`, for servers that refuse EHLO.
    Helo {
        /// Name the client announces.
        hostname: String,
    },
    /// `EHLO`, which also asks for the extension list.
    Ehlo {
        /// Name the client announces.
        hostname: String,
    },
    /// `STARTTLS`
    StartTls,
    /// `AUTH`, optionally with an initial response.
    Auth {
        /// SASL mechanism.
        mechanism: AuthMechanism,
        /// Base64 initial response.
        initial_response: Option<String>,
    },
    /// Base64 answer to a 334 challenge.
    AuthResponse(String),
    /// `MAIL FROM:<address>`
    MailFrom {
        /// Reverse path.
        from: Address,
    },
    /// `RCPT TO:<address>` with optional extra parameters.
    RcptTo {
        /// Forward path.
        to: Address,
        /// Appended verbatim, e.g. `NOTIFY=SUCCESS,FAILURE` (RFC 3461).
        /// Blank parameters are left out.
        params: Option<String>,
    },
    /// `DATA`
    Data,
    /// `RSET`
    Rset,
    /// `QUIT`
    Quit,
}

impl Command {
    /// Returns the command verb, used to label replies and errors.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Helo { .. } => "HELO",
            Self::Ehlo { .. } => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::Auth { .. } | Self::AuthResponse(_) => "AUTH",
            Self::MailFrom { .. } => "MAIL FROM",
            Self::RcptTo { .. } => "RCPT TO",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Quit => "QUIT",
        }
    }

    /// Returns the command line without CRLF.
    #[must_use]
    pub fn line(&self) -> String {
        match self {
            Self::Helo { hostname } => format!("HELO {hostname}"),
            Self::Ehlo { hostname } => format!("EHLO {hostname}"),
            Self::Auth {
                mechanism,
                initial_response: Some(response),
            } => format!("AUTH {} {response}", mechanism.as_str()),
            Self::Auth {
                mechanism,
                initial_response: None,
            } => format!("AUTH {}", mechanism.as_str()),
            Self::AuthResponse(response) => response.clone(),
            Self::MailFrom { from } => format!("MAIL FROM:<{}>", from.as_str()),
            Self::RcptTo { to, params } => {
                match params.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
                    Some(params) => format!("RCPT TO:<{}> {params}", to.as_str()),
                    None => format!("RCPT TO:<{}>", to.as_str()),
                }
            }
            Self::StartTls | Self::Data | Self::Rset | Self::Quit => self.verb().to_string(),
        }
    }

    /// Returns the command line as it may appear in logs.
    ///
    /// Credentials carried by AUTH are replaced with `<redacted>`.
    #[must_use]
    pub fn log_line(&self) -> String {
        match self {
            Self::Auth {
                mechanism,
                initial_response: Some(_),
            } => format!("AUTH {} <redacted>", mechanism.as_str()),
            Self::AuthResponse(_) => "<redacted>".to_string(),
            _ => self.line(),
        }
    }

    /// Returns the bytes to write, CRLF included.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = self.line().into_bytes();
        buf.extend_from_slice(b"\r\n");
        buf
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    #[test]
    fn test_greetings() {
        let name = "client.example.com".to_string();
        assert_eq!(
            Command::Ehlo { hostname: name.clone() }.serialize(),
            b"EHLO client.example.com\r\n"
        );
        assert_eq!(Command::Helo { hostname: name }.line(), "HELO client.example.com");
    }

    #[test]
    fn test_bare_verbs() {
        for (cmd, wire) in [
            (Command::StartTls, "STARTTLS\r\n"),
            (Command::Data, "DATA\r\n"),
            (Command::Rset, "RSET\r\n"),
            (Command::Quit, "QUIT\r\n"),
        ] {
            assert_eq!(cmd.serialize(), wire.as_bytes());
        }
    }

    #[test]
    fn test_auth_login_not_redacted_without_payload() {
        let cmd = Command::Auth {
            mechanism: AuthMechanism::Login,
            initial_response: None,
        };
        assert_eq!(cmd.line(), "AUTH LOGIN");
        assert_eq!(cmd.log_line(), "AUTH LOGIN");
    }

    #[test]
    fn test_auth_credentials_are_redacted() {
        let cmd = Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some("AHVzZXIAcGFzcw==".to_string()),
        };
        assert_eq!(cmd.serialize(), b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n");
        assert_eq!(cmd.log_line(), "AUTH PLAIN <redacted>");

        let cmd = Command::AuthResponse("dXNlcg==".to_string());
        assert_eq!(cmd.serialize(), b"dXNlcg==\r\n");
        assert_eq!(cmd.log_line(), "<redacted>");
        assert_eq!(cmd.verb(), "AUTH");
    }

    #[test]
    fn test_envelope_commands() {
        let cmd = Command::MailFrom {
            from: addr("sender@example.com"),
        };
        assert_eq!(cmd.line(), "MAIL FROM:<sender@example.com>");
        assert_eq!(cmd.verb(), "MAIL FROM");

        let cmd = Command::RcptTo {
            to: addr("recipient@example.com"),
            params: None,
        };
        assert_eq!(cmd.serialize(), b"RCPT TO:<recipient@example.com>\r\n");
    }

    #[test]
    fn test_rcpt_params() {
        let with = |params: &str| Command::RcptTo {
            to: addr("recipient@example.com"),
            params: Some(params.to_string()),
        };
        assert_eq!(
            with("NOTIFY=SUCCESS,FAILURE").log_line(),
            "RCPT TO:<recipient@example.com> NOTIFY=SUCCESS,FAILURE"
        );
        assert_eq!(with("  ").line(), "RCPT TO:<recipient@example.com>");
    }
}
