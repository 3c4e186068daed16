//! Send error categories.

use std::fmt;

use outbox_smtp::Reply;
use serde::Serialize;

use crate::report::DeliveryOutcome;

/// Where a send attempt stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// An address or setting was unusable; nothing was sent.
    Validation,
    /// No server could be reached or it did not greet with 220.
    ConnectFailed,
    /// EHLO and HELO were both refused.
    HelloFailed,
    /// The TLS handshake or STARTTLS failed.
    TlsFailed,
    /// The server refused the credentials.
    AuthFailed,
    /// `MAIL FROM` was refused.
    SenderRejected,
    /// Every `RCPT TO` was refused.
    AllRecipientsRejected,
    /// `DATA` or the message content was refused.
    DataRejected,
    /// The connection broke after the session was set up.
    ConnectionLost,
}

impl ErrorKind {
    /// Text suitable for an end user, without protocol detail.
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::Validation => "The message could not be sent because an address or setting is invalid.",
            Self::ConnectFailed => "Could not connect to the mail server.",
            Self::HelloFailed => "The mail server refused the connection.",
            Self::TlsFailed => "Could not establish a secure connection to the mail server.",
            Self::AuthFailed => "Could not log in to the mail server.",
            Self::SenderRejected => "The mail server rejected the sender address.",
            Self::AllRecipientsRejected => "The mail server rejected every recipient.",
            Self::DataRejected => "The mail server rejected the message.",
            Self::ConnectionLost => "The connection to the mail server was lost.",
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::ConnectFailed => "connect-failed",
            Self::HelloFailed => "hello-failed",
            Self::TlsFailed => "tls-failed",
            Self::AuthFailed => "auth-failed",
            Self::SenderRejected => "sender-rejected",
            Self::AllRecipientsRejected => "all-recipients-rejected",
            Self::DataRejected => "data-rejected",
            Self::ConnectionLost => "connection-lost",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed [`send_email`](crate::send_email).
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct SendError {
    /// Category.
    pub kind: ErrorKind,
    /// Technical description.
    pub detail: String,
    /// Server reply that caused the failure, if one did.
    pub reply: Option<Reply>,
    /// Recipient results gathered before the failure.
    pub outcomes: Vec<DeliveryOutcome>,
    #[source]
    source: Option<outbox_smtp::Error>,
}

impl SendError {
    /// Creates an error with no server reply.
    #[must_use]
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            reply: None,
            outcomes: Vec::new(),
            source: None,
        }
    }

    /// Wraps a transport error.
    #[must_use]
    pub fn from_smtp(kind: ErrorKind, err: outbox_smtp::Error) -> Self {
        Self {
            kind,
            detail: err.to_string(),
            reply: err.reply().cloned(),
            outcomes: Vec::new(),
            source: Some(err),
        }
    }

    /// Wraps a step error: server rejections get `kind`, broken
    /// connections become [`ErrorKind::ConnectionLost`].
    #[must_use]
    pub fn from_step(kind: ErrorKind, err: outbox_smtp::Error) -> Self {
        let kind = if err.reply().is_some() {
            kind
        } else {
            ErrorKind::ConnectionLost
        };
        Self::from_smtp(kind, err)
    }

    /// Attaches the recipient results.
    #[must_use]
    pub fn with_outcomes(mut self, outcomes: Vec<DeliveryOutcome>) -> Self {
        self.outcomes = outcomes;
        self
    }

    /// Attaches the reply that caused the failure.
    #[must_use]
    pub fn with_reply(mut self, reply: Reply) -> Self {
        self.reply = Some(reply);
        self
    }

    /// Reply code that caused the failure, if any.
    #[must_use]
    pub fn code(&self) -> Option<u16> {
        self.reply.as_ref().map(|reply| reply.code.as_u16())
    }

    /// Text suitable for an end user.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }
}

impl From<outbox_mime::Error> for SendError {
    fn from(err: outbox_mime::Error) -> Self {
        Self::new(ErrorKind::Validation, err.to_string())
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
    use outbox_smtp::ReplyCode;
    use std::io;

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::AllRecipientsRejected.to_string(), "all-recipients-rejected");
        assert_eq!(ErrorKind::TlsFailed.to_string(), "tls-failed");
        assert_eq!(
            serde_json_kind(ErrorKind::ConnectFailed),
            "\"connect-failed\""
        );
    }

    fn serde_json_kind(kind: ErrorKind) -> String {
        serde_json::to_string(&kind).unwrap()
    }

    #[test]
    fn test_from_step_keeps_rejection() {
        let reply = Reply::new(ReplyCode::new(553), vec!["sender denied".to_string()]);
        let err = SendError::from_step(
            ErrorKind::SenderRejected,
            outbox_smtp::Error::rejected("MAIL FROM", reply),
        );
        assert_eq!(err.kind, ErrorKind::SenderRejected);
        assert_eq!(err.code(), Some(553));
        assert!(err.detail.contains("sender denied"));
    }

    #[test]
    fn test_from_step_broken_connection() {
        let err = SendError::from_step(
            ErrorKind::SenderRejected,
            outbox_smtp::Error::Io(io::Error::from(io::ErrorKind::UnexpectedEof)),
        );
        assert_eq!(err.kind, ErrorKind::ConnectionLost);
        assert!(err.reply.is_none());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_user_message_hides_detail() {
        let err = SendError::new(ErrorKind::AuthFailed, "535 5.7.8 bad credentials");
        assert!(!err.user_message().contains("535"));
        assert_eq!(err.to_string(), "auth-failed: 535 5.7.8 bad credentials");
    }

    #[test]
    fn test_from_mime_error() {
        let err: SendError = outbox_mime::Error::MissingField("from").into();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
