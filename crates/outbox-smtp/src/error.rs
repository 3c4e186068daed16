//! Error types for SMTP operations.

use std::io;
use std::time::Duration;

use crate::types::Reply;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on an established connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The TCP connection could not be opened.
    #[error("Failed to connect to {address}: {source}")]
    Connect {
        /// `host:port` that was dialed.
        address: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// A connect, read or write did not finish in time.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Server answered a command with an unexpected reply code.
    #[error("{command} rejected: {reply}")]
    Rejected {
        /// Command verb that was rejected (e.g. `RCPT TO`).
        command: &'static str,
        /// Full reply from the server.
        reply: Reply,
    },

    /// Protocol error (malformed or truncated response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// Invalid state for operation.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),
}

impl Error {
    /// Creates a rejection error for `command` from the server's reply.
    #[must_use]
    pub const fn rejected(command: &'static str, reply: Reply) -> Self {
        Self::Rejected { command, reply }
    }

    /// Returns the server reply if this error came from one.
    #[must_use]
    pub const fn reply(&self) -> Option<&Reply> {
        match self {
            Self::Rejected { reply, .. } => Some(reply),
            _ => None,
        }
    }

    /// Returns the reply code if this error came from a server reply.
    #[must_use]
    pub const fn code(&self) -> Option<u16> {
        match self {
            Self::Rejected { reply, .. } => Some(reply.code.as_u16()),
            _ => None,
        }
    }

    /// Returns true if the connection can no longer be used.
    ///
    /// A rejected command leaves the session intact; everything that touched
    /// the socket or broke the framing does not.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Rejected { .. } | Self::InvalidAddress(_) | Self::NotSupported(_)
        )
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Rejected { reply, .. } if reply.code.is_permanent())
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Rejected { reply, .. } if reply.code.is_transient())
    }
}
