//! Composer errors.

use std::string::FromUtf8Error;

/// Result alias used throughout the composer.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a message could not be built or a value could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Address failed validation.
    #[error("{address:?} is not a valid address: {reason}")]
    InvalidAddress {
        /// The rejected input.
        address: String,
        /// Which rule it broke.
        reason: &'static str,
    },

    /// Charset name with characters a MIME charset cannot contain.
    #[error("{0:?} is not a valid charset name")]
    InvalidCharset(String),

    /// A required part of the message was not set.
    #[error("message has no {0}")]
    MissingField(&'static str),

    /// Malformed encoded input (quoted-printable, encoded word).
    #[error("malformed encoding: {0}")]
    InvalidEncoding(String),

    /// Base64 payload could not be decoded.
    #[error("bad base64: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// Decoded bytes are not UTF-8.
    #[error("decoded text is not UTF-8: {0}")]
    Utf8Decode(#[from] FromUtf8Error),
}

impl Error {
    pub(crate) fn invalid_address(address: &str, reason: &'static str) -> Self {
        Self::InvalidAddress {
            address: address.to_string(),
            reason,
        }
    }
}
