//! # outbox-mime
//!
//! Composition of outbound email messages.
//!
//! ## Features
//!
//! - **Addresses**: Validation and display-name rendering for mailboxes
//! - **Recipients**: To, Cc and Bcc lists with case-insensitive duplicate
//!   suppression, plus Reply-To
//! - **Rendering**: Ordered headers, `multipart/alternative` bodies, generated
//!   Date and Message-ID
//! - **Encoding/Decoding**: Base64, Quoted-Printable, RFC 2047 header encoding
//!
//! ## Quick Start
//!
//! ```ignore
//! use outbox_mime::MessageBuilder;
//!
//! let message = MessageBuilder::new()
//!     .from_named("web@example.com", "Contact Form")
//!     .to("support@example.com")
//!     .reply_to("visitor@example.org")
//!     .subject("New enquiry")
//!     .html_body("<p>Hello</p>")
//!     .alt_body("Hello")
//!     .build()?;
//!
//! let rendered = message.render();
//! let bytes = rendered.to_bytes(); // ready for DATA
//! ```
//!
//! ### Encoding/Decoding
//!
//! ```ignore
//! use outbox_mime::encoding::{decode_base64, encode_base64, encode_quoted_printable};
//!
//! let encoded = encode_base64(b"Hello, World!");
//! let decoded = decode_base64(&encoded)?;
//!
//! let qp = encode_quoted_printable("Héllo, Wørld!");
//!
//! use outbox_mime::encoding::encode_rfc2047;
//! let subject = encode_rfc2047("Héllo", "utf-8");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod content_type;
mod error;
mod header;
mod message;
mod recipients;
mod render;

pub mod encoding;

pub use address::{Mailbox, validate_address};
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{
    BodyType, DEFAULT_CHARSET, DEFAULT_SUBJECT, Message, MessageBuilder, TransferEncoding,
    validate_charset,
};
pub use recipients::{RecipientKind, RecipientSet};
pub use render::{
    Layout, RenderedMessage, generate_message_id, render_body, render_headers, rfc_date,
};
