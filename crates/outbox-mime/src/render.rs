//! Rendering a [`Message`] into header and body text.

use crate::address::Mailbox;
use crate::content_type::ContentType;
use crate::encoding::encode_rfc2047;
use crate::header::Headers;
use crate::message::{Message, TransferEncoding};
use chrono::{DateTime, Local, TimeZone};
use rand::Rng;
use std::fmt::Write as _;

/// Fallback when the local hostname cannot be read.
const FALLBACK_HOSTNAME: &str = "localhost.localdomain";

/// Body structure of a rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// One text part.
    Single,
    /// Plain alternative and HTML body under one boundary.
    Alternative {
        /// Boundary token, without the leading dashes.
        boundary: String,
    },
}

impl Layout {
    /// Picks the layout for `message`, generating a boundary when needed.
    #[must_use]
    pub fn for_message(message: &Message) -> Self {
        if message.has_alternative() {
            Self::Alternative {
                boundary: generate_boundary(),
            }
        } else {
            Self::Single
        }
    }
}

/// A message ready for the DATA phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Header block; every line ends with CRLF.
    pub headers: String,
    /// Encoded body.
    pub body: String,
}

impl RenderedMessage {
    /// Joins headers and body with the separating blank line.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.headers.len() + self.body.len() + 2);
        out.extend_from_slice(self.headers.as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(self.body.as_bytes());
        out
    }
}

impl Message {
    /// Renders headers and body.
    #[must_use]
    pub fn render(&self) -> RenderedMessage {
        let layout = Layout::for_message(self);
        RenderedMessage {
            headers: render_headers(self, &layout),
            body: render_body(self, &layout),
        }
    }
}

/// Renders the header block.
///
/// Order: Date, Message-ID, From, To, Cc, Reply-To, Subject, MIME-Version,
/// Content-Type, and Content-Transfer-Encoding for single-part bodies. Bcc is
/// never rendered.
#[must_use]
pub fn render_headers(message: &Message, layout: &Layout) -> String {
    let charset = message.charset();
    let mut headers = Headers::new();

    let date = message
        .date()
        .map_or_else(|| rfc_date(&Local::now()), rfc_date);
    headers.add("Date", date);

    let id = message.message_id().map_or_else(
        || generate_message_id(message.hostname()),
        ToString::to_string,
    );
    headers.add("Message-ID", format!("<{id}>"));

    headers.add("From", message.from().render(charset));

    let recipients = message.recipients();
    if recipients.to().is_empty() {
        headers.add("To", "undisclosed-recipients:;");
    } else {
        headers.add("To", address_list(recipients.to(), charset));
    }
    if !recipients.cc().is_empty() {
        headers.add("Cc", address_list(recipients.cc(), charset));
    }
    if !recipients.reply_to().is_empty() {
        headers.add("Reply-To", address_list(recipients.reply_to(), charset));
    }

    headers.add("Subject", encode_rfc2047(message.subject(), charset));
    headers.add("MIME-Version", "1.0");

    match layout {
        Layout::Single => {
            headers.add(
                "Content-Type",
                message.body_type().content_type(charset).to_string(),
            );
            headers.add(
                "Content-Transfer-Encoding",
                message.transfer_encoding().to_string(),
            );
        }
        Layout::Alternative { boundary } => {
            headers.add(
                "Content-Type",
                ContentType::multipart_alternative(boundary.as_str()).to_string(),
            );
        }
    }

    headers.to_string()
}

/// Renders the body for `layout`.
///
/// Parts of a `multipart/alternative` body are always sent as `8bit`.
#[must_use]
pub fn render_body(message: &Message, layout: &Layout) -> String {
    match layout {
        Layout::Single => message.transfer_encoding().encode(message.body()),
        Layout::Alternative { boundary } => {
            let charset = message.charset();
            let encoding = TransferEncoding::EightBit;
            let mut body = String::new();
            for (content_type, text) in [
                (
                    ContentType::text_plain(charset),
                    message.alt_body().unwrap_or_default(),
                ),
                (ContentType::text_html(charset), message.body()),
            ] {
                let _ = write!(
                    body,
                    "--{boundary}\r\nContent-Type: {content_type}\r\n\
                     Content-Transfer-Encoding: {encoding}\r\n\r\n{}\r\n",
                    encoding.encode(text)
                );
            }
            let _ = write!(body, "--{boundary}--\r\n");
            body
        }
    }
}

/// Formats a date as in RFC 5322 section 3.3, e.g. `Tue, 1 Jul 2025 10:52:37 +0200`.
#[must_use]
pub fn rfc_date<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    date.format("%a, %-d %b %Y %H:%M:%S %z").to_string()
}

/// Generates a Message-ID (without angle brackets): 32 random bytes in hex,
/// `@`, and the hostname.
///
/// Falls back to the local hostname when `hostname` is `None`.
#[must_use]
pub fn generate_message_id(hostname: Option<&str>) -> String {
    let host = hostname.map_or_else(local_hostname, ToString::to_string);
    format!("{}@{host}", random_hex())
}

fn generate_boundary() -> String {
    format!("b1_{}", random_hex())
}

fn random_hex() -> String {
    let random_bytes: Vec<u8> = (0..32).map(|_| rand::thread_rng().r#gen::<u8>()).collect();
    let mut hex = String::with_capacity(64);
    for byte in random_bytes {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_HOSTNAME.to_string())
}

fn address_list(mailboxes: &[Mailbox], charset: &str) -> String {
    mailboxes
        .iter()
        .map(|mailbox| mailbox.render(charset))
        .collect::<Vec<_>>()
        .join(", ")
}
