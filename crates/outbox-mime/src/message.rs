//! Outgoing message model and builder.

use crate::address::{Mailbox, clean_header_value, validate_address};
use crate::content_type::ContentType;
use crate::encoding::{encode_base64_lines, encode_quoted_printable, normalize_line_endings};
use crate::error::{Error, Result};
use crate::recipients::{RecipientKind, RecipientSet};
use chrono::{DateTime, FixedOffset};
use std::fmt;

/// Subject used when none was given.
pub const DEFAULT_SUBJECT: &str = "(No Subject)";

/// Default charset for text parts and encoded words.
pub const DEFAULT_CHARSET: &str = "utf-8";

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    #[cfg_attr(feature = "serde", serde(rename = "7bit"))]
    SevenBit,
    /// 8-bit text.
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "8bit"))]
    EightBit,
    /// Base64 encoding.
    #[cfg_attr(feature = "serde", serde(rename = "base64"))]
    Base64,
    /// Quoted-Printable encoding.
    #[cfg_attr(feature = "serde", serde(rename = "quoted-printable"))]
    QuotedPrintable,
    /// Binary (no encoding).
    #[cfg_attr(feature = "serde", serde(rename = "binary"))]
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "7bit" => Self::SevenBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::EightBit,
        }
    }

    /// Encodes a body for this transfer encoding.
    ///
    /// `7bit` and `8bit` normalize line endings to CRLF and make sure the
    /// text ends with one; `binary` passes the text through untouched.
    #[must_use]
    pub fn encode(self, body: &str) -> String {
        match self {
            Self::SevenBit | Self::EightBit => {
                let mut encoded = normalize_line_endings(body);
                if !encoded.ends_with("\r\n") {
                    encoded.push_str("\r\n");
                }
                encoded
            }
            Self::Base64 => encode_base64_lines(body.as_bytes()),
            Self::QuotedPrintable => encode_quoted_printable(body),
            Self::Binary => body.to_string(),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// Content type of the main body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum BodyType {
    /// `text/plain`
    #[default]
    Plain,
    /// `text/html`
    Html,
}

impl BodyType {
    /// Returns the content type for `charset`.
    #[must_use]
    pub fn content_type(self, charset: &str) -> ContentType {
        match self {
            Self::Plain => ContentType::text_plain(charset),
            Self::Html => ContentType::text_html(charset),
        }
    }
}

/// An outgoing message.
///
/// Built with [`MessageBuilder`]; rendered with [`Message::render`].
#[derive(Debug, Clone)]
pub struct Message {
    pub(crate) from: Mailbox,
    pub(crate) sender: Option<String>,
    pub(crate) recipients: RecipientSet,
    pub(crate) subject: String,
    pub(crate) body: String,
    pub(crate) body_type: BodyType,
    pub(crate) alt_body: Option<String>,
    pub(crate) charset: String,
    pub(crate) encoding: TransferEncoding,
    pub(crate) message_id: Option<String>,
    pub(crate) date: Option<DateTime<FixedOffset>>,
    pub(crate) hostname: Option<String>,
}

impl Message {
    /// Starts building a message.
    #[must_use]
    pub fn builder() -> MessageBuilder {
        MessageBuilder::new()
    }

    /// The From mailbox.
    #[must_use]
    pub const fn from(&self) -> &Mailbox {
        &self.from
    }

    /// Address for `MAIL FROM`: the envelope sender if set, else From.
    #[must_use]
    pub fn envelope_sender(&self) -> &str {
        self.sender.as_deref().unwrap_or_else(|| self.from.address())
    }

    /// The recipient lists.
    #[must_use]
    pub const fn recipients(&self) -> &RecipientSet {
        &self.recipients
    }

    /// Mutable access to the recipient lists.
    pub fn recipients_mut(&mut self) -> &mut RecipientSet {
        &mut self.recipients
    }

    /// The subject as it will be sent.
    #[must_use]
    pub fn subject(&self) -> &str {
        if self.subject.is_empty() {
            DEFAULT_SUBJECT
        } else {
            &self.subject
        }
    }

    /// The main body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Content type of the main body.
    #[must_use]
    pub const fn body_type(&self) -> BodyType {
        self.body_type
    }

    /// Plain-text alternative, if any.
    #[must_use]
    pub fn alt_body(&self) -> Option<&str> {
        self.alt_body.as_deref()
    }

    /// True when the message goes out as `multipart/alternative`.
    ///
    /// That takes an HTML body plus a non-empty plain alternative.
    #[must_use]
    pub fn has_alternative(&self) -> bool {
        self.body_type == BodyType::Html && self.alt_body.as_deref().is_some_and(|alt| !alt.is_empty())
    }

    /// Charset for text parts and encoded words.
    #[must_use]
    pub fn charset(&self) -> &str {
        &self.charset
    }

    /// Transfer encoding for a single-part body.
    #[must_use]
    pub const fn transfer_encoding(&self) -> TransferEncoding {
        self.encoding
    }

    /// Explicit Message-ID, without angle brackets.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// Explicit Date.
    #[must_use]
    pub const fn date(&self) -> Option<&DateTime<FixedOffset>> {
        self.date.as_ref()
    }

    /// Hostname used for generated Message-IDs.
    #[must_use]
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }
}

/// Fluent builder for [`Message`].
///
/// Address errors are kept and reported by [`build`](Self::build), so the
/// chain never breaks halfway.
#[derive(Debug, Default)]
pub struct MessageBuilder {
    from: Option<Mailbox>,
    sender: Option<String>,
    recipients: RecipientSet,
    subject: String,
    body: String,
    body_type: BodyType,
    alt_body: Option<String>,
    charset: Option<String>,
    encoding: TransferEncoding,
    message_id: Option<String>,
    date: Option<DateTime<FixedOffset>>,
    hostname: Option<String>,
    error: Option<Error>,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the From address.
    #[must_use]
    pub fn from(mut self, address: &str) -> Self {
        if let Some(mailbox) = self.check(Mailbox::new(address)) {
            self.from = Some(mailbox);
        }
        self
    }

    /// Sets the From address with a display name.
    #[must_use]
    pub fn from_named(mut self, address: &str, name: &str) -> Self {
        if let Some(mailbox) = self.check(Mailbox::with_name(address, name)) {
            self.from = Some(mailbox);
        }
        self
    }

    /// Overrides the envelope sender (`MAIL FROM`).
    #[must_use]
    pub fn sender(mut self, address: &str) -> Self {
        let address = address.trim();
        if self.check(validate_address(address)).is_some() {
            self.sender = Some(address.to_string());
        }
        self
    }

    /// Adds a To recipient.
    #[must_use]
    pub fn to(self, address: &str) -> Self {
        self.recipient(RecipientKind::To, Mailbox::new(address))
    }

    /// Adds a To recipient with a display name.
    #[must_use]
    pub fn to_named(self, address: &str, name: &str) -> Self {
        self.recipient(RecipientKind::To, Mailbox::with_name(address, name))
    }

    /// Adds a Cc recipient.
    #[must_use]
    pub fn cc(self, address: &str) -> Self {
        self.recipient(RecipientKind::Cc, Mailbox::new(address))
    }

    /// Adds a Cc recipient with a display name.
    #[must_use]
    pub fn cc_named(self, address: &str, name: &str) -> Self {
        self.recipient(RecipientKind::Cc, Mailbox::with_name(address, name))
    }

    /// Adds a Bcc recipient.
    #[must_use]
    pub fn bcc(self, address: &str) -> Self {
        self.recipient(RecipientKind::Bcc, Mailbox::new(address))
    }

    /// Adds a Bcc recipient with a display name.
    #[must_use]
    pub fn bcc_named(self, address: &str, name: &str) -> Self {
        self.recipient(RecipientKind::Bcc, Mailbox::with_name(address, name))
    }

    /// Adds a Reply-To address.
    #[must_use]
    pub fn reply_to(mut self, address: &str) -> Self {
        if let Some(mailbox) = self.check(Mailbox::new(address)) {
            self.recipients.add_reply_to(mailbox);
        }
        self
    }

    /// Adds a Reply-To address with a display name.
    #[must_use]
    pub fn reply_to_named(mut self, address: &str, name: &str) -> Self {
        if let Some(mailbox) = self.check(Mailbox::with_name(address, name)) {
            self.recipients.add_reply_to(mailbox);
        }
        self
    }

    /// Sets the subject. Control characters are removed.
    #[must_use]
    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = clean_header_value(subject)
            .chars()
            .filter(|c| !c.is_control())
            .collect();
        self
    }

    /// Sets a `text/plain` body.
    #[must_use]
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.body_type = BodyType::Plain;
        self
    }

    /// Sets a `text/html` body.
    #[must_use]
    pub fn html_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.body_type = BodyType::Html;
        self
    }

    /// Sets the plain-text alternative shown by clients that skip HTML.
    #[must_use]
    pub fn alt_body(mut self, body: impl Into<String>) -> Self {
        self.alt_body = Some(body.into());
        self
    }

    /// Sets the charset (default `utf-8`).
    ///
    /// A name outside the RFC 2978 `mime-charset` alphabet is kept as an
    /// error and reported by [`build`](Self::build).
    #[must_use]
    pub fn charset(mut self, charset: &str) -> Self {
        let charset = charset.trim();
        if charset.is_empty() {
            return self;
        }
        if self.check(validate_charset(charset)).is_some() {
            self.charset = Some(charset.to_string());
        }
        self
    }

    /// Sets the transfer encoding for a single-part body (default `8bit`).
    #[must_use]
    pub const fn transfer_encoding(mut self, encoding: TransferEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Uses an explicit Message-ID instead of a generated one.
    #[must_use]
    pub fn message_id(mut self, id: &str) -> Self {
        let id = clean_header_value(id);
        let id = id.trim_start_matches('<').trim_end_matches('>');
        if !id.is_empty() {
            self.message_id = Some(id.to_string());
        }
        self
    }

    /// Uses an explicit Date instead of the current time.
    #[must_use]
    pub const fn date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.date = Some(date);
        self
    }

    /// Sets the hostname used in generated Message-IDs.
    #[must_use]
    pub fn hostname(mut self, hostname: &str) -> Self {
        let hostname = clean_header_value(hostname);
        if !hostname.is_empty() {
            self.hostname = Some(hostname);
        }
        self
    }

    /// Finishes the message.
    ///
    /// # Errors
    ///
    /// Returns the first invalid address given to the builder, or
    /// [`Error::MissingField`] when From or every recipient is missing.
    pub fn build(self) -> Result<Message> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let from = self.from.ok_or(Error::MissingField("from"))?;
        if self.recipients.is_empty() {
            return Err(Error::MissingField("recipient"));
        }

        Ok(Message {
            from,
            sender: self.sender,
            recipients: self.recipients,
            subject: self.subject,
            body: self.body,
            body_type: self.body_type,
            alt_body: self.alt_body,
            charset: self.charset.unwrap_or_else(|| DEFAULT_CHARSET.to_string()),
            encoding: self.encoding,
            message_id: self.message_id,
            date: self.date,
            hostname: self.hostname,
        })
    }

    fn recipient(mut self, kind: RecipientKind, mailbox: Result<Mailbox>) -> Self {
        if let Some(mailbox) = self.check(mailbox) {
            self.recipients.add(kind, mailbox);
        }
        self
    }

    fn check<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.error.get_or_insert(err);
                None
            }
        }
    }
}

/// Checks a charset name against the RFC 2978 `mime-charset` alphabet.
///
/// # Errors
///
/// Returns [`Error::InvalidCharset`] for any other character, which keeps
/// CR, LF, spaces and `?` out of part headers and encoded words.
pub fn validate_charset(charset: &str) -> Result<()> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || "!#$%&'+-^_`{}~".contains(c);
    if !charset.is_empty() && charset.len() <= 40 && charset.chars().all(allowed) {
        Ok(())
    } else {
        Err(Error::InvalidCharset(charset.to_string()))
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

    fn minimal() -> MessageBuilder {
        MessageBuilder::new().from("a@example.com").to("b@example.com")
    }

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse("BASE64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("unknown"), TransferEncoding::EightBit);
        assert_eq!(TransferEncoding::default().to_string(), "8bit");
    }

    #[test]
    fn test_eight_bit_encoding_normalizes() {
        assert_eq!(TransferEncoding::EightBit.encode("a\nb"), "a\r\nb\r\n");
        assert_eq!(TransferEncoding::SevenBit.encode("a\r\n"), "a\r\n");
        assert_eq!(TransferEncoding::Binary.encode("a\nb"), "a\nb");
        assert_eq!(TransferEncoding::Base64.encode("hi"), "aGk=\r\n");
    }

    #[test]
    fn test_build_requires_from() {
        let err = MessageBuilder::new().to("b@example.com").build().unwrap_err();
        assert!(matches!(err, Error::MissingField("from")));
    }

    #[test]
    fn test_build_requires_recipient() {
        let err = MessageBuilder::new()
            .from("a@example.com")
            .reply_to("r@example.com")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::MissingField("recipient")));
    }

    #[test]
    fn test_build_reports_first_bad_address() {
        let err = minimal().cc("bad").bcc("worse@").build().unwrap_err();
        match err {
            Error::InvalidAddress { address, .. } => assert_eq!(address, "bad"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_charset_with_line_break_is_refused() {
        let err = minimal()
            .charset("utf-8\r\nX-Injected: yes")
            .html_body("<p>hi</p>")
            .alt_body("hi")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCharset(ref name) if name.contains("X-Injected")));
    }

    #[test]
    fn test_charset_names() {
        for good in ["utf-8", "ISO-8859-1", "windows-1252", "Shift_JIS"] {
            assert!(validate_charset(good).is_ok(), "{good} refused");
        }
        for bad in ["utf 8", "utf-8?", "utf-8\n", "a;b", "\"utf-8\""] {
            assert!(validate_charset(bad).is_err(), "{bad:?} accepted");
        }
        let message = minimal().charset("  ISO-8859-1 ").build().unwrap();
        assert_eq!(message.charset(), "ISO-8859-1");
    }

    #[test]
    fn test_defaults() {
        let message = minimal().build().unwrap();
        assert_eq!(message.subject(), DEFAULT_SUBJECT);
        assert_eq!(message.charset(), "utf-8");
        assert_eq!(message.transfer_encoding(), TransferEncoding::EightBit);
        assert_eq!(message.body_type(), BodyType::Plain);
        assert_eq!(message.envelope_sender(), "a@example.com");
        assert!(!message.has_alternative());
    }

    #[test]
    fn test_envelope_sender_override() {
        let message = minimal().sender("bounces@example.com").build().unwrap();
        assert_eq!(message.envelope_sender(), "bounces@example.com");
        assert_eq!(message.from().address(), "a@example.com");
    }

    #[test]
    fn test_subject_is_single_line() {
        let message = minimal().subject("Hello\r\nBcc: x@y.com\t!").build().unwrap();
        assert_eq!(message.subject(), "HelloBcc: x@y.com!");
    }

    #[test]
    fn test_alternative_needs_html_body() {
        let message = minimal().text_body("plain").alt_body("alt").build().unwrap();
        assert!(!message.has_alternative());

        let message = minimal().html_body("<p>x</p>").alt_body("").build().unwrap();
        assert!(!message.has_alternative());

        let message = minimal().html_body("<p>x</p>").alt_body("x").build().unwrap();
        assert!(message.has_alternative());
    }

    #[test]
    fn test_message_id_brackets_stripped() {
        let message = minimal().message_id("<abc@host>").build().unwrap();
        assert_eq!(message.message_id(), Some("abc@host"));
    }

    #[test]
    fn test_duplicate_recipient_ignored() {
        let message = minimal().cc("B@example.com").build().unwrap();
        assert_eq!(message.recipients().len(), 1);
    }
}
