//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 header encoding.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;

/// Maximum encoded line length for body encodings (RFC 2045).
const MAX_LINE_LENGTH: usize = 76;

/// Maximum length of one RFC 2047 encoded word.
const MAX_ENCODED_WORD: usize = 75;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 broken into 76-column lines, each ending in CRLF.
#[must_use]
pub fn encode_base64_lines(data: &[u8]) -> String {
    let encoded = encode_base64(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2 + 2);
    // Base64 output is ASCII, so byte chunks are char boundaries.
    for chunk in encoded.as_bytes().chunks(MAX_LINE_LENGTH) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push_str("\r\n");
    }
    out
}

/// Decodes Base64 data, ignoring line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Converts CRLF, lone CR and lone LF to CRLF.
#[must_use]
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n").replace('\n', "\r\n")
}

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks become hard CRLF breaks. Longer lines get `=` soft breaks so
/// no encoded line exceeds 76 characters, and whitespace at the end of a line
/// is escaped.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let normalized = normalize_line_endings(text);
    let mut result = String::with_capacity(normalized.len() * 3 / 2);

    for (i, line) in normalized.split("\r\n").enumerate() {
        if i > 0 {
            result.push_str("\r\n");
        }
        encode_qp_line(line.as_bytes(), &mut result);
    }

    result
}

fn encode_qp_line(line: &[u8], out: &mut String) {
    let mut line_length = 0;

    for (i, &byte) in line.iter().enumerate() {
        let at_end = i + 1 == line.len();
        let literal = match byte {
            // Printable ASCII except '='
            b'!'..=b'<' | b'>'..=b'~' => true,
            // Trailing whitespace would be stripped in transit
            b' ' | b'\t' => !at_end,
            _ => false,
        };
        let width = if literal { 1 } else { 3 };

        // Leave room for the '=' of a soft break
        if line_length + width > MAX_LINE_LENGTH - 1 {
            out.push_str("=\r\n");
            line_length = 0;
        }

        if literal {
            out.push(byte as char);
        } else {
            let _ = write!(out, "={byte:02X}");
        }
        line_length += width;
    }
}

/// Decodes Quoted-Printable text (RFC 2045).
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(text: &str) -> Result<String> {
    let bytes = text.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            result.push(bytes[i]);
            i += 1;
            continue;
        }

        // Soft line break
        match bytes.get(i + 1..i + 3) {
            Some(b"\r\n") => {
                i += 3;
                continue;
            }
            _ if bytes.get(i + 1) == Some(&b'\n') => {
                i += 2;
                continue;
            }
            Some(hex) => {
                let hex = std::str::from_utf8(hex)
                    .map_err(|_| Error::InvalidEncoding("Invalid hex escape".to_string()))?;
                let byte = u8::from_str_radix(hex, 16)
                    .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
                result.push(byte);
                i += 3;
            }
            None => {
                return Err(Error::InvalidEncoding(
                    "Incomplete escape sequence".to_string(),
                ));
            }
        }
    }

    String::from_utf8(result).map_err(Into::into)
}

/// Returns true if `text` has anything besides printable ASCII and spaces.
#[must_use]
pub fn needs_encoding(text: &str) -> bool {
    text.bytes().any(|b| !(b' '..=b'~').contains(&b))
}

/// Encodes a header value using RFC 2047 `B` encoding if needed.
///
/// Format: `=?charset?B?encoded-text?=`
///
/// Printable ASCII is returned unchanged. Otherwise the text is split on
/// character boundaries into encoded words of at most 75 characters,
/// separated by single spaces.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    if !needs_encoding(text) {
        return text.to_string();
    }

    // "=?" charset "?B?" ... "?="
    let overhead = charset.len() + 7;
    let max_payload = MAX_ENCODED_WORD.saturating_sub(overhead) / 4 * 3;

    let mut words = Vec::new();
    let mut chunk = String::new();
    for ch in text.chars() {
        if !chunk.is_empty() && chunk.len() + ch.len_utf8() > max_payload {
            words.push(encoded_word(&chunk, charset));
            chunk.clear();
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() {
        words.push(encoded_word(&chunk, charset));
    }

    words.join(" ")
}

fn encoded_word(chunk: &str, charset: &str) -> String {
    format!("=?{charset}?B?{}?=", encode_base64(chunk.as_bytes()))
}

/// Decodes an RFC 2047 encoded header value.
///
/// Accepts a sequence of encoded words separated by whitespace; text that is
/// not an encoded word is returned as is.
///
/// # Errors
///
/// Returns an error if an encoded word is malformed.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || !words.iter().all(|w| w.starts_with("=?") && w.ends_with("?=")) {
        return Ok(text.to_string());
    }

    let mut bytes = Vec::new();
    for word in words {
        let inner = &word[2..word.len() - 2];
        let parts: Vec<&str> = inner.split('?').collect();
        if parts.len() != 3 {
            return Err(Error::InvalidEncoding(
                "Invalid RFC 2047 format".to_string(),
            ));
        }

        match parts[1].to_uppercase().as_str() {
            "B" => bytes.extend(decode_base64(parts[2])?),
            "Q" => bytes.extend(decode_quoted_printable(&parts[2].replace('_', " "))?.into_bytes()),
            other => {
                return Err(Error::InvalidEncoding(format!("Unknown encoding: {other}")));
            }
        }
    }

    String::from_utf8(bytes).map_err(Into::into)
}
