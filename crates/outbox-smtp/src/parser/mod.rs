//! SMTP response parser.

use crate::error::{Error, Result};
use crate::types::{EnhancedCode, Reply, ReplyCode};

/// Parses an SMTP reply from response lines.
///
/// SMTP replies can be single-line or multi-line:
/// - Single: `250 OK\r\n`
/// - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`
///
/// An enhanced status code (`250 2.1.0 Sender OK`) directly after the
/// separator is split out of the text of every line that carries it.
///
/// # Errors
///
/// Returns an error if the reply is malformed.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    if lines.is_empty() {
        return Err(Error::Protocol("Empty reply".into()));
    }

    let first = &lines[0];
    let code = parse_code(first)?;

    let mut enhanced = None;
    let mut message = Vec::with_capacity(lines.len());
    for line in lines {
        if line.len() < 3 || !line.is_char_boundary(3) {
            return Err(Error::Protocol(format!("Malformed reply line: {line}")));
        }
        let text = line.get(4..).unwrap_or_default();

        let text = match split_enhanced(text) {
            Some((code, rest)) => {
                enhanced.get_or_insert(code);
                rest
            }
            None => text,
        };
        message.push(text.to_string());
    }

    let reply = Reply::new(ReplyCode::new(code), message);
    Ok(match enhanced {
        Some(enhanced) if enhanced.class == first.as_bytes()[0] - b'0' => {
            reply.with_enhanced(enhanced)
        }
        _ => reply,
    })
}

/// Checks if a line is the last line of a multi-line reply.
///
/// Multi-line replies use `-` separator for continuation and ` ` for the last
/// line. A line too short to carry a separator also ends the reply.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    line.len() < 4 || line.as_bytes()[3] != b'-'
}

fn parse_code(line: &str) -> Result<u16> {
    let code_str = line
        .get(0..3)
        .ok_or_else(|| Error::Protocol(format!("Reply too short: {line}")))?;

    if !code_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Protocol(format!("Invalid reply code: {code_str}")));
    }

    code_str
        .parse::<u16>()
        .map_err(|_| Error::Protocol(format!("Invalid reply code: {code_str}")))
}

fn split_enhanced(text: &str) -> Option<(EnhancedCode, &str)> {
    let (token, rest) = text.split_once(' ').unwrap_or((text, ""));
    EnhancedCode::parse(token).map(|code| (code, rest))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_single_line_reply() {
        let reply = parse_reply(&lines(&["250 OK"])).unwrap();
        assert_eq!(reply.code.as_u16(), 250);
        assert_eq!(reply.message, vec!["OK"]);
        assert!(reply.enhanced.is_none());
    }

    #[test]
    fn test_parse_multi_line_reply() {
        let reply = parse_reply(&lines(&[
            "250-smtp.example.com Hello",
            "250-SIZE 1000",
            "250 HELP",
        ]))
        .unwrap();
        assert_eq!(reply.code.as_u16(), 250);
        assert_eq!(reply.message, vec!["smtp.example.com Hello", "SIZE 1000", "HELP"]);
    }

    #[test]
    fn test_parse_enhanced_code() {
        let reply = parse_reply(&lines(&["550 5.1.1 <bad@x.com>: Recipient address rejected"]))
            .unwrap();
        assert_eq!(reply.code.as_u16(), 550);
        assert_eq!(reply.enhanced.unwrap().to_string(), "5.1.1");
        assert_eq!(reply.message, vec!["<bad@x.com>: Recipient address rejected"]);
    }

    #[test]
    fn test_parse_enhanced_code_multi_line() {
        let reply = parse_reply(&lines(&[
            "535-5.7.8 Username and Password not accepted.",
            "535 5.7.8 Learn more at https://support.example.com",
        ]))
        .unwrap();
        assert_eq!(reply.enhanced.unwrap().to_string(), "5.7.8");
        assert_eq!(reply.message[1], "Learn more at https://support.example.com");
    }

    #[test]
    fn test_enhanced_class_must_match_code() {
        let reply = parse_reply(&lines(&["250 5.0.0 odd"])).unwrap();
        assert!(reply.enhanced.is_none());
    }

    #[test]
    fn test_parse_bare_code() {
        let reply = parse_reply(&lines(&["354"])).unwrap();
        assert_eq!(reply.code.as_u16(), 354);
        assert_eq!(reply.message, vec![""]);
    }

    #[test]
    fn test_is_last_reply_line() {
        assert!(is_last_reply_line("250 OK"));
        assert!(!is_last_reply_line("250-Continuing"));
        assert!(is_last_reply_line("250"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_reply(&[]).is_err());
        assert!(parse_reply(&lines(&["25"])).is_err());
        assert!(parse_reply(&lines(&["ABC OK"])).is_err());
        assert!(parse_reply(&lines(&["+25 OK"])).is_err());
    }
}
