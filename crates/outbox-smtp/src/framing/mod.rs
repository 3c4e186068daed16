//! DATA-phase framing.
//!
//! Turns a rendered message into the byte stream sent between `DATA` and the
//! final reply:
//!
//! 1. Line endings are normalized to CRLF.
//! 2. Lines longer than [`MAX_LINE_LENGTH`] are folded at the last space
//!    before the limit, or hard-cut when there is none. Continuations inside
//!    the header block are prefixed with a tab; body continuations are not.
//! 3. Lines starting with `.` get a second `.` (RFC 5321 section 4.5.2).
//! 4. The stream is terminated by a line containing a single `.`.

use std::borrow::Cow;

/// Maximum line length on the wire, excluding CRLF (RFC 5321 section 4.5.3.1.6).
pub const MAX_LINE_LENGTH: usize = 998;

/// End-of-data marker.
pub const TERMINATOR: &[u8] = b".\r\n";

/// Frames a complete message (headers, blank line, body) for transmission.
///
/// The returned bytes include the terminating `.` line.
#[must_use]
pub fn frame_message(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + message.len() / 64 + TERMINATOR.len() + 2);
    for line in frame_lines(message) {
        out.extend_from_slice(&line);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(TERMINATOR);
    out
}

/// Returns the framed output lines, without line endings or terminator.
#[must_use]
pub fn frame_lines(message: &[u8]) -> Vec<Vec<u8>> {
    let lines = split_lines(message);
    let mut in_headers = lines.first().is_some_and(|first| looks_like_header(first));

    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        if in_headers && line.is_empty() {
            in_headers = false;
        }

        for segment in fold_line(line, in_headers) {
            out.push(stuff_line(&segment).into_owned());
        }
    }
    out
}

/// Splits `line` into segments that fit on the wire once dot-stuffed.
///
/// With `header` set, every continuation segment starts with a tab. A fold
/// at a space keeps the space at the end of the earlier segment, so
/// [`unfold_lines`] restores the input exactly.
#[must_use]
pub fn fold_line(line: &[u8], header: bool) -> Vec<Vec<u8>> {
    let mut segments = Vec::new();
    let mut rest = line.to_vec();

    loop {
        // A leading dot costs one byte once stuffed.
        let limit = if rest.first() == Some(&b'.') {
            MAX_LINE_LENGTH - 1
        } else {
            MAX_LINE_LENGTH
        };
        if rest.len() <= limit {
            break;
        }

        let cut = break_point(&rest, limit);
        let mut next = Vec::with_capacity(rest.len() - cut + 1);
        if header {
            next.push(b'\t');
        }
        next.extend_from_slice(&rest[cut..]);
        rest.truncate(cut);
        segments.push(std::mem::replace(&mut rest, next));
    }

    segments.push(rest);
    segments
}

/// Rejoins segments produced by [`fold_line`].
#[must_use]
pub fn unfold_lines<S: AsRef<[u8]>>(segments: &[S], header: bool) -> Vec<u8> {
    let mut line = Vec::new();
    for (i, segment) in segments.iter().enumerate() {
        let segment = segment.as_ref();
        if i > 0 && header {
            line.extend_from_slice(segment.strip_prefix(b"\t").unwrap_or(segment));
        } else {
            line.extend_from_slice(segment);
        }
    }
    line
}

/// Doubles a leading dot.
#[must_use]
pub fn stuff_line(line: &[u8]) -> Cow<'_, [u8]> {
    if line.first() == Some(&b'.') {
        let mut stuffed = Vec::with_capacity(line.len() + 1);
        stuffed.push(b'.');
        stuffed.extend_from_slice(line);
        Cow::Owned(stuffed)
    } else {
        Cow::Borrowed(line)
    }
}

/// Removes the dot added by [`stuff_line`], as a receiving server does.
#[must_use]
pub fn unstuff_line(line: &[u8]) -> &[u8] {
    line.strip_prefix(b".").unwrap_or(line)
}

/// Splits on CRLF, lone CR or lone LF. A trailing line ending does not
/// produce an empty final line.
fn split_lines(message: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < message.len() {
        match message[i] {
            b'\r' => {
                lines.push(&message[start..i]);
                if message.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            b'\n' => {
                lines.push(&message[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    if start < message.len() {
        lines.push(&message[start..]);
    }
    lines
}

/// True if `line` opens with a field name (`Name:` without spaces).
fn looks_like_header(line: &[u8]) -> bool {
    match line.iter().position(|&b| b == b':') {
        Some(pos) if pos > 0 => !line[..pos].contains(&b' '),
        _ => false,
    }
}

/// Index at which to cut `line` so the first part is at most `limit` bytes.
fn break_point(line: &[u8], limit: usize) -> usize {
    if let Some(pos) = line[..limit].iter().rposition(|&b| b == b' ') {
        if pos > 0 {
            return pos + 1;
        }
    }

    // Hard cut, backing off so a UTF-8 sequence is not split.
    let mut cut = limit;
    while cut > 1 && (line[cut] & 0xC0) == 0x80 {
        cut -= 1;
    }
    if cut > 1 { cut } else { limit }
}
