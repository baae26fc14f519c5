//! Newline framing for transfer event streams.
//!
//! Network chunks arrive at arbitrary boundaries: one chunk may carry several
//! events, half an event, or half of a multi-byte character. The framer keeps
//! raw bytes until it sees `\n`, so text is only decoded once a whole line is
//! present. A newline byte never occurs inside a multi-byte UTF-8 sequence, so
//! splitting at the byte level is safe.

use bytes::{Bytes, BytesMut};
use futures::Stream;
use futures_util::stream::{self, StreamExt};
use std::collections::VecDeque;

use crate::traits::HttpError;

/// Default upper bound on a single line, newline excluded.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Push-based line framer.
///
/// Feed chunks with [`push`](Self::push) and collect the complete lines each
/// call returns; call [`finish`](Self::finish) once the source ends to flush
/// an unterminated last line.
#[derive(Debug)]
pub struct LineFramer {
    buffer: BytesMut,
    /// Prefix of `buffer` already known to hold no newline
    scanned: usize,
    max_line_bytes: usize,
    /// Dropping an oversized line until its newline shows up
    discarding: bool,
    oversized_lines: u64,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::with_max_line_bytes(DEFAULT_MAX_LINE_BYTES)
    }

    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            scanned: 0,
            max_line_bytes,
            discarding: false,
            oversized_lines: 0,
        }
    }

    /// Append a chunk and return every line it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        self.buffer.extend_from_slice(chunk);

        loop {
            let found = self.buffer[self.scanned..].iter().position(|b| *b == b'\n');
            let Some(offset) = found else {
                break;
            };
            let newline = self.scanned + offset;
            let raw = self.buffer.split_to(newline + 1);
            self.scanned = 0;

            if self.discarding {
                self.discarding = false;
                continue;
            }
            if newline > self.max_line_bytes {
                self.note_oversized();
                continue;
            }
            if let Some(line) = decode_line(&raw[..newline]) {
                lines.push(line);
            }
        }
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_line_bytes {
            if !self.discarding {
                self.note_oversized();
            }
            self.discarding = true;
            self.buffer.clear();
            self.scanned = 0;
        }

        lines
    }

    /// Flush the line-in-progress once the source has ended.
    pub fn finish(&mut self) -> Option<String> {
        let rest = self.buffer.split();
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) {
            return None;
        }
        decode_line(&rest)
    }

    /// Bytes held for a line that has not been terminated yet.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Number of lines dropped for exceeding the length limit.
    pub fn oversized_lines(&self) -> u64 {
        self.oversized_lines
    }

    fn note_oversized(&mut self) {
        self.oversized_lines += 1;
        tracing::warn!(
            "Dropping stream line longer than {} bytes",
            self.max_line_bytes
        );
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode one line without its `\n`; blank lines yield `None`.
///
/// A complete line that is not valid UTF-8 is corrupt (a split character
/// cannot reach here), so it is dropped rather than decoded lossily.
fn decode_line(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let line = match std::str::from_utf8(raw) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(
                "Dropping stream line with invalid UTF-8 at byte {}: {}",
                e.valid_up_to(),
                String::from_utf8_lossy(&raw[..raw.len().min(200)])
            );
            return None;
        }
    };
    if line.trim().is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

/// Turn a byte stream into a stream of complete lines.
///
/// The first read error is yielded and ends the sequence; nothing is retried.
pub fn frame_lines<S>(
    bytes: S,
    framer: LineFramer,
) -> impl Stream<Item = Result<String, HttpError>>
where
    S: Stream<Item = Result<Bytes, HttpError>> + Unpin,
{
    stream::unfold(
        (bytes, framer, VecDeque::new(), false),
        |(mut bytes, mut framer, mut pending, mut done)| async move {
            loop {
                if let Some(line) = pending.pop_front() {
                    return Some((Ok(line), (bytes, framer, pending, done)));
                }
                if done {
                    return None;
                }

                match bytes.next().await {
                    Some(Ok(chunk)) => {
                        pending.extend(framer.push(&chunk));
                    }
                    Some(Err(e)) => {
                        done = true;
                        return Some((Err(e), (bytes, framer, pending, done)));
                    }
                    None => {
                        done = true;
                        pending.extend(framer.finish());
                    }
                }
            }
        },
    )
}
