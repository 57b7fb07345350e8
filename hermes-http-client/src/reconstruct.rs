//! Rebuilding structured responses from a raw transfer buffer.
//!
//! The direct transport receives the response as one byte buffer holding
//! every header block (one per redirect hop or interim response) followed by
//! the body, plus the total header length reported by the engine.

use bytes::Bytes;
use http::StatusCode;
use std::collections::BTreeMap;

use crate::{Diagnostics, HttpClientError, Response, Result, TransportError, TransportErrorKind};

/// Engine failure captured instead of raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    /// Engine error code.
    pub code: i32,
    /// Classification.
    pub kind: TransportErrorKind,
    /// Engine error message.
    pub message: String,
}

/// Undifferentiated transfer output of the direct transport.
#[derive(Debug, Clone)]
pub struct RawResult {
    /// Header blocks followed by the body.
    pub bytes: Bytes,
    /// Length of the header blocks, as reported by the engine.
    pub header_size: usize,
    /// Transfer diagnostics.
    pub diagnostics: Diagnostics,
    /// Set when the transfer failed.
    pub error: Option<TransportFailure>,
}

/// A parsed `HTTP/x.y code reason` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    /// Protocol token, e.g. `HTTP/1.1`.
    pub protocol: String,
    /// Status code.
    pub code: u16,
    /// Reason phrase (may be empty, HTTP/2 has none).
    pub reason: String,
}

impl StatusLine {
    /// Parse a status line, `None` if `line` is not one.
    pub fn parse(line: &str) -> Option<Self> {
        if !line.starts_with("HTTP/") {
            return None;
        }
        let mut parts = line.splitn(3, ' ');
        let protocol = parts.next()?.to_string();
        let code = parts.next()?.trim().parse().ok()?;
        let reason = parts.next().unwrap_or("").trim().to_string();
        Some(Self {
            protocol,
            code,
            reason,
        })
    }
}

/// Result of parsing a header block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedHead {
    /// Last status line seen.
    pub status: Option<StatusLine>,
    /// Lower-cased name → last value.
    pub headers: BTreeMap<String, String>,
    /// Every header occurrence, in order.
    pub lines: Vec<(String, String)>,
}

/// Split the buffer at `header_size`. Out-of-range sizes are clamped.
pub fn split(bytes: &Bytes, header_size: usize) -> (Bytes, Bytes) {
    let at = header_size.min(bytes.len());
    (bytes.slice(..at), bytes.slice(at..))
}

/// Parse every header block in the buffer, one per status line.
///
/// Lines are separated by CRLF. Blank lines and lines without a colon are
/// dropped; names are trimmed and lower-cased, values trimmed, and a
/// repeated name overwrites the earlier value in `headers`. A status line
/// opens a new block, so redirect hops and interim responses each get
/// their own entry.
pub fn parse_header_blocks(block: &[u8]) -> Vec<ParsedHead> {
    let text = String::from_utf8_lossy(block);
    let mut blocks = Vec::new();
    let mut head = ParsedHead::default();

    for line in text.split("\r\n") {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(status) = StatusLine::parse(line) {
            if head.status.is_some() || !head.lines.is_empty() {
                blocks.push(std::mem::take(&mut head));
            }
            head.status = Some(status);
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim().to_lowercase();
        let value = value.trim().to_string();
        head.lines.push((name.clone(), value.clone()));
        head.headers.insert(name, value);
    }

    blocks.push(head);
    blocks
}

/// Parse the header block of the final response.
///
/// Headers sent by earlier hops are discarded.
pub fn parse_header_block(block: &[u8]) -> ParsedHead {
    parse_header_blocks(block).pop().unwrap_or_default()
}

/// Turns a [`RawResult`] into a [`Response`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseReconstructor {
    keep_header_block: bool,
}

impl ResponseReconstructor {
    /// Create a reconstructor. With `keep_header_block` the raw header
    /// block stays in front of the body.
    pub fn new(keep_header_block: bool) -> Self {
        Self { keep_header_block }
    }

    /// Rebuild the response, or surface the captured transport failure.
    pub fn reconstruct(&self, raw: RawResult) -> Result<Response> {
        let RawResult {
            bytes,
            header_size,
            mut diagnostics,
            error,
        } = raw;

        if let Some(failure) = error {
            return Err(TransportError::new(
                diagnostics.transport,
                failure.kind,
                failure.code,
                failure.message,
            )
            .with_diagnostics(diagnostics)
            .into());
        }

        let (block, body) = split(&bytes, header_size);
        let head = parse_header_block(&block);

        if let Some(status) = &head.status {
            diagnostics.protocol = Some(status.protocol.clone());
        }

        let code = diagnostics
            .status
            .filter(|code| *code != 0)
            .or_else(|| head.status.as_ref().map(|s| s.code));
        let Some(status) = code.and_then(|code| StatusCode::from_u16(code).ok()) else {
            let message = match code {
                Some(code) => format!("invalid status code: {}", code),
                None => "response carried no status line".to_string(),
            };
            return Err(malformed(diagnostics, message));
        };
        let code = status.as_u16();
        diagnostics.status = Some(code);

        let body = if self.keep_header_block { bytes } else { body };

        Ok(Response::from_parts(
            status,
            head.headers,
            head.lines,
            body,
            diagnostics,
        ))
    }
}

fn malformed(diagnostics: Diagnostics, message: String) -> HttpClientError {
    TransportError::new(diagnostics.transport, TransportErrorKind::Other, 0, message)
        .with_diagnostics(diagnostics)
        .into()
}
