// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! JSONL parsing for Claude Code session logs.
//!
//! A session log stores one JSON record per line. Records are heterogeneous:
//! conversation messages, tool results, compacted summaries, leaf summaries
//! and bookkeeping entries all share the same file. This module turns each
//! line into a typed [`RawEvent`] and classifies it by the marker keys it
//! carries, without interpreting the conversation itself.
//!
//! # Example
//!
//! ```
//! use ccexport::event::{EventKind, RawEventReader, RawRecord};
//!
//! let log = r#"{"message":{"role":"user","content":"Hi"},"timestamp":"2024-01-01T10:00:00Z"}
//! not json
//! "#;
//!
//! let records: Vec<_> = RawEventReader::new(log.as_bytes())
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//!
//! assert_eq!(records.len(), 2);
//! match &records[0] {
//!     RawRecord::Event { event, .. } => assert_eq!(event.kind, EventKind::Regular),
//!     other => panic!("expected event, got {other:?}"),
//! }
//! assert!(matches!(records[1], RawRecord::Malformed { line: 2, .. }));
//! ```

use serde::Deserialize;
use serde_json::Value;
use snafu::prelude::*;
use std::io::BufRead;
use std::path::PathBuf;

/// Error type for failures while reading a session log.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ReadError {
    /// The underlying reader failed.
    #[snafu(display("failed to read {}: {source}", path.display()))]
    Io {
        /// The file being read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// How a record participates in normalization, derived from its marker keys.
///
/// Markers are checked by presence, not by value: a record carrying
/// `"isApiErrorMessage": false` is still an API error record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Carries `leafUuid`: out-of-band session title metadata.
    LeafSummary,
    /// Carries `isApiErrorMessage`.
    ApiError,
    /// Carries `isMeta`.
    Meta,
    /// Carries `isCompactSummary`: an injected recap of earlier context.
    CompactSummary,
    /// Carries `toolUseResult`: the output of a previously invoked tool.
    ToolResult,
    /// Carries `requestId`: an assistant response chunk.
    Request,
    /// None of the marker keys.
    Regular,
}

/// A single content block inside `message.content`.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    /// Plain text.
    Text(String),
    /// Extended thinking output.
    Thinking(String),
    /// A tool invocation.
    ToolUse {
        /// Identifier used to match the result.
        id: String,
        /// The tool name (e.g., "Write", "Bash").
        name: String,
        /// The tool's input parameters.
        input: Value,
    },
    /// The output of a tool invocation.
    ToolResult {
        /// The invocation this result answers, when recorded.
        tool_use_id: Option<String>,
        /// The result payload (usually a string, sometimes a block list).
        content: Value,
    },
    /// Any other block type, kept verbatim.
    Other(Value),
}

/// The content of a message: either a bare string or a list of blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// A plain string.
    Text(String),
    /// An ordered list of typed blocks.
    Blocks(Vec<ContentBlock>),
}

impl Content {
    /// Returns the tool invocations contained in this content, in order.
    #[must_use]
    pub fn tool_uses(&self) -> Vec<&ContentBlock> {
        match self {
            Self::Text(_) => Vec::new(),
            Self::Blocks(blocks) => blocks
                .iter()
                .filter(|b| matches!(b, ContentBlock::ToolUse { .. }))
                .collect(),
        }
    }

    /// Concatenates the plain text of this content, ignoring non-text blocks.
    #[must_use]
    pub fn plain_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text(t) => Some(t.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

/// A leaf summary record: a short title for a conversation branch.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LeafSummary {
    /// The leaf message the summary belongs to.
    pub uuid: String,
    /// The summary text.
    pub summary: String,
    /// When the summary was recorded, if known.
    pub timestamp: Option<String>,
}

/// One parsed line of a session log.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    /// Classification derived from the marker keys.
    pub kind: EventKind,
    /// ISO-8601 timestamp, when present.
    pub timestamp: Option<String>,
    /// `message.role`, when present.
    pub role: Option<String>,
    /// `message.id`, when present.
    pub message_id: Option<String>,
    /// `message.content`, when present.
    pub content: Option<Content>,
    /// The `toolUseResult` payload for [`EventKind::ToolResult`] records.
    pub tool_use_result: Option<Value>,
    /// Extracted summary for [`EventKind::LeafSummary`] records.
    pub leaf: Option<LeafSummary>,
    /// The original record, kept for diagnostics.
    pub raw: Value,
}

impl ContentBlock {
    fn from_value(value: Value) -> Self {
        match get_str(&value, &["type"]) {
            Some("text") => match get_string(&value, &["text"]) {
                Some(text) => Self::Text(text),
                None => Self::Other(value),
            },
            Some("thinking") => match get_string(&value, &["thinking"]) {
                Some(thinking) => Self::Thinking(thinking),
                None => Self::Other(value),
            },
            Some("tool_use") => Self::ToolUse {
                id: get_string(&value, &["id"]).unwrap_or_default(),
                name: get_string(&value, &["name"]).unwrap_or_else(|| "Unknown Tool".to_owned()),
                input: value
                    .get("input")
                    .cloned()
                    .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
            },
            Some("tool_result") => Self::ToolResult {
                tool_use_id: get_string(&value, &["tool_use_id"]),
                content: value.get("content").cloned().unwrap_or(Value::Null),
            },
            _ => Self::Other(value),
        }
    }
}

impl Content {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Array(items) => Some(Self::Blocks(
                items.iter().cloned().map(ContentBlock::from_value).collect(),
            )),
            Value::Null => None,
            other => Some(Self::Blocks(vec![ContentBlock::Other(other.clone())])),
        }
    }
}

/// Only JSON objects deserialize into an event.
impl<'de> Deserialize<'de> for RawEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        if !value.is_object() {
            return Err(serde::de::Error::custom("expected a JSON object"));
        }
        Ok(Self::from_value(value))
    }
}

impl RawEvent {
    /// Builds an event from an already-parsed JSON record.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let kind = classify(&value);
        let timestamp = get_string(&value, &["timestamp"]);

        let leaf = (kind == EventKind::LeafSummary).then(|| LeafSummary {
            uuid: get_string(&value, &["leafUuid"]).unwrap_or_default(),
            summary: get_string(&value, &["summary"]).unwrap_or_default(),
            timestamp: timestamp.clone(),
        });

        let (role, message_id, content) = match value.get("message") {
            Some(message) if message.is_object() => (
                get_string(message, &["role"]),
                get_string(message, &["id"]),
                message.get("content").and_then(Content::from_value),
            ),
            // Bare thinking records carry their text at the top level.
            _ if get_str(&value, &["type"]) == Some("thinking") => (
                Some("assistant".to_owned()),
                None,
                get_string(&value, &["thinking"])
                    .map(|t| Content::Blocks(vec![ContentBlock::Thinking(t)])),
            ),
            _ => (None, None, None),
        };

        let tool_use_result = value.get("toolUseResult").cloned();

        Self {
            kind,
            timestamp,
            role,
            message_id,
            content,
            tool_use_result,
            leaf,
            raw: value,
        }
    }

    /// Returns the `tool_result` blocks carried in this event's content.
    #[must_use]
    pub fn tool_results(&self) -> Vec<(Option<&str>, &Value)> {
        match &self.content {
            Some(Content::Blocks(blocks)) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                    } => Some((tool_use_id.as_deref(), content)),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn classify(value: &Value) -> EventKind {
    let has = |key: &str| value.get(key).is_some();

    if has("leafUuid") {
        EventKind::LeafSummary
    } else if has("isApiErrorMessage") {
        EventKind::ApiError
    } else if has("isMeta") {
        EventKind::Meta
    } else if has("isCompactSummary") {
        EventKind::CompactSummary
    } else if has("toolUseResult") {
        EventKind::ToolResult
    } else if has("requestId") {
        EventKind::Request
    } else {
        EventKind::Regular
    }
}

/// Navigates a JSON path and returns the string value at the end.
fn get_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_str()
}

/// Like [`get_str`] but returns an owned `String`.
fn get_string(value: &Value, path: &[&str]) -> Option<String> {
    get_str(value, path).map(str::to_owned)
}

/// One non-blank line of a session log.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    /// The line parsed as a JSON object.
    Event {
        /// 1-based line number.
        line: usize,
        /// The parsed record.
        event: Box<RawEvent>,
    },
    /// The line is not valid UTF-8 or not a JSON object.
    Malformed {
        /// 1-based line number.
        line: usize,
        /// The parser's error message.
        message: String,
        /// The offending line.
        raw: String,
    },
}

/// Yields [`RawRecord`]s from a line-oriented log, skipping blank lines.
///
/// Lines that are not valid UTF-8 or not a JSON object are yielded as
/// [`RawRecord::Malformed`] rather than ending iteration; only I/O failures
/// produce an `Err`.
pub struct RawEventReader<R> {
    reader: R,
    buf: Vec<u8>,
    line: usize,
}

impl<R: BufRead> RawEventReader<R> {
    /// Wraps a buffered reader.
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for RawEventReader<R> {
    type Item = std::io::Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e)),
            }
            self.line += 1;
            let line = self.line;

            let bytes = self.buf.strip_suffix(b"\n").unwrap_or(self.buf.as_slice());
            let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
            let text = match std::str::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => {
                    return Some(Ok(RawRecord::Malformed {
                        line,
                        message: format!("invalid UTF-8: {e}"),
                        raw: String::from_utf8_lossy(bytes).into_owned(),
                    }));
                }
            };

            if text.trim().is_empty() {
                continue;
            }

            let record = match serde_json::from_str::<RawEvent>(text) {
                Ok(event) => RawRecord::Event {
                    line,
                    event: Box::new(event),
                },
                Err(e) => RawRecord::Malformed {
                    line,
                    message: e.to_string(),
                    raw: text.to_owned(),
                },
            };
            return Some(Ok(record));
        }
    }
}
