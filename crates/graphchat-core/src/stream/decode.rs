//! Event decoding for `data: {json}` frames.
//!
//! Bad frames are absorbed here: they are logged and skipped, never returned
//! as errors to the stream loop.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::session::ToolInvocationRecord;
use crate::stream::StreamEvent;

/// Prefix every meaningful frame starts with.
pub const DATA_PREFIX: &str = "data: ";

/// Longest frame excerpt included in a warning.
const MAX_LOGGED_FRAME_LEN: usize = 200;

/// Categories of frame decoding failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// Payload is not valid JSON.
    Json,
    /// JSON is valid but lacks the `{type, data}` envelope.
    Envelope,
    /// `data` has the wrong shape for its event type.
    Payload,
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeErrorKind::Json => write!(f, "json"),
            DecodeErrorKind::Envelope => write!(f, "envelope"),
            DecodeErrorKind::Payload => write!(f, "payload"),
        }
    }
}

/// A frame that carried the `data: ` prefix but could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub message: String,
}

impl DecodeError {
    pub fn new(kind: DecodeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DecodeError {}

#[derive(Debug, Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Value,
}

/// Parses a frame into the full event union.
///
/// Returns `Ok(None)` for frames without the data prefix (blank lines,
/// keep-alives, comments). Unknown event types come back as
/// [`StreamEvent::Unrecognized`].
///
/// # Errors
/// Returns a [`DecodeError`] when a data frame's payload is malformed.
pub fn parse_frame(frame: &str) -> Result<Option<StreamEvent>, DecodeError> {
    let Some(payload) = frame.trim().strip_prefix(DATA_PREFIX) else {
        return Ok(None);
    };

    let value: Value = serde_json::from_str(payload).map_err(|err| {
        DecodeError::new(
            DecodeErrorKind::Json,
            format!("Failed to parse event payload: {err}"),
        )
    })?;
    let envelope: WireEnvelope = serde_json::from_value(value).map_err(|err| {
        DecodeError::new(
            DecodeErrorKind::Envelope,
            format!("Event payload is not a {{type, data}} object: {err}"),
        )
    })?;

    let event = match envelope.event_type.as_str() {
        "token" | "message" => {
            log_legacy_alias(&envelope.event_type, "message", "token");
            StreamEvent::Token(expect_text(&envelope.event_type, envelope.data)?)
        }
        "tool_start" | "tool" => {
            log_legacy_alias(&envelope.event_type, "tool", "tool_start");
            let record: ToolInvocationRecord =
                serde_json::from_value(envelope.data).map_err(|err| {
                    DecodeError::new(
                        DecodeErrorKind::Payload,
                        format!("Invalid {} data: {err}", envelope.event_type),
                    )
                })?;
            StreamEvent::ToolStart(record)
        }
        "sparql_update" => StreamEvent::QueryUpdate(expect_text("sparql_update", envelope.data)?),
        _ => StreamEvent::Unrecognized {
            kind: envelope.event_type,
        },
    };

    Ok(Some(event))
}

/// Decodes a frame, absorbing every failure.
///
/// Non-data frames and unknown event types yield `None` silently; malformed
/// payloads are reported through `tracing` and also yield `None`.
pub fn decode(frame: &str) -> Option<StreamEvent> {
    match parse_frame(frame) {
        Ok(Some(StreamEvent::Unrecognized { kind })) => {
            tracing::debug!(%kind, "ignoring unrecognized event type");
            None
        }
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(
                kind = %err.kind,
                error = %err,
                frame = %truncate_for_log(frame, MAX_LOGGED_FRAME_LEN),
                "skipping malformed frame"
            );
            None
        }
    }
}

fn expect_text(event_type: &str, data: Value) -> Result<String, DecodeError> {
    match data {
        Value::String(text) => Ok(text),
        other => Err(DecodeError::new(
            DecodeErrorKind::Payload,
            format!("Expected string data for {event_type}, got {}", json_type_name(&other)),
        )),
    }
}

// The backend has shipped two names for the same event with no version
// negotiation; record which one we saw.
fn log_legacy_alias(seen: &str, legacy: &str, current: &str) {
    if seen == legacy {
        tracing::debug!(legacy, current, "backend sent legacy event name");
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes)", &s[..end], s.len())
}
