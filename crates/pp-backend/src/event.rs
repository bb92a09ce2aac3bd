//! Decoding of single `data:` lines into [`StreamEvent`]s.

use pp_protocol::StreamEvent;
use serde::Deserialize;
use serde_json::Value;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";
const UNKNOWN_ERROR: &str = "Unknown error";

/// The JSON object carried by each `data:` line.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    Token { delta: Option<String> },
    FinalState { state: Option<Value> },
    Error { error: Option<String> },
    Done,
    #[serde(other)]
    Unknown,
}

/// Decode one line of the response body.
///
/// Returns `None` for anything that should not reach a callback: lines
/// without the `data: ` prefix, the `[DONE]` sentinel, malformed JSON,
/// unknown event types and events missing their payload.
pub fn decode_line(line: &str) -> Option<StreamEvent> {
    let payload = line.trim().strip_prefix(DATA_PREFIX)?;
    if payload == DONE_SENTINEL {
        return None;
    }

    let event: WireEvent = match serde_json::from_str(payload) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(error = %e, payload, "skipping malformed event line");
            return None;
        }
    };

    match event {
        WireEvent::Token { delta: Some(delta) } if !delta.is_empty() => {
            Some(StreamEvent::Token(delta))
        }
        WireEvent::FinalState { state: Some(state) } if !state.is_null() => {
            Some(StreamEvent::FinalState(state))
        }
        WireEvent::Error { error } => {
            let message = error
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
            Some(StreamEvent::Error(message))
        }
        WireEvent::Done => Some(StreamEvent::Done),
        WireEvent::Unknown => {
            tracing::trace!(payload, "ignoring event with unknown type");
            None
        }
        WireEvent::Token { .. } | WireEvent::FinalState { .. } => {
            tracing::trace!(payload, "ignoring event without payload");
            None
        }
    }
}
