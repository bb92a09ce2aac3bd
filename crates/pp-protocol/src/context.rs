//! Request types sent to the agent proxy.

use serde::{Deserialize, Serialize};

/// Region tag used when the caller does not supply one.
pub const DEFAULT_REGION: &str = "us";

/// Role in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message in the wire form the proxy expects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl HistoryEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Channels the agent should stream back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    /// Incremental message tokens.
    Messages,
    /// The graph state once the turn settles.
    State,
}

/// A complete request to the agent proxy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub messages: Vec<HistoryEntry>,
    pub region: String,
    pub stream_mode: Vec<StreamMode>,
}

impl ChatRequest {
    /// Build a request for the given history. Falls back to [`DEFAULT_REGION`]
    /// when no region is given.
    pub fn new(messages: Vec<HistoryEntry>, region: Option<&str>) -> Self {
        Self {
            messages,
            region: region
                .filter(|r| !r.is_empty())
                .unwrap_or(DEFAULT_REGION)
                .to_string(),
            stream_mode: vec![StreamMode::Messages, StreamMode::State],
        }
    }
}
