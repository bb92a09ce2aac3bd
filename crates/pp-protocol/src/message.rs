//! Events decoded from the agent's response stream.

use serde_json::Value;

/// One typed event from the agent stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A fragment of response text, appended to everything before it.
    Token(String),

    /// The settled agent state for the turn. Usually carries `last_search`.
    FinalState(Value),

    /// The agent reported an error in-band.
    Error(String),

    /// The agent marked the end of its output. Carries nothing.
    Done,
}
