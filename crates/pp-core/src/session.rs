//! Conversation state for one chat view.
//!
//! The history is append-only. While the agent is answering, its text lives
//! in a separate streaming turn that is promoted into the history on
//! completion or discarded on failure, exactly once per request.

use chrono::{DateTime, Utc};
use pp_protocol::{last_search, HistoryEntry, Product, Role};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("message is empty")]
    EmptyInput,
    #[error("the agent is still answering")]
    Busy,
}

/// A finalized message in the transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Creation instant. Stable key for the message.
    pub timestamp: DateTime<Utc>,
    pub products: Option<Vec<Product>>,
}

impl ChatMessage {
    fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            products: None,
        }
    }

    fn assistant(content: String, products: Option<Vec<Product>>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            timestamp: Utc::now(),
            products,
        }
    }

    fn to_history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct StreamingTurn {
    text: String,
    products: Option<Vec<Product>>,
}

#[derive(Debug, Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    streaming: Option<StreamingTurn>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user submission and open a streaming turn.
    ///
    /// Returns the full history to send to the agent, ending with the new
    /// message.
    pub fn begin_turn(&mut self, input: &str) -> Result<Vec<HistoryEntry>, SubmitError> {
        if input.trim().is_empty() {
            return Err(SubmitError::EmptyInput);
        }
        if self.streaming.is_some() {
            return Err(SubmitError::Busy);
        }

        self.messages.push(ChatMessage::user(input));
        self.streaming = Some(StreamingTurn::default());
        Ok(self
            .messages
            .iter()
            .map(ChatMessage::to_history_entry)
            .collect())
    }

    pub fn push_token(&mut self, delta: &str) {
        if let Some(turn) = self.streaming.as_mut() {
            turn.text.push_str(delta);
        }
    }

    /// Take the products from a final agent state. States without a
    /// `last_search` list leave the pending products unchanged.
    pub fn set_final_state(&mut self, state: &Value) {
        let Some(turn) = self.streaming.as_mut() else {
            return;
        };
        if let Some(products) = last_search(state) {
            turn.products = Some(products);
        }
    }

    /// Close the streaming turn. Appends the assistant message when any text
    /// arrived and returns it.
    pub fn complete_turn(&mut self) -> Option<&ChatMessage> {
        let turn = self.streaming.take()?;
        if turn.text.is_empty() {
            tracing::debug!("agent turn ended without text");
            return None;
        }
        self.messages
            .push(ChatMessage::assistant(turn.text, turn.products));
        self.messages.last()
    }

    /// Drop the streaming turn without recording anything. Returns whether a
    /// turn was open.
    pub fn discard_turn(&mut self) -> bool {
        self.streaming.take().is_some()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.is_some()
    }

    pub fn streaming_text(&self) -> Option<&str> {
        self.streaming.as_ref().map(|t| t.text.as_str())
    }

    pub fn pending_products(&self) -> Option<&[Product]> {
        self.streaming
            .as_ref()
            .and_then(|t| t.products.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn search_state() -> Value {
        json!({"last_search": [{
            "name": "Teclado K2",
            "brand": "Keychron",
            "price": "R$ 599,00",
            "images": [],
            "url": "https://shop.example/p/k2"
        }]})
    }

    #[test]
    fn begin_turn_returns_full_history() {
        let mut session = ChatSession::new();
        session.begin_turn("hi").unwrap();
        session.push_token("Hello!");
        session.complete_turn();

        let history = session.begin_turn("keyboards").unwrap();
        assert_eq!(
            history,
            vec![
                HistoryEntry::user("hi"),
                HistoryEntry::assistant("Hello!"),
                HistoryEntry::user("keyboards"),
            ]
        );
    }

    #[test]
    fn blank_input_is_rejected() {
        let mut session = ChatSession::new();
        assert_eq!(session.begin_turn("   \n"), Err(SubmitError::EmptyInput));
        assert!(session.messages().is_empty());
        assert!(!session.is_streaming());
    }

    #[test]
    fn submission_while_streaming_is_rejected() {
        let mut session = ChatSession::new();
        session.begin_turn("first").unwrap();
        assert_eq!(session.begin_turn("second"), Err(SubmitError::Busy));
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn input_is_kept_as_typed() {
        let mut session = ChatSession::new();
        session.begin_turn("  padded  ").unwrap();
        assert_eq!(session.messages()[0].content, "  padded  ");
    }

    #[test]
    fn tokens_accumulate_outside_history() {
        let mut session = ChatSession::new();
        session.begin_turn("hi").unwrap();
        session.push_token("Hel");
        session.push_token("lo");
        assert_eq!(session.streaming_text(), Some("Hello"));
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn complete_turn_promotes_text_and_products() {
        let mut session = ChatSession::new();
        session.begin_turn("keyboards").unwrap();
        session.push_token("Here you go.");
        session.set_final_state(&search_state());
        assert_eq!(session.pending_products().map(|p| p.len()), Some(1));

        let message = session.complete_turn().unwrap().clone();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "Here you go.");
        assert_eq!(message.products.unwrap()[0].name, "Teclado K2");
        assert!(!session.is_streaming());
        assert_eq!(session.messages().len(), 2);
    }

    #[test]
    fn complete_turn_without_text_adds_nothing() {
        let mut session = ChatSession::new();
        session.begin_turn("hi").unwrap();
        session.set_final_state(&search_state());
        assert!(session.complete_turn().is_none());
        assert_eq!(session.messages().len(), 1);
        assert!(!session.is_streaming());
    }

    #[test]
    fn complete_turn_happens_once() {
        let mut session = ChatSession::new();
        session.begin_turn("hi").unwrap();
        session.push_token("Hello");
        assert!(session.complete_turn().is_some());
        assert!(session.complete_turn().is_none());
        assert_eq!(session.messages().len(), 2);
    }

    #[test]
    fn state_without_last_search_keeps_products() {
        let mut session = ChatSession::new();
        session.begin_turn("hi").unwrap();
        session.set_final_state(&search_state());
        session.set_final_state(&json!({"region": "br"}));
        assert_eq!(session.pending_products().map(|p| p.len()), Some(1));
    }

    #[test]
    fn discard_turn_drops_partial_answer() {
        let mut session = ChatSession::new();
        session.begin_turn("hi").unwrap();
        session.push_token("partial");
        assert!(session.discard_turn());
        assert!(!session.discard_turn());
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.streaming_text(), None);
        assert!(session.begin_turn("again").is_ok());
    }

    #[test]
    fn events_outside_a_turn_are_ignored() {
        let mut session = ChatSession::new();
        session.push_token("stray");
        session.set_final_state(&search_state());
        assert!(session.complete_turn().is_none());
        assert!(session.messages().is_empty());
    }

    #[test]
    fn timestamps_are_ordered() {
        let mut session = ChatSession::new();
        session.begin_turn("hi").unwrap();
        session.push_token("Hello");
        session.complete_turn();
        let messages = session.messages();
        assert!(messages[0].timestamp <= messages[1].timestamp);
    }
}
