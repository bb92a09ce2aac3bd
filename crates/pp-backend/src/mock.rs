//! Mock transport for testing.
//!
//! Serves scripted response bodies chunk by chunk so tests at every layer
//! can drive the decoder without real HTTP.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_stream::stream;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::StreamExt;
use pp_protocol::ChatRequest;
use tokio::time::sleep;

use crate::error::BackendError;
use crate::transport::{ByteStream, Transport};

/// One step of a scripted response body.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Emit raw bytes as a single chunk.
    Chunk { bytes: Vec<u8> },
    /// Delay before the next step (for timing tests).
    Delay { ms: u64 },
    /// Fail the body read with this message. Nothing follows.
    Fail { message: String },
    /// Stop producing data without ending the body.
    Hang,
}

impl MockResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Chunk {
            bytes: text.into().into_bytes(),
        }
    }
}

/// Configuration for one mock response.
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// HTTP status. Anything outside 2xx fails before a body is produced.
    pub status: u16,
    /// Refuse the connection with this message instead of responding.
    pub connect_error: Option<String>,
    /// Sequence of body steps.
    pub responses: Vec<MockResponse>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            status: 200,
            connect_error: None,
            responses: Vec::new(),
        }
    }
}

impl MockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(mut self, responses: Vec<MockResponse>) -> Self {
        self.responses = responses;
        self
    }

    /// Body made of the given text chunks, in order.
    pub fn with_chunks(self, chunks: &[&str]) -> Self {
        self.with_responses(chunks.iter().map(|c| MockResponse::text(*c)).collect())
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_connect_error(mut self, message: impl Into<String>) -> Self {
        self.connect_error = Some(message.into());
        self
    }
}

/// [`Transport`] that replays [`MockConfig`]s and records every request.
///
/// Each `open` consumes the next config; the last one is reused once the
/// queue runs dry.
pub struct MockTransport {
    configs: Mutex<VecDeque<MockConfig>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockTransport {
    pub fn new(config: MockConfig) -> Self {
        Self::sequence(vec![config])
    }

    pub fn sequence(configs: Vec<MockConfig>) -> Self {
        Self {
            configs: Mutex::new(configs.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn next_config(&self) -> MockConfig {
        let mut configs = self.configs.lock().unwrap_or_else(|e| e.into_inner());
        if configs.len() > 1 {
            configs.pop_front().unwrap_or_default()
        } else {
            configs.front().cloned().unwrap_or_default()
        }
    }
}

impl Transport for MockTransport {
    fn open(&self, request: ChatRequest) -> BoxFuture<'_, Result<ByteStream, BackendError>> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        let config = self.next_config();

        Box::pin(async move {
            if let Some(message) = config.connect_error {
                return Err(BackendError::Transport(message));
            }
            if !(200..300).contains(&config.status) {
                return Err(BackendError::Status {
                    status: config.status,
                    body: String::new(),
                });
            }
            Ok(body_stream(config.responses))
        })
    }
}

/// Create a byte stream from scripted body steps.
fn body_stream(responses: Vec<MockResponse>) -> ByteStream {
    stream! {
        for response in responses {
            match response {
                MockResponse::Chunk { bytes } => {
                    yield Ok(Bytes::from(bytes));
                }
                MockResponse::Delay { ms } => {
                    sleep(Duration::from_millis(ms)).await;
                }
                MockResponse::Fail { message } => {
                    yield Err(BackendError::Body(message));
                    return;
                }
                MockResponse::Hang => {
                    futures::future::pending::<()>().await;
                }
            }
        }
    }
    .boxed()
}

/// Built-in fixtures for common stream bodies.
pub mod fixtures {
    use serde_json::{json, Value};

    use super::*;

    /// One SSE block carrying `event` as its data.
    pub fn sse_data(event: &Value) -> String {
        format!("data: {event}\n\n")
    }

    /// A body of `token` events, one per delta.
    pub fn token_events(deltas: &[&str]) -> String {
        deltas
            .iter()
            .map(|delta| sse_data(&json!({"type": "token", "delta": delta})))
            .collect()
    }

    /// A `final_state` event carrying `state`.
    pub fn final_state_event(state: Value) -> String {
        sse_data(&json!({"type": "final_state", "state": state}))
    }

    /// Split `body` into chunks of `size` bytes, ignoring character and
    /// line boundaries.
    pub fn fragmented(body: &str, size: usize) -> Vec<MockResponse> {
        body.as_bytes()
            .chunks(size.max(1))
            .map(|chunk| MockResponse::Chunk {
                bytes: chunk.to_vec(),
            })
            .collect()
    }

    /// A complete answer streamed as tokens, followed by a final state.
    pub fn answer_with_products(deltas: &[&str], products: Value) -> MockConfig {
        let mut body = token_events(deltas);
        body.push_str(&final_state_event(json!({"last_search": products})));
        body.push_str("data: [DONE]\n\n");
        MockConfig::new().with_chunks(&[&body])
    }

    /// Some text, then a body read failure.
    pub fn error_mid_stream(text_before: &str, error: &str) -> MockConfig {
        MockConfig::new().with_responses(vec![
            MockResponse::text(token_events(&[text_before])),
            MockResponse::Fail {
                message: error.to_string(),
            },
        ])
    }
}
