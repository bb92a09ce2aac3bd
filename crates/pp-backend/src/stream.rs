//! Agent stream dispatcher.
//!
//! [`AgentStream`] sends the conversation to the agent proxy and turns the
//! SSE response into callback invocations. At most one stream is active per
//! instance: starting a new one, or calling [`AgentStream::stop`], cancels
//! the previous attempt and silences it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::StreamExt;
use pp_protocol::{ChatRequest, HistoryEntry, StreamEvent};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::BackendError;
use crate::event::decode_line;
use crate::sse::sse_lines;
use crate::transport::Transport;

type TextFn = Arc<dyn Fn(&str) + Send + Sync>;
type StateFn = Arc<dyn Fn(&Value) + Send + Sync>;
type CompleteFn = Arc<dyn Fn() + Send + Sync>;

/// Callbacks receiving the events of a stream.
///
/// All callbacks are optional. Cloning is cheap.
#[derive(Clone, Default)]
pub struct StreamCallbacks {
    on_token: Option<TextFn>,
    on_final_state: Option<StateFn>,
    on_error: Option<TextFn>,
    on_complete: Option<CompleteFn>,
}

impl StreamCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with each text delta, in arrival order.
    pub fn on_token(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_token = Some(Arc::new(f));
        self
    }

    /// Called with the agent state when the turn settles.
    pub fn on_final_state(mut self, f: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.on_final_state = Some(Arc::new(f));
        self
    }

    /// Called once when the request fails, and for each in-band error event.
    pub fn on_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Called once after the body ends and any trailing data is processed.
    pub fn on_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for StreamCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCallbacks")
            .field("on_token", &self.on_token.is_some())
            .field("on_final_state", &self.on_final_state.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// How a single attempt ended.
enum Outcome {
    Completed,
    Failed(BackendError),
    Cancelled,
}

/// Identity and cancellation handle of one `stream` call.
#[derive(Clone)]
struct Attempt {
    id: u64,
    token: CancellationToken,
}

/// Streaming client for one conversation view.
pub struct AgentStream<T> {
    transport: T,
    callbacks: Mutex<StreamCallbacks>,
    active: Mutex<Option<Attempt>>,
    next_id: AtomicU64,
    accumulated: Mutex<String>,
}

/// Releases the active slot when an attempt ends, including when the
/// `stream` future is dropped mid-flight.
struct ActiveGuard<'a, T> {
    owner: &'a AgentStream<T>,
    attempt: Attempt,
}

impl<T> Drop for ActiveGuard<'_, T> {
    fn drop(&mut self) {
        let mut active = lock(&self.owner.active);
        if active.as_ref().is_some_and(|a| a.id == self.attempt.id) {
            *active = None;
        }
        self.attempt.token.cancel();
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl<T: Transport> AgentStream<T> {
    pub fn new(transport: T, callbacks: StreamCallbacks) -> Self {
        Self {
            transport,
            callbacks: Mutex::new(callbacks),
            active: Mutex::new(None),
            next_id: AtomicU64::new(0),
            accumulated: Mutex::new(String::new()),
        }
    }

    /// Replace the registered callbacks. A stream already in flight uses the
    /// new ones from its next event on.
    pub fn set_callbacks(&self, callbacks: StreamCallbacks) {
        *lock(&self.callbacks) = callbacks;
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Whether a stream is currently in flight.
    pub fn is_active(&self) -> bool {
        lock(&self.active).is_some()
    }

    /// Text received so far in the latest attempt.
    pub fn accumulated(&self) -> String {
        lock(&self.accumulated).clone()
    }

    /// Abort the active stream, if any. The aborted attempt fires no further
    /// callbacks.
    pub fn stop(&self) {
        if let Some(attempt) = lock(&self.active).take() {
            tracing::debug!(attempt = attempt.id, "stopping active agent stream");
            attempt.token.cancel();
        }
    }

    /// Send `history` to the agent and dispatch the response to the
    /// registered callbacks. Returns when the attempt has completed, failed
    /// or been cancelled.
    pub async fn stream(&self, history: &[HistoryEntry], region: Option<&str>) {
        let guard = self.begin();
        let token = guard.attempt.token.clone();
        let request = ChatRequest::new(history.to_vec(), region);

        let outcome = self.run(&token, request).await;
        if token.is_cancelled() {
            tracing::debug!(attempt = guard.attempt.id, "agent stream cancelled");
            return;
        }

        match outcome {
            Outcome::Completed => {
                tracing::debug!(
                    attempt = guard.attempt.id,
                    chars = lock(&self.accumulated).chars().count(),
                    "agent stream completed"
                );
                let on_complete = lock(&self.callbacks).on_complete.clone();
                drop(guard);
                if let Some(f) = on_complete {
                    f();
                }
            }
            Outcome::Failed(e) => {
                tracing::warn!(attempt = guard.attempt.id, error = %e, "agent stream failed");
                let on_error = lock(&self.callbacks).on_error.clone();
                drop(guard);
                if let Some(f) = on_error {
                    f(&e.to_string());
                }
            }
            Outcome::Cancelled => {}
        }
    }

    /// Cancel the previous attempt and register a new one.
    fn begin(&self) -> ActiveGuard<'_, T> {
        let attempt = Attempt {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
        };
        if let Some(previous) = lock(&self.active).replace(attempt.clone()) {
            tracing::debug!(attempt = previous.id, "superseding active agent stream");
            previous.token.cancel();
        }
        lock(&self.accumulated).clear();
        ActiveGuard {
            owner: self,
            attempt,
        }
    }

    async fn run(&self, token: &CancellationToken, request: ChatRequest) -> Outcome {
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => return Outcome::Cancelled,
            opened = self.transport.open(request) => opened,
        };
        let body = match opened {
            Ok(body) => body,
            Err(e) => return Outcome::Failed(e),
        };

        let mut lines = sse_lines(body);
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Outcome::Cancelled,
                next = lines.next() => next,
            };

            match next {
                Some(Ok(line)) => {
                    if let Some(event) = decode_line(&line) {
                        self.dispatch(token, event);
                    }
                }
                Some(Err(e)) => return Outcome::Failed(e),
                None => return Outcome::Completed,
            }
        }
    }

    fn dispatch(&self, token: &CancellationToken, event: StreamEvent) {
        if token.is_cancelled() {
            return;
        }

        let callbacks = lock(&self.callbacks).clone();
        match event {
            StreamEvent::Token(delta) => {
                lock(&self.accumulated).push_str(&delta);
                if let Some(f) = callbacks.on_token {
                    f(&delta);
                }
            }
            StreamEvent::FinalState(state) => {
                if let Some(f) = callbacks.on_final_state {
                    f(&state);
                }
            }
            StreamEvent::Error(message) => {
                tracing::warn!(message = %message, "agent reported an error");
                if let Some(f) = callbacks.on_error {
                    f(&message);
                }
            }
            StreamEvent::Done => {}
        }
    }
}
