//! pp-backend: streaming client for the Product Pulse agent.
//!
//! This crate issues chat requests to the agent proxy and decodes the
//! Server-Sent-Events response into typed callbacks.

pub mod error;
pub mod event;
pub mod mock;
pub mod sse;
pub mod stream;
pub mod transport;

pub use error::BackendError;
pub use mock::{MockConfig, MockResponse, MockTransport};
pub use stream::{AgentStream, StreamCallbacks};
pub use transport::{ByteStream, HttpTransport, Transport};
