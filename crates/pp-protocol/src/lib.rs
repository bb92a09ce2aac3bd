//! pp-protocol: Shared types and message definitions for Product Pulse.
//!
//! This crate defines the wire types exchanged with the agent proxy and the
//! product records carried in its final state.

pub mod context;
pub mod message;
pub mod product;

pub use context::{ChatRequest, HistoryEntry, Role, StreamMode, DEFAULT_REGION};
pub use message::StreamEvent;
pub use product::{last_search, Product};
