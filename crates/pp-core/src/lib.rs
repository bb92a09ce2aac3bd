//! pp-core: Terminal chat client for Product Pulse.
//!
//! This crate holds the conversation state, transcript formatting and the
//! REPL. Exposed as a library for integration testing.

pub mod config;
pub mod display;
pub mod error;
pub mod logging;
pub mod repl;
pub mod session;
pub mod style;
