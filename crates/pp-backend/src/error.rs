use thiserror::Error;

/// Failures that end a stream attempt. The `Display` text is what callers
/// receive through `on_error`.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP error: status {status}")]
    Status { status: u16, body: String },
    #[error("failed to read response body: {0}")]
    Body(String),
    #[error("transport error: {0}")]
    Transport(String),
}
