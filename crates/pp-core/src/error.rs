use pp_backend::BackendError;
use thiserror::Error;

/// Fatal errors of the chat client.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to set up agent client: {0}")]
    Backend(#[from] BackendError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
