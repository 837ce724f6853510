//! Client error types.

use quickcal_core::EventError;
use quickcal_google::{SessionError, SubmitError};
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Bad command-line input.
    #[error("invalid input: {0}")]
    Input(#[from] EventError),

    /// No session could be acquired.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// The event could not be created.
    #[error("failed to add event: {0}")]
    Submit(#[from] SubmitError),
}
