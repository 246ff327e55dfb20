//! Infrastructure error types.

use thiserror::Error;

pub type InfraResult<T> = Result<T, InfrastructureError>;

/// Failures talking to the control plane. Never escape the controller.
#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("control plane unavailable: {0}")]
    Unavailable(String),

    #[error("control plane request failed: {0}")]
    Request(String),

    #[error("control plane returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode control plane response: {0}")]
    Decode(String),

    #[error("target not found: {0}")]
    TargetNotFound(String),
}
