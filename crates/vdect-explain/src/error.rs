//! Error types for the explanation service call.
//!
//! These never cross the crate boundary: `explain` absorbs them all into
//! the templated fallback.

use thiserror::Error;

pub type ExplainResult<T> = Result<T, ExplainError>;

/// Failure modes of the external text-generation call.
#[derive(Debug, Error)]
pub enum ExplainError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}
