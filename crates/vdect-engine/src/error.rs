//! Error types for inference operations.

use thiserror::Error;

/// Result type for inference operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during inference.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Tensor or attention shape inconsistency. Fatal to the request.
    #[error("Shape mismatch: {0}")]
    Shape(String),

    /// No face was found in any sampled frame. User-correctable.
    #[error("No face detected in the video. Please upload a video with a clear face visible.")]
    NoFaces,

    /// The loaded model does not expose a gradient output.
    #[error("Model does not expose an input gradient output")]
    GradientUnavailable,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Create a shape mismatch error.
    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape(message.into())
    }

    /// Create an inference failure error.
    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
