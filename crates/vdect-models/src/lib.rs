//! Shared data models for the VeriDect backend.
//!
//! This crate provides Serde-serializable types for:
//! - Verdicts (label + confidence + modality)
//! - The prediction payload returned to clients
//! - Upload metadata

pub mod media;
pub mod verdict;

// Re-export common types
pub use media::MediaMetadata;
pub use verdict::{Label, Modality, Prediction, Verdict};
