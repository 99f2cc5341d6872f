//! Inference core for VeriDect.
//!
//! This crate provides:
//! - Classifier capability traits with ONNX Runtime implementations
//! - The saliency engine (attention rollout with gradient fallback)
//! - The video ensemble scorer

pub mod classifier;
pub mod ensemble;
pub mod error;
pub mod saliency;

pub use classifier::{
    create_session, preprocess_image, softmax, ImageClassifier, ImageForward, OnnxFrameNetwork,
    OnnxImageClassifier,
};
pub use ensemble::{
    CombineRule, EnsembleConfig, FaceFrame, FrameNetwork, FrameScore, NetworkScore, ScoredVerdict,
    VideoEnsemble,
};
pub use error::{EngineError, EngineResult};
pub use saliency::{produce_overlay, AttentionStack, SaliencyConfig, SaliencyStrategy};
