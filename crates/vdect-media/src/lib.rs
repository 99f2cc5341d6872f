//! Video probing and face-sample extraction.
//!
//! This crate provides:
//! - FFprobe metadata probing
//! - Deterministic FFmpeg frame sampling
//! - A face locator capability with an ONNX implementation
//! - The face-sample extractor feeding the video ensemble
//! - Scoped temporary media files with guaranteed cleanup attempts

pub mod error;
pub mod extractor;
pub mod face;
pub mod frames;
pub mod probe;
pub mod tempmedia;

pub use error::{MediaError, MediaResult};
pub use extractor::{FaceSampler, FaceSource};
pub use face::{FaceLocator, FaceRegion, OnnxFaceLocator};
pub use frames::{sample_frames, sample_timestamps, SampledFrame};
pub use probe::{probe_video, VideoInfo};
pub use tempmedia::TempMedia;
