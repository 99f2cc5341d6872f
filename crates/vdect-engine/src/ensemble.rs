//! Video ensemble scorer.
//!
//! Every active network scores every face frame; per-network scores combine
//! into a frame-level score, frame-level scores aggregate into one decision
//! scalar, and the scalar is thresholded into the final verdict.

use std::sync::Arc;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use vdect_models::{Label, Modality, Verdict};

use crate::error::{EngineError, EngineResult};

pub use crate::classifier::FrameNetwork;

/// One face-cropped frame extracted from a video.
#[derive(Debug, Clone)]
pub struct FaceFrame {
    pub image: RgbImage,
    /// Index of the sampled source frame this crop came from.
    pub frame_index: usize,
}

/// One network's score for one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkScore {
    pub network: String,
    pub score: f32,
}

/// Per-frame classifier output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameScore {
    pub frame_index: usize,
    /// Combined frame-level score in [0, 1].
    pub combined: f32,
    pub per_network: Vec<NetworkScore>,
}

/// How per-network scores combine within one frame.
///
/// The exact rule is model-defined; both options are monotonic and
/// deterministic given the same per-network outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombineRule {
    #[default]
    Mean,
    Max,
}

impl CombineRule {
    fn combine(&self, scores: &[f32]) -> f32 {
        match self {
            CombineRule::Mean => scores.iter().sum::<f32>() / scores.len() as f32,
            CombineRule::Max => scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max),
        }
    }
}

/// Ensemble configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// Decision threshold: aggregate >= threshold classifies as fake.
    pub decision_threshold: f32,
    pub combine: CombineRule,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            decision_threshold: 0.5,
            combine: CombineRule::Mean,
        }
    }
}

/// Scoring result: the verdict plus the per-frame breakdown behind it.
#[derive(Debug)]
pub struct ScoredVerdict {
    pub verdict: Verdict,
    pub frame_scores: Vec<FrameScore>,
}

/// One-to-many classifier networks aggregated into a single verdict.
///
/// The reference configuration registers a single lightweight network to
/// bound memory; additional networks require no code changes.
pub struct VideoEnsemble {
    networks: Vec<Arc<dyn FrameNetwork>>,
    config: EnsembleConfig,
}

impl VideoEnsemble {
    pub fn new(networks: Vec<Arc<dyn FrameNetwork>>, config: EnsembleConfig) -> EngineResult<Self> {
        if networks.is_empty() {
            return Err(EngineError::internal("Ensemble has no networks"));
        }
        Ok(Self { networks, config })
    }

    pub fn network_names(&self) -> Vec<&str> {
        self.networks.iter().map(|n| n.name()).collect()
    }

    /// Score a sequence of face frames into one verdict.
    ///
    /// Fails with [`EngineError::NoFaces`] on an empty sequence; callers must
    /// surface that as a user-correctable condition, not default a guess.
    pub fn score(&self, frames: &[FaceFrame]) -> EngineResult<ScoredVerdict> {
        if frames.is_empty() {
            return Err(EngineError::NoFaces);
        }

        let mut frame_scores = Vec::with_capacity(frames.len());
        for frame in frames {
            let mut per_network = Vec::with_capacity(self.networks.len());
            for network in &self.networks {
                let score = network.score(frame)?;
                per_network.push(NetworkScore {
                    network: network.name().to_string(),
                    score,
                });
            }

            let raw: Vec<f32> = per_network.iter().map(|s| s.score).collect();
            let combined = self.config.combine.combine(&raw);
            debug!(
                frame = frame.frame_index,
                combined,
                "Frame scored"
            );

            frame_scores.push(FrameScore {
                frame_index: frame.frame_index,
                combined,
                per_network,
            });
        }

        let aggregate = frame_scores.iter().map(|f| f.combined).sum::<f32>()
            / frame_scores.len() as f32;
        let label = if aggregate >= self.config.decision_threshold {
            Label::Fake
        } else {
            Label::Real
        };

        info!(
            frames = frame_scores.len(),
            networks = self.networks.len(),
            aggregate,
            label = %label,
            "Ensemble prediction complete"
        );

        Ok(ScoredVerdict {
            verdict: Verdict::new(label, aggregate as f64, Modality::Video),
            frame_scores,
        })
    }
}
