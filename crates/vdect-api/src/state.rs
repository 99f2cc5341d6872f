//! Application state.
//!
//! Model weights load once at process start and are shared read-only across
//! all concurrent requests behind `Arc`; no request mutates them.

use std::sync::Arc;

use vdect_engine::{
    EnsembleConfig, FrameNetwork, ImageClassifier, OnnxFrameNetwork, OnnxImageClassifier,
    VideoEnsemble,
};
use vdect_explain::ExplanationGenerator;
use vdect_media::{FaceSampler, FaceSource, OnnxFaceLocator};

use crate::config::ApiConfig;

/// The once-initialized, read-only classifier bundle.
pub struct ModelBundle {
    pub image: Arc<dyn ImageClassifier>,
    pub ensemble: Arc<VideoEnsemble>,
    pub faces: Arc<dyn FaceSource>,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub models: Arc<ModelBundle>,
    pub explainer: Arc<ExplanationGenerator>,
}

impl AppState {
    /// Load all models and build application state.
    pub fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let image = OnnxImageClassifier::new(&config.image_model_path, config.image_labels.clone())?;

        let mut networks: Vec<Arc<dyn FrameNetwork>> = Vec::with_capacity(config.video_models.len());
        for (name, path) in &config.video_models {
            networks.push(Arc::new(OnnxFrameNetwork::new(
                name,
                path,
                config.classifier_input_size,
            )?));
        }
        let ensemble = VideoEnsemble::new(networks, EnsembleConfig::default())?;

        let locator = OnnxFaceLocator::new(&config.face_model_path)?;
        let sampler = FaceSampler::new(Arc::new(locator));

        let models = ModelBundle {
            image: Arc::new(image),
            ensemble: Arc::new(ensemble),
            faces: Arc::new(sampler),
        };

        Ok(Self {
            config,
            models: Arc::new(models),
            explainer: Arc::new(ExplanationGenerator::from_env()),
        })
    }
}
