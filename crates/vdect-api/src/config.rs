//! API configuration.

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max request body size (video uploads are large)
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Path to the image classifier ONNX model
    pub image_model_path: String,
    /// Class labels, indexed by logit position
    pub image_labels: Vec<String>,
    /// Video ensemble networks as (name, model path) pairs
    pub video_models: Vec<(String, String)>,
    /// Path to the face locator ONNX model
    pub face_model_path: String,
    /// Classifier input side length in pixels
    pub classifier_input_size: u32,
    /// Frames sampled per video
    pub sample_frames: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            max_body_size: 100 * 1024 * 1024, // 100MB
            environment: "development".to_string(),
            image_model_path: "models/image/vit_deepfake.onnx".to_string(),
            image_labels: vec!["REAL".to_string(), "FAKE".to_string()],
            video_models: vec![(
                "ed".to_string(),
                "models/video/genconvit_ed.onnx".to_string(),
            )],
            face_model_path: "models/face/yunet.onnx".to_string(),
            classifier_input_size: 224,
            sample_frames: 15,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            image_model_path: std::env::var("IMAGE_MODEL_PATH").unwrap_or(defaults.image_model_path),
            image_labels: std::env::var("IMAGE_LABELS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.image_labels),
            video_models: std::env::var("VIDEO_MODELS")
                .map(|s| parse_video_models(&s))
                .unwrap_or(defaults.video_models),
            face_model_path: std::env::var("FACE_MODEL_PATH").unwrap_or(defaults.face_model_path),
            classifier_input_size: std::env::var("CLASSIFIER_INPUT_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.classifier_input_size),
            sample_frames: std::env::var("SAMPLE_FRAMES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.sample_frames),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

/// Parse `name=path,name=path` network declarations.
fn parse_video_models(value: &str) -> Vec<(String, String)> {
    value
        .split(',')
        .filter_map(|entry| {
            let (name, path) = entry.split_once('=')?;
            let (name, path) = (name.trim(), path.trim());
            if name.is_empty() || path.is_empty() {
                return None;
            }
            Some((name.to_string(), path.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_models() {
        let models = parse_video_models("ed=models/ed.onnx, vae=models/vae.onnx");
        assert_eq!(
            models,
            vec![
                ("ed".to_string(), "models/ed.onnx".to_string()),
                ("vae".to_string(), "models/vae.onnx".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_video_models_skips_malformed_entries() {
        let models = parse_video_models("ed=models/ed.onnx,broken,=x,y=");
        assert_eq!(models.len(), 1);
    }

    #[test]
    fn test_default_samples_fifteen_frames() {
        assert_eq!(ApiConfig::default().sample_frames, 15);
    }
}
