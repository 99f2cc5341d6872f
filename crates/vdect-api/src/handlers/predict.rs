//! Prediction handlers: assemble metadata, verdict, overlay and explanation.

use std::time::Instant;

use axum::extract::{Multipart, State};
use axum::Json;
use base64::Engine as _;
use image::RgbImage;
use serde::Serialize;
use tracing::{info, warn};

use vdect_engine::saliency::{produce_overlay, SaliencyConfig, SaliencyStrategy};
use vdect_engine::{preprocess_image, softmax};
use vdect_media::TempMedia;
use vdect_models::{Label, MediaMetadata, Modality, Prediction, Verdict};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Image prediction response.
#[derive(Debug, Serialize)]
pub struct ImageAnalysis {
    pub metadata: MediaMetadata,
    pub prediction: Prediction,
    /// Saliency overlay as a base64 JPEG data URL.
    pub gradcam_heatmap: String,
    pub explanation: String,
}

/// Video prediction response.
#[derive(Debug, Serialize)]
pub struct VideoAnalysis {
    pub metadata: MediaMetadata,
    pub prediction: Prediction,
    pub explanation: String,
}

/// One uploaded file from a multipart body.
struct Upload {
    filename: String,
    bytes: axum::body::Bytes,
}

/// POST /predict_image
pub async fn predict_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<ImageAnalysis>> {
    let upload = read_upload(&mut multipart).await?;
    let original = image::load_from_memory(&upload.bytes)
        .map_err(|e| ApiError::bad_request(format!("Could not decode image: {}", e)))?
        .to_rgb8();
    let metadata = MediaMetadata::for_image(&upload.filename, original.width(), original.height());

    let started = Instant::now();
    let pixels = preprocess_image(&original, state.config.classifier_input_size);

    let forward = state.models.image.forward(&pixels, true)?;
    let probabilities = softmax(&forward.logits);
    let (class_index, confidence) = argmax(&probabilities)?;
    let label = label_for(state.models.image.labels(), class_index);
    let verdict = Verdict::new(label, confidence as f64, Modality::Image);

    // Attention rollout when the model produced attention weights, gradient
    // saliency otherwise. Both yield an overlay of the original's dimensions.
    let strategy = match forward.attentions {
        Some(stack) => SaliencyStrategy::AttentionRollout(stack),
        None => {
            warn!("Model produced no attention weights, using gradient saliency");
            metrics::record_saliency_fallback();
            SaliencyStrategy::GradientSaliency(state.models.image.input_gradient(&pixels)?)
        }
    };
    let overlay = produce_overlay(strategy, &original, &SaliencyConfig::default())?;
    let gradcam_heatmap = encode_jpeg_data_url(&overlay)?;

    metrics::record_inference_duration("image", started.elapsed().as_secs_f64());
    metrics::record_prediction("image", verdict.label.as_str());
    info!(
        filename = %upload.filename,
        label = %verdict.label,
        confidence = verdict.confidence,
        "Image prediction complete"
    );

    let explanation = state.explainer.explain(&verdict).await;

    Ok(Json(ImageAnalysis {
        metadata,
        prediction: Prediction::from(&verdict),
        gradcam_heatmap,
        explanation,
    }))
}

/// POST /predict_video
pub async fn predict_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<VideoAnalysis>> {
    let upload = read_upload(&mut multipart).await?;
    let metadata = MediaMetadata::for_video(&upload.filename);

    let temp = TempMedia::write(&upload.bytes, ".mp4").await?;
    let result = score_video(&state, &temp).await;
    // The temp file goes away on every exit path; failures are logged only.
    temp.cleanup().await;
    let verdict = result?;

    info!(
        filename = %upload.filename,
        label = %verdict.label,
        confidence = verdict.confidence,
        "Video prediction complete"
    );

    let explanation = state.explainer.explain(&verdict).await;

    Ok(Json(VideoAnalysis {
        metadata,
        prediction: Prediction::from(&verdict),
        explanation,
    }))
}

/// Run the extract-then-score pipeline for one spooled video.
async fn score_video(state: &AppState, temp: &TempMedia) -> ApiResult<Verdict> {
    let started = Instant::now();

    let faces = state
        .models
        .faces
        .extract_faces(temp.path(), state.config.sample_frames)
        .await?;
    // An empty sequence surfaces as the user-correctable no-face error
    let scored = state.models.ensemble.score(&faces)?;

    metrics::record_inference_duration("video", started.elapsed().as_secs_f64());
    metrics::record_prediction("video", scored.verdict.label.as_str());

    Ok(scored.verdict)
}

/// Pull the uploaded file out of the multipart body.
async fn read_upload(multipart: &mut Multipart) -> ApiResult<Upload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let is_file = field.name() == Some("file") || field.file_name().is_some();
        if !is_file {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;

        if bytes.is_empty() {
            return Err(ApiError::bad_request("Uploaded file is empty"));
        }
        return Ok(Upload { filename, bytes });
    }

    Err(ApiError::bad_request("Missing file field in upload"))
}

/// Index and value of the largest probability.
fn argmax(probabilities: &[f32]) -> ApiResult<(usize, f32)> {
    probabilities
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, v)| (i, *v))
        .ok_or_else(|| ApiError::internal("Classifier produced no logits"))
}

/// Map a class index to a verdict label via the model's label table.
fn label_for(labels: &[String], class_index: usize) -> Label {
    let is_fake = labels
        .get(class_index)
        .map(|l| l.eq_ignore_ascii_case("fake"))
        .unwrap_or(false);
    if is_fake {
        Label::Fake
    } else {
        Label::Real
    }
}

/// Encode an overlay as a `data:image/jpeg;base64,...` URL.
fn encode_jpeg_data_url(overlay: &RgbImage) -> ApiResult<String> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image::DynamicImage::ImageRgb8(overlay.clone())
        .write_to(&mut cursor, image::ImageOutputFormat::Jpeg(90))
        .map_err(|e| ApiError::internal(format!("Failed to encode overlay: {}", e)))?;

    let encoded = base64::engine::general_purpose::STANDARD.encode(&buffer);
    Ok(format!("data:image/jpeg;base64,{}", encoded))
}
