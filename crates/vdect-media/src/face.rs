//! Face locator capability.
//!
//! The locator returns at most one region per frame: the most prominent
//! face. The ONNX implementation consumes a YuNet-format detection head
//! (rows of `[x, y, w, h, landmarks..., score]`).

use std::path::Path;
use std::sync::Mutex;

use image::RgbImage;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Score threshold below which detections are discarded.
const SCORE_THRESHOLD: f32 = 0.6;

/// Detector input dimensions.
const INPUT_WIDTH: u32 = 320;
const INPUT_HEIGHT: u32 = 240;

/// Number of values per YuNet detection row.
const ROW_WIDTH: usize = 15;

/// A face bounding region in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Detection confidence in [0, 1].
    pub score: f32,
}

/// Face locating capability: zero or one region for the most prominent face.
pub trait FaceLocator: Send + Sync {
    fn locate(&self, frame: &RgbImage) -> MediaResult<Option<FaceRegion>>;
}

/// YuNet-format ONNX face locator.
pub struct OnnxFaceLocator {
    session: Mutex<ort::session::Session>,
    output_name: String,
}

impl OnnxFaceLocator {
    pub fn new(model_path: impl AsRef<Path>) -> MediaResult<Self> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(MediaError::ModelNotFound(model_path.display().to_string()));
        }

        let session = vdect_engine::create_session(model_path)
            .map_err(|e| MediaError::detection_failed(e.to_string()))?;
        let output_name = session
            .outputs()
            .first()
            .map(|o| o.name().to_string())
            .ok_or_else(|| MediaError::detection_failed("Face model declares no outputs"))?;

        info!(model = %model_path.display(), "Face locator loaded");

        Ok(Self {
            session: Mutex::new(session),
            output_name,
        })
    }
}

impl FaceLocator for OnnxFaceLocator {
    fn locate(&self, frame: &RgbImage) -> MediaResult<Option<FaceRegion>> {
        let (frame_width, frame_height) = frame.dimensions();
        if frame_width == 0 || frame_height == 0 {
            return Ok(None);
        }

        let input = preprocess(frame)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::internal("Session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::detection_failed(format!("Face detection failed: {}", e)))?;

        let output = outputs
            .get(&self.output_name)
            .ok_or_else(|| MediaError::detection_failed("Missing detection output"))?;
        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::detection_failed(format!("Failed to extract detections: {}", e)))?;

        Ok(most_prominent(
            data,
            frame_width as f32,
            frame_height as f32,
        ))
    }
}

/// Resize to detector input and lay out as a raw-intensity NCHW tensor.
fn preprocess(frame: &RgbImage) -> MediaResult<Value> {
    let resized = image::imageops::resize(
        frame,
        INPUT_WIDTH,
        INPUT_HEIGHT,
        image::imageops::FilterType::Triangle,
    );

    let (w, h) = (INPUT_WIDTH as usize, INPUT_HEIGHT as usize);
    let mut chw: Vec<f32> = Vec::with_capacity(3 * w * h);
    for c in 0..3 {
        for y in 0..h {
            for x in 0..w {
                chw.push(resized.get_pixel(x as u32, y as u32)[c] as f32);
            }
        }
    }

    let shape = vec![1usize, 3, h, w];
    Tensor::from_array((shape, chw.into_boxed_slice()))
        .map(Value::from)
        .map_err(|e| MediaError::internal(format!("Failed to create tensor: {}", e)))
}

/// Pick the highest-scoring detection above threshold, scaled to frame
/// coordinates and clamped to frame bounds.
fn most_prominent(data: &[f32], frame_width: f32, frame_height: f32) -> Option<FaceRegion> {
    let scale_x = frame_width / INPUT_WIDTH as f32;
    let scale_y = frame_height / INPUT_HEIGHT as f32;

    let mut best: Option<FaceRegion> = None;
    for row in data.chunks_exact(ROW_WIDTH) {
        let score = row[ROW_WIDTH - 1];
        if score < SCORE_THRESHOLD {
            continue;
        }

        let x = (row[0] * scale_x).max(0.0);
        let y = (row[1] * scale_y).max(0.0);
        let width = (row[2] * scale_x).min(frame_width - x);
        let height = (row[3] * scale_y).min(frame_height - y);
        if width <= 0.0 || height <= 0.0 {
            continue;
        }

        if best.map_or(true, |b| score > b.score) {
            best = Some(FaceRegion {
                x,
                y,
                width,
                height,
                score,
            });
        }
    }

    if let Some(region) = best {
        debug!(
            score = region.score,
            x = region.x,
            y = region.y,
            "Face located"
        );
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(x: f32, y: f32, w: f32, h: f32, score: f32) -> [f32; ROW_WIDTH] {
        let mut row = [0.0_f32; ROW_WIDTH];
        row[0] = x;
        row[1] = y;
        row[2] = w;
        row[3] = h;
        row[ROW_WIDTH - 1] = score;
        row
    }

    #[test]
    fn test_most_prominent_picks_highest_score() {
        let mut data = Vec::new();
        data.extend_from_slice(&row(10.0, 10.0, 20.0, 20.0, 0.7));
        data.extend_from_slice(&row(100.0, 50.0, 40.0, 40.0, 0.95));

        let region = most_prominent(&data, 320.0, 240.0).unwrap();
        assert_eq!(region.score, 0.95);
        assert_eq!(region.x, 100.0);
    }

    #[test]
    fn test_below_threshold_discarded() {
        let mut data = Vec::new();
        data.extend_from_slice(&row(10.0, 10.0, 20.0, 20.0, 0.3));

        assert!(most_prominent(&data, 320.0, 240.0).is_none());
    }

    #[test]
    fn test_coordinates_scaled_and_clamped() {
        let mut data = Vec::new();
        data.extend_from_slice(&row(300.0, 220.0, 40.0, 40.0, 0.9));

        // Frame twice the detector input size
        let region = most_prominent(&data, 640.0, 480.0).unwrap();
        assert_eq!(region.x, 600.0);
        assert_eq!(region.y, 440.0);
        // Clamped to frame bounds
        assert_eq!(region.width, 40.0);
        assert_eq!(region.height, 40.0);
    }

    #[test]
    fn test_empty_output_is_no_face() {
        assert!(most_prominent(&[], 320.0, 240.0).is_none());
    }
}
