//! Face-sample extractor.
//!
//! Samples frames across a video, locates the most prominent face in each,
//! and crops it for the video ensemble. Frames without a face are skipped,
//! never padded; a video with no detectable face yields an empty sequence,
//! which is a normal, reportable condition at this layer.

use std::path::Path;
use std::sync::Arc;

use image::RgbImage;
use tracing::{debug, info};

use vdect_engine::FaceFrame;

use crate::error::MediaResult;
use crate::face::{FaceLocator, FaceRegion};
use crate::frames::{sample_frames, SampledFrame};

/// Relative margin added around the detected face before cropping.
const DEFAULT_CROP_MARGIN: f32 = 0.25;

/// Source of face crops for the video pipeline.
///
/// An empty result means no face was found in any sampled frame; the scorer
/// one layer up converts that into the user-facing input error.
#[async_trait::async_trait]
pub trait FaceSource: Send + Sync {
    async fn extract_faces(
        &self,
        video_path: &Path,
        target_count: usize,
    ) -> MediaResult<Vec<FaceFrame>>;
}

/// Extracts face crops from sampled video frames.
pub struct FaceSampler {
    locator: Arc<dyn FaceLocator>,
    crop_margin: f32,
}

impl FaceSampler {
    pub fn new(locator: Arc<dyn FaceLocator>) -> Self {
        Self {
            locator,
            crop_margin: DEFAULT_CROP_MARGIN,
        }
    }

    pub fn with_crop_margin(mut self, margin: f32) -> Self {
        self.crop_margin = margin.max(0.0);
        self
    }

    /// Locate and crop faces in already-decoded frames.
    fn crop_sampled(&self, frames: &[SampledFrame]) -> MediaResult<Vec<FaceFrame>> {
        let mut faces = Vec::with_capacity(frames.len());
        for frame in frames {
            match self.locator.locate(&frame.image)? {
                Some(region) => {
                    faces.push(FaceFrame {
                        image: crop_face(&frame.image, region, self.crop_margin),
                        frame_index: frame.index,
                    });
                }
                None => {
                    debug!(frame = frame.index, "No face in sampled frame, skipping");
                }
            }
        }
        Ok(faces)
    }
}

#[async_trait::async_trait]
impl FaceSource for FaceSampler {
    /// Extract up to `target_count` face crops spread across the video.
    async fn extract_faces(
        &self,
        video_path: &Path,
        target_count: usize,
    ) -> MediaResult<Vec<FaceFrame>> {
        let frames = sample_frames(video_path, target_count).await?;
        let faces = self.crop_sampled(&frames)?;

        info!(
            video = %video_path.display(),
            sampled = frames.len(),
            faces = faces.len(),
            "Face extraction complete"
        );
        Ok(faces)
    }
}

/// Crop a face region expanded by `margin` on each side, clamped to bounds.
fn crop_face(frame: &RgbImage, region: FaceRegion, margin: f32) -> RgbImage {
    let (frame_width, frame_height) = frame.dimensions();

    let pad_x = region.width * margin;
    let pad_y = region.height * margin;

    let x0 = (region.x - pad_x).max(0.0) as u32;
    let y0 = (region.y - pad_y).max(0.0) as u32;
    let x1 = ((region.x + region.width + pad_x).ceil() as u32).min(frame_width);
    let y1 = ((region.y + region.height + pad_y).ceil() as u32).min(frame_height);

    let crop_width = (x1 - x0).max(1);
    let crop_height = (y1 - y0).max(1);

    image::imageops::crop_imm(frame, x0, y0, crop_width, crop_height).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;

    /// Test double: yields regions from a fixed per-frame script, cycling.
    struct ScriptedLocator {
        regions: Vec<Option<FaceRegion>>,
        calls: std::sync::Mutex<usize>,
    }

    impl ScriptedLocator {
        fn new(regions: Vec<Option<FaceRegion>>) -> Self {
            Self {
                regions,
                calls: std::sync::Mutex::new(0),
            }
        }
    }

    impl FaceLocator for ScriptedLocator {
        fn locate(&self, _frame: &RgbImage) -> MediaResult<Option<FaceRegion>> {
            let mut calls = self.calls.lock().unwrap();
            let index = *calls % self.regions.len();
            *calls += 1;
            Ok(self.regions[index])
        }
    }

    struct NoFaceLocator;

    impl FaceLocator for NoFaceLocator {
        fn locate(&self, _frame: &RgbImage) -> MediaResult<Option<FaceRegion>> {
            Ok(None)
        }
    }

    struct FailingLocator;

    impl FaceLocator for FailingLocator {
        fn locate(&self, _frame: &RgbImage) -> MediaResult<Option<FaceRegion>> {
            Err(MediaError::detection_failed("detector exploded"))
        }
    }

    fn sampled(count: usize) -> Vec<SampledFrame> {
        (0..count)
            .map(|index| SampledFrame {
                index,
                timestamp: index as f64,
                image: RgbImage::from_pixel(64, 64, image::Rgb([128, 128, 128])),
            })
            .collect()
    }

    #[test]
    fn test_no_faces_yields_empty_sequence_not_error() {
        let sampler = FaceSampler::new(Arc::new(NoFaceLocator));
        let faces = sampler.crop_sampled(&sampled(5)).unwrap();
        assert!(faces.is_empty());
    }

    #[test]
    fn test_frames_without_faces_skipped_not_padded() {
        let sampler = FaceSampler::new(Arc::new(ScriptedLocator::new(vec![
            Some(FaceRegion {
                x: 16.0,
                y: 16.0,
                width: 16.0,
                height: 16.0,
                score: 0.9,
            }),
            None,
        ])));

        let faces = sampler.crop_sampled(&sampled(4)).unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].frame_index, 0);
        assert_eq!(faces[1].frame_index, 2);
    }

    #[test]
    fn test_detector_failure_propagates() {
        let sampler = FaceSampler::new(Arc::new(FailingLocator));
        assert!(sampler.crop_sampled(&sampled(1)).is_err());
    }

    #[test]
    fn test_crop_expanded_by_margin() {
        let frame = RgbImage::new(100, 100);
        let region = FaceRegion {
            x: 40.0,
            y: 40.0,
            width: 20.0,
            height: 20.0,
            score: 0.9,
        };

        let crop = crop_face(&frame, region, 0.25);
        // 20px face + 5px margin each side
        assert_eq!(crop.dimensions(), (30, 30));
    }

    #[test]
    fn test_crop_clamped_at_frame_border() {
        let frame = RgbImage::new(50, 50);
        let region = FaceRegion {
            x: 40.0,
            y: 0.0,
            width: 20.0,
            height: 20.0,
            score: 0.9,
        };

        let crop = crop_face(&frame, region, 0.25);
        let (w, h) = crop.dimensions();
        assert!(w <= 15); // 35..50
        assert!(h <= 25);
    }
}
