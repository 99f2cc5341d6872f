//! Saliency engine: turns classifier internals into a viewable overlay.
//!
//! Two strategies share one output contract, so callers never branch on
//! which path ran:
//! - [`SaliencyStrategy::AttentionRollout`]: composes per-layer attention
//!   into a joint patch-importance grid (the primary path).
//! - [`SaliencyStrategy::GradientSaliency`]: channel-averaged absolute input
//!   gradient (the fallback when attention is unavailable).
//!
//! Both feed the same upsample, blur, normalize, colorize and blend tail.

pub mod overlay;
pub mod palette;
pub mod rollout;

use image::RgbImage;
use ndarray::{Array2, Array3, Axis};

use crate::error::{EngineError, EngineResult};

pub use rollout::AttentionStack;

/// Saliency source, selected by data availability.
#[derive(Debug)]
pub enum SaliencyStrategy {
    /// Per-layer attention tensors from the classifier forward pass.
    AttentionRollout(AttentionStack),
    /// Raw input gradient (channels first) from a gradient-tracking pass.
    GradientSaliency(Array3<f32>),
}

/// Rendering parameters for the overlay.
#[derive(Debug, Clone)]
pub struct SaliencyConfig {
    /// Gaussian blur sigma applied after upsampling.
    pub blur_sigma: f32,
    /// Blend weight of the original image.
    pub original_weight: f32,
    /// Blend weight of the false-color heatmap.
    pub heatmap_weight: f32,
}

impl Default for SaliencyConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 8.0,
            original_weight: 0.6,
            heatmap_weight: 0.4,
        }
    }
}

/// Produce a false-color overlay with the same dimensions as `original`.
pub fn produce_overlay(
    strategy: SaliencyStrategy,
    original: &RgbImage,
    config: &SaliencyConfig,
) -> EngineResult<RgbImage> {
    let map = match strategy {
        SaliencyStrategy::AttentionRollout(stack) => rollout::patch_saliency(&stack)?,
        SaliencyStrategy::GradientSaliency(gradient) => gradient_map(&gradient)?,
    };
    overlay::render(&map, original, config)
}

/// Collapse a raw input gradient into a 2-D importance map: absolute value,
/// averaged across color channels.
fn gradient_map(gradient: &Array3<f32>) -> EngineResult<Array2<f32>> {
    let (channels, _, _) = gradient.dim();
    if channels == 0 {
        return Err(EngineError::shape("Gradient tensor has no channels"));
    }
    Ok(gradient.mapv(f32::abs).mean_axis(Axis(0)).expect("non-empty channel axis"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr3;

    #[test]
    fn test_gradient_map_averages_channel_magnitudes() {
        let gradient = arr3(&[
            [[1.0_f32, -1.0], [0.0, 2.0]],
            [[-3.0, 1.0], [0.0, -2.0]],
        ]);
        let map = gradient_map(&gradient).unwrap();
        assert_eq!(map.dim(), (2, 2));
        assert!((map[[0, 0]] - 2.0).abs() < 1e-6);
        assert!((map[[0, 1]] - 1.0).abs() < 1e-6);
        assert!((map[[1, 1]] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_both_strategies_share_output_dimensions() {
        let original = RgbImage::from_pixel(40, 30, image::Rgb([10, 20, 30]));
        let config = SaliencyConfig::default();

        // 5 tokens = 4 patches = 2x2 grid
        let layer = ndarray::Array3::from_elem((2, 5, 5), 0.2_f32);
        let stack = AttentionStack::new(vec![layer.clone(), layer]).unwrap();
        let from_attention =
            produce_overlay(SaliencyStrategy::AttentionRollout(stack), &original, &config).unwrap();

        let gradient = ndarray::Array3::from_shape_fn((3, 8, 8), |(c, y, x)| {
            (c + y + x) as f32 * 0.1 - 0.5
        });
        let from_gradient =
            produce_overlay(SaliencyStrategy::GradientSaliency(gradient), &original, &config)
                .unwrap();

        assert_eq!(from_attention.dimensions(), (40, 30));
        assert_eq!(from_gradient.dimensions(), (40, 30));
    }
}
