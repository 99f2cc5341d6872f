//! Overlay rendering: upsample, blur, normalize, colorize, blend.

use image::{ImageBuffer, Luma, RgbImage};
use ndarray::Array2;

use super::palette;
use super::SaliencyConfig;
use crate::error::{EngineError, EngineResult};

/// Ranges at or below this are treated as degenerate (uniform) maps.
const NORM_EPSILON: f32 = 1e-6;

type LumaF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Render an importance map over the original image.
pub fn render(
    map: &Array2<f32>,
    original: &RgbImage,
    config: &SaliencyConfig,
) -> EngineResult<RgbImage> {
    let (width, height) = original.dimensions();

    // The resampler clamps float samples to [0, 1], so normalize on both
    // sides of it: once before, once after the blur to restore full span.
    let upsampled = upsample(&normalize(map), width, height)?;
    let blurred = image::imageops::blur(&upsampled, config.blur_sigma);
    let normalized = normalize(&from_luma(&blurred));
    let heatmap = colorize(&normalized);

    Ok(blend(
        original,
        &heatmap,
        config.original_weight,
        config.heatmap_weight,
    ))
}

/// Min-max normalize to [0, 1] with an epsilon guard.
///
/// After normalization min is 0 and max is 1 unless the input range is
/// degenerate (uniform up to [`NORM_EPSILON`]), in which case every value
/// collapses to 0 (finite, never NaN).
pub fn normalize(map: &Array2<f32>) -> Array2<f32> {
    let min = map.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = map.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;

    if !range.is_finite() || range <= NORM_EPSILON {
        return Array2::zeros(map.raw_dim());
    }
    map.mapv(|v| (v - min) / range)
}

/// Upsample a patch grid to pixel dimensions with smooth interpolation.
pub fn upsample(map: &Array2<f32>, width: u32, height: u32) -> EngineResult<LumaF32> {
    let (rows, cols) = map.dim();
    if rows == 0 || cols == 0 {
        return Err(EngineError::shape("Saliency map is empty"));
    }

    let source: LumaF32 = ImageBuffer::from_fn(cols as u32, rows as u32, |x, y| {
        Luma([map[[y as usize, x as usize]]])
    });

    Ok(image::imageops::resize(
        &source,
        width,
        height,
        image::imageops::FilterType::CatmullRom,
    ))
}

/// Map normalized importance values to jet colors.
pub fn colorize(map: &Array2<f32>) -> RgbImage {
    let (rows, cols) = map.dim();
    RgbImage::from_fn(cols as u32, rows as u32, |x, y| {
        palette::jet(map[[y as usize, x as usize]])
    })
}

/// Per-pixel weighted blend of the original image and the heatmap.
pub fn blend(original: &RgbImage, heatmap: &RgbImage, original_weight: f32, heatmap_weight: f32) -> RgbImage {
    debug_assert_eq!(original.dimensions(), heatmap.dimensions());

    RgbImage::from_fn(original.width(), original.height(), |x, y| {
        let o = original.get_pixel(x, y);
        let h = heatmap.get_pixel(x, y);
        let mut out = [0u8; 3];
        for c in 0..3 {
            let value = original_weight * o.0[c] as f32 + heatmap_weight * h.0[c] as f32;
            out[c] = value.round().clamp(0.0, 255.0) as u8;
        }
        image::Rgb(out)
    })
}

fn from_luma(buffer: &LumaF32) -> Array2<f32> {
    let (width, height) = buffer.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        buffer.get_pixel(x as u32, y as u32).0[0]
    })
}
