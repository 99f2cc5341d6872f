//! Perceptually ordered false-color palette (jet).

use image::Rgb;

/// Map a normalized importance value to a jet color, RGB channel order.
///
/// Low importance renders blue, mid renders green, high renders red.
pub fn jet(value: f32) -> Rgb<u8> {
    let t = value.clamp(0.0, 1.0);
    let r = (1.5 - (4.0 * t - 3.0).abs()).clamp(0.0, 1.0);
    let g = (1.5 - (4.0 * t - 2.0).abs()).clamp(0.0, 1.0);
    let b = (1.5 - (4.0 * t - 1.0).abs()).clamp(0.0, 1.0);
    Rgb([
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jet_endpoints() {
        // Cold end is blue, hot end is red.
        let cold = jet(0.0);
        assert_eq!(cold.0[0], 0);
        assert_eq!(cold.0[1], 0);
        assert!(cold.0[2] > 0);

        let hot = jet(1.0);
        assert!(hot.0[0] > 0);
        assert_eq!(hot.0[1], 0);
        assert_eq!(hot.0[2], 0);
    }

    #[test]
    fn test_jet_clamps_out_of_range() {
        assert_eq!(jet(-1.0), jet(0.0));
        assert_eq!(jet(2.0), jet(1.0));
    }

    #[test]
    fn test_jet_midpoint_is_green_dominant() {
        let mid = jet(0.5);
        assert!(mid.0[1] > mid.0[0]);
        assert!(mid.0[1] > mid.0[2]);
    }
}
