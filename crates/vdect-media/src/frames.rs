//! Deterministic FFmpeg frame sampling.
//!
//! Frames are decoded at timestamps spread uniformly across the video's
//! duration. Spacing depends only on duration and sample count, so identical
//! input always yields identical sample positions.

use std::path::Path;
use std::process::Stdio;

use image::RgbImage;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// One decoded sample frame.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    /// Sample position (0-based).
    pub index: usize,
    /// Decode timestamp in seconds.
    pub timestamp: f64,
    pub image: RgbImage,
}

/// Midpoint sampling: frame `i` of `n` lands at `duration * (i + 0.5) / n`.
pub fn sample_timestamps(duration: f64, count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| duration * (i as f64 + 0.5) / count as f64)
        .collect()
}

/// Decode `count` frames spread across the video.
///
/// Frames that fail to decode (e.g. a timestamp past a truncated stream)
/// are skipped with a warning, so the result may be shorter than `count`.
pub async fn sample_frames(path: impl AsRef<Path>, count: usize) -> MediaResult<Vec<SampledFrame>> {
    let path = path.as_ref();
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

    let info = probe_video(path).await?;
    let timestamps = sample_timestamps(info.duration, count);

    let mut frames = Vec::with_capacity(count);
    for (index, timestamp) in timestamps.into_iter().enumerate() {
        match decode_frame_at(path, timestamp).await {
            Ok(Some(image)) => {
                debug!(index, timestamp, "Decoded sample frame");
                frames.push(SampledFrame {
                    index,
                    timestamp,
                    image,
                });
            }
            Ok(None) => {
                warn!(index, timestamp, "No frame decoded at sample position");
            }
            Err(e) => {
                warn!(index, timestamp, error = %e, "Failed to decode sample frame");
            }
        }
    }

    debug!(
        requested = count,
        decoded = frames.len(),
        duration = info.duration,
        "Frame sampling complete"
    );
    Ok(frames)
}

/// Decode a single frame at `timestamp`, piped out of FFmpeg as PNG.
async fn decode_frame_at(path: &Path, timestamp: f64) -> MediaResult<Option<RgbImage>> {
    let seek = format!("{:.3}", timestamp);
    let output = Command::new("ffmpeg")
        .args(["-v", "error", "-ss", seek.as_str(), "-i"])
        .arg(path)
        .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::ffmpeg_failed(
            format!("Frame decode at {:.3}s failed", timestamp),
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
        ));
    }

    if output.stdout.is_empty() {
        // Seek past the last frame produces no output
        return Ok(None);
    }

    let image = image::load_from_memory(&output.stdout)?;
    Ok(Some(image.to_rgb8()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_timestamps_are_midpoints() {
        let timestamps = sample_timestamps(10.0, 5);
        assert_eq!(timestamps, vec![1.0, 3.0, 5.0, 7.0, 9.0]);
    }

    #[test]
    fn test_sample_timestamps_deterministic() {
        assert_eq!(sample_timestamps(7.3, 15), sample_timestamps(7.3, 15));
    }

    #[test]
    fn test_sample_timestamps_stay_inside_duration() {
        let timestamps = sample_timestamps(4.0, 3);
        assert!(timestamps.iter().all(|t| *t > 0.0 && *t < 4.0));
    }

    #[test]
    fn test_zero_count_yields_no_timestamps() {
        assert!(sample_timestamps(10.0, 0).is_empty());
    }
}
