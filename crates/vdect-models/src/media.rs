//! Upload metadata echoed back in responses.

use serde::{Deserialize, Serialize};

/// Metadata about the uploaded file.
///
/// Width/height are present for images only; video metadata carries just the
/// filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl MediaMetadata {
    pub fn for_image(filename: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            filename: filename.into(),
            width: Some(width),
            height: Some(height),
        }
    }

    pub fn for_video(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            width: None,
            height: None,
        }
    }
}
