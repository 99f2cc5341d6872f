//! Scoped temporary media files.
//!
//! Uploaded videos are spooled to disk for FFmpeg. The file must be removed
//! on every exit path (success, classifier failure, or no-face failure), so
//! removal happens in `Drop` as well as through the explicit async
//! [`TempMedia::cleanup`]. Removal failure is logged, never propagated.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// A temporary media file that is deleted when it goes out of scope.
#[derive(Debug)]
pub struct TempMedia {
    path: PathBuf,
    removed: bool,
}

impl TempMedia {
    /// Spool bytes to a fresh temporary file with the given suffix.
    pub async fn write(bytes: &[u8], suffix: &str) -> MediaResult<Self> {
        let file = tempfile::Builder::new()
            .prefix("vdect-")
            .suffix(suffix)
            .tempfile()?;
        let (_, path) = file
            .keep()
            .map_err(|e| MediaError::internal(format!("Failed to keep temp file: {}", e)))?;

        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Spooled upload to temp file");

        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file now. Failures are logged and swallowed; the request
    /// must not fail because cleanup did.
    pub async fn cleanup(mut self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Cleaned up temporary media");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to remove temporary media");
            }
        }
        self.removed = true;
    }
}

impl Drop for TempMedia {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Cleaned up temporary media on drop");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to remove temporary media");
            }
        }
    }
}
