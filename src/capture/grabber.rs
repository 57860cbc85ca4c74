use std::path::PathBuf;
use tracing::info;

use super::screenshot::{CapturedImage, DisplayId};
use crate::error::CaptureError;

/// Screenshot backend: one image per connected display, in display order.
pub trait ScreenGrabber: Send + Sync {
    fn grab(&self) -> Result<Vec<CapturedImage>, CaptureError>;
}

impl<F> ScreenGrabber for F
where
    F: Fn() -> Result<Vec<CapturedImage>, CaptureError> + Send + Sync,
{
    fn grab(&self) -> Result<Vec<CapturedImage>, CaptureError> {
        self()
    }
}

/// Serves screenshots from image files, one file per display.
pub struct FileGrabber {
    paths: Vec<PathBuf>,
    scale_factor: f64,
}

impl FileGrabber {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            scale_factor: 1.0,
        }
    }

    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }
}

impl ScreenGrabber for FileGrabber {
    fn grab(&self) -> Result<Vec<CapturedImage>, CaptureError> {
        if self.paths.is_empty() {
            return Err(CaptureError::NoImages);
        }

        self.paths
            .iter()
            .enumerate()
            .map(|(index, path)| {
                let image = image::open(path).map_err(|e| CaptureError::Load {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
                info!(
                    "Loaded screenshot for display {} from {:?} ({}x{})",
                    index,
                    path,
                    image.width(),
                    image.height()
                );
                Ok(CapturedImage::new(index as DisplayId, image.to_rgba8())
                    .with_scale_factor(self.scale_factor))
            })
            .collect()
    }
}
