use std::path::{Path, PathBuf};
use image::DynamicImage;
use crate::camera::CaptureProvider;
use crate::common::{FaceAuthError, Result};

/// Replays a still image from disk as the capture.
#[derive(Debug, Clone)]
pub struct FileCapture {
    path: PathBuf,
}

impl FileCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CaptureProvider for FileCapture {
    fn capture(&mut self) -> Result<DynamicImage> {
        tracing::debug!("Reading capture from {}", self.path.display());
        image::open(&self.path).map_err(|e| {
            FaceAuthError::DeviceUnavailable(format!("cannot read {}: {}", self.path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use tempfile::TempDir;

    #[test]
    fn reads_image_from_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("face.png");
        GrayImage::from_pixel(4, 3, Luma([200])).save(&path).unwrap();

        let image = FileCapture::new(&path).capture().unwrap();
        assert_eq!((image.width(), image.height()), (4, 3));
    }

    #[test]
    fn missing_file_is_device_unavailable() {
        let tmp = TempDir::new().unwrap();
        let err = FileCapture::new(tmp.path().join("missing.png")).capture().unwrap_err();
        assert!(matches!(err, FaceAuthError::DeviceUnavailable(_)));
    }
}
