use std::time::Duration;

use image::DynamicImage;

use crate::camera::{CaptureProvider, TimedCapture, V4lCamera};
use crate::common::config::CameraConfig;
use crate::common::Result;

/// The configured V4L2 camera, opened afresh for every capture and
/// released right after so other processes can use it in between.
pub struct DeviceCapture {
    config: CameraConfig,
}

impl DeviceCapture {
    pub fn new(config: &CameraConfig) -> Self {
        Self { config: config.clone() }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.capture_timeout_ms)
    }
}

impl CaptureProvider for DeviceCapture {
    fn capture(&mut self) -> Result<DynamicImage> {
        let config = self.config.clone();
        let mut camera = TimedCapture::spawn(move || V4lCamera::open(&config), self.timeout())?;
        camera.capture()
    }
}
