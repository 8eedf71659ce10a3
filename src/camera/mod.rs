pub mod device;
pub mod file;
pub mod timed;
pub mod v4l2;

use image::DynamicImage;
use crate::common::Result;

pub use device::DeviceCapture;
pub use file::FileCapture;
pub use timed::TimedCapture;
pub use v4l2::V4lCamera;

/// Source of a single captured image per call.
///
/// Implementations report a missing or failing device as
/// `FaceAuthError::DeviceUnavailable`.
pub trait CaptureProvider {
    fn capture(&mut self) -> Result<DynamicImage>;
}

impl<P: CaptureProvider + ?Sized> CaptureProvider for Box<P> {
    fn capture(&mut self) -> Result<DynamicImage> {
        (**self).capture()
    }
}
