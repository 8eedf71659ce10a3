use crate::camera::CaptureProvider;
use crate::common::{config::CameraConfig, FaceAuthError, Result};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma};
use std::time::Duration;

pub struct V4lCamera {
    device: Device,
    index: u32,
    config: CameraConfig,
}

fn unavailable(context: &str, e: impl std::fmt::Display) -> FaceAuthError {
    FaceAuthError::DeviceUnavailable(format!("{}: {}", context, e))
}

impl V4lCamera {
    pub fn open(config: &CameraConfig) -> Result<Self> {
        let index = config.device_index;
        tracing::info!("Opening camera device {}", index);

        let device = Device::new(index as usize)
            .map_err(|e| unavailable(&format!("Failed to open camera {}", index), e))?;

        let caps = device.query_caps()
            .map_err(|e| unavailable("Failed to query capabilities", e))?;

        // Some IR devices report only metadata capture but still stream frames
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            tracing::warn!("Device {} may not support standard video capture: {:?}", index, caps.capabilities);
        }

        let mut fmt = device.format()
            .map_err(|e| unavailable("Failed to get format", e))?;

        fmt.width = config.width;
        fmt.height = config.height;

        // Keep GREY for IR cameras, otherwise ask for MJPG
        if fmt.fourcc != FourCC::new(b"GREY") {
            fmt.fourcc = FourCC::new(b"MJPG");
        }

        if let Err(e) = device.set_format(&fmt) {
            tracing::warn!("Could not set exact format: {}. Using device defaults.", e);
        }

        let actual = device.format()
            .map_err(|e| unavailable("Failed to get final format", e))?;
        if actual.width != config.width || actual.height != config.height {
            tracing::warn!(
                "Camera resolution {}x{} differs from requested {}x{}",
                actual.width, actual.height, config.width, config.height
            );
        }

        Ok(Self { device, index, config: config.clone() })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    fn decode_frame(data: &[u8], fourcc: FourCC, width: u32, height: u32) -> Result<DynamicImage> {
        if fourcc == FourCC::new(b"GREY") {
            let expected = (width * height) as usize;
            let pixels = data.get(..expected)
                .ok_or_else(|| FaceAuthError::DeviceUnavailable("Short GREY frame".into()))?;
            let buffer = ImageBuffer::<Luma<u8>, _>::from_raw(width, height, pixels.to_vec())
                .ok_or_else(|| FaceAuthError::DeviceUnavailable("Failed to create grayscale image buffer".into()))?;
            return Ok(DynamicImage::ImageLuma8(buffer));
        }
        if fourcc == FourCC::new(b"MJPG") {
            return image::load_from_memory_with_format(data, ImageFormat::Jpeg)
                .map_err(|e| unavailable("Failed to decode MJPG frame", e));
        }
        Err(FaceAuthError::DeviceUnavailable(format!("Unsupported pixel format {}", fourcc.str().unwrap_or("unknown"))))
    }
}

impl CaptureProvider for V4lCamera {
    fn capture(&mut self) -> Result<DynamicImage> {
        let fmt = self.device.format()
            .map_err(|e| unavailable("Failed to get format", e))?;

        let mut stream = v4l::io::mmap::Stream::with_buffers(&mut self.device, Type::VideoCapture, 4)
            .map_err(|e| unavailable("Failed to create stream", e))?;

        // Warmup frames let the IR emitter and exposure settle
        for _ in 0..self.config.warmup_frames {
            stream.next()
                .map_err(|e| unavailable("Failed to capture warmup frame", e))?;
            std::thread::sleep(Duration::from_millis(self.config.warmup_delay_ms));
        }

        let (buf, _meta) = stream.next()
            .map_err(|e| unavailable("Failed to capture", e))?;

        Self::decode_frame(buf, fmt.fourcc, fmt.width, fmt.height)
    }
}
