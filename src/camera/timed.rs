//! Deadline for capture devices that can hang.
//!
//! The wrapped provider lives on its own worker thread; `capture` waits for
//! the frame at most `timeout` and reports `CaptureTimeout` otherwise. A frame
//! that arrives after its deadline is discarded on the next call.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use image::DynamicImage;

use crate::camera::CaptureProvider;
use crate::common::{FaceAuthError, Result};

pub struct TimedCapture {
    requests: Sender<()>,
    frames: Receiver<Result<DynamicImage>>,
    timeout: Duration,
    outstanding: usize,
}

impl TimedCapture {
    /// Builds the provider on the worker thread, so it does not need to be
    /// `Send`. Fails if `open` fails or does not finish within `timeout`.
    pub fn spawn<P, F>(open: F, timeout: Duration) -> Result<Self>
    where
        P: CaptureProvider + 'static,
        F: FnOnce() -> Result<P> + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel::<()>();
        let (frame_tx, frame_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        thread::Builder::new()
            .name("capture".into())
            .spawn(move || {
                let mut provider = match open() {
                    Ok(provider) => {
                        let _ = ready_tx.send(Ok(()));
                        provider
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                for () in request_rx {
                    if frame_tx.send(provider.capture()).is_err() {
                        break;
                    }
                }
            })?;

        match ready_rx.recv_timeout(timeout) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(RecvTimeoutError::Timeout) => {
                return Err(FaceAuthError::CaptureTimeout(timeout.as_millis() as u64));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(FaceAuthError::DeviceUnavailable("capture worker exited".into()));
            }
        }

        Ok(Self {
            requests: request_tx,
            frames: frame_rx,
            timeout,
            outstanding: 0,
        })
    }
}

impl CaptureProvider for TimedCapture {
    fn capture(&mut self) -> Result<DynamicImage> {
        self.requests
            .send(())
            .map_err(|_| FaceAuthError::DeviceUnavailable("capture worker exited".into()))?;
        self.outstanding += 1;

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.frames.recv_timeout(remaining) {
                Ok(frame) => {
                    self.outstanding -= 1;
                    if self.outstanding == 0 {
                        return frame;
                    }
                    tracing::debug!("Dropping late frame from an expired capture");
                }
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!("Capture did not complete within {:?}", self.timeout);
                    return Err(FaceAuthError::CaptureTimeout(self.timeout.as_millis() as u64));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(FaceAuthError::DeviceUnavailable("capture worker exited".into()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    struct SlowCamera {
        delays: Vec<Duration>,
        shade: u8,
    }

    impl CaptureProvider for SlowCamera {
        fn capture(&mut self) -> Result<DynamicImage> {
            if !self.delays.is_empty() {
                thread::sleep(self.delays.remove(0));
            }
            self.shade += 1;
            Ok(DynamicImage::ImageLuma8(GrayImage::from_pixel(1, 1, Luma([self.shade]))))
        }
    }

    fn shade(image: &DynamicImage) -> u8 {
        image.to_luma8().get_pixel(0, 0)[0]
    }

    #[test]
    fn fast_capture_passes_through() {
        let mut capture = TimedCapture::spawn(
            || Ok(SlowCamera { delays: Vec::new(), shade: 0 }),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(shade(&capture.capture().unwrap()), 1);
        assert_eq!(shade(&capture.capture().unwrap()), 2);
    }

    #[test]
    fn slow_capture_times_out_and_late_frame_is_discarded() {
        let mut capture = TimedCapture::spawn(
            || Ok(SlowCamera { delays: vec![Duration::from_millis(400)], shade: 0 }),
            Duration::from_millis(100),
        )
        .unwrap();

        assert!(matches!(capture.capture(), Err(FaceAuthError::CaptureTimeout(100))));

        thread::sleep(Duration::from_millis(400));
        // The first frame (shade 1) belonged to the expired request
        assert_eq!(shade(&capture.capture().unwrap()), 2);
    }

    #[test]
    fn failing_open_is_reported() {
        let result = TimedCapture::spawn(
            || -> Result<SlowCamera> { Err(FaceAuthError::DeviceUnavailable("no camera".into())) },
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(FaceAuthError::DeviceUnavailable(_))));
    }
}
