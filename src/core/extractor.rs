use crate::camera::CaptureProvider;
use crate::common::{Config, FaceAuthError, Result};
use crate::core::descriptor::{validate_descriptor, Descriptor};
use crate::core::detector::FaceDetector;
use crate::core::recognizer::FaceRecognizer;
use image::DynamicImage;
use std::path::Path;

/// Turns a captured image into one descriptor per detected face.
///
/// The first descriptor belongs to the primary face (for the ONNX extractor,
/// the most confident detection). An image without faces yields an empty
/// vector, not an error.
pub trait DescriptorExtractor {
    fn extract(&self, image: &DynamicImage) -> Result<Vec<Descriptor>>;
}

impl<E: DescriptorExtractor + ?Sized> DescriptorExtractor for &E {
    fn extract(&self, image: &DynamicImage) -> Result<Vec<Descriptor>> {
        (**self).extract(image)
    }
}

pub struct OnnxExtractor {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxExtractor {
    pub fn new(config: &Config, models_dir: &Path) -> Result<Self> {
        Ok(Self {
            detector: FaceDetector::new(config, models_dir)?,
            recognizer: FaceRecognizer::new(config, models_dir)?,
        })
    }
}

impl DescriptorExtractor for OnnxExtractor {
    fn extract(&self, image: &DynamicImage) -> Result<Vec<Descriptor>> {
        let faces = self.detector.detect(image)?;
        faces
            .iter()
            .map(|face| self.recognizer.describe(image, face))
            .collect()
    }
}

/// Result of one capture + extraction step.
pub(crate) enum Acquired {
    Descriptor { descriptor: Descriptor, image: DynamicImage },
    NoFace,
    Unavailable(String),
}

/// Captures one image and keeps the primary face's descriptor.
///
/// A capture timeout counts as no face; additional faces are ignored. A
/// primary descriptor that is empty or not finite is an `InvalidDescriptor`
/// error in both workflows.
pub(crate) fn acquire_descriptor<C, E>(capture: &mut C, extractor: &E, username: &str) -> Result<Acquired>
where
    C: CaptureProvider + ?Sized,
    E: DescriptorExtractor + ?Sized,
{
    let image = match capture.capture() {
        Ok(image) => image,
        Err(FaceAuthError::DeviceUnavailable(reason)) => {
            tracing::warn!("Capture device unavailable for {}: {}", username, reason);
            return Ok(Acquired::Unavailable(reason));
        }
        Err(FaceAuthError::CaptureTimeout(ms)) => {
            tracing::warn!("Capture for {} timed out after {} ms", username, ms);
            return Ok(Acquired::NoFace);
        }
        Err(e) => return Err(e),
    };
    tracing::debug!("Capture obtained for {} ({}x{})", username, image.width(), image.height());

    let mut descriptors = extractor.extract(&image)?;
    if descriptors.len() > 1 {
        tracing::warn!(
            "{} faces in capture for {}; using the primary face only",
            descriptors.len(), username
        );
    }
    if descriptors.is_empty() {
        return Ok(Acquired::NoFace);
    }

    let descriptor = descriptors.swap_remove(0);
    validate_descriptor(&descriptor)?;
    Ok(Acquired::Descriptor { descriptor, image })
}
