use crate::common::{config::DetectorConfig, Config, Result};
use crate::core::onnx::{load_session, resolve_model_path};
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;
use image::{DynamicImage, imageops::FilterType};
use ndarray::{Array4, CowArray};

#[derive(Debug, Clone, PartialEq)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl FaceBox {
    fn area(&self) -> f32 {
        (self.x2 - self.x1) * (self.y2 - self.y1)
    }

    fn iou(&self, other: &FaceBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// YOLO-style single-class face detector.
pub struct FaceDetector {
    session: Session,
    _environment: Arc<Environment>,
    config: DetectorConfig,
}

impl FaceDetector {
    pub fn new(config: &Config, models_dir: &Path) -> Result<Self> {
        let model_path = resolve_model_path(&config.models.detector_path, models_dir);
        let (session, environment) = load_session(
            "face_detector",
            &model_path,
            config.performance.optimization_level,
        )?;

        Ok(Self {
            session,
            _environment: environment,
            config: config.detector.clone(),
        })
    }

    /// Detected faces in original image coordinates, most confident first.
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceBox>> {
        let orig_width = image.width() as f32;
        let orig_height = image.height() as f32;

        let resized;
        let input = if image.width() == self.config.input_width
            && image.height() == self.config.input_height {
            image
        } else {
            resized = image.resize_exact(
                self.config.input_width,
                self.config.input_height,
                FilterType::Nearest,
            );
            &resized
        };

        let cow_array = CowArray::from(image_to_array(input).into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        let Some(first) = outputs.first() else {
            return Ok(Vec::new());
        };
        let output = first.try_extract::<f32>()?.view().to_owned();
        let shape = output.shape().to_vec();
        let values: Vec<f32> = output.iter().copied().collect();

        let mut faces = parse_predictions(&values, &shape, &self.config);

        let scale_x = orig_width / self.config.input_width as f32;
        let scale_y = orig_height / self.config.input_height as f32;
        for face in &mut faces {
            face.x1 *= scale_x;
            face.x2 *= scale_x;
            face.y1 *= scale_y;
            face.y2 *= scale_y;
        }

        tracing::debug!("Detected {} face(s)", faces.len());
        Ok(faces)
    }
}

// Grey input replicated into three channels, scaled to [0, 1].
fn image_to_array(img: &DynamicImage) -> Array4<f32> {
    let gray = img.to_luma8();
    let width = img.width() as usize;
    let height = img.height() as usize;
    let mut array = Array4::<f32>::zeros((1, 3, height, width));

    for (x, y, pixel) in gray.enumerate_pixels() {
        let value = pixel[0] as f32 / 255.0;
        for channel in 0..3 {
            array[[0, channel, y as usize, x as usize]] = value;
        }
    }

    array
}

/// Decodes `[1, N, 5]` or transposed `[1, 5, N]` output rows of
/// `(cx, cy, w, h, confidence)` into boxes, then applies NMS, the confidence
/// threshold, and the face limit.
pub fn parse_predictions(values: &[f32], shape: &[usize], config: &DetectorConfig) -> Vec<FaceBox> {
    let (num_predictions, prediction_length, transposed) = match shape {
        [_, a, b] if b > a && *a <= 10 => (*b, *a, true),
        [_, a, b] => (*a, *b, false),
        [a, b] => (*a, *b, false),
        _ => {
            tracing::warn!("Unexpected detector output shape: {:?}", shape);
            return Vec::new();
        }
    };
    if prediction_length < 4 || values.len() < num_predictions * prediction_length {
        tracing::warn!("Detector output too short for shape {:?}", shape);
        return Vec::new();
    }

    let at = |i: usize, field: usize| -> f32 {
        if field >= prediction_length {
            return 0.0;
        }
        if transposed {
            values[field * num_predictions + i]
        } else {
            values[i * prediction_length + field]
        }
    };

    let input_width = config.input_width as f32;
    let input_height = config.input_height as f32;

    let mut faces = Vec::new();
    for i in 0..num_predictions {
        let (cx, cy, w, h, confidence) = (at(i, 0), at(i, 1), at(i, 2), at(i, 3), at(i, 4));
        if confidence <= 0.001 {
            continue;
        }

        // Normalized coordinates need scaling to the model input
        let scale = if cx > 1.0 || cy > 1.0 || w > 1.0 || h > 1.0 { 1.0 } else { input_width };
        let (cx, cy, w, h) = (cx * scale, cy * scale, w * scale, h * scale);

        let x1 = (cx - w / 2.0).max(0.0);
        let y1 = (cy - h / 2.0).max(0.0);
        let x2 = (cx + w / 2.0).min(input_width);
        let y2 = (cy + h / 2.0).min(input_height);

        if x2 - x1 > 10.0 && y2 - y1 > 10.0 {
            faces.push(FaceBox { x1, y1, x2, y2, confidence });
        }
    }

    let mut faces = non_max_suppression(faces, config.nms_iou);
    faces.retain(|face| face.confidence >= config.confidence);
    faces.truncate(config.max_faces);
    faces
}

fn non_max_suppression(mut boxes: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<FaceBox> = Vec::new();
    for candidate in boxes {
        if keep.iter().all(|kept| kept.iou(&candidate) < iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DetectorConfig {
        DetectorConfig {
            input_width: 640,
            input_height: 640,
            confidence: 0.5,
            nms_iou: 0.45,
            max_faces: 5,
        }
    }

    #[test]
    fn overlapping_boxes_collapse_to_most_confident() {
        let values = vec![
            100.0, 100.0, 50.0, 50.0, 0.7,
            102.0, 101.0, 50.0, 50.0, 0.9,
            400.0, 400.0, 60.0, 60.0, 0.8,
        ];
        let faces = parse_predictions(&values, &[1, 3, 5], &config());

        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].confidence, 0.9);
        assert_eq!(faces[1].confidence, 0.8);
    }

    #[test]
    fn transposed_output_is_decoded() {
        // Fields are rows, predictions are columns
        let values = vec![
            100.0, 400.0, 300.0, 300.0, 500.0, 200.0,
            100.0, 300.0, 100.0, 300.0, 500.0, 500.0,
            50.0, 60.0, 50.0, 60.0, 50.0, 50.0,
            50.0, 60.0, 50.0, 60.0, 50.0, 50.0,
            0.6, 0.95, 0.2, 0.3, 0.1, 0.05,
        ];
        let mut cfg = config();
        cfg.max_faces = 1;
        let faces = parse_predictions(&values, &[1, 5, 6], &cfg);

        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].confidence, 0.95);
        assert_eq!(faces[0].x1, 400.0 - 30.0);
    }

    #[test]
    fn low_confidence_and_tiny_boxes_are_dropped() {
        let values = vec![
            100.0, 100.0, 50.0, 50.0, 0.3,
            200.0, 200.0, 5.0, 5.0, 0.99,
        ];
        assert!(parse_predictions(&values, &[1, 2, 5], &config()).is_empty());
    }

    #[test]
    fn unexpected_shape_yields_no_faces() {
        assert!(parse_predictions(&[0.0; 4], &[4], &config()).is_empty());
    }
}
