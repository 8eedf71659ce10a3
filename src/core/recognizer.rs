use crate::common::{config::RecognizerConfig, Config, FaceAuthError, Result};
use crate::core::descriptor::Descriptor;
use crate::core::detector::FaceBox;
use crate::core::onnx::{load_session, resolve_model_path};
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;
use image::{DynamicImage, imageops::FilterType};
use ndarray::{Array4, CowArray};

/// Maps a face crop to its descriptor vector.
pub struct FaceRecognizer {
    session: Session,
    _environment: Arc<Environment>,
    config: RecognizerConfig,
}

impl FaceRecognizer {
    pub fn new(config: &Config, models_dir: &Path) -> Result<Self> {
        let model_path = resolve_model_path(&config.models.recognizer_path, models_dir);
        let (session, environment) = load_session(
            "face_recognizer",
            &model_path,
            config.performance.optimization_level,
        )?;

        Ok(Self {
            session,
            _environment: environment,
            config: config.recognizer.clone(),
        })
    }

    pub fn describe(&self, image: &DynamicImage, face: &FaceBox) -> Result<Descriptor> {
        let face_img = crop_face(image, face)?;
        let resized = face_img.resize_exact(
            self.config.input_size,
            self.config.input_size,
            FilterType::Triangle,
        );

        let input_array = preprocess_face(&resized, &self.config);
        let cow_array = CowArray::from(input_array.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        let first = outputs.first()
            .ok_or_else(|| FaceAuthError::Model("Recognizer produced no output".into()))?;
        let descriptor: Descriptor = first
            .try_extract::<f32>()?
            .view()
            .iter()
            .map(|&v| v as f64)
            .collect();
        Ok(descriptor)
    }
}

fn crop_face(image: &DynamicImage, face: &FaceBox) -> Result<DynamicImage> {
    let x = face.x1.max(0.0) as u32;
    let y = face.y1.max(0.0) as u32;
    if x >= image.width() || y >= image.height() {
        return Err(FaceAuthError::Model(format!(
            "Face box ({}, {}) lies outside the {}x{} image", x, y, image.width(), image.height()
        )));
    }
    let width = ((face.x2 - face.x1).max(1.0) as u32).min(image.width() - x);
    let height = ((face.y2 - face.y1).max(1.0) as u32).min(image.height() - y);

    Ok(image.crop_imm(x, y, width, height))
}

// Single-channel input centred on zero: (pixel - v) / v.
fn preprocess_face(img: &DynamicImage, config: &RecognizerConfig) -> Array4<f32> {
    let gray = img.to_luma8();
    let size = config.input_size as usize;
    let norm = config.normalization_value;
    let mut array = Array4::<f32>::zeros((1, 1, size, size));

    for (x, y, pixel) in gray.enumerate_pixels() {
        array[[0, 0, y as usize, x as usize]] = (pixel[0] as f32 - norm) / norm;
    }

    array
}
