use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::common::error::{FaceAuthError, Result};

/// Euclidean distance cut-off for 128-value face descriptors; tune per
/// descriptor model.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.6;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub recognizer: RecognizerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CameraConfig {
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub warmup_frames: u32,
    #[serde(default = "default_warmup_delay")]
    pub warmup_delay_ms: u64,
    #[serde(default = "default_capture_timeout")]
    pub capture_timeout_ms: u64,
}

fn default_warmup_delay() -> u64 { 50 }
fn default_capture_timeout() -> u64 { 10_000 }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 640,
            height: 480,
            warmup_frames: 0,
            warmup_delay_ms: default_warmup_delay(),
            capture_timeout_ms: default_capture_timeout(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModelConfig {
    pub detector_path: PathBuf,
    pub recognizer_path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            detector_path: PathBuf::from("face_detector.onnx"),
            recognizer_path: PathBuf::from("face_descriptor.onnx"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
}

fn default_match_threshold() -> f64 { DEFAULT_MATCH_THRESHOLD }

impl Default for AuthConfig {
    fn default() -> Self {
        Self { match_threshold: DEFAULT_MATCH_THRESHOLD }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DetectorConfig {
    pub input_width: u32,
    pub input_height: u32,
    #[serde(default = "default_detection_confidence")]
    pub confidence: f32,
    #[serde(default = "default_nms_iou")]
    pub nms_iou: f32,
    #[serde(default = "default_max_faces")]
    pub max_faces: usize,
}

fn default_detection_confidence() -> f32 { 0.5 }
fn default_nms_iou() -> f32 { 0.45 }
fn default_max_faces() -> usize { 5 }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_width: 640,
            input_height: 640,
            confidence: default_detection_confidence(),
            nms_iou: default_nms_iou(),
            max_faces: default_max_faces(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecognizerConfig {
    pub input_size: u32,
    pub normalization_value: f32,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self { input_size: 112, normalization_value: 127.5 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// Overrides the mode-dependent location of the identity store.
    #[serde(default)]
    pub users_file: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PerformanceConfig {
    #[serde(default = "default_optimization_level")]
    pub optimization_level: u32,
}

fn default_optimization_level() -> u32 { 3 }

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self { optimization_level: default_optimization_level() }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from_path(Path::new("configs/face-auth.toml"))
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FaceAuthError::Config(format!(
                "Config file not found: {}. Please create it from configs/face-auth.toml.",
                path.display()
            )));
        }

        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| FaceAuthError::Config(format!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.width > 4096 {
            return Err(FaceAuthError::Config(format!(
                "Camera width must be between 1 and 4096, got {}", self.camera.width
            )));
        }
        if self.camera.height == 0 || self.camera.height > 4096 {
            return Err(FaceAuthError::Config(format!(
                "Camera height must be between 1 and 4096, got {}", self.camera.height
            )));
        }
        if self.camera.capture_timeout_ms == 0 {
            return Err(FaceAuthError::Config(
                "Capture timeout must be at least 1 ms".into()
            ));
        }

        // Distances are non-negative, so a negative threshold would reject everyone
        if !self.auth.match_threshold.is_finite() || self.auth.match_threshold < 0.0 {
            return Err(FaceAuthError::Config(format!(
                "Match threshold must be a finite, non-negative distance, got {}",
                self.auth.match_threshold
            )));
        }

        if self.detector.confidence < 0.0 || self.detector.confidence > 1.0 {
            return Err(FaceAuthError::Config(format!(
                "Detection confidence must be between 0.0 and 1.0, got {}",
                self.detector.confidence
            )));
        }
        if self.detector.nms_iou <= 0.0 || self.detector.nms_iou > 1.0 {
            return Err(FaceAuthError::Config(format!(
                "NMS IoU threshold must be in (0.0, 1.0], got {}", self.detector.nms_iou
            )));
        }
        if self.detector.input_width == 0 || self.detector.input_width > 4096 {
            return Err(FaceAuthError::Config(format!(
                "Detector input width must be between 1 and 4096, got {}",
                self.detector.input_width
            )));
        }
        if self.detector.input_height == 0 || self.detector.input_height > 4096 {
            return Err(FaceAuthError::Config(format!(
                "Detector input height must be between 1 and 4096, got {}",
                self.detector.input_height
            )));
        }

        if self.recognizer.input_size == 0 || self.recognizer.input_size > 1024 {
            return Err(FaceAuthError::Config(format!(
                "Recognizer input size must be between 1 and 1024, got {}",
                self.recognizer.input_size
            )));
        }
        if self.recognizer.normalization_value <= 0.0 {
            return Err(FaceAuthError::Config(format!(
                "Recognizer normalization value must be positive, got {}",
                self.recognizer.normalization_value
            )));
        }

        Ok(())
    }
}
