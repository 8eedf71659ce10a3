use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaceAuthError {
    #[error("User already enrolled: {0}")]
    DuplicateUser(String),

    #[error("No face detected")]
    NoFaceDetected,

    #[error("Face did not match enrolled descriptor (distance {distance:.4})")]
    FaceMismatch { distance: f64 },

    #[error("User not enrolled: {0}")]
    UserUnknown(String),

    #[error("No enrollment record for: {0}")]
    NotFound(String),

    #[error("Enrollment record already exists for: {0}")]
    AlreadyExists(String),

    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Capture timed out after {0} ms")]
    CaptureTimeout(u64),

    #[error("Identity store {path} is corrupt: {message}")]
    StorageCorrupt { path: PathBuf, message: String },

    #[error("Descriptor shape mismatch: expected {expected} values, found {found}")]
    DescriptorShapeMismatch { expected: usize, found: usize },

    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Invalid username '{username}': {reason}")]
    InvalidUsername { username: String, reason: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::OrtError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FaceAuthError>;
