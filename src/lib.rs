// Core modules
pub mod core;
pub mod camera;
pub mod storage;
pub mod service;
pub mod common;

// Re-export commonly used types
pub use crate::common::{Config, FaceAuthError, Paths, Result};
pub use crate::core::{
    AuthenticationOutcome, AuthenticationWorkflow, Descriptor, DescriptorExtractor,
    EnrollmentOutcome, EnrollmentWorkflow, OnnxExtractor, RejectReason, Recovery,
};
pub use crate::camera::{CaptureProvider, DeviceCapture, FileCapture, TimedCapture, V4lCamera};
pub use crate::storage::{EnrollmentRecord, IdentityStore};
pub use crate::service::{protocol, Service, ServiceClient};
