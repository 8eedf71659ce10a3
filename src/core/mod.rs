pub mod authentication;
pub mod descriptor;
pub mod detector;
pub mod enrollment;
pub mod extractor;
pub mod matcher;
pub mod onnx;
pub mod outcome;
pub mod recognizer;

pub use authentication::AuthenticationWorkflow;
pub use descriptor::{validate_descriptor, Descriptor};
pub use detector::{FaceBox, FaceDetector};
pub use enrollment::EnrollmentWorkflow;
pub use extractor::{DescriptorExtractor, OnnxExtractor};
pub use matcher::{euclidean_distance, matches, MatchDecision};
pub use outcome::{AuthenticationOutcome, EnrollmentOutcome, RejectReason, Recovery};
pub use recognizer::FaceRecognizer;
