//! Terminal states of the enrollment and authentication workflows.
//!
//! Recoverable results are outcomes; failures that must abort the current
//! operation (`StorageCorrupt`, `DescriptorShapeMismatch`, I/O) are `Err`
//! values of `FaceAuthError` instead.

use serde::{Deserialize, Serialize};
use crate::common::{FaceAuthError, Result};
use crate::storage::EnrollmentRecord;

/// What the calling layer should offer the user next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recovery {
    /// Capture again at the same step.
    RetryCapture,
    /// The identity exists; authenticate instead.
    GoToLogin,
    /// The identity does not exist; enroll first.
    GoToRegistration,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EnrollmentOutcome {
    Stored(EnrollmentRecord),
    DuplicateUser(String),
    NoFaceDetected,
    DeviceUnavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RejectReason {
    FaceMismatch { distance: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuthenticationOutcome {
    Accepted { distance: f64, display_name: String },
    Rejected(RejectReason),
    UserUnknown(String),
    NoFaceDetected,
    DeviceUnavailable(String),
}

impl EnrollmentOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored(_))
    }

    pub fn recovery(&self) -> Recovery {
        match self {
            Self::Stored(_) => Recovery::None,
            Self::DuplicateUser(_) => Recovery::GoToLogin,
            Self::NoFaceDetected | Self::DeviceUnavailable(_) => Recovery::RetryCapture,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Stored(_) => "Picture captured successfully! You can now log in.",
            Self::DuplicateUser(_) => "User already registered. Please log in.",
            Self::NoFaceDetected => "No face found in the captured picture. Please try again.",
            Self::DeviceUnavailable(_) => "Camera is not available. Please try again.",
        }
    }

    pub fn into_result(self) -> Result<EnrollmentRecord> {
        match self {
            Self::Stored(record) => Ok(record),
            Self::DuplicateUser(username) => Err(FaceAuthError::DuplicateUser(username)),
            Self::NoFaceDetected => Err(FaceAuthError::NoFaceDetected),
            Self::DeviceUnavailable(reason) => Err(FaceAuthError::DeviceUnavailable(reason)),
        }
    }
}

impl AuthenticationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Name to greet the user with after a successful login.
    pub fn display_name(&self) -> Option<&str> {
        match self {
            Self::Accepted { display_name, .. } => Some(display_name),
            _ => None,
        }
    }

    pub fn recovery(&self) -> Recovery {
        match self {
            Self::Accepted { .. } | Self::Rejected(_) => Recovery::None,
            Self::UserUnknown(_) => Recovery::GoToRegistration,
            Self::NoFaceDetected | Self::DeviceUnavailable(_) => Recovery::RetryCapture,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "Login successful!",
            Self::Rejected(RejectReason::FaceMismatch { .. }) => {
                "Face authentication failed. Please try again."
            }
            Self::UserUnknown(_) => "User not found. Please register first.",
            Self::NoFaceDetected => "No face found in the Camera. Please try again.",
            Self::DeviceUnavailable(_) => "Camera is not available. Please try again.",
        }
    }

    /// Distance of an accepted match.
    pub fn into_result(self) -> Result<f64> {
        match self {
            Self::Accepted { distance, .. } => Ok(distance),
            Self::Rejected(RejectReason::FaceMismatch { distance }) => {
                Err(FaceAuthError::FaceMismatch { distance })
            }
            Self::UserUnknown(username) => Err(FaceAuthError::UserUnknown(username)),
            Self::NoFaceDetected => Err(FaceAuthError::NoFaceDetected),
            Self::DeviceUnavailable(reason) => Err(FaceAuthError::DeviceUnavailable(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_failures_ask_for_a_new_capture() {
        assert_eq!(EnrollmentOutcome::NoFaceDetected.recovery(), Recovery::RetryCapture);
        assert_eq!(
            AuthenticationOutcome::DeviceUnavailable("busy".into()).recovery(),
            Recovery::RetryCapture
        );
    }

    #[test]
    fn identity_failures_redirect() {
        assert_eq!(EnrollmentOutcome::DuplicateUser("carol".into()).recovery(), Recovery::GoToLogin);
        assert_eq!(
            AuthenticationOutcome::UserUnknown("mallory".into()).recovery(),
            Recovery::GoToRegistration
        );
    }

    #[test]
    fn only_acceptance_carries_a_greeting() {
        let accepted = AuthenticationOutcome::Accepted { distance: 0.01, display_name: "Alice".into() };
        assert_eq!(accepted.display_name(), Some("Alice"));
        assert_eq!(AuthenticationOutcome::NoFaceDetected.display_name(), None);
    }

    #[test]
    fn mismatch_is_distinct_from_no_face() {
        let rejected = AuthenticationOutcome::Rejected(RejectReason::FaceMismatch { distance: 1.2 });
        assert_ne!(rejected.message(), AuthenticationOutcome::NoFaceDetected.message());
        assert!(matches!(
            rejected.into_result(),
            Err(FaceAuthError::FaceMismatch { distance }) if distance == 1.2
        ));
        assert!(matches!(
            AuthenticationOutcome::NoFaceDetected.into_result(),
            Err(FaceAuthError::NoFaceDetected)
        ));
    }
}
