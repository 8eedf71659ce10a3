use crate::camera::CaptureProvider;
use crate::common::{FaceAuthError, Result};
use crate::core::extractor::{acquire_descriptor, Acquired, DescriptorExtractor};
use crate::core::matcher;
use crate::core::outcome::{AuthenticationOutcome, RejectReason};
use crate::storage::IdentityStore;

/// Verifies a claimed identity against its enrolled descriptor.
///
/// Each run is independent: there is no attempt counting or lockout here.
pub struct AuthenticationWorkflow<'a, E: ?Sized> {
    store: &'a IdentityStore,
    extractor: &'a E,
    threshold: f64,
}

impl<'a, E: DescriptorExtractor + ?Sized> AuthenticationWorkflow<'a, E> {
    pub fn new(store: &'a IdentityStore, extractor: &'a E, threshold: f64) -> Self {
        Self { store, extractor, threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn run<C: CaptureProvider + ?Sized>(
        &self,
        username: &str,
        capture: &mut C,
    ) -> Result<AuthenticationOutcome> {
        let stored = match self.store.get(username) {
            Ok(record) => record,
            Err(FaceAuthError::NotFound(_)) => {
                tracing::info!("Authentication for unknown user: {}", username);
                return Ok(AuthenticationOutcome::UserUnknown(username.to_string()));
            }
            Err(e) => return Err(e),
        };

        let candidate = match acquire_descriptor(capture, self.extractor, username)? {
            Acquired::Descriptor { descriptor, .. } => descriptor,
            Acquired::NoFace => return Ok(AuthenticationOutcome::NoFaceDetected),
            Acquired::Unavailable(reason) => return Ok(AuthenticationOutcome::DeviceUnavailable(reason)),
        };

        let decision = matcher::evaluate(stored.descriptor(), &candidate, self.threshold)?;
        tracing::debug!(
            "Match for {}: distance={:.4}, threshold={:.4}",
            username, decision.distance, decision.threshold
        );

        if decision.accepted {
            tracing::info!("Authentication successful for {}", username);
            Ok(AuthenticationOutcome::Accepted {
                distance: decision.distance,
                display_name: stored.display_name().to_string(),
            })
        } else {
            tracing::info!("Authentication rejected for {}: face mismatch", username);
            Ok(AuthenticationOutcome::Rejected(RejectReason::FaceMismatch {
                distance: decision.distance,
            }))
        }
    }
}
