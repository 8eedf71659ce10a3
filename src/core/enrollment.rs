use crate::camera::CaptureProvider;
use crate::common::{FaceAuthError, Result};
use crate::core::extractor::{acquire_descriptor, Acquired, DescriptorExtractor};
use crate::core::outcome::EnrollmentOutcome;
use crate::storage::{validate_username, EnrollmentRecord, IdentityStore};
use image::DynamicImage;
use std::fs;
use std::path::{Path, PathBuf};

/// Registers a new identity from one capture.
///
/// `Requested -> CaptureObtained -> DescriptorExtracted -> Stored`, ending
/// early in `DuplicateUser`, `NoFaceDetected`, or `DeviceUnavailable`.
pub struct EnrollmentWorkflow<'a, E: ?Sized> {
    store: &'a IdentityStore,
    extractor: &'a E,
    pictures_dir: Option<PathBuf>,
}

impl<'a, E: DescriptorExtractor + ?Sized> EnrollmentWorkflow<'a, E> {
    pub fn new(store: &'a IdentityStore, extractor: &'a E) -> Self {
        Self { store, extractor, pictures_dir: None }
    }

    /// Keep the enrollment capture as `<dir>/<username>.jpg` once stored.
    pub fn with_pictures_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pictures_dir = Some(dir.into());
        self
    }

    pub fn run<C: CaptureProvider + ?Sized>(
        &self,
        username: &str,
        display_name: Option<&str>,
        capture: &mut C,
    ) -> Result<EnrollmentOutcome> {
        validate_username(username)?;

        // Checked before touching the camera; the store re-checks on commit
        if self.store.contains(username) {
            tracing::info!("Enrollment rejected, {} is already enrolled", username);
            return Ok(EnrollmentOutcome::DuplicateUser(username.to_string()));
        }

        let (descriptor, image) = match acquire_descriptor(capture, self.extractor, username)? {
            Acquired::Descriptor { descriptor, image } => (descriptor, image),
            Acquired::NoFace => {
                tracing::info!("Enrollment for {} found no face", username);
                return Ok(EnrollmentOutcome::NoFaceDetected);
            }
            Acquired::Unavailable(reason) => return Ok(EnrollmentOutcome::DeviceUnavailable(reason)),
        };
        tracing::debug!("Extracted {}-value descriptor for {}", descriptor.len(), username);

        let record = EnrollmentRecord::new(username, display_name, descriptor)?;
        match self.store.commit(record.clone()) {
            Ok(()) => {
                tracing::info!("Successfully enrolled user: {}", username);
                if let Some(dir) = &self.pictures_dir {
                    // The record is durable already; a lost picture is not fatal
                    if let Err(e) = save_picture(dir, username, &image) {
                        tracing::warn!("Failed to save enrollment image: {}", e);
                    }
                }
                Ok(EnrollmentOutcome::Stored(record))
            }
            Err(FaceAuthError::AlreadyExists(_)) => {
                tracing::warn!("Concurrent enrollment of {} lost the race", username);
                Ok(EnrollmentOutcome::DuplicateUser(username.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}

fn save_picture(dir: &Path, username: &str, image: &DynamicImage) -> Result<PathBuf> {
    if username.contains('/') || username.starts_with('.') {
        return Err(FaceAuthError::InvalidUsername {
            username: username.to_string(),
            reason: "not usable as a picture file name".into(),
        });
    }
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.jpg", username));
    image.to_rgb8().save(&path)?;
    tracing::debug!("Saved enrollment image to {}", path.display());
    Ok(path)
}
