use crate::common::{FaceAuthError, Result};

/// Fixed-length numeric representation of one detected face.
pub type Descriptor = Vec<f64>;

/// Rejects descriptors no extractor should ever produce: empty vectors and
/// vectors holding NaN or infinities.
pub fn validate_descriptor(descriptor: &[f64]) -> Result<()> {
    if descriptor.is_empty() {
        return Err(FaceAuthError::InvalidDescriptor("descriptor is empty".into()));
    }
    if let Some(index) = descriptor.iter().position(|v| !v.is_finite()) {
        return Err(FaceAuthError::InvalidDescriptor(format!(
            "value at index {} is not finite", index
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_descriptor_is_valid() {
        assert!(validate_descriptor(&[0.1, -0.2, 0.3]).is_ok());
    }

    #[test]
    fn empty_and_nan_descriptors_are_invalid() {
        assert!(matches!(validate_descriptor(&[]), Err(FaceAuthError::InvalidDescriptor(_))));
        assert!(matches!(
            validate_descriptor(&[0.1, f64::NAN]),
            Err(FaceAuthError::InvalidDescriptor(_))
        ));
    }
}
