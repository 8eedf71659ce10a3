use serde::{Deserialize, Serialize};
use crate::common::{FaceAuthError, Result};
use crate::core::descriptor::{validate_descriptor, Descriptor};

const MAX_USERNAME_LEN: usize = 64;

/// One enrolled identity. Created only by a successful enrollment and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    username: String,
    display_name: String,
    descriptor: Descriptor,
}

impl EnrollmentRecord {
    pub fn new(username: &str, display_name: Option<&str>, descriptor: Descriptor) -> Result<Self> {
        validate_username(username)?;
        validate_descriptor(&descriptor)?;

        let display_name = match display_name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => username.to_string(),
        };

        Ok(Self {
            username: username.to_string(),
            display_name,
            descriptor,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn descriptor(&self) -> &[f64] {
        &self.descriptor
    }

    // Store-internal constructor for entries already validated while loading.
    pub(crate) fn from_parts(username: String, display_name: String, descriptor: Descriptor) -> Self {
        Self { username, display_name, descriptor }
    }
}

pub fn validate_username(username: &str) -> Result<()> {
    let invalid = |reason: &str| FaceAuthError::InvalidUsername {
        username: username.to_string(),
        reason: reason.to_string(),
    };

    if username.trim().is_empty() {
        return Err(invalid("username is required"));
    }
    if username.trim() != username {
        return Err(invalid("leading or trailing whitespace"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(invalid("longer than 64 characters"));
    }
    if username.chars().any(char::is_control) {
        return Err(invalid("contains control characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_defaults_to_username() {
        let record = EnrollmentRecord::new("alice", None, vec![0.1, 0.2]).unwrap();
        assert_eq!(record.display_name(), "alice");

        let record = EnrollmentRecord::new("alice", Some("  "), vec![0.1, 0.2]).unwrap();
        assert_eq!(record.display_name(), "alice");

        let record = EnrollmentRecord::new("alice", Some("Alice Liddell"), vec![0.1]).unwrap();
        assert_eq!(record.display_name(), "Alice Liddell");
    }

    #[test]
    fn usernames_are_validated() {
        assert!(validate_username("bob").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("   ").is_err());
        assert!(validate_username(" bob").is_err());
        assert!(validate_username("bo\nb").is_err());
        assert!(validate_username(&"x".repeat(65)).is_err());
    }

    #[test]
    fn record_requires_a_descriptor() {
        let err = EnrollmentRecord::new("carol", None, Vec::new()).unwrap_err();
        assert!(matches!(err, FaceAuthError::InvalidDescriptor(_)));
    }
}
