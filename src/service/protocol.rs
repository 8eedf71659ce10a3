//! Wire format between `faceid` and `faceid-service`.
//!
//! Every message is a 4-byte little-endian length followed by that many
//! bytes of bincode.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::PathBuf;
use crate::common::{FaceAuthError, Result};
use crate::core::{AuthenticationOutcome, EnrollmentOutcome};

pub const MAX_FRAME_LEN: usize = 1024 * 1024;

// Request types
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Request {
    Enroll(EnrollRequest),
    Authenticate(AuthRequest),
    ListUsers,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EnrollRequest {
    pub username: String,
    pub display_name: Option<String>,
    pub image: Option<PathBuf>,  // Still image instead of the camera (dev mode only)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuthRequest {
    pub username: String,
    pub image: Option<PathBuf>,
}

// Response types
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Response {
    Enroll(EnrollmentOutcome),
    Auth(AuthenticationOutcome),
    Users(Vec<String>),
    Failed { kind: FailureKind, message: String },
}

/// Errors that abort an operation, as seen by the client.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    StorageCorrupt,
    DescriptorShapeMismatch { expected: usize, found: usize },
    InvalidRequest,
    Internal,
}

impl Response {
    pub fn failed(error: &FaceAuthError) -> Self {
        let kind = match error {
            FaceAuthError::StorageCorrupt { .. } => FailureKind::StorageCorrupt,
            FaceAuthError::DescriptorShapeMismatch { expected, found } => {
                FailureKind::DescriptorShapeMismatch { expected: *expected, found: *found }
            }
            FaceAuthError::InvalidUsername { .. } | FaceAuthError::Protocol(_) => FailureKind::InvalidRequest,
            _ => FailureKind::Internal,
        };
        Response::Failed { kind, message: error.to_string() }
    }
}

impl FailureKind {
    pub fn into_error(self, message: String) -> FaceAuthError {
        match self {
            FailureKind::StorageCorrupt => FaceAuthError::StorageCorrupt {
                path: PathBuf::from("<service>"),
                message,
            },
            FailureKind::DescriptorShapeMismatch { expected, found } => {
                FaceAuthError::DescriptorShapeMismatch { expected, found }
            }
            FailureKind::InvalidRequest => FaceAuthError::Protocol(message),
            FailureKind::Internal => {
                FaceAuthError::Other(anyhow::anyhow!("Service error: {}", message))
            }
        }
    }
}

pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<()> {
    let data = bincode::serialize(message)
        .map_err(|e| FaceAuthError::Protocol(format!("Failed to serialize message: {}", e)))?;
    if data.len() > MAX_FRAME_LEN {
        return Err(FaceAuthError::Protocol(format!("Message too large: {} bytes", data.len())));
    }

    writer.write_all(&(data.len() as u32).to_le_bytes())?;
    writer.write_all(&data)?;
    writer.flush()?;
    Ok(())
}

pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;

    if len > MAX_FRAME_LEN {
        return Err(FaceAuthError::Protocol(format!("Message too large: {} bytes", len)));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    bincode::deserialize(&buf)
        .map_err(|e| FaceAuthError::Protocol(format!("Failed to deserialize message: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RejectReason;
    use crate::storage::EnrollmentRecord;
    use std::io::Cursor;

    #[test]
    fn responses_survive_framing() {
        let record = EnrollmentRecord::new("alice", Some("Alice"), vec![0.1, 0.2, 0.3]).unwrap();
        let messages = vec![
            Response::Enroll(EnrollmentOutcome::Stored(record)),
            Response::Auth(AuthenticationOutcome::Rejected(RejectReason::FaceMismatch { distance: 8.4 })),
            Response::Users(vec!["alice".into(), "bob".into()]),
        ];

        let mut buf = Vec::new();
        for message in &messages {
            write_frame(&mut buf, message).unwrap();
        }

        let mut cursor = Cursor::new(buf);
        for message in &messages {
            let decoded: Response = read_frame(&mut cursor).unwrap();
            assert_eq!(&decoded, message);
        }
    }

    #[test]
    fn oversized_length_prefix_is_rejected() {
        let mut bytes = ((MAX_FRAME_LEN + 1) as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 16]);

        let err = read_frame::<_, Request>(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, FaceAuthError::Protocol(_)));
    }

    #[test]
    fn fatal_errors_keep_their_kind() {
        let err = FaceAuthError::DescriptorShapeMismatch { expected: 128, found: 512 };
        match Response::failed(&err) {
            Response::Failed { kind, message } => {
                assert_eq!(kind, FailureKind::DescriptorShapeMismatch { expected: 128, found: 512 });
                assert!(matches!(
                    kind.into_error(message),
                    FaceAuthError::DescriptorShapeMismatch { expected: 128, found: 512 }
                ));
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }
}
