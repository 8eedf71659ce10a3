//! Descriptor comparison.
//!
//! Two descriptors belong to the same identity when the Euclidean distance
//! between them is at most the configured match threshold. Everything here
//! is pure and deterministic.

use serde::{Deserialize, Serialize};
use crate::common::{FaceAuthError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchDecision {
    pub distance: f64,
    pub threshold: f64,
    pub accepted: bool,
}

pub fn euclidean_distance(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(FaceAuthError::DescriptorShapeMismatch {
            expected: a.len(),
            found: b.len(),
        });
    }

    let sum: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    Ok(sum.sqrt())
}

/// Compares a freshly extracted descriptor against the enrolled one.
pub fn evaluate(stored: &[f64], candidate: &[f64], threshold: f64) -> Result<MatchDecision> {
    let distance = euclidean_distance(stored, candidate)?;
    Ok(MatchDecision {
        distance,
        threshold,
        accepted: distance <= threshold,
    })
}

pub fn matches(stored: &[f64], candidate: &[f64], threshold: f64) -> Result<bool> {
    evaluate(stored, candidate, threshold).map(|decision| decision.accepted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_matches_itself_at_zero_threshold() {
        let d = vec![0.25, -1.5, 3.0, 0.0];
        assert!(matches(&d, &d, 0.0).unwrap());
        assert_eq!(euclidean_distance(&d, &d).unwrap(), 0.0);
    }

    #[test]
    fn close_descriptor_is_accepted() {
        let decision = evaluate(&[0.1, 0.2, 0.3], &[0.1, 0.2, 0.31], 0.6).unwrap();
        assert!(decision.accepted);
        assert!((decision.distance - 0.01).abs() < 1e-9);
    }

    #[test]
    fn distant_descriptor_is_rejected() {
        let decision = evaluate(&[0.1, 0.2, 0.3], &[5.0, 5.0, 5.0], 0.6).unwrap();
        assert!(!decision.accepted);
        assert!(decision.distance > 8.0);
    }

    #[test]
    fn distance_equal_to_threshold_is_accepted() {
        // 3-4-5 triangle keeps the distance exact
        assert!(matches(&[0.0, 0.0], &[3.0, 4.0], 5.0).unwrap());
        assert!(!matches(&[0.0, 0.0], &[3.0, 4.0], 4.999).unwrap());
    }

    #[test]
    fn length_mismatch_is_an_error_not_a_rejection() {
        let err = matches(&[0.1, 0.2, 0.3], &[0.1, 0.2], 0.6).unwrap_err();
        match err {
            FaceAuthError::DescriptorShapeMismatch { expected, found } => {
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn comparison_is_deterministic() {
        let a = vec![0.123, 0.456, 0.789];
        let b = vec![0.321, 0.654, 0.987];
        assert_eq!(evaluate(&a, &b, 0.6).unwrap(), evaluate(&a, &b, 0.6).unwrap());
    }
}
