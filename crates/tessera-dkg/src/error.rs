//! Error types for DKG operations

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::staging::Round;
use crate::ParticipantId;

/// Result type for DKG operations
pub type Result<T> = std::result::Result<T, DkgError>;

/// Which check a sender failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Schnorr proof of knowledge of `a_0` did not verify
    Proof,
    /// Share did not match the sender's commitments
    Share,
    /// Commitment vector could not be decoded or had the wrong length
    Commitment,
}

/// A failed check, as seen by one verifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerificationFailure {
    pub verifier: ParticipantId,
    pub sender: ParticipantId,
    pub kind: FailureKind,
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "party {} rejected {:?} from party {}",
            self.verifier, self.kind, self.sender
        )
    }
}

fn list_failures(failures: &[VerificationFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur during a DKG run
#[derive(Debug, Error)]
pub enum DkgError {
    /// Invalid number of participants
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Invalid threshold
    #[error("Invalid threshold: {threshold} must be >= 1 and < {participants}")]
    InvalidThreshold {
        threshold: usize,
        participants: usize,
    },

    /// Operation not valid in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// One or more proofs or shares failed verification
    #[error("Verification failed: {}", list_failures(.0))]
    VerificationFailed(Vec<VerificationFailure>),

    /// A round barrier did not complete in time
    #[error("Barrier timeout in {round} round, missing parties {missing:?}")]
    BarrierTimeout {
        round: Round,
        missing: Vec<ParticipantId>,
    },

    /// The run was cancelled while a party was waiting
    #[error("DKG run cancelled")]
    Cancelled,

    /// Parties derived different group keys
    #[error("Party {participant} derived a different group key")]
    InconsistentGroupKey { participant: ParticipantId },

    /// Threshold signing failed
    #[error("Signing failed: {0}")]
    Signing(String),

    /// A party task panicked or was aborted
    #[error("Party task failed: {0}")]
    Task(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Field or curve error
    #[error("Core error: {0}")]
    Core(#[from] tessera_core::CoreError),
}

impl From<tokio::task::JoinError> for DkgError {
    fn from(e: tokio::task::JoinError) -> Self {
        DkgError::Task(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_failed_lists_every_failure() {
        let err = DkgError::VerificationFailed(vec![
            VerificationFailure {
                verifier: 1,
                sender: 3,
                kind: FailureKind::Proof,
            },
            VerificationFailure {
                verifier: 2,
                sender: 3,
                kind: FailureKind::Share,
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("party 1 rejected Proof from party 3"));
        assert!(msg.contains("party 2 rejected Share from party 3"));
    }

    #[test]
    fn test_barrier_timeout_message() {
        let err = DkgError::BarrierTimeout {
            round: Round::Shares,
            missing: vec![2, 4],
        };
        assert_eq!(
            err.to_string(),
            "Barrier timeout in shares round, missing parties [2, 4]"
        );
    }
}
