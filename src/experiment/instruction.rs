//! Registry instructions (request shapes, not wire bytes)

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One registry operation. The signer and target record travel alongside
/// in the [`crate::ledger::Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Create the record at `derive(signer, experiment_id)`.
    InitializeExperiment {
        /// Caller-chosen experiment id.
        experiment_id: u64,
    },
    /// Append one event to an active record.
    RecordEvent {
        /// Opaque 32-byte content digest; never interpreted or re-hashed.
        #[serde(with = "hex::serde")]
        event_hash: [u8; 32],
    },
    /// Close the record.
    CompleteExperiment,
}

impl Instruction {
    /// Instruction name as it appears in transaction logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InitializeExperiment { .. } => "InitializeExperiment",
            Self::RecordEvent { .. } => "RecordEvent",
            Self::CompleteExperiment => "CompleteExperiment",
        }
    }

    const fn method(&self) -> &'static str {
        match self {
            Self::InitializeExperiment { .. } => "initialize_experiment",
            Self::RecordEvent { .. } => "record_event",
            Self::CompleteExperiment => "complete_experiment",
        }
    }

    /// Canonical bytes: `sha256("global:<method>")[..8]` followed by the
    /// little-endian arguments. Signed as part of every transaction.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        let digest = Sha256::digest(format!("global:{}", self.method()).as_bytes());
        let mut data = digest[..8].to_vec();
        match self {
            Self::InitializeExperiment { experiment_id } => {
                data.extend_from_slice(&experiment_id.to_le_bytes());
            }
            Self::RecordEvent { event_hash } => data.extend_from_slice(event_hash),
            Self::CompleteExperiment => {}
        }
        data
    }
}
