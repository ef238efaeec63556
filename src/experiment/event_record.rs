//! Event Records - audit-trail entries emitted by the registry
//!
//! Event hashes live only here, never in the experiment account. The
//! account keeps the running count; the transaction log keeps the hashes.

use serde::{Deserialize, Serialize};

use crate::identity::Pubkey;

/// Emitted once per accepted `record_event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentEvent {
    /// Address of the experiment record.
    pub experiment: Pubkey,
    /// `event_count` after this event (1-based).
    pub index: u64,
    /// Caller-supplied content digest, stored exactly as given.
    #[serde(with = "hex::serde")]
    pub hash: [u8; 32],
    /// Ledger time of acceptance (unix seconds).
    pub timestamp: i64,
    /// Accepted after the experiment was completed.
    pub post_completion: bool,
}

/// Emitted when an experiment transitions to `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentCompletedEvent {
    /// Address of the experiment record.
    pub experiment: Pubkey,
    /// Ledger time of completion (unix seconds).
    pub timestamp: i64,
}

/// Any event the registry emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum ProgramEvent {
    /// An event hash was recorded.
    #[serde(rename = "ExperimentEvent")]
    Recorded(ExperimentEvent),
    /// The experiment was completed.
    #[serde(rename = "ExperimentCompletedEvent")]
    Completed(ExperimentCompletedEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_tagged_by_name() {
        let event = ProgramEvent::Completed(ExperimentCompletedEvent {
            experiment: Pubkey::new([2; 32]),
            timestamp: 10,
        });
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["name"], "ExperimentCompletedEvent");
        assert_eq!(json["timestamp"], 10);
    }
}
