//! Experiment Record - the persistent, authority-owned entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::PostCompletionPolicy;
use crate::identity::{Pubkey, PUBKEY_BYTES};
use crate::{Error, Result};

/// Length of the account-type discriminator that prefixes stored records.
pub const DISCRIMINATOR_LEN: usize = 8;

/// Lifecycle status of an experiment.
///
/// `Active` is initial, `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExperimentStatus {
    /// Accepting events.
    Active,
    /// Closed by its authority; never reverts.
    Completed,
}

impl ExperimentStatus {
    /// Single-byte encoding used in the account layout.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Active => 0,
            Self::Completed => 1,
        }
    }

    /// Decode the account-layout byte.
    ///
    /// # Errors
    ///
    /// Returns `AccountDidNotDeserialize` for unknown values.
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(Self::Active),
            1 => Ok(Self::Completed),
            other => Err(Error::AccountDidNotDeserialize(format!(
                "unknown experiment status {other}"
            ))),
        }
    }
}

/// Outcome of an accepted `record_event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedEvent {
    /// New `event_count`, which is also the 1-based index of the event.
    pub index: u64,
    /// The experiment was already completed when the event was accepted.
    pub post_completion: bool,
}

/// Experiment Record tracks one experiment's lifecycle and event count.
///
/// One record exists per `(authority, experiment_id)` pair, stored at the
/// address derived from that pair. Only `authority` may mutate it.
///
/// ## Account layout
///
/// ```text
/// [0..8)   discriminator  sha256("account:Experiment")[..8]
/// [8..40)  authority
/// [40..48) experiment_id  u64 LE
/// [48..56) event_count    u64 LE
/// [56]     status         0 = Active, 1 = Completed
/// [57..65) created_at     i64 LE, unix seconds
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    authority: Pubkey,
    experiment_id: u64,
    event_count: u64,
    status: ExperimentStatus,
    created_at: i64,
}

impl Experiment {
    /// Packed size of the record fields.
    pub const INIT_SPACE: usize = PUBKEY_BYTES + 8 + 8 + 1 + 8;

    /// Total account size including the discriminator.
    pub const SPACE: usize = DISCRIMINATOR_LEN + Self::INIT_SPACE;

    /// Create an `Active` record with no events.
    ///
    /// # Arguments
    ///
    /// * `authority` - Creator; the only identity allowed to mutate the record
    /// * `experiment_id` - Caller-chosen id, part of the address derivation
    /// * `created_at` - Ledger time at creation (unix seconds)
    #[must_use]
    pub const fn new(authority: Pubkey, experiment_id: u64, created_at: i64) -> Self {
        Self {
            authority,
            experiment_id,
            event_count: 0,
            status: ExperimentStatus::Active,
            created_at,
        }
    }

    /// Get the authority.
    #[must_use]
    pub const fn authority(&self) -> &Pubkey {
        &self.authority
    }

    /// Get the experiment ID.
    #[must_use]
    pub const fn experiment_id(&self) -> u64 {
        self.experiment_id
    }

    /// Get the number of accepted events.
    #[must_use]
    pub const fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Get the current status.
    #[must_use]
    pub const fn status(&self) -> ExperimentStatus {
        self.status
    }

    /// Whether the experiment still accepts events under the sealing policy.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, ExperimentStatus::Active)
    }

    /// Get the creation timestamp (unix seconds).
    #[must_use]
    pub const fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Get the creation timestamp as a `DateTime`, if representable.
    #[must_use]
    pub fn created_at_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created_at, 0)
    }

    /// Fail with `Unauthorized` unless `signer` is the authority.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` on mismatch.
    pub fn ensure_authority(&self, signer: &Pubkey) -> Result<()> {
        if *signer == self.authority {
            Ok(())
        } else {
            Err(Error::Unauthorized {
                signer: *signer,
                authority: self.authority,
            })
        }
    }

    /// Accept one event, incrementing `event_count`.
    ///
    /// Nothing is modified unless every check passes.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if `signer` is not the authority
    /// - `AlreadyCompleted` if completed and `policy` is `Seal`
    /// - `EventCountOverflow` if the counter is saturated
    pub fn record_event(
        &mut self,
        address: &Pubkey,
        signer: &Pubkey,
        policy: PostCompletionPolicy,
    ) -> Result<RecordedEvent> {
        self.ensure_authority(signer)?;

        let post_completion = !self.is_active();
        if post_completion && policy == PostCompletionPolicy::Seal {
            return Err(Error::AlreadyCompleted(*address));
        }

        let index = self
            .event_count
            .checked_add(1)
            .ok_or(Error::EventCountOverflow(*address))?;
        self.event_count = index;

        Ok(RecordedEvent {
            index,
            post_completion,
        })
    }

    /// Transition `Active` -> `Completed`.
    ///
    /// Not idempotent: completing a completed record fails.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if `signer` is not the authority
    /// - `AlreadyCompleted` if the record is already completed
    pub fn complete(&mut self, address: &Pubkey, signer: &Pubkey) -> Result<()> {
        self.ensure_authority(signer)?;
        if !self.is_active() {
            return Err(Error::AlreadyCompleted(*address));
        }
        self.status = ExperimentStatus::Completed;
        Ok(())
    }

    /// Account-type discriminator, `sha256("account:Experiment")[..8]`.
    #[must_use]
    pub fn discriminator() -> [u8; DISCRIMINATOR_LEN] {
        let digest = Sha256::digest(b"account:Experiment");
        let mut out = [0u8; DISCRIMINATOR_LEN];
        out.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
        out
    }

    /// Encode into the account layout.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(Self::SPACE);
        data.extend_from_slice(&Self::discriminator());
        data.extend_from_slice(self.authority.as_bytes());
        data.extend_from_slice(&self.experiment_id.to_le_bytes());
        data.extend_from_slice(&self.event_count.to_le_bytes());
        data.push(self.status.as_byte());
        data.extend_from_slice(&self.created_at.to_le_bytes());
        data
    }

    /// Decode from the account layout.
    ///
    /// # Errors
    ///
    /// - `AccountDidNotDeserialize` if the data is too short or the status byte is unknown
    /// - `AccountDiscriminatorMismatch` if the data is not an experiment record
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SPACE {
            return Err(Error::AccountDidNotDeserialize(format!(
                "expected {} bytes, got {}",
                Self::SPACE,
                data.len()
            )));
        }
        if data[..DISCRIMINATOR_LEN] != Self::discriminator() {
            return Err(Error::AccountDiscriminatorMismatch);
        }

        let body = &data[DISCRIMINATOR_LEN..];
        let mut authority = [0u8; PUBKEY_BYTES];
        authority.copy_from_slice(&body[..32]);

        Ok(Self {
            authority: Pubkey::new(authority),
            experiment_id: read_u64(&body[32..40]),
            event_count: read_u64(&body[40..48]),
            status: ExperimentStatus::from_byte(body[48])?,
            created_at: i64::from_le_bytes(read_array(&body[49..57])),
        })
    }
}

fn read_array(bytes: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(bytes);
    out
}

fn read_u64(bytes: &[u8]) -> u64 {
    u64::from_le_bytes(read_array(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> Pubkey {
        Pubkey::new([0xaa; 32])
    }

    #[test]
    fn test_experiment_new() {
        let authority = Pubkey::new([1; 32]);
        let record = Experiment::new(authority, 1, 1_700_000_000);
        assert_eq!(record.authority(), &authority);
        assert_eq!(record.experiment_id(), 1);
        assert_eq!(record.event_count(), 0);
        assert_eq!(record.status(), ExperimentStatus::Active);
        assert_eq!(record.created_at(), 1_700_000_000);
    }

    #[test]
    fn test_record_event_increments() {
        let authority = Pubkey::new([1; 32]);
        let mut record = Experiment::new(authority, 1, 1);
        let recorded = record
            .record_event(&address(), &authority, PostCompletionPolicy::Seal)
            .unwrap();
        assert_eq!(recorded.index, 1);
        assert!(!recorded.post_completion);
        assert_eq!(record.event_count(), 1);
    }

    #[test]
    fn test_record_event_unauthorized_leaves_state() {
        let authority = Pubkey::new([1; 32]);
        let mut record = Experiment::new(authority, 1, 1);
        let before = record.clone();
        let err = record
            .record_event(&address(), &Pubkey::new([2; 32]), PostCompletionPolicy::Seal)
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(record, before);
    }

    #[test]
    fn test_complete_not_idempotent() {
        let authority = Pubkey::new([1; 32]);
        let mut record = Experiment::new(authority, 1, 1);
        record.complete(&address(), &authority).unwrap();
        assert_eq!(record.status(), ExperimentStatus::Completed);
        let err = record.complete(&address(), &authority).unwrap_err();
        assert!(err.is_invalid_state());
        assert_eq!(record.status(), ExperimentStatus::Completed);
    }

    #[test]
    fn test_sealed_after_completion() {
        let authority = Pubkey::new([1; 32]);
        let mut record = Experiment::new(authority, 1, 1);
        record.complete(&address(), &authority).unwrap();
        let err = record
            .record_event(&address(), &authority, PostCompletionPolicy::Seal)
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyCompleted(_)));
        assert_eq!(record.event_count(), 0);
    }

    #[test]
    fn test_allow_policy_flags_post_completion() {
        let authority = Pubkey::new([1; 32]);
        let mut record = Experiment::new(authority, 1, 1);
        record.complete(&address(), &authority).unwrap();
        let recorded = record
            .record_event(&address(), &authority, PostCompletionPolicy::Allow)
            .unwrap();
        assert!(recorded.post_completion);
        assert_eq!(record.event_count(), 1);
        assert_eq!(record.status(), ExperimentStatus::Completed);
    }

    #[test]
    fn test_counter_overflow_rejected() {
        let authority = Pubkey::new([1; 32]);
        let mut data = Experiment::new(authority, 1, 1).encode();
        data[48..56].copy_from_slice(&u64::MAX.to_le_bytes());
        let mut record = Experiment::decode(&data).unwrap();
        let err = record
            .record_event(&address(), &authority, PostCompletionPolicy::Seal)
            .unwrap_err();
        assert!(matches!(err, Error::EventCountOverflow(_)));
        assert_eq!(record.event_count(), u64::MAX);
    }

    #[test]
    fn test_layout_size() {
        let record = Experiment::new(Pubkey::new([1; 32]), 9, 5);
        assert_eq!(record.encode().len(), Experiment::SPACE);
        assert_eq!(Experiment::SPACE, 65);
    }

    #[test]
    fn test_decode_rejects_foreign_data() {
        let mut data = Experiment::new(Pubkey::new([1; 32]), 9, 5).encode();
        data[0] ^= 0xff;
        assert!(matches!(
            Experiment::decode(&data),
            Err(Error::AccountDiscriminatorMismatch)
        ));
        assert!(Experiment::decode(&data[..10]).is_err());
    }

    #[test]
    fn test_decode_rejects_unknown_status() {
        let mut data = Experiment::new(Pubkey::new([1; 32]), 9, 5).encode();
        data[56] = 7;
        assert!(matches!(
            Experiment::decode(&data),
            Err(Error::AccountDidNotDeserialize(_))
        ));
    }

    #[test]
    fn test_created_at_datetime() {
        let record = Experiment::new(Pubkey::new([1; 32]), 1, 1_700_000_000);
        assert_eq!(record.created_at_datetime().unwrap().timestamp(), 1_700_000_000);
    }
}
