//! Error types for votius-core
//!
//! Every message starts with the condition name (`Unauthorized`,
//! `InvalidState`, `AlreadyExists`, ...). Clients match on these substrings,
//! so the prefixes are part of the public contract.

use thiserror::Error;

use crate::identity::Pubkey;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// First code assigned to registry-level (custom program) errors.
pub const CUSTOM_ERROR_OFFSET: u32 = 6000;

/// votius-core error types
#[derive(Error, Debug)]
pub enum Error {
    /// Signer is not the experiment authority
    #[error("Unauthorized: signer {signer} is not the authority {authority} of this experiment")]
    Unauthorized {
        /// Identity that signed the request
        signer: Pubkey,
        /// Identity recorded as the experiment authority
        authority: Pubkey,
    },

    /// Operation attempted against a completed experiment
    #[error("InvalidState: experiment {0} already completed")]
    AlreadyCompleted(Pubkey),

    /// Event counter would wrap
    #[error("InvalidState: event count overflow on experiment {0}")]
    EventCountOverflow(Pubkey),

    /// Storage allocation targeted an address that already holds an account
    #[error("AlreadyExists: account {0} already in use")]
    AlreadyExists(Pubkey),

    /// No account at the requested address
    #[error("AccountNotFound: no account at {0}")]
    AccountNotFound(Pubkey),

    /// Account is owned by another program
    #[error("AccountOwnedByWrongProgram: account {address} is owned by {owner}")]
    AccountOwnedByWrongProgram {
        /// Account address
        address: Pubkey,
        /// Actual owner
        owner: Pubkey,
    },

    /// Account data does not start with the experiment discriminator
    #[error("AccountDiscriminatorMismatch: account data is not an experiment record")]
    AccountDiscriminatorMismatch,

    /// Account data could not be decoded
    #[error("AccountDidNotDeserialize: {0}")]
    AccountDidNotDeserialize(String),

    /// Supplied experiment address is not the one derived from the signer and id
    #[error("ConstraintSeeds: expected address {expected}, got {actual}")]
    AddressMismatch {
        /// Derived address
        expected: Pubkey,
        /// Address supplied by the caller
        actual: Pubkey,
    },

    /// Derivation produced a point on the ed25519 curve
    #[error("InvalidSeeds: derived address lies on the ed25519 curve")]
    InvalidSeeds,

    /// Too many seeds or a seed longer than `MAX_SEED_LEN`
    #[error("MaxSeedLengthExceeded: {0}")]
    MaxSeedLengthExceeded(String),

    /// No bump seed produced an off-curve address
    #[error("NoViableBump: unable to find a viable program address bump seed")]
    NoViableBump,

    /// Transaction signature did not verify against the signer
    #[error("InvalidSignature: transaction signature does not match signer {0}")]
    InvalidSignature(Pubkey),

    /// Transaction with this signature was already processed
    #[error("DuplicateTransaction: transaction {0} already processed")]
    DuplicateTransaction(String),

    /// String is not a hex-encoded 32-byte key
    #[error("InvalidPubkey: {0}")]
    InvalidPubkey(String),

    /// String is not a hex-encoded 64-byte signature
    #[error("InvalidSignature: malformed signature {0}")]
    InvalidSignatureEncoding(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Numeric code for the condition.
    ///
    /// Registry errors use `CUSTOM_ERROR_OFFSET + n`; runtime errors keep
    /// codes below 6000.
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::Unauthorized { .. } => CUSTOM_ERROR_OFFSET,
            Self::AlreadyCompleted(_) => CUSTOM_ERROR_OFFSET + 1,
            Self::EventCountOverflow(_) => CUSTOM_ERROR_OFFSET + 2,
            Self::AddressMismatch { .. } => 2006,
            Self::AccountDiscriminatorMismatch => 3002,
            Self::AccountDidNotDeserialize(_) => 3003,
            Self::AccountOwnedByWrongProgram { .. } => 3007,
            Self::AccountNotFound(_) => 3012,
            Self::AlreadyExists(_) => 0,
            Self::InvalidSeeds
            | Self::MaxSeedLengthExceeded(_)
            | Self::NoViableBump => 1,
            Self::InvalidSignature(_) | Self::DuplicateTransaction(_) => 2,
            Self::InvalidPubkey(_)
            | Self::InvalidSignatureEncoding(_)
            | Self::Json(_)
            | Self::Io(_) => 3,
        }
    }

    /// Whether this is an authorization failure.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Whether the operation was rejected because of the record's status.
    #[must_use]
    pub const fn is_invalid_state(&self) -> bool {
        matches!(self, Self::AlreadyCompleted(_) | Self::EventCountOverflow(_))
    }
}
