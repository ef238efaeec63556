//! Program-derived addresses
//!
//! An experiment lives at an address computed from its creator and id, so
//! anyone can locate it without an index:
//!
//! ```text
//! address = sha256(authority || experiment_id.to_le_bytes() || [bump] || program_id || "ProgramDerivedAddress")
//! ```
//!
//! `bump` is searched from 255 downward until the hash is not a valid
//! ed25519 point. The surviving bump is the derivation proof: it lets a
//! verifier recompute the address in one hash, and the off-curve property
//! means no keypair can ever sign as the record.
//!
//! The 8-byte little-endian id encoding is a compatibility contract with
//! indexing clients and must not change.

use sha2::{Digest, Sha256};

use crate::identity::Pubkey;
use crate::{Error, Result};

/// Maximum length of a single seed.
pub const MAX_SEED_LEN: usize = 32;

/// Maximum number of seeds (the bump is appended as one more).
pub const MAX_SEEDS: usize = 16;

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Recompute a derived address from seeds and a known bump.
///
/// # Errors
///
/// - `MaxSeedLengthExceeded` if there are too many seeds or one is too long
/// - `InvalidSeeds` if the resulting hash lies on the ed25519 curve
pub fn create_program_address(seeds: &[&[u8]], bump: u8, program_id: &Pubkey) -> Result<Pubkey> {
    if seeds.len() >= MAX_SEEDS {
        return Err(Error::MaxSeedLengthExceeded(format!(
            "{} seeds, at most {} allowed",
            seeds.len(),
            MAX_SEEDS - 1
        )));
    }
    if let Some(seed) = seeds.iter().find(|s| s.len() > MAX_SEED_LEN) {
        return Err(Error::MaxSeedLengthExceeded(format!(
            "seed of {} bytes, at most {MAX_SEED_LEN} allowed",
            seed.len()
        )));
    }

    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update([bump]);
    hasher.update(program_id.as_bytes());
    hasher.update(PDA_MARKER);
    let address = Pubkey::new(hasher.finalize().into());

    if address.is_on_curve() {
        return Err(Error::InvalidSeeds);
    }
    Ok(address)
}

/// Find the off-curve address for `seeds`, returning it with its bump.
///
/// # Errors
///
/// - `MaxSeedLengthExceeded` for malformed seeds
/// - `NoViableBump` if all 256 bumps land on the curve
pub fn find_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Result<(Pubkey, u8)> {
    for bump in (0..=u8::MAX).rev() {
        match create_program_address(seeds, bump, program_id) {
            Ok(address) => return Ok((address, bump)),
            Err(Error::InvalidSeeds) => {}
            Err(e) => return Err(e),
        }
    }
    Err(Error::NoViableBump)
}

/// Seeds addressing the experiment `experiment_id` created by `authority`.
#[must_use]
pub fn experiment_seeds(authority: &Pubkey, experiment_id: u64) -> ([u8; 32], [u8; 8]) {
    (authority.to_bytes(), experiment_id.to_le_bytes())
}

/// Derive the storage address of an experiment.
///
/// # Errors
///
/// Returns `NoViableBump` in the (practically impossible) case that no bump
/// yields an off-curve address.
pub fn derive_experiment_address(
    authority: &Pubkey,
    experiment_id: u64,
    program_id: &Pubkey,
) -> Result<(Pubkey, u8)> {
    let (authority_seed, id_seed) = experiment_seeds(authority, experiment_id);
    find_program_address(&[&authority_seed[..], &id_seed[..]], program_id)
}
