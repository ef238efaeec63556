//! Signed requests and their confirmed results.

use serde::{Deserialize, Serialize};

use crate::experiment::{ExperimentEvent, Instruction, ProgramEvent};
use crate::identity::{Keypair, Pubkey, Signature};

/// A signed registry request.
///
/// The signature covers the program id, the instruction bytes, the target
/// address, the signer and a client nonce; it is also the transaction's
/// reference for later lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    instruction: Instruction,
    experiment: Pubkey,
    signer: Pubkey,
    nonce: u64,
    signature: Signature,
}

impl Transaction {
    /// Build and sign a request with `keypair`.
    #[must_use]
    pub fn new_signed(
        instruction: Instruction,
        experiment: Pubkey,
        nonce: u64,
        program_id: &Pubkey,
        keypair: &Keypair,
    ) -> Self {
        let signer = keypair.pubkey();
        let message = Self::message(program_id, &instruction, &experiment, &signer, nonce);
        Self {
            instruction,
            experiment,
            signer,
            nonce,
            signature: keypair.sign(&message),
        }
    }

    /// Assemble a request from parts without signing (e.g. relayed requests).
    #[must_use]
    pub const fn from_parts(
        instruction: Instruction,
        experiment: Pubkey,
        signer: Pubkey,
        nonce: u64,
        signature: Signature,
    ) -> Self {
        Self {
            instruction,
            experiment,
            signer,
            nonce,
            signature,
        }
    }

    /// Canonical signed message.
    #[must_use]
    pub fn message(
        program_id: &Pubkey,
        instruction: &Instruction,
        experiment: &Pubkey,
        signer: &Pubkey,
        nonce: u64,
    ) -> Vec<u8> {
        let data = instruction.data();
        let mut message = Vec::with_capacity(32 * 3 + 8 + data.len());
        message.extend_from_slice(program_id.as_bytes());
        message.extend_from_slice(experiment.as_bytes());
        message.extend_from_slice(signer.as_bytes());
        message.extend_from_slice(&nonce.to_le_bytes());
        message.extend_from_slice(&data);
        message
    }

    /// Whether the signature is valid for `signer` under `program_id`.
    #[must_use]
    pub fn verify(&self, program_id: &Pubkey) -> bool {
        let message = Self::message(
            program_id,
            &self.instruction,
            &self.experiment,
            &self.signer,
            self.nonce,
        );
        self.signature.verify(&self.signer, &message)
    }

    /// Get the instruction.
    #[must_use]
    pub const fn instruction(&self) -> &Instruction {
        &self.instruction
    }

    /// Get the target experiment address.
    #[must_use]
    pub const fn experiment(&self) -> &Pubkey {
        &self.experiment
    }

    /// Get the claimed signer.
    #[must_use]
    pub const fn signer(&self) -> &Pubkey {
        &self.signer
    }

    /// Get the client nonce.
    #[must_use]
    pub const fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Get the signature (transaction reference).
    #[must_use]
    pub const fn signature(&self) -> &Signature {
        &self.signature
    }
}

/// A transaction the ledger accepted, with everything it emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedTransaction {
    /// Transaction reference.
    pub signature: Signature,
    /// Position in the ledger's total order of accepted transactions.
    ///
    /// Drawn while the target record is locked, so along one record slots
    /// increase with event index. Values may be skipped.
    pub slot: u64,
    /// Ledger time at execution.
    pub block_time: i64,
    /// Authenticated signer.
    pub signer: Pubkey,
    /// Target experiment address.
    pub experiment: Pubkey,
    /// Executed instruction.
    pub instruction: Instruction,
    /// Human-readable program log.
    pub log_messages: Vec<String>,
    /// Structured events.
    pub events: Vec<ProgramEvent>,
}

impl ConfirmedTransaction {
    /// Recorded-event entries carried by this transaction.
    pub fn experiment_events(&self) -> impl Iterator<Item = &ExperimentEvent> {
        self.events.iter().filter_map(|event| match event {
            ProgramEvent::Recorded(e) => Some(e),
            ProgramEvent::Completed(_) => None,
        })
    }
}

/// One retrievable audit-trail entry: an accepted event plus the
/// transaction that carried it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Transaction reference.
    pub signature: Signature,
    /// Slot of the carrying transaction.
    pub slot: u64,
    /// The emitted event.
    pub event: ExperimentEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_transaction_verifies() {
        let keypair = Keypair::generate();
        let program = Pubkey::new([1; 32]);
        let tx = Transaction::new_signed(
            Instruction::CompleteExperiment,
            Pubkey::new([2; 32]),
            0,
            &program,
            &keypair,
        );
        assert!(tx.verify(&program));
        assert!(!tx.verify(&Pubkey::new([3; 32])));
    }

    #[test]
    fn test_forged_signer_fails() {
        let attacker = Keypair::generate();
        let victim = Keypair::generate().pubkey();
        let program = Pubkey::new([1; 32]);
        let experiment = Pubkey::new([2; 32]);
        let instruction = Instruction::CompleteExperiment;
        let message = Transaction::message(&program, &instruction, &experiment, &victim, 0);
        let forged = Transaction::from_parts(
            instruction,
            experiment,
            victim,
            0,
            attacker.sign(&message),
        );
        assert!(!forged.verify(&program));
    }

    #[test]
    fn test_nonce_changes_signature() {
        let keypair = Keypair::from_seed(&[4; 32]);
        let program = Pubkey::new([1; 32]);
        let a = Transaction::new_signed(
            Instruction::CompleteExperiment,
            Pubkey::new([2; 32]),
            0,
            &program,
            &keypair,
        );
        let b = Transaction::new_signed(
            Instruction::CompleteExperiment,
            Pubkey::new([2; 32]),
            1,
            &program,
            &keypair,
        );
        assert_ne!(a.signature(), b.signature());
    }
}
