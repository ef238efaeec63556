//! Client for the experiment registry.
//!
//! Wraps a signing identity and a ledger handle; builds, signs and submits
//! requests, and reads records back. Retries, if wanted, belong to the
//! caller: every failure is final for the request that produced it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::experiment::{Experiment, Instruction};
use crate::identity::{Keypair, Pubkey, Signature};
use crate::ledger::{AccountStore, AuditEntry, ConfirmedTransaction, Ledger, MemoryAccountStore, Transaction};
use crate::Result;

/// Signs and submits registry requests on behalf of one identity.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use votius_core::client::ExperimentClient;
/// use votius_core::experiment::ExperimentStatus;
/// use votius_core::identity::Keypair;
/// use votius_core::ledger::Ledger;
///
/// let ledger = Arc::new(Ledger::new());
/// let client = ExperimentClient::new(Arc::clone(&ledger), Keypair::generate());
///
/// let address = client.experiment_address(1)?;
/// client.initialize_experiment(1)?;
/// client.record_event(&address, [1u8; 32])?;
/// client.complete_experiment(&address)?;
///
/// let experiment = client.fetch_experiment(&address)?;
/// assert_eq!(experiment.event_count(), 1);
/// assert_eq!(experiment.status(), ExperimentStatus::Completed);
/// # Ok::<(), votius_core::Error>(())
/// ```
pub struct ExperimentClient<S: AccountStore = MemoryAccountStore> {
    ledger: Arc<Ledger<S>>,
    keypair: Keypair,
    nonce: AtomicU64,
}

impl<S: AccountStore> ExperimentClient<S> {
    /// Client for `keypair` against `ledger`.
    #[must_use]
    pub fn new(ledger: Arc<Ledger<S>>, keypair: Keypair) -> Self {
        Self {
            ledger,
            keypair,
            nonce: AtomicU64::new(rand::random()),
        }
    }

    /// Identity this client signs as.
    #[must_use]
    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// Ledger handle.
    #[must_use]
    pub const fn ledger(&self) -> &Arc<Ledger<S>> {
        &self.ledger
    }

    /// Address of this client's experiment `experiment_id`.
    ///
    /// # Errors
    ///
    /// Returns `NoViableBump` if derivation fails.
    pub fn experiment_address(&self, experiment_id: u64) -> Result<Pubkey> {
        self.ledger.experiment_address(&self.pubkey(), experiment_id)
    }

    /// Create experiment `experiment_id` owned by this client.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if this identity already created that id.
    pub fn initialize_experiment(&self, experiment_id: u64) -> Result<Signature> {
        let address = self.experiment_address(experiment_id)?;
        self.send(Instruction::InitializeExperiment { experiment_id }, address)
    }

    /// Append an event digest to the experiment at `address`.
    ///
    /// # Errors
    ///
    /// `Unauthorized` if this client is not the authority; `AlreadyCompleted`
    /// if the experiment is completed and the ledger seals completed logs.
    pub fn record_event(&self, address: &Pubkey, event_hash: [u8; 32]) -> Result<Signature> {
        self.send(Instruction::RecordEvent { event_hash }, *address)
    }

    /// Complete the experiment at `address`.
    ///
    /// # Errors
    ///
    /// `Unauthorized` if this client is not the authority; `AlreadyCompleted`
    /// on a second call.
    pub fn complete_experiment(&self, address: &Pubkey) -> Result<Signature> {
        self.send(Instruction::CompleteExperiment, *address)
    }

    /// Sign and submit an arbitrary instruction against `address`.
    ///
    /// # Errors
    ///
    /// Whatever the ledger rejects the transaction with.
    pub fn send(&self, instruction: Instruction, address: Pubkey) -> Result<Signature> {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        let tx = Transaction::new_signed(
            instruction,
            address,
            nonce,
            &self.ledger.program_id(),
            &self.keypair,
        );
        self.ledger.process_transaction(&tx)
    }

    /// Fetch and decode the experiment at `address`.
    ///
    /// # Errors
    ///
    /// `AccountNotFound` if there is no record there.
    pub fn fetch_experiment(&self, address: &Pubkey) -> Result<Experiment> {
        self.ledger.fetch_experiment(address)
    }

    /// Look up a confirmed transaction.
    #[must_use]
    pub fn get_transaction(&self, signature: &Signature) -> Option<ConfirmedTransaction> {
        self.ledger.get_transaction(signature)
    }

    /// Audit trail of the experiment at `address`.
    #[must_use]
    pub fn audit_trail(&self, address: &Pubkey) -> Vec<AuditEntry> {
        self.ledger.audit_trail(address)
    }
}
