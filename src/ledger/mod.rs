//! Hosting runtime for the experiment registry
//!
//! The ledger authenticates each request's signer, rejects replays, runs the
//! registry processor atomically against its account store, and keeps a
//! log of confirmed transactions so every emitted event hash can be
//! retrieved later by transaction reference.
//!
//! No transaction-log lock is held while the processor runs. A signature is
//! claimed in a pending set for the duration of its execution, so requests
//! against different records never wait on each other.
//!
//! # Example
//!
//! ```rust
//! use votius_core::experiment::Instruction;
//! use votius_core::identity::Keypair;
//! use votius_core::ledger::{Ledger, Transaction};
//!
//! let ledger = Ledger::builder().build();
//! let authority = Keypair::generate();
//! let address = ledger.experiment_address(&authority.pubkey(), 1)?;
//!
//! let tx = Transaction::new_signed(
//!     Instruction::InitializeExperiment { experiment_id: 1 },
//!     address,
//!     0,
//!     &ledger.program_id(),
//!     &authority,
//! );
//! let signature = ledger.process_transaction(&tx)?;
//!
//! assert_eq!(ledger.fetch_experiment(&address)?.event_count(), 0);
//! assert!(ledger.get_transaction(&signature).is_some());
//! # Ok::<(), votius_core::Error>(())
//! ```

mod clock;
mod store;
mod transaction;

pub use clock::{Clock, FixedClock, Sequencer, Stamp, SystemClock};
pub use store::{Account, AccountStore, MemoryAccountStore};
pub use transaction::{AuditEntry, ConfirmedTransaction, Transaction};

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use rustc_hash::FxBuildHasher;

use crate::address::derive_experiment_address;
use crate::config::{LedgerConfig, PostCompletionPolicy};
use crate::experiment::{process_instruction, Experiment, Instruction, InvocationContext, ProgramEvent};
use crate::identity::{Pubkey, Signature};
use crate::{Error, Result};

/// In-process ledger hosting one registry program.
pub struct Ledger<S: AccountStore = MemoryAccountStore> {
    config: LedgerConfig,
    program_id: Pubkey,
    accounts: S,
    sequencer: Sequencer,
    transactions: DashMap<Signature, ConfirmedTransaction, FxBuildHasher>,
    pending: DashSet<Signature, FxBuildHasher>,
}

impl Ledger<MemoryAccountStore> {
    /// Ledger with default configuration, in-memory storage and the wall clock.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new ledger builder.
    #[must_use]
    pub fn builder() -> LedgerBuilder {
        LedgerBuilder::default()
    }
}

impl Default for Ledger<MemoryAccountStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: AccountStore> Ledger<S> {
    /// Ledger over an existing store.
    #[must_use]
    pub fn with_store(store: S, config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            program_id: config.program_id(),
            config,
            accounts: store,
            sequencer: Sequencer::new(clock),
            transactions: DashMap::with_hasher(FxBuildHasher),
            pending: DashSet::with_hasher(FxBuildHasher),
        }
    }

    /// Registry program identity.
    #[must_use]
    pub const fn program_id(&self) -> Pubkey {
        self.program_id
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Post-completion append policy in force.
    #[must_use]
    pub const fn post_completion(&self) -> PostCompletionPolicy {
        self.config.post_completion
    }

    /// Underlying account store.
    #[must_use]
    pub const fn accounts(&self) -> &S {
        &self.accounts
    }

    /// Derived address of `authority`'s experiment `experiment_id`.
    ///
    /// # Errors
    ///
    /// Returns `NoViableBump` if derivation fails.
    pub fn experiment_address(&self, authority: &Pubkey, experiment_id: u64) -> Result<Pubkey> {
        derive_experiment_address(authority, experiment_id, &self.program_id).map(|(a, _)| a)
    }

    /// Authenticate and execute one transaction.
    ///
    /// Either the whole request applies and is logged, or nothing changes.
    ///
    /// # Errors
    ///
    /// - `InvalidSignature` if the signature does not verify for the signer
    /// - `DuplicateTransaction` if this signature was already confirmed or is
    ///   still executing
    /// - any registry error (`Unauthorized`, `AlreadyCompleted`, `AlreadyExists`, ...)
    pub fn process_transaction(&self, tx: &Transaction) -> Result<Signature> {
        let signature = *tx.signature();
        if !tx.verify(&self.program_id) {
            tracing::warn!(signer = %tx.signer(), "rejected transaction with invalid signature");
            return Err(Error::InvalidSignature(*tx.signer()));
        }

        // Claim before checking the log: a copy that confirms concurrently
        // inserts into the log before releasing its claim.
        if !self.pending.insert(signature) {
            tracing::warn!(%signature, "rejected replayed transaction");
            return Err(Error::DuplicateTransaction(signature.to_string()));
        }
        let result = self.execute(tx, signature);
        self.pending.remove(&signature);
        result
    }

    fn execute(&self, tx: &Transaction, signature: Signature) -> Result<Signature> {
        if self.transactions.contains_key(&signature) {
            tracing::warn!(%signature, "rejected replayed transaction");
            return Err(Error::DuplicateTransaction(signature.to_string()));
        }

        let ctx = InvocationContext {
            program_id: &self.program_id,
            signer: tx.signer(),
            experiment: tx.experiment(),
            sequencer: &self.sequencer,
            policy: self.config.post_completion,
        };
        let outcome = process_instruction(&self.accounts, &ctx, tx.instruction()).map_err(|e| {
            tracing::warn!(
                instruction = tx.instruction().name(),
                experiment = %tx.experiment(),
                signer = %tx.signer(),
                error = %e,
                "transaction failed"
            );
            e
        })?;

        let log_messages = self.log_messages(tx.instruction(), &outcome.events)?;
        let slot = outcome.stamp.slot;
        self.transactions.insert(
            signature,
            ConfirmedTransaction {
                signature,
                slot,
                block_time: outcome.stamp.unix_timestamp,
                signer: *tx.signer(),
                experiment: *tx.experiment(),
                instruction: *tx.instruction(),
                log_messages,
                events: outcome.events,
            },
        );

        tracing::debug!(
            %signature,
            slot,
            instruction = tx.instruction().name(),
            "transaction confirmed"
        );
        Ok(signature)
    }

    fn log_messages(
        &self,
        instruction: &Instruction,
        events: &[ProgramEvent],
    ) -> Result<Vec<String>> {
        let mut logs = Vec::with_capacity(events.len() + 3);
        logs.push(format!("Program {} invoke [1]", self.program_id));
        logs.push(format!("Program log: Instruction: {}", instruction.name()));
        for event in events {
            logs.push(format!("Program data: {}", serde_json::to_string(event)?));
        }
        logs.push(format!("Program {} success", self.program_id));
        Ok(logs)
    }

    /// Raw account at `address`.
    #[must_use]
    pub fn get_account(&self, address: &Pubkey) -> Option<Account> {
        self.accounts.get(address)
    }

    /// Fetch and decode the experiment at `address`.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound` if nothing is stored there
    /// - `AccountOwnedByWrongProgram` if another program owns it
    /// - decode errors for non-experiment data
    pub fn fetch_experiment(&self, address: &Pubkey) -> Result<Experiment> {
        let account = self
            .accounts
            .get(address)
            .ok_or(Error::AccountNotFound(*address))?;
        if account.owner != self.program_id {
            return Err(Error::AccountOwnedByWrongProgram {
                address: *address,
                owner: account.owner,
            });
        }
        Experiment::decode(&account.data)
    }

    /// Confirmed transaction by reference.
    #[must_use]
    pub fn get_transaction(&self, signature: &Signature) -> Option<ConfirmedTransaction> {
        self.transactions.get(signature).map(|tx| tx.value().clone())
    }

    /// Number of confirmed transactions.
    #[must_use]
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Every accepted event for the experiment at `address`, in index order.
    ///
    /// Once in-flight requests settle, the length equals the record's
    /// `event_count`.
    #[must_use]
    pub fn audit_trail(&self, address: &Pubkey) -> Vec<AuditEntry> {
        let mut entries: Vec<AuditEntry> = self
            .transactions
            .iter()
            .flat_map(|tx| {
                tx.experiment_events()
                    .filter(|event| event.experiment == *address)
                    .map(|event| AuditEntry {
                        signature: tx.signature,
                        slot: tx.slot,
                        event: *event,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        entries.sort_by_key(|entry| entry.event.index);
        entries
    }
}

/// Ledger builder
#[derive(Default)]
pub struct LedgerBuilder {
    config: LedgerConfig,
    clock: Option<Arc<dyn Clock>>,
    capacity: Option<usize>,
}

impl LedgerBuilder {
    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the registry program id.
    #[must_use]
    pub fn program_id(mut self, program_id: Pubkey) -> Self {
        self.config.program_id = Some(program_id);
        self
    }

    /// Set the post-completion append policy.
    #[must_use]
    pub fn post_completion(mut self, policy: PostCompletionPolicy) -> Self {
        self.config.post_completion = policy;
        self
    }

    /// Use a custom time source.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Pre-allocate room for `capacity` accounts.
    #[must_use]
    pub const fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Build an in-memory ledger.
    #[must_use]
    pub fn build(self) -> Ledger<MemoryAccountStore> {
        let store = self
            .capacity
            .map_or_else(MemoryAccountStore::new, MemoryAccountStore::with_capacity);
        self.build_with_store(store)
    }

    /// Build a ledger over `store`.
    #[must_use]
    pub fn build_with_store<S: AccountStore>(self, store: S) -> Ledger<S> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        tracing::debug!(
            program_id = %self.config.program_id(),
            policy = ?self.config.post_completion,
            "ledger initialized"
        );
        Ledger::with_store(store, self.config, clock)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{OnceLock, Weak};

    use super::*;
    use crate::identity::Keypair;

    /// Clock that submits `nested` once, from inside the first stamp it
    /// hands out, and keeps the result.
    #[derive(Default)]
    struct NestingClock {
        nested: OnceLock<(Weak<Ledger>, Transaction)>,
        fired: AtomicBool,
        outcome: OnceLock<Result<Signature>>,
    }

    impl Clock for NestingClock {
        fn unix_timestamp(&self) -> i64 {
            if let Some((ledger, tx)) = self.nested.get() {
                if !self.fired.swap(true, Ordering::SeqCst) {
                    if let Some(ledger) = ledger.upgrade() {
                        let _ = self.outcome.set(ledger.process_transaction(tx));
                    }
                }
            }
            1
        }
    }

    fn nesting_ledger() -> (Arc<NestingClock>, Arc<Ledger>) {
        let clock = Arc::new(NestingClock::default());
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let ledger = Arc::new(Ledger::builder().clock(dyn_clock).build());
        (clock, ledger)
    }

    fn init_tx(ledger: &Ledger, keypair: &Keypair, id: u64, nonce: u64) -> Transaction {
        let address = ledger.experiment_address(&keypair.pubkey(), id).unwrap();
        Transaction::new_signed(
            Instruction::InitializeExperiment { experiment_id: id },
            address,
            nonce,
            &ledger.program_id(),
            keypair,
        )
    }

    #[test]
    fn test_builder_defaults() {
        let ledger = Ledger::builder().build();
        assert_eq!(ledger.post_completion(), PostCompletionPolicy::Seal);
        assert_eq!(ledger.program_id(), crate::config::DEFAULT_PROGRAM_ID);
        assert_eq!(ledger.transaction_count(), 0);
    }

    #[test]
    fn test_builder_program_id() {
        let program = Pubkey::new([3; 32]);
        let ledger = Ledger::builder().program_id(program).capacity(16).build();
        assert_eq!(ledger.program_id(), program);
    }

    #[test]
    fn test_created_at_from_clock() {
        let clock = Arc::new(FixedClock::new(1_700_000_000));
        let ledger = Ledger::builder().clock(clock).build();
        let keypair = Keypair::generate();
        let tx = init_tx(&ledger, &keypair, 1, 0);
        ledger.process_transaction(&tx).unwrap();
        let record = ledger.fetch_experiment(tx.experiment()).unwrap();
        assert_eq!(record.created_at(), 1_700_000_000);
    }

    #[test]
    fn test_replay_rejected() {
        let ledger = Ledger::new();
        let keypair = Keypair::generate();
        let tx = init_tx(&ledger, &keypair, 1, 0);
        ledger.process_transaction(&tx).unwrap();
        let err = ledger.process_transaction(&tx).unwrap_err();
        assert!(matches!(err, Error::DuplicateTransaction(_)));
        assert_eq!(ledger.transaction_count(), 1);
    }

    #[test]
    fn test_failed_transaction_not_logged() {
        let ledger = Ledger::new();
        let keypair = Keypair::generate();
        ledger.process_transaction(&init_tx(&ledger, &keypair, 1, 0)).unwrap();
        let err = ledger
            .process_transaction(&init_tx(&ledger, &keypair, 1, 1))
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert_eq!(ledger.transaction_count(), 1);
    }

    #[test]
    fn test_log_messages_shape() {
        let ledger = Ledger::new();
        let keypair = Keypair::generate();
        let sig = ledger.process_transaction(&init_tx(&ledger, &keypair, 1, 0)).unwrap();
        let confirmed = ledger.get_transaction(&sig).unwrap();
        assert_eq!(confirmed.slot, 0);
        assert_eq!(
            confirmed.log_messages[1],
            "Program log: Instruction: InitializeExperiment"
        );
        assert!(confirmed.log_messages.last().unwrap().ends_with("success"));
    }

    #[test]
    fn test_in_flight_copy_rejected() {
        let (clock, ledger) = nesting_ledger();
        let keypair = Keypair::generate();
        let tx = init_tx(&ledger, &keypair, 1, 0);
        assert!(clock.nested.set((Arc::downgrade(&ledger), tx.clone())).is_ok());

        ledger.process_transaction(&tx).unwrap();

        assert!(matches!(
            clock.outcome.get(),
            Some(Err(Error::DuplicateTransaction(_)))
        ));
        assert_eq!(ledger.transaction_count(), 1);
        assert!(ledger.pending.is_empty());
    }

    #[test]
    fn test_other_transaction_runs_while_one_executes() {
        let (clock, ledger) = nesting_ledger();
        let keypair = Keypair::generate();
        let outer = init_tx(&ledger, &keypair, 1, 0);
        let inner = init_tx(&ledger, &keypair, 2, 1);
        assert!(clock.nested.set((Arc::downgrade(&ledger), inner.clone())).is_ok());

        ledger.process_transaction(&outer).unwrap();

        assert!(matches!(clock.outcome.get(), Some(Ok(sig)) if sig == inner.signature()));
        assert_eq!(ledger.transaction_count(), 2);
        let outer_slot = ledger.get_transaction(outer.signature()).unwrap().slot;
        let inner_slot = ledger.get_transaction(inner.signature()).unwrap().slot;
        assert_eq!((outer_slot, inner_slot), (0, 1));
    }

    #[test]
    fn test_log_data_lines_are_json_events() {
        let ledger = Ledger::new();
        let keypair = Keypair::generate();
        let tx = init_tx(&ledger, &keypair, 1, 0);
        ledger.process_transaction(&tx).unwrap();
        let record = Transaction::new_signed(
            Instruction::RecordEvent { event_hash: [4; 32] },
            *tx.experiment(),
            1,
            &ledger.program_id(),
            &keypair,
        );
        let sig = ledger.process_transaction(&record).unwrap();
        let confirmed = ledger.get_transaction(&sig).unwrap();

        let data: Vec<ProgramEvent> = confirmed
            .log_messages
            .iter()
            .filter_map(|line| line.strip_prefix("Program data: "))
            .map(|json| serde_json::from_str(json).unwrap())
            .collect();
        assert_eq!(data, confirmed.events);
        assert!(confirmed.log_messages[2].contains(r#""name":"ExperimentEvent""#));
    }

    #[test]
    fn test_fetch_missing() {
        let ledger = Ledger::new();
        let err = ledger.fetch_experiment(&Pubkey::new([1; 32])).unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(_)));
    }
}
