//! # Votius Core: Ledger-Resident Experiment Registry
//!
//! **Version**: 0.1.0
//!
//! Votius Core tracks caller-defined experiments on an append-only ledger.
//! Only an experiment's creator may append events to it or close it, and
//! every accepted event's content hash is emitted into a retrievable
//! transaction log.
//!
//! ## Design Principles
//!
//! - **Derived addresses**: a record lives at `derive(authority, experiment_id)`,
//!   so it is discoverable without an index and cannot be created twice
//! - **Authority gating**: every mutation checks the authenticated signer
//!   against the record's `authority`
//! - **Monotonic state**: `Active -> Completed` only; `event_count` only grows
//! - **Atomic requests**: checks and mutation run under one per-record lock;
//!   failures leave no trace
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use votius_core::client::ExperimentClient;
//! use votius_core::identity::Keypair;
//! use votius_core::ledger::Ledger;
//!
//! let ledger = Arc::new(Ledger::builder().build());
//! let owner = ExperimentClient::new(Arc::clone(&ledger), Keypair::generate());
//! let intruder = ExperimentClient::new(Arc::clone(&ledger), Keypair::generate());
//!
//! let address = owner.experiment_address(1)?;
//! owner.initialize_experiment(1)?;
//! let signature = owner.record_event(&address, [1u8; 32])?;
//!
//! let err = intruder.record_event(&address, [1u8; 32]).unwrap_err();
//! assert!(err.to_string().contains("Unauthorized"));
//!
//! let tx = ledger.get_transaction(&signature).expect("confirmed");
//! assert_eq!(tx.experiment_events().count(), 1);
//! # Ok::<(), votius_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod address;
pub mod client;
pub mod config;
pub mod error;
pub mod experiment;
pub mod identity;
pub mod ledger;
pub mod telemetry;

pub use config::{LedgerConfig, PostCompletionPolicy};
pub use error::{Error, Result};
pub use identity::{Keypair, Pubkey, Signature};
