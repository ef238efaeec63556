//! Experiment Registry
//!
//! Owns the lifecycle of [`Experiment`] records:
//!
//! ```text
//! [none] --initialize--> Active --record_event--> Active   (event_count++)
//!                        Active --complete------> Completed
//!                     Completed --complete------> rejected (InvalidState)
//!                     Completed --record_event--> rejected under Seal,
//!                                                 accepted + flagged under Allow
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use votius_core::config::PostCompletionPolicy;
//! use votius_core::experiment::{Experiment, ExperimentStatus};
//! use votius_core::identity::Pubkey;
//!
//! let authority = Pubkey::new([1; 32]);
//! let address = Pubkey::new([2; 32]);
//! let mut experiment = Experiment::new(authority, 1, 1_700_000_000);
//!
//! experiment.record_event(&address, &authority, PostCompletionPolicy::Seal)?;
//! experiment.complete(&address, &authority)?;
//!
//! assert_eq!(experiment.event_count(), 1);
//! assert_eq!(experiment.status(), ExperimentStatus::Completed);
//! # Ok::<(), votius_core::Error>(())
//! ```

mod event_record;
mod experiment_record;
mod instruction;
pub mod processor;

pub use event_record::{ExperimentCompletedEvent, ExperimentEvent, ProgramEvent};
pub use experiment_record::{Experiment, ExperimentStatus, RecordedEvent, DISCRIMINATOR_LEN};
pub use instruction::Instruction;
pub use processor::{process_instruction, InvocationContext, Outcome};
