//! Registry processor: applies one instruction against the account store.
//!
//! Authorization and status checks run inside the store's atomic update,
//! against the same snapshot the mutation is applied to. Two racing
//! `complete` requests therefore cannot both observe `Active`. The slot and
//! time of an accepted mutation are drawn under the same lock.

use crate::address::derive_experiment_address;
use crate::config::PostCompletionPolicy;
use crate::identity::Pubkey;
use crate::ledger::{Account, AccountStore, Sequencer, Stamp};
use crate::{Error, Result};

use super::{Experiment, ExperimentCompletedEvent, ExperimentEvent, Instruction, ProgramEvent};

/// Ambient facts the runtime supplies for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct InvocationContext<'a> {
    /// Registry program identity.
    pub program_id: &'a Pubkey,
    /// Authenticated signer of the request.
    pub signer: &'a Pubkey,
    /// Target experiment address.
    pub experiment: &'a Pubkey,
    /// Source of slots and ledger time.
    pub sequencer: &'a Sequencer,
    /// Post-completion append policy.
    pub policy: PostCompletionPolicy,
}

/// An applied instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Slot and time the mutation was applied at.
    pub stamp: Stamp,
    /// Emitted events, in order.
    pub events: Vec<ProgramEvent>,
}

/// Apply `instruction`, returning its stamp and the events it emitted.
///
/// # Errors
///
/// Any failure leaves the store untouched.
pub fn process_instruction<S: AccountStore>(
    store: &S,
    ctx: &InvocationContext<'_>,
    instruction: &Instruction,
) -> Result<Outcome> {
    match instruction {
        Instruction::InitializeExperiment { experiment_id } => {
            initialize_experiment(store, ctx, *experiment_id)
        }
        Instruction::RecordEvent { event_hash } => record_event(store, ctx, event_hash),
        Instruction::CompleteExperiment => complete_experiment(store, ctx),
    }
}

fn initialize_experiment<S: AccountStore>(
    store: &S,
    ctx: &InvocationContext<'_>,
    experiment_id: u64,
) -> Result<Outcome> {
    let (expected, bump) = derive_experiment_address(ctx.signer, experiment_id, ctx.program_id)?;
    if expected != *ctx.experiment {
        return Err(Error::AddressMismatch {
            expected,
            actual: *ctx.experiment,
        });
    }

    // No other request can mutate the record before it exists.
    let stamp = ctx.sequencer.next_stamp();
    let record = Experiment::new(*ctx.signer, experiment_id, stamp.unix_timestamp);
    store.create(
        expected,
        Account {
            owner: *ctx.program_id,
            data: record.encode(),
        },
    )?;

    tracing::info!(
        experiment = %expected,
        experiment_id,
        bump,
        authority = %ctx.signer,
        "experiment initialized"
    );
    Ok(Outcome {
        stamp,
        events: Vec::new(),
    })
}

fn record_event<S: AccountStore>(
    store: &S,
    ctx: &InvocationContext<'_>,
    event_hash: &[u8; 32],
) -> Result<Outcome> {
    let (recorded, stamp) = store.update(ctx.experiment, |account| {
        let mut record = load(account, ctx)?;
        let recorded = record.record_event(ctx.experiment, ctx.signer, ctx.policy)?;
        account.data = record.encode();
        Ok((recorded, ctx.sequencer.next_stamp()))
    })?;

    if recorded.post_completion {
        tracing::warn!(
            experiment = %ctx.experiment,
            index = recorded.index,
            "event recorded after completion"
        );
    } else {
        tracing::debug!(experiment = %ctx.experiment, index = recorded.index, "event recorded");
    }

    Ok(Outcome {
        stamp,
        events: vec![ProgramEvent::Recorded(ExperimentEvent {
            experiment: *ctx.experiment,
            index: recorded.index,
            hash: *event_hash,
            timestamp: stamp.unix_timestamp,
            post_completion: recorded.post_completion,
        })],
    })
}

fn complete_experiment<S: AccountStore>(
    store: &S,
    ctx: &InvocationContext<'_>,
) -> Result<Outcome> {
    let stamp = store.update(ctx.experiment, |account| {
        let mut record = load(account, ctx)?;
        record.complete(ctx.experiment, ctx.signer)?;
        account.data = record.encode();
        Ok(ctx.sequencer.next_stamp())
    })?;

    tracing::info!(experiment = %ctx.experiment, "experiment completed");
    Ok(Outcome {
        stamp,
        events: vec![ProgramEvent::Completed(ExperimentCompletedEvent {
            experiment: *ctx.experiment,
            timestamp: stamp.unix_timestamp,
        })],
    })
}

fn load(account: &Account, ctx: &InvocationContext<'_>) -> Result<Experiment> {
    if account.owner != *ctx.program_id {
        return Err(Error::AccountOwnedByWrongProgram {
            address: *ctx.experiment,
            owner: account.owner,
        });
    }
    Experiment::decode(&account.data)
}
