//! Experiment Lifecycle Example
//!
//! Walks one experiment through the registry: initialize, record, an
//! intruder rejected, complete, double-complete rejected, and a
//! post-completion append under the configured policy.
//!
//! Run with: cargo run --example experiment_lifecycle [config.json]

use std::sync::Arc;

use anyhow::Context;
use votius_core::client::ExperimentClient;
use votius_core::identity::Keypair;
use votius_core::ledger::Ledger;
use votius_core::telemetry::init_tracing;
use votius_core::LedgerConfig;

fn main() -> anyhow::Result<()> {
    init_tracing("votius_core=info");

    let config = match std::env::args().nth(1) {
        Some(path) => LedgerConfig::from_path(&path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => LedgerConfig::default(),
    };

    println!("=== Votius Core Experiment Lifecycle ===\n");
    println!("Program ID: {}", config.program_id());
    println!("Post-completion policy: {:?}\n", config.post_completion);

    let ledger = Arc::new(Ledger::builder().config(config).build());
    let authority = ExperimentClient::new(Arc::clone(&ledger), Keypair::generate());
    let attacker = ExperimentClient::new(Arc::clone(&ledger), Keypair::generate());

    // -------------------------------------------------------------------------
    // 1. Initialize
    // -------------------------------------------------------------------------
    println!("1. Initializing experiment 1...");
    let address = authority.experiment_address(1)?;
    authority.initialize_experiment(1)?;
    let experiment = authority.fetch_experiment(&address)?;
    println!("   Address: {address}");
    println!("   Authority: {}", experiment.authority());
    println!("   Status: {:?}", experiment.status());
    println!("   Created: {:?}", experiment.created_at_datetime());

    // -------------------------------------------------------------------------
    // 2. Record an event
    // -------------------------------------------------------------------------
    println!("\n2. Recording event...");
    let fake_hash = [1u8; 32];
    let signature = authority.record_event(&address, fake_hash)?;
    println!(
        "   Event count: {}",
        authority.fetch_experiment(&address)?.event_count()
    );

    // -------------------------------------------------------------------------
    // 3. Intruder
    // -------------------------------------------------------------------------
    println!("\n3. Attacker attempts to record...");
    match attacker.record_event(&address, fake_hash) {
        Ok(_) => println!("   CRITICAL: attacker bypassed authorization"),
        Err(e) => println!("   Rejected: {e}"),
    }

    println!("\n   Transaction logs for {signature}:");
    let tx = authority
        .get_transaction(&signature)
        .context("confirmed transaction missing")?;
    for line in &tx.log_messages {
        println!("   {line}");
    }

    // -------------------------------------------------------------------------
    // 4. Complete, twice
    // -------------------------------------------------------------------------
    println!("\n4. Completing experiment...");
    authority.complete_experiment(&address)?;
    println!(
        "   Status: {:?}",
        authority.fetch_experiment(&address)?.status()
    );
    match authority.complete_experiment(&address) {
        Ok(_) => println!("   Unexpected: completed twice"),
        Err(e) => println!("   Second completion rejected: {e}"),
    }

    // -------------------------------------------------------------------------
    // 5. Post-completion append
    // -------------------------------------------------------------------------
    println!("\n5. Recording after completion...");
    match authority.record_event(&address, fake_hash) {
        Ok(sig) => println!("   Accepted (flagged post-completion) in {sig}"),
        Err(e) => println!("   Rejected: {e}"),
    }

    let experiment = authority.fetch_experiment(&address)?;
    let trail = authority.audit_trail(&address);
    println!("\n=== Summary ===");
    println!("   Event count: {}", experiment.event_count());
    println!("   Audit entries: {}", trail.len());
    println!(
        "   Record JSON: {}",
        serde_json::to_string_pretty(&experiment)?
    );

    Ok(())
}
