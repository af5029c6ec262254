//! Loan-lock enforcement agent.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌────────────────────────────────────────────────────┐
//!                  │                 LOAN-LOCK AGENT                     │
//!                  │                                                     │
//!   RPC endpoint   │  ┌─────────┐ poll   ┌──────────┐ publish ┌────────┐ │
//!   ◀──────────────┼──│  chain  │◀───────│ monitor  │────────▶│ device │ │
//!                  │  │ reader  │        │ (state   │  watch  │ lock   │ │
//!                  │  └─────────┘        │ machine) │ channel │ ctrl   │ │
//!                  │                     └──────────┘         └───┬────┘ │
//!                  │                                              │      │
//!                  │                                              ▼      │
//!                  │                                     OS pinning API  │
//!                  │                                                     │
//!                  │  ┌────────────────────────────────────────────────┐ │
//!                  │  │            Cross-Cutting Concerns               │ │
//!                  │  │  ┌────────┐ ┌─────────────┐ ┌───────────────┐  │ │
//!                  │  │  │ config │ │observability│ │   lifecycle   │  │ │
//!                  │  │  └────────┘ └─────────────┘ └───────────────┘  │ │
//!                  │  └────────────────────────────────────────────────┘ │
//!                  └────────────────────────────────────────────────────┘
//! ```
//!
//! Writes (loan request, repayment) are issued by `loanctl` or the embedding
//! application through [`loan_lock::LoanContractService`]; the agent only
//! observes and enforces.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

use loan_lock::chain::types::ChainError;
use loan_lock::chain::{ChainReader, EmbeddedWallet, WalletSigner};
use loan_lock::config::load_config;
use loan_lock::device::{AppLifecycleEvent, DeviceLockController, NoopPinning};
use loan_lock::lifecycle::Shutdown;
use loan_lock::monitor::LoanMonitor;
use loan_lock::observability::logging;
use alloy::primitives::Address;

#[derive(Parser)]
#[command(name = "loan-lock-agent")]
#[command(about = "Loan status monitoring and device lock enforcement", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Borrower address to monitor. Defaults to the embedded wallet's
    /// address from the environment.
    #[arg(long)]
    borrower: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    logging::init(&config.observability.log_level);
    tracing::info!("loan-lock-agent v0.1.0 starting");

    let reader = ChainReader::new(config.chain.clone())?;

    // A wrong chain behind the RPC URL makes every decision meaningless;
    // refuse to run. An unreachable RPC is only transient: start anyway,
    // the monitor stays at Unknown (not unlocked) until a read succeeds.
    match reader.verify_chain_id().await {
        Ok(()) => tracing::info!(chain_id = config.chain.chain_id, "RPC chain id verified"),
        Err(e @ ChainError::NetworkMismatch { .. }) => return Err(e.into()),
        Err(e) => {
            tracing::warn!(error = %e, "Could not verify RPC chain id; monitor will keep retrying");
        }
    }

    let (borrower, wallet): (Address, Option<EmbeddedWallet>) = match &args.borrower {
        Some(raw) => (raw.parse()?, None),
        None => {
            let wallet = EmbeddedWallet::from_env()?;
            (wallet.address(), Some(wallet))
        }
    };

    // Surface a wallet chain mismatch at startup, before the user tries to
    // repay. Enforcement does not need the signer, so this is not fatal.
    if let Some(wallet) = wallet {
        let signer = WalletSigner::new(wallet, config.chain.chain_id);
        if let Err(e) = signer.require_network() {
            tracing::error!(
                error = %e,
                "Wallet cannot transact on the target chain; repayment will fail until it is recreated"
            );
        }
    }

    let shutdown = Shutdown::new();
    let (handle, monitor_join) = LoanMonitor::spawn(
        Arc::new(reader),
        borrower,
        config.monitor.clone(),
        shutdown.subscribe(),
    );

    // The platform embedding owns this sender and reports app
    // foreground/background transitions through it.
    let (lifecycle_tx, lifecycle_rx) = broadcast::channel::<AppLifecycleEvent>(16);

    let controller_join = if config.device.enforcement_enabled {
        // This binary has no platform pinning API; the embedding application
        // passes its own DevicePinning implementation to the controller.
        let controller = DeviceLockController::new(Arc::new(NoopPinning));
        Some(controller.spawn(handle.subscribe(), lifecycle_rx, shutdown.subscribe()))
    } else {
        tracing::warn!("Device enforcement disabled by configuration");
        None
    };

    tracing::info!(
        borrower = %borrower,
        poll_interval_secs = config.monitor.poll_interval_secs,
        "Agent running; press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    shutdown.trigger();
    drop(lifecycle_tx);

    let _ = monitor_join.await;
    if let Some(join) = controller_join {
        let _ = join.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
