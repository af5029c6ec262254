//! Operator CLI for the loan contract: query status, request, repay.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::utils::parse_units;
use alloy::primitives::{Address, U256};
use loan_lock::chain::reader::LoanReader;
use loan_lock::chain::types::{now_unix, ChainError, LoanSnapshot};
use loan_lock::chain::{ChainReader, EmbeddedWallet, LoanContractService, RpcWriter, WalletSigner};
use loan_lock::config::{load_config, AppConfig};
use loan_lock::lifecycle::Shutdown;
use loan_lock::monitor::{confirm_unlock, LoanMonitor, UnlockOutcome, UnlockPolicy};
use loan_lock::observability::logging;

#[derive(Parser)]
#[command(name = "loanctl")]
#[command(about = "Management CLI for the loan-lock subsystem", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Address to operate on. Defaults to the embedded wallet's address.
    #[arg(short, long)]
    address: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current loan for the address
    Status,
    /// Show token balance and loan-contract allowance
    Token {
        /// Pending payment amount in token units, to flag a needed approval
        #[arg(long)]
        amount: Option<String>,
    },
    /// Show funds the contract has available for new loans
    Liquidity,
    /// Request a loan
    Request {
        /// Principal in token units (e.g. "10" or "10.5")
        amount: String,
        /// Days until the payment is due
        #[arg(long, default_value_t = 30)]
        due_days: u64,
    },
    /// Repay the outstanding loan and wait for the device to unlock
    Repay {
        /// Payment in token units
        amount: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    logging::init(&config.observability.log_level);

    let reader = Arc::new(ChainReader::new(config.chain.clone())?);
    reader.verify_chain_id().await?;

    let address = resolve_address(&cli)?;

    match cli.command {
        Commands::Status => {
            match reader.get_active_loan(address).await? {
                Some(record) => {
                    let snapshot = LoanSnapshot::from_record(&record, now_unix());
                    println!("{}", serde_json::to_string_pretty(&snapshot)?);
                }
                None => println!("No active loan for {address}"),
            }
        }
        Commands::Token { amount } => {
            let info = reader.get_token_info(address).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
            if let Some(raw) = amount {
                let amount = parse_token_amount(&raw)?;
                println!("needs_approval for {raw}: {}", info.needs_approval(amount));
            }
        }
        Commands::Liquidity => {
            let available = reader.get_contract_balance().await?;
            println!("available: {available} wei");
        }
        Commands::Request { amount, due_days } => {
            let amount = parse_token_amount(&amount)?;
            let max_payment_date = now_unix() + due_days * 86_400;
            let service = build_service(&config, reader.clone())?;

            service.check_loan_eligibility(amount).await?;
            let tx_hash = service.request_loan(amount, max_payment_date).await?;
            println!("Loan request confirmed: {tx_hash}");
        }
        Commands::Repay { amount } => {
            let amount = parse_token_amount(&amount)?;
            let service = build_service(&config, reader.clone())?;

            let tx_hash = service.pay_back_loan(amount).await?;
            println!("Payment confirmed: {tx_hash}");

            // The contract state still has to be observed to change before
            // the device releases; nudge a short-lived monitor until it does.
            let shutdown = Shutdown::new();
            let (handle, join) = LoanMonitor::spawn(
                reader.clone(),
                address,
                config.monitor.clone(),
                shutdown.subscribe(),
            );
            let policy = UnlockPolicy {
                max_attempts: config.unlock.max_attempts,
                retry_interval: Duration::from_millis(config.unlock.retry_interval_ms),
            };
            match confirm_unlock(&handle, policy).await {
                UnlockOutcome::Unlocked { attempts } => {
                    println!("Device unlock confirmed after {attempts} check(s)");
                }
                UnlockOutcome::Pending { attempts } => {
                    println!(
                        "Payment succeeded; unlock still pending after {attempts} checks. \
                         The device releases on the next verified status."
                    );
                }
            }
            shutdown.trigger();
            let _ = join.await;
        }
    }

    Ok(())
}

fn resolve_address(cli: &Cli) -> Result<Address, Box<dyn std::error::Error>> {
    match &cli.address {
        Some(raw) => Ok(raw.parse()?),
        None => Ok(EmbeddedWallet::from_env()?.address()),
    }
}

fn parse_token_amount(raw: &str) -> Result<U256, ChainError> {
    Ok(parse_units(raw, 18u8)
        .map_err(|e| ChainError::Decode(format!("invalid token amount '{raw}': {e}")))?
        .get_absolute())
}

fn build_service(
    config: &AppConfig,
    reader: Arc<ChainReader>,
) -> Result<LoanContractService<ChainReader, RpcWriter>, Box<dyn std::error::Error>> {
    let wallet = EmbeddedWallet::from_env()?;
    let signer = Arc::new(WalletSigner::new(wallet, config.chain.chain_id));
    let writer = RpcWriter::new((*reader).clone(), &signer)?;
    let loan_contract = reader.loan_contract();
    Ok(LoanContractService::new(reader, writer, signer, loan_contract))
}
