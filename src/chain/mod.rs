//! Chain access subsystem.
//!
//! # Data Flow
//! ```text
//! Configuration (RPC URL, chain id, contract addresses)
//!     → reader.rs (signerless eth_call reads, failover + timeouts)
//!     → signer.rs (embedded wallet, chain-binding validation)
//!     → contract.rs (request / approve / repay writes, receipt waits)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - Every write passes the signer's network check first
//! - All RPC calls have configurable timeouts

pub mod abi;
pub mod contract;
pub mod reader;
pub mod signer;
pub mod types;

pub use contract::{LoanContractService, LoanWriter, RpcWriter, TxOutcome};
pub use reader::{ChainReader, LoanReader};
pub use signer::{EmbeddedWallet, NetworkStatus, WalletSigner};
pub use types::{
    ChainError, ChainResult, LoanRecord, LoanSnapshot, LoanStatus, TokenAllowanceInfo,
    WalletIdentity,
};
