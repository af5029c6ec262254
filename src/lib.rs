//! Loan lifecycle and device-enforcement subsystem.
//!
//! Reads on-chain loan state, derives a lock decision, drives the device
//! pinning API, and sequences the loan transactions (request, approval,
//! repayment). Rendering, navigation, and identity are the embedding
//! application's concern; it consumes the monitor handle and the contract
//! service and owns everything visual.

pub mod chain;
pub mod config;
pub mod device;
pub mod lifecycle;
pub mod monitor;
pub mod observability;

pub use chain::{ChainReader, EmbeddedWallet, LoanContractService, RpcWriter, WalletSigner};
pub use config::AppConfig;
pub use lifecycle::Shutdown;
pub use monitor::{LoanMonitor, LockState, MonitorHandle};
