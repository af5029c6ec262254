//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files and
//! carry defaults so a minimal config works.

use serde::{Deserialize, Serialize};

/// Root configuration for the loan-lock subsystem.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Chain, contract, and transaction settings.
    pub chain: ChainConfig,

    /// Loan monitor cadence.
    pub monitor: MonitorConfig,

    /// Post-repayment unlock confirmation bounds.
    pub unlock: UnlockConfig,

    /// Device enforcement settings.
    pub device: DeviceConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// Chain and contract configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    #[serde(default)]
    pub failover_urls: Vec<String>,

    /// Target chain id. The wallet must be bound to this chain.
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Block confirmations required before a transaction counts as final.
    pub confirmation_blocks: u32,

    /// Seconds to wait for a broadcast transaction to confirm.
    pub tx_confirmation_timeout_secs: u64,

    /// Loan contract address (hex).
    pub loan_contract: String,

    /// Value token (ERC20) contract address (hex).
    pub token_contract: String,

    /// Gas price multiplier (1.0 = estimated, 1.2 = 20% buffer).
    pub gas_price_multiplier: f64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://sepolia-rollup.arbitrum.io/rpc".to_string(),
            failover_urls: Vec::new(),
            // Arbitrum Sepolia.
            chain_id: 421_614,
            rpc_timeout_secs: 10,
            confirmation_blocks: 1,
            tx_confirmation_timeout_secs: 120,
            loan_contract: String::new(),
            token_contract: String::new(),
            gas_price_multiplier: 1.2,
            max_gas_price_gwei: 500,
        }
    }
}

/// Loan monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between scheduled loan status polls.
    pub poll_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
        }
    }
}

/// Post-repayment unlock confirmation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UnlockConfig {
    /// Maximum forced status checks after a payment.
    pub max_attempts: u32,

    /// Milliseconds between forced checks.
    pub retry_interval_ms: u64,
}

impl Default for UnlockConfig {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            retry_interval_ms: 1000,
        }
    }
}

/// Device enforcement configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// When false, lock decisions are computed and published but the
    /// pinning API is never invoked (useful on unsupported platforms and in
    /// development).
    pub enforcement_enabled: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            enforcement_enabled: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
