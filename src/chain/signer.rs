//! Wallet identity and signing capability.
//!
//! # Responsibilities
//! - Load the embedded wallet's private key (environment only, never logged)
//! - Validate the wallet's chain binding against the app's target chain
//! - Gate every write behind that validation
//!
//! # Chain locking
//! Embedded wallets are bound to one chain when they are created. A mismatch
//! cannot, in general, be corrected at runtime: one best-effort switch is
//! attempted, and if it fails the mismatch is a permanent account-level
//! condition (the wallet must be recreated, which is outside this
//! subsystem). Nothing here retries the switch.

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::chain::types::{ChainError, ChainResult, WalletIdentity};

/// Environment variable holding the hex-encoded private key.
pub const WALLET_KEY_ENV: &str = "LOAN_LOCK_WALLET_KEY";

/// Environment variable holding the chain id the wallet was created on.
pub const WALLET_CHAIN_ENV: &str = "LOAN_LOCK_WALLET_CHAIN_ID";

/// A signing key bound to one chain at creation time.
pub struct EmbeddedWallet {
    signer: PrivateKeySigner,
    /// Chain the wallet is currently bound to.
    chain_id: AtomicU64,
    /// Whether the backing provider honors `wallet_switchEthereumChain`.
    /// False for every embedded-wallet provider seen so far.
    switchable: bool,
}

impl EmbeddedWallet {
    /// Create a wallet from a hex private key and its creation chain id.
    ///
    /// The key is parsed and held in memory only; it is never logged.
    pub fn new(private_key_hex: &str, chain_id: u64) -> ChainResult<Self> {
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| ChainError::Wallet(format!("invalid private key format: {e}")))?;

        tracing::info!(
            address = %signer.address(),
            chain_id = chain_id,
            "Embedded wallet loaded"
        );

        Ok(Self {
            signer,
            chain_id: AtomicU64::new(chain_id),
            switchable: false,
        })
    }

    /// Load the wallet from `LOAN_LOCK_WALLET_KEY` / `LOAN_LOCK_WALLET_CHAIN_ID`.
    pub fn from_env() -> ChainResult<Self> {
        let private_key = std::env::var(WALLET_KEY_ENV)
            .map_err(|_| ChainError::Wallet(format!("environment variable {WALLET_KEY_ENV} not set")))?;
        let chain_id = std::env::var(WALLET_CHAIN_ENV)
            .map_err(|_| ChainError::Wallet(format!("environment variable {WALLET_CHAIN_ENV} not set")))?
            .parse::<u64>()
            .map_err(|e| ChainError::Wallet(format!("invalid {WALLET_CHAIN_ENV}: {e}")))?;

        Self::new(&private_key, chain_id)
    }

    /// Mark the wallet as able to honor a chain switch.
    ///
    /// Real embedded wallets are chain-locked; this exists for the rare
    /// provider that does support switching, and for tests.
    pub fn with_switch_support(mut self) -> Self {
        self.switchable = true;
        self
    }

    /// The wallet's address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Chain the wallet currently reports.
    pub fn chain_id(&self) -> u64 {
        self.chain_id.load(Ordering::SeqCst)
    }

    /// Best-effort chain switch. Returns whether the wallet now reports
    /// `target`. Chain-locked wallets always refuse.
    pub fn try_switch_chain(&self, target: u64) -> bool {
        if !self.switchable {
            tracing::warn!(
                current = self.chain_id(),
                target = target,
                "Wallet is chain-locked; switch refused"
            );
            return false;
        }
        self.chain_id.store(target, Ordering::SeqCst);
        tracing::info!(chain_id = target, "Wallet switched chains");
        true
    }

    /// Raw signing handle. Callers must go through [`WalletSigner`] so the
    /// network check cannot be skipped.
    fn raw_signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

impl std::fmt::Debug for EmbeddedWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedWallet")
            .field("address", &self.signer.address())
            .field("chain_id", &self.chain_id())
            .finish()
    }
}

/// Where the wallet stands relative to the app's target chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// Wallet chain matches the target; writes may proceed.
    Correct,
    /// Mismatch detected, the single switch attempt has not run yet.
    MismatchPendingSwitch { current: u64, expected: u64 },
    /// Mismatch persisted past the switch attempt. The wallet must be
    /// recreated on the target chain; surface this to the user, do not retry.
    Unrecoverable { current: u64, expected: u64 },
}

/// Network-validated gateway to the signing key.
pub struct WalletSigner {
    wallet: EmbeddedWallet,
    target_chain_id: u64,
    switch_attempted: AtomicBool,
}

impl WalletSigner {
    /// Bind a wallet to the app's target chain.
    pub fn new(wallet: EmbeddedWallet, target_chain_id: u64) -> Self {
        Self {
            wallet,
            target_chain_id,
            switch_attempted: AtomicBool::new(false),
        }
    }

    /// The wallet's identity as it reports it.
    pub fn identity(&self) -> WalletIdentity {
        WalletIdentity {
            address: self.wallet.address(),
            chain_id: self.wallet.chain_id(),
        }
    }

    /// The wallet's address.
    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Current standing without side effects.
    pub fn network_status(&self) -> NetworkStatus {
        let current = self.wallet.chain_id();
        if current == self.target_chain_id {
            NetworkStatus::Correct
        } else if self.switch_attempted.load(Ordering::SeqCst) {
            NetworkStatus::Unrecoverable {
                current,
                expected: self.target_chain_id,
            }
        } else {
            NetworkStatus::MismatchPendingSwitch {
                current,
                expected: self.target_chain_id,
            }
        }
    }

    /// Validate the chain binding, consuming the single switch attempt if a
    /// mismatch is found.
    pub fn require_network(&self) -> ChainResult<WalletIdentity> {
        let current = self.wallet.chain_id();
        if current == self.target_chain_id {
            return Ok(self.identity());
        }

        if !self.switch_attempted.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                current = current,
                expected = self.target_chain_id,
                "Wallet on wrong chain; attempting one best-effort switch"
            );
            if self.wallet.try_switch_chain(self.target_chain_id) {
                return Ok(self.identity());
            }
        }

        tracing::error!(
            current = current,
            expected = self.target_chain_id,
            "Wallet chain mismatch is permanent; wallet must be recreated on the target chain"
        );
        Err(ChainError::NetworkMismatch {
            current,
            expected: self.target_chain_id,
        })
    }

    /// Obtain the signing handle, failing unless the wallet is on the target
    /// chain. Performs no writes.
    pub fn signer(&self) -> ChainResult<&PrivateKeySigner> {
        self.require_network()?;
        Ok(self.wallet.raw_signer())
    }
}

impl std::fmt::Debug for WalletSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSigner")
            .field("address", &self.wallet.address())
            .field("wallet_chain_id", &self.wallet.chain_id())
            .field("target_chain_id", &self.target_chain_id)
            .finish()
    }
}
