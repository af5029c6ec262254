//! Loan-domain types and error definitions.

use alloy::primitives::{Address, U256};
use alloy::primitives::utils::format_units;
use serde::Serialize;
use thiserror::Error;

/// On-chain loan status, matching the contract's uint8 encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoanStatus {
    /// Loan approved and funded, can be repaid.
    Active = 0,
    /// Loan past its due date, can still be repaid.
    Overdue = 1,
    /// Loan successfully repaid.
    Paid = 2,
    /// Loan defaulted (device locked).
    Defaulted = 3,
}

impl TryFrom<u8> for LoanStatus {
    type Error = ChainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LoanStatus::Active),
            1 => Ok(LoanStatus::Overdue),
            2 => Ok(LoanStatus::Paid),
            3 => Ok(LoanStatus::Defaulted),
            other => Err(ChainError::InvalidStatus(other)),
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            LoanStatus::Active => "Active",
            LoanStatus::Overdue => "Overdue",
            LoanStatus::Paid => "Paid",
            LoanStatus::Defaulted => "Defaulted",
        };
        f.write_str(text)
    }
}

/// The authoritative on-chain loan snapshot for one borrower.
///
/// Created by a successful loan request and mutated only by the contract;
/// the client observes it via [`crate::chain::ChainReader`] and reacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanRecord {
    /// Outstanding principal in wei. The contract encodes "no loan" as zero;
    /// the reader decodes that to `None` before this type is constructed.
    pub principal: U256,
    /// Latest allowed repayment date (seconds since epoch).
    pub max_payment_date: u64,
    /// Contract-side status.
    pub status: LoanStatus,
    /// Loan creation time (seconds since epoch).
    pub created_at: u64,
    /// Contract-computed overdue flag. May be true while `status` is still
    /// `Active` if the contract has not yet transitioned the loan.
    pub is_overdue_flag: bool,
}

/// Display-oriented view of a [`LoanRecord`], published to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct LoanSnapshot {
    /// Principal in wei.
    pub principal_wei: U256,
    /// Principal in token units (18 decimals).
    pub principal_display: String,
    /// Latest allowed repayment date (seconds since epoch).
    pub max_payment_date: u64,
    /// Loan creation time (seconds since epoch).
    pub created_at: u64,
    /// Contract-side status.
    pub status: LoanStatus,
    /// Human-readable status.
    pub status_text: String,
    /// Contract-computed overdue flag.
    pub is_overdue_flag: bool,
    /// Whole days until the due date (ceiling); zero or negative once past
    /// due.
    pub days_until_due: i64,
}

impl LoanSnapshot {
    /// Build a display snapshot from a record at a given wall-clock time.
    pub fn from_record(record: &LoanRecord, now_unix: u64) -> Self {
        let principal_display = format_units(record.principal, 18)
            .unwrap_or_else(|_| record.principal.to_string());

        let seconds_until_due = record.max_payment_date as i64 - now_unix as i64;
        // Ceiling division so a loan due later today still counts as 1 day.
        let days_until_due = seconds_until_due.div_euclid(86_400)
            + i64::from(seconds_until_due.rem_euclid(86_400) > 0);

        Self {
            principal_wei: record.principal,
            principal_display,
            max_payment_date: record.max_payment_date,
            created_at: record.created_at,
            status: record.status,
            status_text: record.status.to_string(),
            is_overdue_flag: record.is_overdue_flag,
            days_until_due,
        }
    }
}

/// Token balance and allowance for the loan contract, derived per query.
#[derive(Debug, Clone, Serialize)]
pub struct TokenAllowanceInfo {
    /// Holder's token balance in wei.
    pub balance: U256,
    /// Amount the loan contract may spend on the holder's behalf.
    pub allowance: U256,
}

impl TokenAllowanceInfo {
    /// Whether an `approve` write is required before spending `amount`.
    pub fn needs_approval(&self, amount: U256) -> bool {
        self.allowance < amount
    }
}

/// The signing wallet's identity as reported by the wallet itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WalletIdentity {
    /// Wallet address.
    pub address: Address,
    /// Chain the wallet is bound to.
    pub chain_id: u64,
}

/// Errors surfaced by chain reads and writes.
///
/// Write callers branch on these variants to tell the user what went wrong;
/// the monitor only cares about "did the read fail" and retains its previous
/// state regardless of the variant.
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC endpoint(s) unreachable or timed out. Transient.
    #[error("RPC unavailable: {0}")]
    RpcUnavailable(String),

    /// Response bytes did not decode as the expected return values.
    #[error("malformed contract response: {0}")]
    Decode(String),

    /// The wallet is bound to a different chain than the app targets.
    /// Embedded wallets cannot be migrated; after the single switch attempt
    /// this is a permanent, account-level condition.
    #[error("wallet is on chain {current}, app requires chain {expected}")]
    NetworkMismatch { current: u64, expected: u64 },

    /// The wallet owner declined to sign.
    #[error("transaction rejected by wallet owner")]
    UserRejected,

    /// Token balance below the attempted payment amount.
    #[error("insufficient token balance for payment")]
    InsufficientBalance,

    /// Token allowance below the attempted payment amount.
    #[error("token allowance too low for payment")]
    InsufficientAllowance,

    /// The contract holds less than the requested loan principal.
    #[error("loan contract has insufficient funds (available {available} wei)")]
    InsufficientLiquidity { available: U256 },

    /// The contract rejected a loan request because one is outstanding.
    #[error("borrower already has an active loan")]
    AlreadyHasActiveLoan,

    /// Contract revert not covered by a more specific variant.
    #[error("transaction reverted: {0}")]
    Reverted(String),

    /// Transaction broadcast but not mined within the configured window.
    #[error("transaction not confirmed after {0} seconds")]
    ConfirmationTimeout(u64),

    /// Key loading, signing, or wallet provider failure.
    #[error("wallet error: {0}")]
    Wallet(String),

    /// Contract returned a status byte outside the known range.
    #[error("invalid loan status value {0}")]
    InvalidStatus(u8),

    /// Gas price exceeded the configured ceiling.
    #[error("gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },
}

impl ChainError {
    /// Whether the error is expected to clear on its own (retry next cycle).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ChainError::RpcUnavailable(_) | ChainError::ConfirmationTimeout(_)
        )
    }
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Map a provider/wallet error message onto the loan error taxonomy.
///
/// RPC nodes put the revert reason (or the wallet's rejection text) in the
/// error string; this is the only place those strings are interpreted.
pub fn classify_provider_error(message: &str) -> ChainError {
    let lower = message.to_ascii_lowercase();

    if lower.contains("user rejected") || lower.contains("user denied") {
        return ChainError::UserRejected;
    }
    if message.contains("ERC20InsufficientBalance")
        || lower.contains("transfer amount exceeds balance")
    {
        return ChainError::InsufficientBalance;
    }
    if message.contains("ERC20InsufficientAllowance")
        || lower.contains("insufficient allowance")
    {
        return ChainError::InsufficientAllowance;
    }
    if lower.contains("active loan") {
        return ChainError::AlreadyHasActiveLoan;
    }
    if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection")
        || lower.contains("transport")
    {
        return ChainError::RpcUnavailable(message.to_string());
    }
    ChainError::Reverted(message.to_string())
}

/// Seconds since the Unix epoch.
pub fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_wire_value() {
        assert_eq!(LoanStatus::try_from(0).unwrap(), LoanStatus::Active);
        assert_eq!(LoanStatus::try_from(1).unwrap(), LoanStatus::Overdue);
        assert_eq!(LoanStatus::try_from(2).unwrap(), LoanStatus::Paid);
        assert_eq!(LoanStatus::try_from(3).unwrap(), LoanStatus::Defaulted);

        let err = LoanStatus::try_from(4).unwrap_err();
        assert!(matches!(err, ChainError::InvalidStatus(4)));
    }

    #[test]
    fn test_needs_approval_boundary() {
        let info = TokenAllowanceInfo {
            balance: U256::from(500),
            allowance: U256::from(100),
        };
        assert!(info.needs_approval(U256::from(101)));
        // Exact allowance is enough; no approval write needed.
        assert!(!info.needs_approval(U256::from(100)));
        assert!(!info.needs_approval(U256::from(99)));
    }

    #[test]
    fn test_snapshot_days_until_due() {
        let record = LoanRecord {
            principal: U256::from(10).pow(U256::from(19)), // 10 tokens
            max_payment_date: 1_000_000,
            status: LoanStatus::Active,
            created_at: 900_000,
            is_overdue_flag: false,
        };

        // Due in 1.5 days rounds up to 2.
        let snap = LoanSnapshot::from_record(&record, 1_000_000 - 129_600);
        assert_eq!(snap.days_until_due, 2);
        assert_eq!(snap.status_text, "Active");

        // Past due by half a day reads as negative.
        let snap = LoanSnapshot::from_record(&record, 1_000_000 + 43_200);
        assert!(snap.days_until_due <= 0);
    }

    #[test]
    fn test_snapshot_display_units() {
        let record = LoanRecord {
            principal: U256::from(10).pow(U256::from(19)),
            max_payment_date: 0,
            status: LoanStatus::Overdue,
            created_at: 0,
            is_overdue_flag: true,
        };
        let snap = LoanSnapshot::from_record(&record, 0);
        assert!(snap.principal_display.starts_with("10"));
    }

    #[test]
    fn test_classify_provider_error() {
        assert!(matches!(
            classify_provider_error("execution reverted: User rejected the request"),
            ChainError::UserRejected
        ));
        assert!(matches!(
            classify_provider_error("execution reverted: ERC20InsufficientBalance(0x..)"),
            ChainError::InsufficientBalance
        ));
        assert!(matches!(
            classify_provider_error("execution reverted: ERC20InsufficientAllowance(0x..)"),
            ChainError::InsufficientAllowance
        ));
        assert!(matches!(
            classify_provider_error("execution reverted: borrower has active loan"),
            ChainError::AlreadyHasActiveLoan
        ));
        assert!(matches!(
            classify_provider_error("request timed out"),
            ChainError::RpcUnavailable(_)
        ));
        assert!(matches!(
            classify_provider_error("execution reverted: paused"),
            ChainError::Reverted(_)
        ));
    }

    #[test]
    fn test_transient_classification() {
        assert!(ChainError::RpcUnavailable("down".into()).is_transient());
        assert!(ChainError::ConfirmationTimeout(120).is_transient());
        assert!(!ChainError::UserRejected.is_transient());
        assert!(!ChainError::AlreadyHasActiveLoan.is_transient());
    }
}
