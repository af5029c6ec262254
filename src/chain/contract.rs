//! Loan contract writes: request, repayment, and the ordering they require.
//!
//! # Responsibilities
//! - Build, sign, and broadcast the three loan transactions
//! - Enforce the approve-before-pay sequencing on repayment
//! - Wait for confirmations and translate reverts into the error taxonomy
//!
//! This is the only module that submits transactions. Reads stay in
//! [`crate::chain::reader`]; the monitor never calls into here.

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout};

use crate::chain::abi::{ILoanVault, IValueToken};
use crate::chain::reader::{ChainReader, LoanReader};
use crate::chain::signer::WalletSigner;
use crate::chain::types::{classify_provider_error, ChainError, ChainResult};
use crate::observability::metrics;

/// Terminal result of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// Mined and past the configured confirmation depth.
    Confirmed { block_number: u64 },
    /// Mined but reverted by the contract.
    Reverted,
}

/// Raw submit/confirm surface beneath [`LoanContractService`].
///
/// Production code uses [`RpcWriter`]; tests substitute a scripted fake that
/// records submission order.
pub trait LoanWriter: Send + Sync {
    /// Broadcast a `requestLoan` write.
    fn submit_request_loan(
        &self,
        amount: U256,
        max_payment_date: u64,
    ) -> impl Future<Output = ChainResult<TxHash>> + Send;

    /// Broadcast a `payBackLoan` write.
    fn submit_pay_back(&self, amount: U256) -> impl Future<Output = ChainResult<TxHash>> + Send;

    /// Broadcast an ERC20 `approve` write.
    fn submit_approve(
        &self,
        spender: Address,
        amount: U256,
    ) -> impl Future<Output = ChainResult<TxHash>> + Send;

    /// Block until the transaction is mined and confirmed (or reverted).
    fn wait_for_receipt(&self, tx_hash: TxHash)
        -> impl Future<Output = ChainResult<TxOutcome>> + Send;
}

/// Transaction writer over a wallet-backed RPC provider.
pub struct RpcWriter {
    provider: Arc<dyn Provider + Send + Sync>,
    /// Signerless reader reused for nonce, gas price, and receipt polling
    /// (those reads get the failover list for free).
    reader: ChainReader,
    sender: Address,
}

impl RpcWriter {
    /// Build a writer for the signer's wallet.
    ///
    /// Fails with `NetworkMismatch` when the wallet is bound to the wrong
    /// chain, before anything is broadcast.
    pub fn new(reader: ChainReader, signer: &WalletSigner) -> ChainResult<Self> {
        let key = signer.signer()?.clone();
        let sender = signer.address();

        let url: url::Url = reader
            .config()
            .rpc_url
            .parse()
            .map_err(|e| ChainError::RpcUnavailable(format!("invalid RPC URL: {e}")))?;
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(key))
            .connect_http(url);

        Ok(Self {
            provider: Arc::new(provider),
            reader,
            sender,
        })
    }

    /// Build, price, and broadcast a contract call.
    ///
    /// Gas limit is left to estimation so contract reverts surface here,
    /// where they can be classified, rather than as a mined failure.
    async fn submit(&self, to: Address, data: Bytes, label: &'static str) -> ChainResult<TxHash> {
        let config = self.reader.config();

        let gas_price = self.reader.get_gas_price().await?;
        let gas_price_gwei = gas_price / 1_000_000_000;
        if gas_price_gwei > config.max_gas_price_gwei as u128 {
            return Err(ChainError::GasPriceTooHigh {
                current_gwei: gas_price_gwei as u64,
                max_gwei: config.max_gas_price_gwei,
            });
        }
        let adjusted_gas_price = (gas_price as f64 * config.gas_price_multiplier) as u128;

        let nonce = self.reader.get_transaction_count(self.sender).await?;

        let tx = TransactionRequest::default()
            .with_from(self.sender)
            .with_to(to)
            .with_input(data)
            .with_nonce(nonce)
            .with_gas_price(adjusted_gas_price)
            .with_chain_id(config.chain_id);

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| classify_provider_error(&e.to_string()))?;
        let tx_hash = *pending.tx_hash();

        metrics::record_tx_submitted(label);
        tracing::info!(tx_hash = %tx_hash, kind = label, "Transaction broadcast");
        Ok(tx_hash)
    }
}

impl LoanWriter for RpcWriter {
    fn submit_request_loan(
        &self,
        amount: U256,
        max_payment_date: u64,
    ) -> impl Future<Output = ChainResult<TxHash>> + Send {
        async move {
            let call = ILoanVault::requestLoanCall {
                amount,
                maxPaymentDate: U256::from(max_payment_date),
            };
            self.submit(self.reader.loan_contract(), call.abi_encode().into(), "request_loan")
                .await
        }
    }

    fn submit_pay_back(&self, amount: U256) -> impl Future<Output = ChainResult<TxHash>> + Send {
        async move {
            let call = ILoanVault::payBackLoanCall { amount };
            self.submit(self.reader.loan_contract(), call.abi_encode().into(), "pay_back_loan")
                .await
        }
    }

    fn submit_approve(
        &self,
        spender: Address,
        amount: U256,
    ) -> impl Future<Output = ChainResult<TxHash>> + Send {
        async move {
            let call = IValueToken::approveCall { spender, amount };
            self.submit(self.reader.token_contract(), call.abi_encode().into(), "approve")
                .await
        }
    }

    fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = ChainResult<TxOutcome>> + Send {
        async move {
            let config = self.reader.config();
            let required_confirmations = config.confirmation_blocks;
            let timeout_secs = config.tx_confirmation_timeout_secs;
            let poll_interval = Duration::from_secs(2);

            let result = timeout(Duration::from_secs(timeout_secs), async {
                let mut ticker = interval(poll_interval);

                loop {
                    ticker.tick().await;

                    let receipt = match self.reader.get_transaction_receipt(tx_hash).await? {
                        Some(r) => r,
                        None => {
                            tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                            continue;
                        }
                    };

                    if !receipt.status() {
                        return Ok(TxOutcome::Reverted);
                    }

                    let current_block = self.reader.get_block_number().await?;
                    let tx_block = receipt.block_number.unwrap_or(current_block);
                    let confirmations = current_block.saturating_sub(tx_block) as u32;

                    if confirmations >= required_confirmations {
                        return Ok(TxOutcome::Confirmed { block_number: tx_block });
                    }

                    tracing::debug!(
                        tx_hash = %tx_hash,
                        confirmations = confirmations,
                        required = required_confirmations,
                        "Waiting for confirmations"
                    );
                }
            })
            .await;

            match result {
                Ok(outcome) => outcome,
                Err(_) => Err(ChainError::ConfirmationTimeout(timeout_secs)),
            }
        }
    }
}

/// The three loan operations, with their ordering invariants enforced.
pub struct LoanContractService<R, W> {
    reader: Arc<R>,
    writer: W,
    signer: Arc<WalletSigner>,
    loan_contract: Address,
}

impl<R, W> LoanContractService<R, W>
where
    R: LoanReader,
    W: LoanWriter,
{
    /// Compose the service. `loan_contract` is the approve spender.
    pub fn new(reader: Arc<R>, writer: W, signer: Arc<WalletSigner>, loan_contract: Address) -> Self {
        Self {
            reader,
            writer,
            signer,
            loan_contract,
        }
    }

    /// Pre-flight checks a caller should run before [`Self::request_loan`]:
    /// no outstanding loan, and the contract can fund the principal.
    pub async fn check_loan_eligibility(&self, amount: U256) -> ChainResult<()> {
        let identity = self.signer.require_network()?;

        if self.reader.has_active_loan(identity.address).await? {
            return Err(ChainError::AlreadyHasActiveLoan);
        }

        let available = self.reader.get_contract_balance().await?;
        if available < amount {
            return Err(ChainError::InsufficientLiquidity { available });
        }

        Ok(())
    }

    /// Request a loan of `amount` wei, due by `max_payment_date`.
    ///
    /// The no-existing-loan precondition is the contract's to enforce; a
    /// revert while a loan is outstanding surfaces as `AlreadyHasActiveLoan`
    /// so the caller re-queries status instead of retrying.
    pub async fn request_loan(&self, amount: U256, max_payment_date: u64) -> ChainResult<TxHash> {
        let identity = self.signer.require_network()?;

        tracing::info!(
            address = %identity.address,
            amount = %amount,
            max_payment_date = max_payment_date,
            "Requesting loan"
        );

        let tx_hash = self.writer.submit_request_loan(amount, max_payment_date).await?;

        match self.writer.wait_for_receipt(tx_hash).await? {
            TxOutcome::Confirmed { block_number } => {
                tracing::info!(tx_hash = %tx_hash, block = block_number, "Loan request confirmed");
                Ok(tx_hash)
            }
            TxOutcome::Reverted => Err(self.diagnose_request_revert(identity.address).await),
        }
    }

    /// Repay `amount` wei of the outstanding loan.
    ///
    /// Two phases, strictly sequential: when the allowance is short, the
    /// `approve` write is submitted and its receipt awaited before the
    /// payment is broadcast. Submitting the payment earlier would revert or
    /// under-spend, so the phases are never overlapped.
    pub async fn pay_back_loan(&self, amount: U256) -> ChainResult<TxHash> {
        let identity = self.signer.require_network()?;

        tracing::info!(address = %identity.address, amount = %amount, "Paying back loan");

        let token_info = self.reader.get_token_info(identity.address).await?;
        if token_info.balance < amount {
            return Err(ChainError::InsufficientBalance);
        }

        if token_info.needs_approval(amount) {
            let approve_hash = self.writer.submit_approve(self.loan_contract, amount).await?;
            match self.writer.wait_for_receipt(approve_hash).await? {
                TxOutcome::Confirmed { .. } => {
                    tracing::info!(tx_hash = %approve_hash, "Token approval confirmed");
                }
                TxOutcome::Reverted => {
                    return Err(ChainError::Reverted("token approval reverted".to_string()));
                }
            }
        }

        let pay_hash = self.writer.submit_pay_back(amount).await?;
        match self.writer.wait_for_receipt(pay_hash).await? {
            TxOutcome::Confirmed { block_number } => {
                tracing::info!(tx_hash = %pay_hash, block = block_number, "Loan payment confirmed");
                Ok(pay_hash)
            }
            TxOutcome::Reverted => Err(self.diagnose_payment_revert(identity.address, amount).await),
        }
    }

    async fn diagnose_request_revert(&self, borrower: Address) -> ChainError {
        match self.reader.has_active_loan(borrower).await {
            Ok(true) => ChainError::AlreadyHasActiveLoan,
            _ => ChainError::Reverted("loan request reverted".to_string()),
        }
    }

    async fn diagnose_payment_revert(&self, payer: Address, amount: U256) -> ChainError {
        match self.reader.get_token_info(payer).await {
            Ok(info) if info.allowance < amount => ChainError::InsufficientAllowance,
            Ok(info) if info.balance < amount => ChainError::InsufficientBalance,
            _ => ChainError::Reverted("loan payment reverted".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_outcome_matching() {
        let outcome = TxOutcome::Confirmed { block_number: 100 };
        assert!(matches!(outcome, TxOutcome::Confirmed { .. }));
        assert_ne!(outcome, TxOutcome::Reverted);
    }
}
