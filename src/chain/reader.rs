//! Read-only chain access.
//!
//! # Responsibilities
//! - Query loan and token state without a signing key
//! - Iterate primary + failover RPC endpoints with per-request timeouts
//! - Surface transient failures as a distinguishable error kind so the
//!   monitor can apply its fail-safe policy
//!
//! All reads take `&self` and are safe to issue concurrently.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::sol_types::SolCall;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::chain::abi::ILoanVault;
use crate::chain::abi::IValueToken;
use crate::chain::types::{ChainError, ChainResult, LoanRecord, LoanStatus, TokenAllowanceInfo};
use crate::config::schema::ChainConfig;

/// The read surface the loan monitor depends on.
///
/// Production code uses [`ChainReader`]; tests substitute a scripted fake.
pub trait LoanReader: Send + Sync {
    /// Fetch the borrower's loan, `None` when the contract reports no loan.
    fn get_active_loan(
        &self,
        borrower: Address,
    ) -> impl Future<Output = ChainResult<Option<LoanRecord>>> + Send;

    /// Fetch the holder's token balance and loan-contract allowance.
    fn get_token_info(
        &self,
        holder: Address,
    ) -> impl Future<Output = ChainResult<TokenAllowanceInfo>> + Send;

    /// Funds the contract currently has available for new loans.
    fn get_contract_balance(&self) -> impl Future<Output = ChainResult<U256>> + Send;

    /// Cheap boolean eligibility check.
    fn has_active_loan(
        &self,
        borrower: Address,
    ) -> impl Future<Output = ChainResult<bool>> + Send;
}

/// Signerless RPC reader over the configured chain.
#[derive(Clone)]
pub struct ChainReader {
    /// Primary provider followed by failovers, tried in order.
    providers: Vec<Arc<dyn Provider + Send + Sync>>,
    loan_contract: Address,
    token_contract: Address,
    config: ChainConfig,
    timeout_duration: Duration,
}

impl ChainReader {
    /// Build a reader from validated configuration.
    pub fn new(config: ChainConfig) -> ChainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);

        let loan_contract: Address = config
            .loan_contract
            .parse()
            .map_err(|e| ChainError::Decode(format!("invalid loan contract address: {e}")))?;
        let token_contract: Address = config
            .token_contract
            .parse()
            .map_err(|e| ChainError::Decode(format!("invalid token contract address: {e}")))?;

        let mut providers = Vec::new();
        let primary: url::Url = config
            .rpc_url
            .parse()
            .map_err(|e| ChainError::RpcUnavailable(format!("invalid RPC URL '{}': {e}", config.rpc_url)))?;
        providers.push(
            Arc::new(ProviderBuilder::new().connect_http(primary)) as Arc<dyn Provider + Send + Sync>
        );

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                providers.push(
                    Arc::new(ProviderBuilder::new().connect_http(url)) as Arc<dyn Provider + Send + Sync>
                );
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        tracing::info!(
            rpc_url = %config.rpc_url,
            chain_id = config.chain_id,
            loan_contract = %loan_contract,
            token_contract = %token_contract,
            "Chain reader initialized"
        );

        Ok(Self {
            providers,
            loan_contract,
            token_contract,
            config,
            timeout_duration,
        })
    }

    /// Confirm the RPC endpoint serves the configured chain.
    ///
    /// Run at startup so a misconfigured endpoint is caught before the first
    /// lock decision, not at the first write.
    pub async fn verify_chain_id(&self) -> ChainResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id != self.config.chain_id {
            return Err(ChainError::NetworkMismatch {
                current: chain_id,
                expected: self.config.chain_id,
            });
        }
        Ok(())
    }

    /// Chain id reported by the RPC endpoint.
    pub async fn get_chain_id(&self) -> ChainResult<u64> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_chain_id()).await {
                Ok(Ok(id)) => return Ok(id),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, error = %e, "RPC error, trying next provider");
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, "RPC timeout, trying next provider");
                }
            }
        }
        Err(ChainError::RpcUnavailable("all RPC providers failed".to_string()))
    }

    /// Latest block number, used for confirmation depth.
    pub async fn get_block_number(&self) -> ChainResult<u64> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_block_number()).await {
                Ok(Ok(n)) => return Ok(n),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(ChainError::RpcUnavailable("all providers failed to get block number".to_string()))
    }

    /// Current gas price in wei.
    pub async fn get_gas_price(&self) -> ChainResult<u128> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_gas_price()).await {
                Ok(Ok(price)) => return Ok(price),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(ChainError::RpcUnavailable("all providers failed to get gas price".to_string()))
    }

    /// Transaction count (next nonce) for an address.
    pub async fn get_transaction_count(&self, address: Address) -> ChainResult<u64> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_transaction_count(address)).await {
                Ok(Ok(n)) => return Ok(n),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(ChainError::RpcUnavailable("all providers failed to get nonce".to_string()))
    }

    /// Receipt for a broadcast transaction, `None` while still pending.
    pub async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> ChainResult<Option<TransactionReceipt>> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_transaction_receipt(tx_hash)).await {
                Ok(Ok(receipt)) => return Ok(receipt),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(ChainError::RpcUnavailable("all providers failed to get receipt".to_string()))
    }

    /// `eth_call` against `to`, iterating providers until one answers.
    async fn eth_call(&self, to: Address, data: Bytes) -> ChainResult<Bytes> {
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.call(tx.clone())).await {
                Ok(Ok(bytes)) => return Ok(bytes),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, error = %e, "RPC error, trying next provider");
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, "RPC timeout, trying next provider");
                }
            }
        }
        Err(ChainError::RpcUnavailable("all RPC providers failed".to_string()))
    }

    async fn fetch_active_loan(&self, borrower: Address) -> ChainResult<Option<LoanRecord>> {
        let call = ILoanVault::getActiveLoanCall { borrower };
        let raw = self.eth_call(self.loan_contract, call.abi_encode().into()).await?;
        let ret = ILoanVault::getActiveLoanCall::abi_decode_returns(&raw)
            .map_err(|e| ChainError::Decode(format!("getActiveLoan: {e}")))?;

        // Zero principal is the contract's encoding for "no loan".
        if ret.principal.is_zero() {
            return Ok(None);
        }

        Ok(Some(LoanRecord {
            principal: ret.principal,
            max_payment_date: ret.maxPaymentDate.saturating_to(),
            status: LoanStatus::try_from(ret.status)?,
            created_at: ret.createdAt.saturating_to(),
            is_overdue_flag: ret.isOverdue,
        }))
    }

    async fn fetch_token_balance(&self, holder: Address) -> ChainResult<U256> {
        let call = IValueToken::balanceOfCall { owner: holder };
        let raw = self.eth_call(self.token_contract, call.abi_encode().into()).await?;
        IValueToken::balanceOfCall::abi_decode_returns(&raw)
            .map_err(|e| ChainError::Decode(format!("balanceOf: {e}")))
    }

    async fn fetch_token_allowance(&self, holder: Address) -> ChainResult<U256> {
        let call = IValueToken::allowanceCall {
            owner: holder,
            spender: self.loan_contract,
        };
        let raw = self.eth_call(self.token_contract, call.abi_encode().into()).await?;
        IValueToken::allowanceCall::abi_decode_returns(&raw)
            .map_err(|e| ChainError::Decode(format!("allowance: {e}")))
    }

    /// Address of the loan contract this reader is bound to.
    pub fn loan_contract(&self) -> Address {
        self.loan_contract
    }

    /// Address of the value token this reader is bound to.
    pub fn token_contract(&self) -> Address {
        self.token_contract
    }

    /// Chain configuration this reader was built from.
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }
}

impl LoanReader for ChainReader {
    fn get_active_loan(
        &self,
        borrower: Address,
    ) -> impl Future<Output = ChainResult<Option<LoanRecord>>> + Send {
        self.fetch_active_loan(borrower)
    }

    fn get_token_info(
        &self,
        holder: Address,
    ) -> impl Future<Output = ChainResult<TokenAllowanceInfo>> + Send {
        async move {
            let (balance, allowance) = tokio::try_join!(
                self.fetch_token_balance(holder),
                self.fetch_token_allowance(holder)
            )?;
            Ok(TokenAllowanceInfo { balance, allowance })
        }
    }

    fn get_contract_balance(&self) -> impl Future<Output = ChainResult<U256>> + Send {
        async move {
            let call = ILoanVault::getContractBalanceCall {};
            let raw = self.eth_call(self.loan_contract, call.abi_encode().into()).await?;
            ILoanVault::getContractBalanceCall::abi_decode_returns(&raw)
                .map_err(|e| ChainError::Decode(format!("getContractBalance: {e}")))
        }
    }

    fn has_active_loan(
        &self,
        borrower: Address,
    ) -> impl Future<Output = ChainResult<bool>> + Send {
        async move {
            let call = ILoanVault::hasActiveLoanStatusCall { borrower };
            let raw = self.eth_call(self.loan_contract, call.abi_encode().into()).await?;
            ILoanVault::hasActiveLoanStatusCall::abi_decode_returns(&raw)
                .map_err(|e| ChainError::Decode(format!("hasActiveLoanStatus: {e}")))
        }
    }
}

impl std::fmt::Debug for ChainReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainReader")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("loan_contract", &self.loan_contract)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ChainConfig;

    fn test_config() -> ChainConfig {
        ChainConfig {
            // Reserved port: connections are refused immediately.
            rpc_url: "http://127.0.0.1:1".to_string(),
            loan_contract: "0xd880112AeC1307eBE2886e4fB0daec82564f3a65".to_string(),
            token_contract: "0x637A1259C6afd7E3AdF63993cA7E58BB438aB1B1".to_string(),
            rpc_timeout_secs: 1,
            ..ChainConfig::default()
        }
    }

    #[test]
    fn test_reader_creation() {
        let reader = ChainReader::new(test_config());
        assert!(reader.is_ok());
    }

    #[test]
    fn test_reader_rejects_bad_addresses() {
        let mut config = test_config();
        config.loan_contract = "not-an-address".to_string();
        let err = ChainReader::new(config).unwrap_err();
        assert!(matches!(err, ChainError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unreachable_providers_are_distinguishable() {
        let mut config = test_config();
        config.failover_urls.push("http://127.0.0.1:2".to_string());

        let reader = ChainReader::new(config).unwrap();
        let err = reader.get_chain_id().await.unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, ChainError::RpcUnavailable(_)));
    }
}
