//! Shared test doubles: a scripted chain and a recording pinning device.

use alloy::primitives::{Address, TxHash, U256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use loan_lock::chain::contract::{LoanWriter, TxOutcome};
use loan_lock::chain::reader::LoanReader;
use loan_lock::chain::types::{ChainError, ChainResult, LoanRecord, LoanStatus, TokenAllowanceInfo};
use loan_lock::device::{DevicePinning, PinningError};

/// Everything observable about the scripted chain, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    ApproveSubmitted(U256),
    ApproveConfirmed(U256),
    PaySubmitted(U256),
    PayConfirmed(U256),
    PayReverted(U256),
    RequestSubmitted(U256),
    RequestConfirmed(U256),
    RequestReverted,
}

#[derive(Debug, Clone)]
enum PendingTx {
    Approve(U256),
    PayBack {
        amount: U256,
        /// Allowance at submission time decides whether the payment clears;
        /// a payment broadcast before its approval confirms must revert.
        allowance_at_submit: U256,
    },
    Request {
        amount: U256,
        due: u64,
    },
}

struct ChainState {
    loan: Option<LoanRecord>,
    balance: U256,
    allowance: U256,
    contract_balance: U256,
    fail_reads: bool,
    read_delay: Duration,
    read_count: u32,
    events: Vec<ChainEvent>,
    pending: HashMap<TxHash, PendingTx>,
    next_tx: u64,
    next_block: u64,
}

/// An in-memory loan contract + token with scripted behavior.
#[derive(Clone)]
pub struct ScriptedChain {
    inner: Arc<Mutex<ChainState>>,
}

#[allow(dead_code)]
impl ScriptedChain {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ChainState {
                loan: None,
                balance: U256::ZERO,
                allowance: U256::ZERO,
                contract_balance: U256::ZERO,
                fail_reads: false,
                read_delay: Duration::ZERO,
                read_count: 0,
                events: Vec::new(),
                pending: HashMap::new(),
                next_tx: 1,
                next_block: 100,
            })),
        }
    }

    pub fn set_loan(&self, loan: Option<LoanRecord>) {
        self.inner.lock().unwrap().loan = loan;
    }

    pub fn set_balance(&self, balance: U256) {
        self.inner.lock().unwrap().balance = balance;
    }

    pub fn set_allowance(&self, allowance: U256) {
        self.inner.lock().unwrap().allowance = allowance;
    }

    pub fn set_contract_balance(&self, balance: U256) {
        self.inner.lock().unwrap().contract_balance = balance;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.lock().unwrap().fail_reads = fail;
    }

    pub fn set_read_delay(&self, delay: Duration) {
        self.inner.lock().unwrap().read_delay = delay;
    }

    pub fn events(&self) -> Vec<ChainEvent> {
        self.inner.lock().unwrap().events.clone()
    }

    pub fn read_count(&self) -> u32 {
        self.inner.lock().unwrap().read_count
    }

    pub fn loan(&self) -> Option<LoanRecord> {
        self.inner.lock().unwrap().loan.clone()
    }

    fn submit(&self, pending: PendingTx, event: ChainEvent) -> TxHash {
        let mut state = self.inner.lock().unwrap();
        let hash = TxHash::from(U256::from(state.next_tx));
        state.next_tx += 1;
        state.events.push(event);
        state.pending.insert(hash, pending);
        hash
    }
}

impl LoanReader for ScriptedChain {
    fn get_active_loan(
        &self,
        _borrower: Address,
    ) -> impl Future<Output = ChainResult<Option<LoanRecord>>> + Send {
        let inner = self.inner.clone();
        async move {
            let delay = inner.lock().unwrap().read_delay;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let mut state = inner.lock().unwrap();
            state.read_count += 1;
            if state.fail_reads {
                return Err(ChainError::RpcUnavailable("scripted outage".into()));
            }
            Ok(state.loan.clone())
        }
    }

    fn get_token_info(
        &self,
        _holder: Address,
    ) -> impl Future<Output = ChainResult<TokenAllowanceInfo>> + Send {
        let inner = self.inner.clone();
        async move {
            let state = inner.lock().unwrap();
            if state.fail_reads {
                return Err(ChainError::RpcUnavailable("scripted outage".into()));
            }
            Ok(TokenAllowanceInfo {
                balance: state.balance,
                allowance: state.allowance,
            })
        }
    }

    fn get_contract_balance(&self) -> impl Future<Output = ChainResult<U256>> + Send {
        let inner = self.inner.clone();
        async move {
            let state = inner.lock().unwrap();
            if state.fail_reads {
                return Err(ChainError::RpcUnavailable("scripted outage".into()));
            }
            Ok(state.contract_balance)
        }
    }

    fn has_active_loan(
        &self,
        _borrower: Address,
    ) -> impl Future<Output = ChainResult<bool>> + Send {
        let inner = self.inner.clone();
        async move {
            let state = inner.lock().unwrap();
            if state.fail_reads {
                return Err(ChainError::RpcUnavailable("scripted outage".into()));
            }
            Ok(state
                .loan
                .as_ref()
                .is_some_and(|l| matches!(l.status, LoanStatus::Active | LoanStatus::Overdue)))
        }
    }
}

impl LoanWriter for ScriptedChain {
    fn submit_request_loan(
        &self,
        amount: U256,
        max_payment_date: u64,
    ) -> impl Future<Output = ChainResult<TxHash>> + Send {
        let hash = self.submit(
            PendingTx::Request {
                amount,
                due: max_payment_date,
            },
            ChainEvent::RequestSubmitted(amount),
        );
        async move { Ok(hash) }
    }

    fn submit_pay_back(&self, amount: U256) -> impl Future<Output = ChainResult<TxHash>> + Send {
        let allowance_at_submit = self.inner.lock().unwrap().allowance;
        let hash = self.submit(
            PendingTx::PayBack {
                amount,
                allowance_at_submit,
            },
            ChainEvent::PaySubmitted(amount),
        );
        async move { Ok(hash) }
    }

    fn submit_approve(
        &self,
        _spender: Address,
        amount: U256,
    ) -> impl Future<Output = ChainResult<TxHash>> + Send {
        let hash = self.submit(PendingTx::Approve(amount), ChainEvent::ApproveSubmitted(amount));
        async move { Ok(hash) }
    }

    fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = ChainResult<TxOutcome>> + Send {
        let inner = self.inner.clone();
        async move {
            let mut state = inner.lock().unwrap();
            let pending = state
                .pending
                .remove(&tx_hash)
                .ok_or_else(|| ChainError::RpcUnavailable("unknown transaction".into()))?;
            state.next_block += 1;
            let block_number = state.next_block;

            match pending {
                PendingTx::Approve(amount) => {
                    state.allowance = amount;
                    state.events.push(ChainEvent::ApproveConfirmed(amount));
                    Ok(TxOutcome::Confirmed { block_number })
                }
                PendingTx::PayBack {
                    amount,
                    allowance_at_submit,
                } => {
                    if allowance_at_submit < amount {
                        state.events.push(ChainEvent::PayReverted(amount));
                        return Ok(TxOutcome::Reverted);
                    }
                    state.balance -= amount;
                    state.allowance -= amount;
                    if let Some(loan) = state.loan.as_mut() {
                        if amount >= loan.principal {
                            loan.status = LoanStatus::Paid;
                        } else {
                            loan.principal -= amount;
                        }
                    }
                    state.events.push(ChainEvent::PayConfirmed(amount));
                    Ok(TxOutcome::Confirmed { block_number })
                }
                PendingTx::Request { amount, due } => {
                    let outstanding = state
                        .loan
                        .as_ref()
                        .is_some_and(|l| matches!(l.status, LoanStatus::Active | LoanStatus::Overdue));
                    if outstanding {
                        state.events.push(ChainEvent::RequestReverted);
                        return Ok(TxOutcome::Reverted);
                    }
                    state.loan = Some(LoanRecord {
                        principal: amount,
                        max_payment_date: due,
                        status: LoanStatus::Active,
                        created_at: 0,
                        is_overdue_flag: false,
                    });
                    state.events.push(ChainEvent::RequestConfirmed(amount));
                    Ok(TxOutcome::Confirmed { block_number })
                }
            }
        }
    }
}

/// Pinning device that records the calls made against it.
#[derive(Default)]
pub struct RecordingPinning {
    calls: Mutex<Vec<&'static str>>,
}

#[allow(dead_code)]
impl RecordingPinning {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

impl DevicePinning for RecordingPinning {
    fn start_pinning(&self) -> Result<(), PinningError> {
        self.calls.lock().unwrap().push("start_pinning");
        Ok(())
    }

    fn stop_pinning(&self) -> Result<(), PinningError> {
        self.calls.lock().unwrap().push("stop_pinning");
        Ok(())
    }

    fn disable_exit_gesture(&self) -> Result<(), PinningError> {
        self.calls.lock().unwrap().push("disable_exit_gesture");
        Ok(())
    }

    fn enable_exit_gesture(&self) -> Result<(), PinningError> {
        self.calls.lock().unwrap().push("enable_exit_gesture");
        Ok(())
    }
}

/// An overdue loan of `principal` wei.
#[allow(dead_code)]
pub fn overdue_loan(principal: u64) -> LoanRecord {
    LoanRecord {
        principal: U256::from(principal),
        max_payment_date: 1_700_000_000,
        status: LoanStatus::Overdue,
        created_at: 1_690_000_000,
        is_overdue_flag: true,
    }
}

/// An active, in-good-standing loan of `principal` wei.
#[allow(dead_code)]
pub fn active_loan(principal: u64) -> LoanRecord {
    LoanRecord {
        principal: U256::from(principal),
        max_payment_date: 4_000_000_000,
        status: LoanStatus::Active,
        created_at: 1_690_000_000,
        is_overdue_flag: false,
    }
}
