//! Polling loan monitor.
//!
//! # Responsibilities
//! - Fetch the loan record on a fixed cadence and on demand
//! - Apply the pure transition function and publish the result
//! - Retain the previous state when a read fails (fail safe)
//!
//! # Design Decisions
//! - One owned task does all fetching, so at most one read is in flight and
//!   results apply in completion order (a stale result can never overwrite a
//!   newer one)
//! - Force-checks go through a `Notify`; triggers arriving mid-fetch
//!   coalesce into a single follow-up fetch instead of queueing
//! - Subscribers get a `watch` channel; the latest snapshot is also kept in
//!   an `ArcSwap` for cheap synchronous reads

use alloy::primitives::Address;
use arc_swap::ArcSwap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::chain::reader::LoanReader;
use crate::chain::types::{now_unix, LoanSnapshot};
use crate::config::schema::MonitorConfig;
use crate::monitor::state::{next_state, LockState, MonitorSnapshot};
use crate::observability::metrics;

/// Shared surface for monitor consumers (shell, lock controller, unlock
/// confirmation). Cheap to clone.
#[derive(Clone)]
pub struct MonitorHandle {
    rx: watch::Receiver<MonitorSnapshot>,
    current: Arc<ArcSwap<MonitorSnapshot>>,
    force: Arc<Notify>,
}

impl MonitorHandle {
    /// Subscribe to snapshot publications.
    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.rx.clone()
    }

    /// Latest published snapshot without waiting.
    pub fn current(&self) -> Arc<MonitorSnapshot> {
        self.current.load_full()
    }

    /// Request an immediate out-of-cadence check. Requests issued while a
    /// fetch is in flight coalesce into one follow-up fetch.
    pub fn force_check(&self) {
        self.force.notify_one();
    }
}

/// The polling state machine. Owns its state; everything observable goes
/// through [`MonitorHandle`].
pub struct LoanMonitor<R> {
    reader: Arc<R>,
    borrower: Address,
    snapshot: MonitorSnapshot,
    tx: watch::Sender<MonitorSnapshot>,
    current: Arc<ArcSwap<MonitorSnapshot>>,
}

impl<R> LoanMonitor<R>
where
    R: LoanReader + Send + Sync + 'static,
{
    /// Start the monitor task. The first fetch happens immediately; after
    /// that the cadence is `config.poll_interval_secs`, plus any forced
    /// checks. The task exits on the shutdown signal.
    pub fn spawn(
        reader: Arc<R>,
        borrower: Address,
        config: MonitorConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> (MonitorHandle, JoinHandle<()>) {
        let initial = MonitorSnapshot::initial();
        let (tx, rx) = watch::channel(initial.clone());
        let current = Arc::new(ArcSwap::from_pointee(initial.clone()));
        let force = Arc::new(Notify::new());

        let handle = MonitorHandle {
            rx,
            current: current.clone(),
            force: force.clone(),
        };

        let mut monitor = LoanMonitor {
            reader,
            borrower,
            snapshot: initial,
            tx,
            current,
        };

        let poll_interval = Duration::from_secs(config.poll_interval_secs);
        let join = tokio::spawn(async move {
            tracing::info!(
                borrower = %monitor.borrower,
                interval_secs = poll_interval.as_secs(),
                "Loan monitor started"
            );

            let mut ticker = interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        monitor.poll().await;
                    }
                    _ = force.notified() => {
                        tracing::debug!("Forced loan status check");
                        monitor.poll().await;
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Loan monitor shutting down");
                        break;
                    }
                }
            }
        });

        (handle, join)
    }

    /// One fetch-and-publish cycle.
    async fn poll(&mut self) {
        match self.reader.get_active_loan(self.borrower).await {
            Ok(record) => {
                let state = next_state(record.as_ref());
                let now = now_unix();

                if state != self.snapshot.state {
                    tracing::info!(
                        from = %self.snapshot.state,
                        to = %state,
                        "Lock state transition"
                    );
                    metrics::record_lock_transition(state);
                }

                self.snapshot = MonitorSnapshot {
                    state,
                    loan: record.as_ref().map(|r| LoanSnapshot::from_record(r, now)),
                    verified_at: Some(now),
                    consecutive_failures: 0,
                };
                metrics::record_poll("success");
                metrics::record_lock_engaged(state.is_locked());
                self.publish();
            }
            Err(e) => {
                // Fail safe: a failed read never moves the state, and in
                // particular never unlocks. The stale verified_at lets the
                // shell say "unable to verify status".
                self.snapshot.consecutive_failures += 1;
                metrics::record_poll("failure");
                tracing::warn!(
                    error = %e,
                    consecutive_failures = self.snapshot.consecutive_failures,
                    state = %self.snapshot.state,
                    "Unable to verify loan status; retaining previous lock state"
                );
                self.publish();
            }
        }
    }

    fn publish(&self) {
        self.current.store(Arc::new(self.snapshot.clone()));
        self.tx.send_replace(self.snapshot.clone());
    }
}
