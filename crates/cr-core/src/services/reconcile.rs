use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::error::Result;
use crate::models::{HandoffOutcome, OwnershipRecord, RotationConfig};

use super::decision::{decide, Decision, NoHandoffReason};
use super::directory::OwnershipStore;
use super::handoff::HandoffExecutor;
use super::platform::PodObserver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Reconciling,
    Stopped,
}

/// What one observe-decide-act pass saw and did.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub candidate_count: usize,
    pub record: OwnershipRecord,
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<HandoffOutcome>,
}

pub struct ReconcileLoop {
    observer: Arc<dyn PodObserver>,
    store: Arc<dyn OwnershipStore>,
    executor: HandoffExecutor,
    identifier: String,
    label_selector: String,
    interval: Duration,
    state: watch::Sender<LoopState>,
    cycles: u64,
}

impl ReconcileLoop {
    pub fn new(
        observer: Arc<dyn PodObserver>,
        store: Arc<dyn OwnershipStore>,
        executor: HandoffExecutor,
        config: &RotationConfig,
    ) -> Self {
        Self {
            observer,
            store,
            executor,
            identifier: config.appliance_inum.clone(),
            label_selector: config.label_selector.clone(),
            interval: config.check_interval(),
            state: watch::Sender::new(LoopState::Idle),
            cycles: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Follow state transitions while `run` holds the loop.
    pub fn watch_state(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    /// Number of cycles run so far, failed ones included.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Tick until `shutdown` flips to `true` or its sender goes away.
    ///
    /// The first cycle runs immediately. A cycle that has started always runs
    /// to completion; only the wait between cycles is interruptible. Errors
    /// inside a cycle are logged and never end the loop.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            selector = %self.label_selector,
            "cache refresh rotation loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            if *shutdown.borrow() {
                break;
            }

            self.state.send_replace(LoopState::Reconciling);
            if let Err(e) = self.run_cycle().await {
                tracing::error!(error = %e, "reconciliation cycle failed");
            }
            self.cycles += 1;
            self.state.send_replace(LoopState::Idle);
        }

        self.state.send_replace(LoopState::Stopped);
        tracing::warn!("canceled; exiting rotation loop");
    }

    /// One observe-decide-act pass. The candidate set is captured once and
    /// used for both the decision and the hand-off.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let candidates = self.observer.list_candidates(&self.label_selector).await?;
        tracing::debug!(
            count = candidates.len(),
            addresses = ?candidates.addresses(),
            "observed candidates"
        );

        let record = self.store.read(&self.identifier).await?;
        let decision = decide(&candidates, &record);
        let current = record.owner_address.as_deref().unwrap_or("");

        let outcome = match &decision {
            Decision::None {
                reason: NoHandoffReason::Disabled,
            } => {
                tracing::warn!("cache refresh is found to be disabled");
                None
            }
            Decision::None {
                reason: NoHandoffReason::OwnerHealthy,
            } => {
                tracing::debug!(owner = current, "current owner is alive; nothing to do");
                None
            }
            Decision::None {
                reason: NoHandoffReason::NoCandidates,
            } => {
                tracing::info!(
                    owner = current,
                    selector = %self.label_selector,
                    "no live candidate to hand cache refresh to"
                );
                None
            }
            Decision::Handoff { plan } => {
                tracing::info!(owner = current, "current cache refresh owner is gone");
                Some(self.executor.execute(plan).await)
            }
        };

        Ok(CycleReport {
            candidate_count: candidates.len(),
            record,
            decision,
            outcome,
        })
    }
}
