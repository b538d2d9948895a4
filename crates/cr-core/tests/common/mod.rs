// Each test binary compiles this module independently and uses a different
// subset of helpers, so unused-function warnings are expected.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use cr_core::error::{Result, RotationError};
use cr_core::models::{
    Candidate, CandidateSet, DirectoryAck, OwnershipRecord, RotationConfig,
};
use cr_core::services::directory::OwnershipStore;
use cr_core::services::handoff::HandoffExecutor;
use cr_core::services::platform::{ExecOutput, PodExecutor, PodObserver};
use cr_core::services::reconcile::ReconcileLoop;

pub const INUM: &str = "@!1234.5678.0002";

pub fn test_config() -> RotationConfig {
    RotationConfig {
        appliance_inum: INUM.into(),
        bind_dn: "cn=directory manager".into(),
        bind_password: "secret".into(),
        check_interval_secs: 60,
        ..Default::default()
    }
}

pub fn candidate(name: &str, ip: &str) -> Candidate {
    Candidate::new(name, "gluu", Some(ip))
}

pub fn record(owner: Option<&str>, enabled: bool) -> OwnershipRecord {
    OwnershipRecord {
        owner_address: owner.map(str::to_string),
        enabled,
        config_blob: None,
    }
}

/// Serves scripted listing results in order; once the script runs out the
/// last entry repeats.
pub struct FakeObserver {
    script: Mutex<VecDeque<Result<Vec<Candidate>>>>,
    last: Mutex<Vec<Candidate>>,
    pub calls: Mutex<usize>,
}

impl FakeObserver {
    pub fn with_pods(pods: Vec<Candidate>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(pods),
            calls: Mutex::new(0),
        })
    }

    pub fn scripted(script: Vec<Result<Vec<Candidate>>>, then: Vec<Candidate>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(then),
            calls: Mutex::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl PodObserver for FakeObserver {
    async fn list_candidates(&self, _label_selector: &str) -> Result<CandidateSet> {
        *self.calls.lock().unwrap() += 1;
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(result) => result.map(CandidateSet::new),
            None => Ok(CandidateSet::new(self.last.lock().unwrap().clone())),
        }
    }
}

/// Takes `delay` to answer each listing, so a cycle can be caught in flight.
pub struct SlowObserver {
    pub delay: Duration,
    pub pods: Vec<Candidate>,
    pub calls: Mutex<usize>,
}

impl SlowObserver {
    pub fn new(delay: Duration, pods: Vec<Candidate>) -> Arc<Self> {
        Arc::new(Self {
            delay,
            pods,
            calls: Mutex::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl PodObserver for SlowObserver {
    async fn list_candidates(&self, _label_selector: &str) -> Result<CandidateSet> {
        *self.calls.lock().unwrap() += 1;
        tokio::time::sleep(self.delay).await;
        Ok(CandidateSet::new(self.pods.clone()))
    }
}

/// Records every exec; scripts containing any of `failing` exit non-zero and
/// scripts containing any of `broken` fail at the transport level.
#[derive(Default)]
pub struct FakeExecutor {
    pub calls: Mutex<Vec<(String, String)>>,
    pub failing: Vec<&'static str>,
    pub broken: Vec<&'static str>,
}

impl FakeExecutor {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_on(fragments: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            failing: fragments,
            ..Default::default()
        })
    }

    pub fn broken_on(fragments: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            broken: fragments,
            ..Default::default()
        })
    }

    pub fn scripts(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(_, s)| s.clone()).collect()
    }

    pub fn targets(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }
}

#[async_trait]
impl PodExecutor for FakeExecutor {
    async fn exec(&self, target: &Candidate, script: &str) -> Result<ExecOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((target.name.clone(), script.to_string()));
        if self.broken.iter().any(|f| script.contains(f)) {
            return Err(RotationError::RemoteExecFailed {
                step: "exec".into(),
                target: target.target_label(),
                reason: "websocket closed".into(),
            });
        }
        if self.failing.iter().any(|f| script.contains(f)) {
            return Ok(ExecOutput {
                stdout: String::new(),
                stderr: "permission denied".into(),
                exit_code: Some(1),
            });
        }
        Ok(ExecOutput {
            exit_code: Some(0),
            ..Default::default()
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Healthy,
    Unreachable,
    Refusing,
}

/// In-memory ownership record with the same ack semantics as the directory.
pub struct FakeStore {
    pub record: Mutex<OwnershipRecord>,
    pub owner_updates: Mutex<Vec<String>>,
    pub config_updates: Mutex<Vec<String>>,
    pub reads: Mutex<usize>,
    pub mode: Mutex<StoreMode>,
}

impl FakeStore {
    pub fn new(record: OwnershipRecord) -> Arc<Self> {
        Arc::new(Self {
            record: Mutex::new(record),
            owner_updates: Mutex::new(Vec::new()),
            config_updates: Mutex::new(Vec::new()),
            reads: Mutex::new(0),
            mode: Mutex::new(StoreMode::Healthy),
        })
    }

    pub fn set_mode(&self, mode: StoreMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn current(&self) -> OwnershipRecord {
        self.record.lock().unwrap().clone()
    }

    pub fn owner_updates(&self) -> Vec<String> {
        self.owner_updates.lock().unwrap().clone()
    }

    fn ack(&self) -> Result<DirectoryAck> {
        match *self.mode.lock().unwrap() {
            StoreMode::Healthy => Ok(DirectoryAck::success()),
            StoreMode::Unreachable => Err(RotationError::DirectoryUnavailable(
                "connection refused".into(),
            )),
            StoreMode::Refusing => Ok(DirectoryAck {
                code: 50,
                message: "insufficient access rights".into(),
            }),
        }
    }
}

#[async_trait]
impl OwnershipStore for FakeStore {
    async fn read(&self, identifier: &str) -> Result<OwnershipRecord> {
        *self.reads.lock().unwrap() += 1;
        if identifier != INUM {
            return Err(RotationError::RecordNotFound(identifier.to_string()));
        }
        if *self.mode.lock().unwrap() == StoreMode::Unreachable {
            return Err(RotationError::DirectoryUnavailable("connection refused".into()));
        }
        Ok(self.current())
    }

    async fn update_owner(&self, _identifier: &str, new_address: &str) -> Result<DirectoryAck> {
        self.owner_updates.lock().unwrap().push(new_address.to_string());
        let ack = self.ack()?;
        if ack.is_success() {
            self.record.lock().unwrap().owner_address = Some(new_address.to_string());
        }
        Ok(ack)
    }

    async fn update_config(&self, _identifier: &str, value: &str) -> Result<DirectoryAck> {
        self.config_updates.lock().unwrap().push(value.to_string());
        self.ack()
    }
}

pub fn build_loop(
    observer: Arc<dyn PodObserver>,
    executor: Arc<FakeExecutor>,
    store: Arc<FakeStore>,
    config: &RotationConfig,
) -> ReconcileLoop {
    let handoff = HandoffExecutor::new(executor, store.clone(), config);
    ReconcileLoop::new(observer, store, handoff, config)
}
