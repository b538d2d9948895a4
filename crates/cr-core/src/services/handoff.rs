use std::borrow::Cow;
use std::sync::Arc;

use chrono::Utc;

use crate::error::RotationError;
use crate::models::{
    Candidate, HandoffOutcome, HandoffPlan, HandoffStep, RotationConfig, StepResult, StepStatus,
};

use super::directory::OwnershipStore;
use super::platform::PodExecutor;

/// Carries out a hand-off: wipe the snapshot directory on the new owner,
/// then point the directory record at it.
///
/// Every planned step is attempted even when an earlier one failed, and
/// nothing is rolled back. The next reconciliation cycle is the retry.
pub struct HandoffExecutor {
    pods: Arc<dyn PodExecutor>,
    store: Arc<dyn OwnershipStore>,
    identifier: String,
    snapshot_dir: String,
    snapshot_owner: Option<String>,
}

impl HandoffExecutor {
    pub fn new(
        pods: Arc<dyn PodExecutor>,
        store: Arc<dyn OwnershipStore>,
        config: &RotationConfig,
    ) -> Self {
        Self {
            pods,
            store,
            identifier: config.appliance_inum.clone(),
            snapshot_dir: config.snapshot_dir.clone(),
            snapshot_owner: config.snapshot_owner.clone(),
        }
    }

    /// Steps `execute` will run for `plan`, in order.
    pub fn planned_steps(&self, plan: &HandoffPlan) -> Vec<HandoffStep> {
        let mut steps = vec![HandoffStep::RemoveSnapshots, HandoffStep::RecreateSnapshots];
        if self.snapshot_owner.is_some() {
            steps.push(HandoffStep::ChownSnapshots);
        }
        steps.push(HandoffStep::UpdateOwner);
        if plan.config_blob.is_some() {
            steps.push(HandoffStep::PropagateConfig);
        }
        steps
    }

    pub async fn execute(&self, plan: &HandoffPlan) -> HandoffOutcome {
        let target = &plan.new_owner;
        let started_at = Utc::now();
        tracing::info!(
            pod = %target.name,
            namespace = %target.namespace,
            address = target.address.as_deref().unwrap_or(""),
            previous = plan.previous_owner_address.as_deref().unwrap_or(""),
            "handing cache refresh over"
        );

        let mut steps = Vec::new();
        for step in self.planned_steps(plan) {
            let status = match self.run_step(step, plan).await {
                Ok(()) => {
                    tracing::info!(step = %step, pod = %target.name, "handoff step succeeded");
                    StepStatus::Succeeded
                }
                Err(e) => {
                    tracing::warn!(
                        step = %step,
                        pod = %target.name,
                        namespace = %target.namespace,
                        error = %e,
                        "handoff step failed"
                    );
                    StepStatus::Failed(e.to_string())
                }
            };
            steps.push(StepResult { step, status });
        }

        let outcome = HandoffOutcome {
            new_owner: target.clone(),
            started_at,
            finished_at: Utc::now(),
            steps,
        };
        if outcome.all_succeeded() {
            tracing::info!(pod = %target.name, "cache refresh config has been updated");
        } else {
            tracing::warn!(
                pod = %target.name,
                failed = ?outcome.failed_steps(),
                "handoff finished with failed steps"
            );
        }
        outcome
    }

    async fn run_step(&self, step: HandoffStep, plan: &HandoffPlan) -> Result<(), RotationError> {
        let target = &plan.new_owner;
        let dir = quote(&self.snapshot_dir);
        match step {
            HandoffStep::RemoveSnapshots => {
                self.run_remote(step, target, &format!("rm -rf {dir}")).await
            }
            HandoffStep::RecreateSnapshots => {
                self.run_remote(step, target, &format!("mkdir -p {dir}")).await
            }
            HandoffStep::ChownSnapshots => {
                let owner = self.snapshot_owner.as_deref().unwrap_or_default();
                self.run_remote(step, target, &format!("chown -R {} {dir}", quote(owner)))
                    .await
            }
            HandoffStep::UpdateOwner => {
                let address = target.address.as_deref().ok_or_else(|| {
                    RotationError::InvalidConfig(format!(
                        "candidate {} has no address",
                        target.target_label()
                    ))
                })?;
                let ack = self.store.update_owner(&self.identifier, address).await?;
                check_ack(ack.code, ack.message)
            }
            HandoffStep::PropagateConfig => {
                let blob = plan.config_blob.as_deref().unwrap_or_default();
                let ack = self.store.update_config(&self.identifier, blob).await?;
                check_ack(ack.code, ack.message)
            }
        }
    }

    async fn run_remote(
        &self,
        step: HandoffStep,
        target: &Candidate,
        script: &str,
    ) -> Result<(), RotationError> {
        tracing::debug!(step = %step, pod = %target.name, script, "running remote command");
        let output = self
            .pods
            .exec(target, script)
            .await
            .map_err(|e| match e {
                RotationError::RemoteExecFailed { target, reason, .. } => {
                    RotationError::RemoteExecFailed {
                        step: step.to_string(),
                        target,
                        reason,
                    }
                }
                other => other,
            })?;

        if output.success() {
            return Ok(());
        }
        let exit = output
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unknown".into());
        Err(RotationError::RemoteExecFailed {
            step: step.to_string(),
            target: target.target_label(),
            reason: format!("exit {exit}: {}", output.stderr),
        })
    }
}

fn check_ack(code: u32, message: String) -> Result<(), RotationError> {
    if code == 0 {
        Ok(())
    } else {
        Err(RotationError::DirectoryRejected { code, message })
    }
}

fn quote(value: &str) -> String {
    shell_escape::escape(Cow::Borrowed(value)).into_owned()
}
