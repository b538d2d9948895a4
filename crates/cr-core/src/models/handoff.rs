use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::candidate::Candidate;

/// A decided hand-off, consumed immediately by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffPlan {
    pub new_owner: Candidate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_owner_address: Option<String>,
    /// Tracked configuration value to re-write once the owner moves.
    #[serde(skip)]
    pub config_blob: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandoffStep {
    RemoveSnapshots,
    RecreateSnapshots,
    ChownSnapshots,
    UpdateOwner,
    PropagateConfig,
}

impl HandoffStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandoffStep::RemoveSnapshots => "remove-snapshots",
            HandoffStep::RecreateSnapshots => "recreate-snapshots",
            HandoffStep::ChownSnapshots => "chown-snapshots",
            HandoffStep::UpdateOwner => "update-owner",
            HandoffStep::PropagateConfig => "propagate-config",
        }
    }
}

impl fmt::Display for HandoffStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "cause")]
pub enum StepStatus {
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    pub step: HandoffStep,
    #[serde(flatten)]
    pub status: StepStatus,
}

impl StepResult {
    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Succeeded
    }
}

/// Per-step results of one hand-off, in execution order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffOutcome {
    pub new_owner: Candidate,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepResult>,
}

impl HandoffOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.steps.iter().all(StepResult::is_success)
    }

    pub fn failed_steps(&self) -> Vec<HandoffStep> {
        self.steps
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| r.step)
            .collect()
    }

    pub fn step_order(&self) -> Vec<HandoffStep> {
        self.steps.iter().map(|r| r.step).collect()
    }
}
