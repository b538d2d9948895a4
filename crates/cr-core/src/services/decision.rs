use serde::Serialize;

use crate::models::{CandidateSet, HandoffPlan, OwnershipRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoHandoffReason {
    /// Cache refresh is switched off in the directory.
    Disabled,
    /// The recorded owner is still among the live candidates.
    OwnerHealthy,
    /// No live candidate with an address to hand off to.
    NoCandidates,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "decision")]
pub enum Decision {
    None { reason: NoHandoffReason },
    Handoff { plan: HandoffPlan },
}

impl Decision {
    pub fn plan(&self) -> Option<&HandoffPlan> {
        match self {
            Decision::Handoff { plan } => Some(plan),
            Decision::None { .. } => None,
        }
    }
}

/// Decide whether ownership must move, and to whom.
///
/// Presence of the recorded owner's address among the live candidates is the
/// only health signal. When a hand-off is needed the new owner is the first
/// addressed candidate in `(name, namespace)` order, so the result does not
/// depend on the order the platform listed pods in.
pub fn decide(candidates: &CandidateSet, record: &OwnershipRecord) -> Decision {
    if !record.enabled {
        return Decision::None {
            reason: NoHandoffReason::Disabled,
        };
    }

    let current = record.owner_address.as_deref();
    if let Some(owner) = current {
        if candidates.contains_address(owner) {
            return Decision::None {
                reason: NoHandoffReason::OwnerHealthy,
            };
        }
    }

    let new_owner = candidates
        .sorted()
        .into_iter()
        .find(|c| c.address.is_some() && c.address.as_deref() != current);

    match new_owner {
        Some(candidate) => Decision::Handoff {
            plan: HandoffPlan {
                new_owner: candidate.clone(),
                previous_owner_address: record.owner_address.clone(),
                config_blob: record.config_blob.clone(),
            },
        },
        None => Decision::None {
            reason: NoHandoffReason::NoCandidates,
        },
    }
}
