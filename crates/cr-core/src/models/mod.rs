pub mod candidate;
pub mod config;
pub mod handoff;
pub mod record;

pub use candidate::{Candidate, CandidateSet};
pub use config::{DirectoryLayout, RotationConfig};
pub use handoff::{HandoffOutcome, HandoffPlan, HandoffStep, StepResult, StepStatus};
pub use record::{DirectoryAck, OwnershipRecord};
