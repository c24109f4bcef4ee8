//! Execution bookkeeping for dispatched actions.
//!
//! Every action run is identified by an [`ExecutionKey`]. The execution log
//! records one [`ExecutionStatus`] per key so that a redelivered occurrence
//! does not repeat side effects that already happened.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ActionExecutionError;
use crate::id::{OccurrenceId, PipelineId};
use crate::time::Timestamp;

/// `(pipeline, action index, triggering occurrence)`: the idempotency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExecutionKey {
    pub pipeline_id: PipelineId,
    pub action_index: usize,
    pub occurrence_id: OccurrenceId,
}

impl ExecutionKey {
    #[must_use]
    pub fn new(pipeline_id: PipelineId, action_index: usize, occurrence_id: OccurrenceId) -> Self {
        Self {
            pipeline_id,
            action_index,
            occurrence_id,
        }
    }
}

impl fmt::Display for ExecutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}@{}",
            self.pipeline_id, self.action_index, self.occurrence_id
        )
    }
}

/// State of one execution key in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    InProgress,
    Succeeded,
    Failed,
}

impl ExecutionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown execution status `{other}`")),
        }
    }
}

/// What happened to a single action during a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The email was handed to the mail transport.
    Sent,
    /// The webhook answered with a 2xx status.
    Delivered { status: u16 },
    /// Access was granted (or extended) until `expires_at`.
    Granted { expires_at: Timestamp },
    /// A previous delivery of the same occurrence already ran this action.
    Skipped,
    Failed(ActionExecutionError),
}

impl ActionOutcome {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent => f.write_str("sent"),
            Self::Delivered { status } => write!(f, "delivered({status})"),
            Self::Granted { expires_at } => write!(f, "granted(until {expires_at})"),
            Self::Skipped => f.write_str("skipped"),
            Self::Failed(err) => write!(f, "failed({err})"),
        }
    }
}

/// Outcome of one action within a [`DispatchReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReport {
    pub index: usize,
    pub action: &'static str,
    pub outcome: ActionOutcome,
}

/// Per-action outcomes of dispatching one matched pipeline, in action order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub pipeline_id: PipelineId,
    pub occurrence_id: OccurrenceId,
    pub actions: Vec<ActionReport>,
}

impl DispatchReport {
    #[must_use]
    pub fn failures(&self) -> usize {
        self.actions.iter().filter(|a| a.outcome.is_failure()).count()
    }

    #[must_use]
    pub fn outcome(&self, index: usize) -> Option<&ActionOutcome> {
        self.actions
            .iter()
            .find(|a| a.index == index)
            .map(|a| &a.outcome)
    }
}
