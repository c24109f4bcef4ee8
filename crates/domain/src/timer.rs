//! Durable timers for deferred actions (access expiration, reminders).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::execution::ExecutionKey;
use crate::id::{FormId, UserId};
use crate::time::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Revokes the access grant, if the owning run still owns it.
    Expiration,
    /// Notifies the subject that access is about to expire. Never revokes.
    Reminder,
}

impl TimerKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expiration => "expiration",
            Self::Reminder => "reminder",
        }
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expiration" => Ok(Self::Expiration),
            "reminder" => Ok(Self::Reminder),
            other => Err(format!("unknown timer kind `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    Pending,
    Fired,
    /// Fired but found nothing to do (grant revoked or owned by a newer run).
    Superseded,
}

impl TimerState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fired => "fired",
            Self::Superseded => "superseded",
        }
    }
}

impl FromStr for TimerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "fired" => Ok(Self::Fired),
            "superseded" => Ok(Self::Superseded),
            other => Err(format!("unknown timer state `{other}`")),
        }
    }
}

/// A persisted deferred action, unique per `(key, kind)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTimer {
    pub key: ExecutionKey,
    pub kind: TimerKind,
    pub fire_at: Timestamp,
    pub form_id: FormId,
    pub user_id: UserId,
    /// Where reminder notifications go, when known.
    pub email: Option<String>,
    pub state: TimerState,
}

impl ScheduledTimer {
    #[must_use]
    pub fn pending(
        key: ExecutionKey,
        kind: TimerKind,
        fire_at: Timestamp,
        form_id: FormId,
        user_id: UserId,
        email: Option<String>,
    ) -> Self {
        Self {
            key,
            kind,
            fire_at,
            form_id,
            user_id,
            email,
            state: TimerState::Pending,
        }
    }

    #[must_use]
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.state == TimerState::Pending && self.fire_at <= now
    }
}

impl fmt::Display for ScheduledTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.key)
    }
}
