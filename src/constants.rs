//! # Status Vocabularies
//!
//! Closed value sets shared by schedules, triggers and work orders. All of them
//! persist as SCREAMING_SNAKE_CASE text so the database stays readable from the
//! rest of the platform.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stored text value that is not part of its vocabulary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct InvalidValue(pub String);

/// `TryFrom<String>` for text-backed enums, used when decoding database rows
macro_rules! text_column {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl TryFrom<String> for $ty {
                type Error = $crate::constants::InvalidValue;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    value.parse().map_err($crate::constants::InvalidValue)
                }
            }
        )+
    };
}

pub(crate) use text_column;

text_column!(WorkOrderStatus, Priority, WorkOrderTaskStatus, TriggerType);

/// Lifecycle status of a work order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkOrderStatus {
    /// Created and waiting for a technician
    #[default]
    Open,
    /// Work has started
    InProgress,
    /// Blocked on parts, access or approval
    OnHold,
    /// Work finished
    Completed,
    /// Work abandoned
    Canceled,
}

impl WorkOrderStatus {
    /// Statuses that no longer count as open work
    pub const TERMINAL: [WorkOrderStatus; 2] = [Self::Completed, Self::Canceled];

    /// Check if this is a terminal state (no further work expected)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Canceled)
    }

    /// Open work is anything not yet terminal
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::InProgress => "IN_PROGRESS",
            Self::OnHold => "ON_HOLD",
            Self::Completed => "COMPLETED",
            Self::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkOrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(Self::Open),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "ON_HOLD" => Ok(Self::OnHold),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELED" => Ok(Self::Canceled),
            _ => Err(format!("Invalid work order status: {s}")),
        }
    }
}

/// Work order priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "URGENT" => Ok(Self::Urgent),
            _ => Err(format!("Invalid priority: {s}")),
        }
    }
}

/// Checklist item status inside a work order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkOrderTaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Skipped,
}

impl WorkOrderTaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for WorkOrderTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkOrderTaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_STARTED" => Ok(Self::NotStarted),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            "SKIPPED" => Ok(Self::Skipped),
            _ => Err(format!("Invalid work order task status: {s}")),
        }
    }
}

/// What drives a trigger. Only calendar intervals are modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    #[default]
    TimeBased,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TimeBased => "TIME_BASED",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TriggerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TIME_BASED" => Ok(Self::TimeBased),
            _ => Err(format!("Invalid trigger type: {s}")),
        }
    }
}

/// Schedule state derived from the work orders it has generated.
///
/// Only states a committed schedule can be observed in are represented. A schedule
/// being created is not visible yet, and a deleted one has no row to derive from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleState {
    ActiveWithOpenWork,
    ActiveNoOpenWork,
}

impl ScheduleState {
    /// Derive the state of a persisted schedule from the statuses of its work orders
    pub fn derive<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = WorkOrderStatus>,
    {
        if statuses.into_iter().any(|status| status.is_open()) {
            Self::ActiveWithOpenWork
        } else {
            Self::ActiveNoOpenWork
        }
    }

    /// Whether the next update would materialize a fresh work order
    pub fn needs_materialization(&self) -> bool {
        matches!(self, Self::ActiveNoOpenWork)
    }
}

impl fmt::Display for ScheduleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActiveWithOpenWork => write!(f, "ACTIVE_WITH_OPEN_WORK"),
            Self::ActiveNoOpenWork => write!(f, "ACTIVE_NO_OPEN_WORK"),
        }
    }
}
