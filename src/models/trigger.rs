//! # Trigger Model
//!
//! The persisted recurrence-interval record driving when a schedule next fires.
//! Exactly one active trigger exists per schedule and exactly one of its
//! interval columns is set.

use crate::constants::TriggerType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Maps to the `pm_triggers` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Trigger {
    pub id: i64,
    pub schedule_id: i64,
    #[sqlx(try_from = "String")]
    pub trigger_type: TriggerType,
    pub interval_days: Option<i32>,
    pub interval_weeks: Option<i32>,
    pub interval_months: Option<i32>,
    pub is_active: bool,
    pub last_triggered: Option<DateTime<Utc>>,
}

impl Trigger {
    pub fn interval(&self) -> IntervalFields {
        IntervalFields {
            days: self.interval_days,
            weeks: self.interval_weeks,
            months: self.interval_months,
        }
    }
}

/// Interval columns of a trigger; exactly one is expected to be set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalFields {
    pub days: Option<i32>,
    pub weeks: Option<i32>,
    pub months: Option<i32>,
}

impl IntervalFields {
    pub fn days(days: i32) -> Self {
        Self {
            days: Some(days),
            ..Self::default()
        }
    }

    pub fn weeks(weeks: i32) -> Self {
        Self {
            weeks: Some(weeks),
            ..Self::default()
        }
    }

    pub fn months(months: i32) -> Self {
        Self {
            months: Some(months),
            ..Self::default()
        }
    }

    /// Number of interval columns that carry a value
    pub fn set_count(&self) -> usize {
        [self.days, self.weeks, self.months]
            .iter()
            .filter(|field| field.is_some())
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTrigger {
    pub schedule_id: i64,
    pub trigger_type: TriggerType,
    pub interval: IntervalFields,
    pub is_active: bool,
}
