//! # Schedule Model
//!
//! A preventive-maintenance definition tied to one asset with a recurrence cadence.
//!
//! ## Database Schema
//!
//! Maps to the `pm_schedules` table:
//! ```sql
//! CREATE TABLE pm_schedules (
//!   id BIGSERIAL PRIMARY KEY,
//!   title TEXT NOT NULL,
//!   description TEXT,
//!   frequency TEXT NOT NULL,  -- canonical: DAILY, WEEKLY, MONTHLY, QUARTERLY, YEARLY
//!   next_due TIMESTAMPTZ NOT NULL,
//!   asset_id BIGINT NOT NULL REFERENCES assets (id),
//!   -- ... audit fields
//! );
//! ```
//!
//! `frequency` only ever holds canonical values: every write path goes through
//! [`normalize`](crate::frequency::normalize) first.

use super::{Asset, ScheduleTask, Trigger, WorkOrder};
use crate::constants::ScheduleState;
use crate::frequency::Frequency;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Schedule {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub frequency: Frequency,
    pub next_due: DateTime<Utc>,
    pub asset_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New Schedule for creation (without generated fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSchedule {
    pub title: String,
    pub description: Option<String>,
    pub frequency: Frequency,
    pub next_due: DateTime<Utc>,
    pub asset_id: i64,
}

/// Column changes applied by an update. `None` leaves the column untouched.
///
/// There is deliberately no `asset_id`: a schedule never moves between assets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub frequency: Option<Frequency>,
    pub next_due: Option<DateTime<Utc>>,
}

impl ScheduleChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.frequency.is_none()
            && self.next_due.is_none()
    }

    /// Apply the changes to an in-memory copy of the schedule
    pub fn apply_to(&self, schedule: &mut Schedule) {
        if let Some(title) = &self.title {
            schedule.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            schedule.description = Some(description.clone());
        }
        if let Some(frequency) = self.frequency {
            schedule.frequency = frequency;
        }
        if let Some(next_due) = self.next_due {
            schedule.next_due = next_due;
        }
    }
}

/// A schedule together with everything the lifecycle operations touch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleWithRelations {
    pub schedule: Schedule,
    pub asset: Option<Asset>,
    /// Checklist in `order_index` order
    pub tasks: Vec<ScheduleTask>,
    pub trigger: Option<Trigger>,
    /// The schedule's open work order, if any
    pub open_work_order: Option<WorkOrder>,
    /// Whether `open_work_order` was materialized by this operation
    pub work_order_created: bool,
}

/// Read-path projection used by schedule listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub schedule: Schedule,
    pub asset: Option<Asset>,
    /// Most recent work orders first
    pub recent_work_orders: Vec<WorkOrder>,
    pub task_count: i64,
    pub work_order_count: i64,
    pub state: ScheduleState,
}
