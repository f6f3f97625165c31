//! # Orchestration Types
//!
//! Inputs and results of the schedule lifecycle operations.
//!
//! Updates arrive as one loosely shaped [`UpdateSchedulePayload`]. It is split into
//! two explicit inputs before anything is written: [`ScheduleUpdateInput`] holds
//! what may change on the schedule itself, [`WorkOrderSeedInput`] holds values
//! that only ever seed a newly materialized work order. Nothing in the seed is
//! written to the schedule.

use crate::constants::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything needed to create a schedule.
///
/// There is no organization here: the owning organization is passed to
/// `create_schedule` from the authenticated session. An `organization_id` key in a
/// client payload is ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateScheduleInput {
    pub title: String,
    pub description: Option<String>,
    /// Free-text recurrence; normalized before it is stored
    pub frequency: Option<String>,
    pub asset_id: i64,
    /// Checklist task templates, in order
    #[serde(default)]
    pub task_ids: Vec<i64>,
    /// Explicit first due date; computed from now and the frequency when absent
    pub next_due: Option<DateTime<Utc>>,
    pub priority: Option<Priority>,
    pub estimated_hours: Option<f64>,
    pub assigned_to_id: Option<i64>,
}

impl CreateScheduleInput {
    pub fn new(title: impl Into<String>, asset_id: i64) -> Self {
        Self {
            title: title.into(),
            description: None,
            frequency: None,
            asset_id,
            task_ids: Vec::new(),
            next_due: None,
            priority: None,
            estimated_hours: None,
            assigned_to_id: None,
        }
    }

    pub fn with_frequency(mut self, frequency: impl Into<String>) -> Self {
        self.frequency = Some(frequency.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tasks(mut self, task_ids: Vec<i64>) -> Self {
        self.task_ids = task_ids;
        self
    }

    pub fn with_next_due(mut self, next_due: DateTime<Utc>) -> Self {
        self.next_due = Some(next_due);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_assignee(mut self, assigned_to_id: i64) -> Self {
        self.assigned_to_id = Some(assigned_to_id);
        self
    }

    pub fn with_estimated_hours(mut self, hours: f64) -> Self {
        self.estimated_hours = Some(hours);
        self
    }

    /// Work-order-only values carried by this input, scoped to the session organization
    pub fn seed(&self, organization_id: i64) -> WorkOrderSeedInput {
        WorkOrderSeedInput {
            organization_id,
            priority: self.priority,
            estimated_hours: self.estimated_hours,
            assigned_to_id: self.assigned_to_id,
        }
    }
}

/// Partial update as received from the API layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateSchedulePayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub frequency: Option<String>,
    pub next_due: Option<DateTime<Utc>>,
    /// Replaces the checklist wholesale when present
    pub task_ids: Option<Vec<i64>>,
    /// Accepted for compatibility; a schedule never changes asset
    pub asset_id: Option<i64>,
    pub priority: Option<Priority>,
    pub estimated_hours: Option<f64>,
    pub assigned_to_id: Option<i64>,
}

impl UpdateSchedulePayload {
    /// Split into schedule changes and work order seed values.
    ///
    /// `asset_id` is dropped here.
    pub fn split(self, organization_id: i64) -> (ScheduleUpdateInput, WorkOrderSeedInput) {
        let schedule = ScheduleUpdateInput {
            title: self.title,
            description: self.description,
            frequency: self.frequency,
            next_due: self.next_due,
            task_ids: self.task_ids,
        };
        let seed = WorkOrderSeedInput {
            organization_id,
            priority: self.priority,
            estimated_hours: self.estimated_hours,
            assigned_to_id: self.assigned_to_id,
        };
        (schedule, seed)
    }
}

/// Fields of an update that apply to the schedule entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleUpdateInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub frequency: Option<String>,
    pub next_due: Option<DateTime<Utc>>,
    pub task_ids: Option<Vec<i64>>,
}

/// Values used only when a work order is materialized
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderSeedInput {
    pub organization_id: i64,
    pub priority: Option<Priority>,
    pub estimated_hours: Option<f64>,
    pub assigned_to_id: Option<i64>,
}

/// Why a bulk delete left a schedule alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotFound,
    OtherOrganization,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSkip {
    pub schedule_id: i64,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub schedule_id: i64,
    pub error: String,
}

/// Aggregate outcome of a bulk delete. Counts only include committed deletes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDeleteResult {
    pub deleted_schedules: u64,
    pub deleted_work_orders: u64,
    pub processed_ids: Vec<i64>,
    pub skipped: Vec<BulkSkip>,
    pub failures: Vec<BulkFailure>,
}

impl BulkDeleteResult {
    pub fn is_complete_success(&self) -> bool {
        self.skipped.is_empty() && self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_work_order_fields_off_the_schedule() {
        let payload = UpdateSchedulePayload {
            title: Some("Grease bearings".to_string()),
            frequency: Some("weekly".to_string()),
            asset_id: Some(99),
            priority: Some(Priority::High),
            estimated_hours: Some(1.5),
            assigned_to_id: Some(12),
            ..Default::default()
        };

        let (schedule, seed) = payload.split(3);

        assert_eq!(schedule.title.as_deref(), Some("Grease bearings"));
        assert_eq!(schedule.frequency.as_deref(), Some("weekly"));
        assert_eq!(
            seed,
            WorkOrderSeedInput {
                organization_id: 3,
                priority: Some(Priority::High),
                estimated_hours: Some(1.5),
                assigned_to_id: Some(12),
            }
        );
    }

    #[test]
    fn test_payload_deserializes_from_partial_json() {
        let payload: UpdateSchedulePayload =
            serde_json::from_value(serde_json::json!({ "frequency": "quarterly", "priority": "URGENT" }))
                .unwrap();
        assert_eq!(payload.frequency.as_deref(), Some("quarterly"));
        assert_eq!(payload.priority, Some(Priority::Urgent));
        assert!(payload.title.is_none());
    }

    #[test]
    fn test_create_input_seed() {
        let input = CreateScheduleInput::new("Lube Pump", 7)
            .with_priority(Priority::Low)
            .with_assignee(4);
        let seed = input.seed(1);
        assert_eq!(seed.organization_id, 1);
        assert_eq!(seed.priority, Some(Priority::Low));
        assert_eq!(seed.assigned_to_id, Some(4));
        assert_eq!(seed.estimated_hours, None);
    }

    #[test]
    fn test_create_payload_cannot_carry_an_organization() {
        let input: CreateScheduleInput = serde_json::from_value(serde_json::json!({
            "title": "Lube Pump",
            "description": null,
            "frequency": "weekly",
            "asset_id": 7,
            "organization_id": 999,
            "next_due": null,
            "priority": null,
            "estimated_hours": null,
            "assigned_to_id": null
        }))
        .unwrap();

        assert_eq!(input.asset_id, 7);
        assert_eq!(input.seed(1).organization_id, 1);
        let echoed = serde_json::to_value(&input).unwrap();
        assert!(echoed.get("organization_id").is_none());
    }
}
