//! # Work Order Models
//!
//! Concrete units of maintenance work. A work order generated from a schedule
//! carries `schedule_id`; its checklist is a [`WorkOrderTask`] snapshot of the
//! task templates taken when the work order was materialized, so later edits to
//! the templates never alter in-flight work.
//!
//! ## Database Schema
//!
//! ```sql
//! CREATE TABLE work_orders (
//!   id BIGSERIAL PRIMARY KEY,
//!   status TEXT NOT NULL,         -- OPEN, IN_PROGRESS, ON_HOLD, COMPLETED, CANCELED
//!   schedule_id BIGINT REFERENCES pm_schedules (id) ON DELETE SET NULL,
//!   -- ... other fields
//! );
//! CREATE INDEX idx_work_orders_schedule_status ON work_orders (schedule_id, status);
//! ```

use crate::constants::{Priority, WorkOrderStatus, WorkOrderTaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WorkOrder {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[sqlx(try_from = "String")]
    pub status: WorkOrderStatus,
    #[sqlx(try_from = "String")]
    pub priority: Priority,
    pub due_date: DateTime<Utc>,
    pub asset_id: i64,
    pub assigned_to_id: Option<i64>,
    pub schedule_id: Option<i64>,
    pub organization_id: i64,
    pub estimated_hours: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkOrder {
    /// Open work is anything not completed or canceled
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }
}

/// New WorkOrder for creation (without generated fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkOrder {
    pub title: String,
    pub description: String,
    pub status: WorkOrderStatus,
    pub priority: Priority,
    pub due_date: DateTime<Utc>,
    pub asset_id: i64,
    pub assigned_to_id: Option<i64>,
    pub schedule_id: Option<i64>,
    pub organization_id: i64,
    pub estimated_hours: Option<f64>,
}

/// Checklist item of a work order. Maps to `work_order_tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct WorkOrderTask {
    pub id: i64,
    pub work_order_id: i64,
    pub task_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub procedure: Option<String>,
    pub order_index: i32,
    #[sqlx(try_from = "String")]
    pub status: WorkOrderTaskStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWorkOrderTask {
    pub work_order_id: i64,
    pub task_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub procedure: Option<String>,
    pub order_index: i32,
    pub status: WorkOrderTaskStatus,
}
