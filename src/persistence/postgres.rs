//! # PostgreSQL Store
//!
//! SQLx implementation of the persistence port. Schema lives in `db/schema.sql`.
//!
//! Queries are runtime-checked (`sqlx::query_as`) rather than macro-checked so the
//! crate builds without a database at hand.
//!
//! ## Isolation
//!
//! Transactions run at PostgreSQL's default READ COMMITTED level. That level alone
//! does not stop two concurrent updates from both seeing "no open work order", so
//! [`PmTransaction::lock_schedule`] issues `SELECT ... FOR UPDATE` on the schedule
//! row. The second transaction blocks there until the first commits and then
//! reads the work order the first one created.

use super::{PersistenceError, PersistenceResult, PmStore, PmTransaction};
use crate::config::DatabaseConfig;
use crate::constants::{ScheduleState, WorkOrderStatus};
use crate::models::{
    Asset, IntervalFields, NewSchedule, NewScheduleTask, NewTrigger, NewWorkOrder,
    NewWorkOrderTask, Schedule, ScheduleChanges, ScheduleSummary, ScheduleTask, Task, Trigger,
    WorkOrder, WorkOrderTask,
};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

const SCHEDULE_COLUMNS: &str =
    "id, title, description, frequency, next_due, asset_id, created_at, updated_at";
const TRIGGER_COLUMNS: &str = "id, schedule_id, trigger_type, interval_days, interval_weeks, \
     interval_months, is_active, last_triggered";
const WORK_ORDER_COLUMNS: &str = "id, title, description, status, priority, due_date, asset_id, \
     assigned_to_id, schedule_id, organization_id, estimated_hours, created_at, updated_at";
const WORK_ORDER_TASK_COLUMNS: &str =
    "id, work_order_id, task_id, title, description, procedure, order_index, status";
const SCHEDULE_TASK_COLUMNS: &str = "id, schedule_id, task_id, order_index, is_required";

fn terminal_statuses() -> Vec<&'static str> {
    WorkOrderStatus::TERMINAL.iter().map(|s| s.as_str()).collect()
}

/// PostgreSQL persistence adapter
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a connection pool from configuration
    pub async fn connect(config: &DatabaseConfig) -> PersistenceResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(&config.url)
            .await?;

        info!(
            max_connections = config.max_connections,
            "PostgreSQL pool established"
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Recent work orders of every listed schedule in one windowed query, newest first
    async fn recent_work_orders(
        &self,
        schedule_ids: &[i64],
        recent_limit: i64,
    ) -> PersistenceResult<HashMap<i64, Vec<WorkOrder>>> {
        let work_orders = sqlx::query_as::<_, WorkOrder>(&format!(
            "SELECT {WORK_ORDER_COLUMNS} FROM ( \
                 SELECT {WORK_ORDER_COLUMNS}, ROW_NUMBER() OVER ( \
                     PARTITION BY schedule_id ORDER BY created_at DESC, id DESC \
                 ) AS recent_rank \
                 FROM work_orders WHERE schedule_id = ANY($1) \
             ) ranked \
             WHERE recent_rank <= $2 \
             ORDER BY schedule_id, created_at DESC, id DESC"
        ))
        .bind(schedule_ids)
        .bind(recent_limit)
        .fetch_all(&self.pool)
        .await?;

        let mut by_schedule: HashMap<i64, Vec<WorkOrder>> = HashMap::new();
        for work_order in work_orders {
            if let Some(schedule_id) = work_order.schedule_id {
                by_schedule.entry(schedule_id).or_default().push(work_order);
            }
        }
        Ok(by_schedule)
    }
}

/// One listed schedule with its asset and aggregates, as returned by the listing query
#[derive(Debug, FromRow)]
struct ScheduleListingRow {
    #[sqlx(flatten)]
    schedule: Schedule,
    asset_name: Option<String>,
    asset_organization_id: Option<i64>,
    task_count: i64,
    work_order_count: i64,
    has_open_work: bool,
}

impl ScheduleListingRow {
    fn into_summary(self, recent_work_orders: Vec<WorkOrder>) -> ScheduleSummary {
        let asset = match (self.asset_name, self.asset_organization_id) {
            (Some(name), Some(organization_id)) => Some(Asset {
                id: self.schedule.asset_id,
                name,
                organization_id,
            }),
            _ => None,
        };
        let state = if self.has_open_work {
            ScheduleState::ActiveWithOpenWork
        } else {
            ScheduleState::ActiveNoOpenWork
        };

        ScheduleSummary {
            schedule: self.schedule,
            asset,
            recent_work_orders,
            task_count: self.task_count,
            work_order_count: self.work_order_count,
            state,
        }
    }
}

#[async_trait]
impl PmStore for PgStore {
    async fn begin(&self) -> PersistenceResult<Box<dyn PmTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn list_schedules(
        &self,
        organization_id: Option<i64>,
        recent_limit: usize,
    ) -> PersistenceResult<Vec<ScheduleSummary>> {
        let rows = sqlx::query_as::<_, ScheduleListingRow>(
            "SELECT s.id, s.title, s.description, s.frequency, s.next_due, s.asset_id, \
                    s.created_at, s.updated_at, \
                    a.name AS asset_name, a.organization_id AS asset_organization_id, \
                    (SELECT COUNT(*) FROM pm_schedule_tasks t WHERE t.schedule_id = s.id) \
                        AS task_count, \
                    COUNT(w.id) AS work_order_count, \
                    COALESCE(BOOL_OR(w.status <> ALL($2)), FALSE) AS has_open_work \
             FROM pm_schedules s \
             LEFT JOIN assets a ON a.id = s.asset_id \
             LEFT JOIN work_orders w ON w.schedule_id = s.id \
             WHERE ($1::BIGINT IS NULL OR a.organization_id = $1) \
             GROUP BY s.id, a.id \
             ORDER BY s.id",
        )
        .bind(organization_id)
        .bind(terminal_statuses())
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let recent_limit = i64::try_from(recent_limit).unwrap_or(i64::MAX);
        let schedule_ids: Vec<i64> = rows.iter().map(|row| row.schedule.id).collect();
        let mut recent = self.recent_work_orders(&schedule_ids, recent_limit).await?;

        debug!(count = rows.len(), "Listed schedules");
        Ok(rows
            .into_iter()
            .map(|row| {
                let recent_work_orders = recent.remove(&row.schedule.id).unwrap_or_default();
                row.into_summary(recent_work_orders)
            })
            .collect())
    }
}

struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PgTransaction {
    fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }
}

#[async_trait]
impl PmTransaction for PgTransaction {
    async fn lock_schedule(&mut self, schedule_id: i64) -> PersistenceResult<Option<Schedule>> {
        let schedule = sqlx::query_as::<_, Schedule>(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM pm_schedules WHERE id = $1 FOR UPDATE"
        ))
        .bind(schedule_id)
        .fetch_optional(self.conn())
        .await?;
        Ok(schedule)
    }

    async fn find_schedule(&mut self, schedule_id: i64) -> PersistenceResult<Option<Schedule>> {
        let schedule = sqlx::query_as::<_, Schedule>(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM pm_schedules WHERE id = $1"
        ))
        .bind(schedule_id)
        .fetch_optional(self.conn())
        .await?;
        Ok(schedule)
    }

    async fn find_asset(&mut self, asset_id: i64) -> PersistenceResult<Option<Asset>> {
        let asset = sqlx::query_as::<_, Asset>(
            "SELECT id, name, organization_id FROM assets WHERE id = $1",
        )
        .bind(asset_id)
        .fetch_optional(self.conn())
        .await?;
        Ok(asset)
    }

    async fn find_tasks(&mut self, task_ids: &[i64]) -> PersistenceResult<Vec<Task>> {
        let tasks = sqlx::query_as::<_, Task>(
            "SELECT id, title, description, procedure FROM tasks WHERE id = ANY($1)",
        )
        .bind(task_ids)
        .fetch_all(self.conn())
        .await?;
        Ok(tasks)
    }

    async fn insert_schedule(&mut self, new_schedule: &NewSchedule) -> PersistenceResult<Schedule> {
        let schedule = sqlx::query_as::<_, Schedule>(&format!(
            "INSERT INTO pm_schedules (title, description, frequency, next_due, asset_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {SCHEDULE_COLUMNS}"
        ))
        .bind(&new_schedule.title)
        .bind(&new_schedule.description)
        .bind(new_schedule.frequency.as_str())
        .bind(new_schedule.next_due)
        .bind(new_schedule.asset_id)
        .fetch_one(self.conn())
        .await?;
        debug!(schedule_id = schedule.id, "Inserted PM schedule");
        Ok(schedule)
    }

    async fn update_schedule(
        &mut self,
        schedule_id: i64,
        changes: &ScheduleChanges,
    ) -> PersistenceResult<Schedule> {
        sqlx::query_as::<_, Schedule>(&format!(
            "UPDATE pm_schedules SET \
                 title = COALESCE($2, title), \
                 description = COALESCE($3, description), \
                 frequency = COALESCE($4, frequency), \
                 next_due = COALESCE($5, next_due), \
                 updated_at = NOW() \
             WHERE id = $1 RETURNING {SCHEDULE_COLUMNS}"
        ))
        .bind(schedule_id)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(changes.frequency.map(|f| f.as_str()))
        .bind(changes.next_due)
        .fetch_optional(self.conn())
        .await?
        .ok_or(PersistenceError::RowNotFound {
            entity: "Schedule",
            id: schedule_id,
        })
    }

    async fn delete_schedule(&mut self, schedule_id: i64) -> PersistenceResult<bool> {
        sqlx::query("DELETE FROM pm_schedule_tasks WHERE schedule_id = $1")
            .bind(schedule_id)
            .execute(self.conn())
            .await?;
        sqlx::query("DELETE FROM pm_triggers WHERE schedule_id = $1")
            .bind(schedule_id)
            .execute(self.conn())
            .await?;
        sqlx::query("UPDATE work_orders SET schedule_id = NULL, updated_at = NOW() WHERE schedule_id = $1")
            .bind(schedule_id)
            .execute(self.conn())
            .await?;
        let deleted = sqlx::query("DELETE FROM pm_schedules WHERE id = $1")
            .bind(schedule_id)
            .execute(self.conn())
            .await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn schedule_tasks(&mut self, schedule_id: i64) -> PersistenceResult<Vec<ScheduleTask>> {
        let tasks = sqlx::query_as::<_, ScheduleTask>(&format!(
            "SELECT {SCHEDULE_TASK_COLUMNS} FROM pm_schedule_tasks \
             WHERE schedule_id = $1 ORDER BY order_index"
        ))
        .bind(schedule_id)
        .fetch_all(self.conn())
        .await?;
        Ok(tasks)
    }

    async fn replace_schedule_tasks(
        &mut self,
        schedule_id: i64,
        tasks: &[NewScheduleTask],
    ) -> PersistenceResult<Vec<ScheduleTask>> {
        sqlx::query("DELETE FROM pm_schedule_tasks WHERE schedule_id = $1")
            .bind(schedule_id)
            .execute(self.conn())
            .await?;

        let insert = format!(
            "INSERT INTO pm_schedule_tasks (schedule_id, task_id, order_index, is_required) \
             VALUES ($1, $2, $3, $4) RETURNING {SCHEDULE_TASK_COLUMNS}"
        );
        let mut created = Vec::with_capacity(tasks.len());
        for task in tasks {
            let row = sqlx::query_as::<_, ScheduleTask>(&insert)
                .bind(schedule_id)
                .bind(task.task_id)
                .bind(task.order_index)
                .bind(task.is_required)
                .fetch_one(self.conn())
                .await?;
            created.push(row);
        }
        Ok(created)
    }

    async fn find_trigger(&mut self, schedule_id: i64) -> PersistenceResult<Option<Trigger>> {
        let trigger = sqlx::query_as::<_, Trigger>(&format!(
            "SELECT {TRIGGER_COLUMNS} FROM pm_triggers WHERE schedule_id = $1 \
             ORDER BY is_active DESC, id LIMIT 1"
        ))
        .bind(schedule_id)
        .fetch_optional(self.conn())
        .await?;
        Ok(trigger)
    }

    async fn insert_trigger(&mut self, new_trigger: &NewTrigger) -> PersistenceResult<Trigger> {
        let trigger = sqlx::query_as::<_, Trigger>(&format!(
            "INSERT INTO pm_triggers \
                 (schedule_id, trigger_type, interval_days, interval_weeks, interval_months, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {TRIGGER_COLUMNS}"
        ))
        .bind(new_trigger.schedule_id)
        .bind(new_trigger.trigger_type.as_str())
        .bind(new_trigger.interval.days)
        .bind(new_trigger.interval.weeks)
        .bind(new_trigger.interval.months)
        .bind(new_trigger.is_active)
        .fetch_one(self.conn())
        .await?;
        Ok(trigger)
    }

    async fn update_trigger_interval(
        &mut self,
        trigger_id: i64,
        interval: IntervalFields,
    ) -> PersistenceResult<Trigger> {
        sqlx::query_as::<_, Trigger>(&format!(
            "UPDATE pm_triggers SET interval_days = $2, interval_weeks = $3, \
                 interval_months = $4, last_triggered = NULL \
             WHERE id = $1 RETURNING {TRIGGER_COLUMNS}"
        ))
        .bind(trigger_id)
        .bind(interval.days)
        .bind(interval.weeks)
        .bind(interval.months)
        .fetch_optional(self.conn())
        .await?
        .ok_or(PersistenceError::RowNotFound {
            entity: "Trigger",
            id: trigger_id,
        })
    }

    async fn find_open_work_orders(
        &mut self,
        schedule_id: i64,
    ) -> PersistenceResult<Vec<WorkOrder>> {
        let work_orders = sqlx::query_as::<_, WorkOrder>(&format!(
            "SELECT {WORK_ORDER_COLUMNS} FROM work_orders \
             WHERE schedule_id = $1 AND status <> ALL($2) ORDER BY id"
        ))
        .bind(schedule_id)
        .bind(terminal_statuses())
        .fetch_all(self.conn())
        .await?;
        Ok(work_orders)
    }

    async fn insert_work_order(
        &mut self,
        new_work_order: &NewWorkOrder,
    ) -> PersistenceResult<WorkOrder> {
        let work_order = sqlx::query_as::<_, WorkOrder>(&format!(
            "INSERT INTO work_orders \
                 (title, description, status, priority, due_date, asset_id, assigned_to_id, \
                  schedule_id, organization_id, estimated_hours) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {WORK_ORDER_COLUMNS}"
        ))
        .bind(&new_work_order.title)
        .bind(&new_work_order.description)
        .bind(new_work_order.status.as_str())
        .bind(new_work_order.priority.as_str())
        .bind(new_work_order.due_date)
        .bind(new_work_order.asset_id)
        .bind(new_work_order.assigned_to_id)
        .bind(new_work_order.schedule_id)
        .bind(new_work_order.organization_id)
        .bind(new_work_order.estimated_hours)
        .fetch_one(self.conn())
        .await?;
        Ok(work_order)
    }

    async fn insert_work_order_tasks(
        &mut self,
        tasks: &[NewWorkOrderTask],
    ) -> PersistenceResult<Vec<WorkOrderTask>> {
        let insert = format!(
            "INSERT INTO work_order_tasks \
                 (work_order_id, task_id, title, description, procedure, order_index, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {WORK_ORDER_TASK_COLUMNS}"
        );
        let mut created = Vec::with_capacity(tasks.len());
        for task in tasks {
            let row = sqlx::query_as::<_, WorkOrderTask>(&insert)
                .bind(task.work_order_id)
                .bind(task.task_id)
                .bind(&task.title)
                .bind(&task.description)
                .bind(&task.procedure)
                .bind(task.order_index)
                .bind(task.status.as_str())
                .fetch_one(self.conn())
                .await?;
            created.push(row);
        }
        Ok(created)
    }

    async fn delete_work_orders(&mut self, work_order_ids: &[i64]) -> PersistenceResult<u64> {
        if work_order_ids.is_empty() {
            return Ok(0);
        }
        sqlx::query("DELETE FROM work_order_tasks WHERE work_order_id = ANY($1)")
            .bind(work_order_ids)
            .execute(self.conn())
            .await?;
        let deleted = sqlx::query("DELETE FROM work_orders WHERE id = ANY($1)")
            .bind(work_order_ids)
            .execute(self.conn())
            .await?;
        Ok(deleted.rows_affected())
    }

    async fn commit(self: Box<Self>) -> PersistenceResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> PersistenceResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
