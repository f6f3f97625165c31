//! # Persistence Port
//!
//! The scheduling engine never talks to a database client directly. It is handed
//! an [`PmStore`] and does all effectful work through a [`PmTransaction`] opened
//! from it, which keeps the lifecycle logic testable without a live database.
//!
//! ## Transaction contract
//!
//! - Everything done through a transaction becomes visible atomically on
//!   [`PmTransaction::commit`]; dropping or rolling back discards it.
//! - [`PmTransaction::lock_schedule`] takes an exclusive lock on the schedule
//!   row that is held until the transaction ends. Two transactions locking the
//!   same schedule are serialized, so a read-then-write inside one of them
//!   cannot interleave with the other.
//! - [`PmTransaction::find_schedule`] reads the same row without locking it and
//!   is what read-only paths use.
//! - There is no implicit upsert. Callers check for existence and then insert,
//!   so audit columns are only ever written by the insert path.
//!
//! ## Adapters
//!
//! - [`MemoryStore`] keeps all records in process; used by tests and embedders.
//! - [`PgStore`] runs on PostgreSQL through SQLx (feature `postgres`).

pub mod errors;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use errors::{PersistenceError, PersistenceResult};
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

use crate::models::{
    Asset, IntervalFields, NewSchedule, NewScheduleTask, NewTrigger, NewWorkOrder,
    NewWorkOrderTask, Schedule, ScheduleChanges, ScheduleSummary, ScheduleTask, Task, Trigger,
    WorkOrder, WorkOrderTask,
};
use async_trait::async_trait;

/// Entry point to the persistence collaborator
#[async_trait]
pub trait PmStore: Send + Sync {
    /// Open a new transaction
    async fn begin(&self) -> PersistenceResult<Box<dyn PmTransaction>>;

    /// List schedules, optionally scoped to the organization owning their asset.
    ///
    /// Each summary carries at most `recent_limit` work orders, newest first.
    async fn list_schedules(
        &self,
        organization_id: Option<i64>,
        recent_limit: usize,
    ) -> PersistenceResult<Vec<ScheduleSummary>>;
}

/// Unit of work against the persistence collaborator
#[async_trait]
pub trait PmTransaction: Send {
    /// Fetch a schedule and lock it for the rest of the transaction
    async fn lock_schedule(&mut self, schedule_id: i64) -> PersistenceResult<Option<Schedule>>;

    /// Fetch a schedule without locking it
    async fn find_schedule(&mut self, schedule_id: i64) -> PersistenceResult<Option<Schedule>>;

    async fn find_asset(&mut self, asset_id: i64) -> PersistenceResult<Option<Asset>>;

    /// Task templates for the given ids, in no particular order. Unknown ids are absent.
    async fn find_tasks(&mut self, task_ids: &[i64]) -> PersistenceResult<Vec<Task>>;

    async fn insert_schedule(&mut self, new_schedule: &NewSchedule) -> PersistenceResult<Schedule>;

    async fn update_schedule(
        &mut self,
        schedule_id: i64,
        changes: &ScheduleChanges,
    ) -> PersistenceResult<Schedule>;

    /// Delete a schedule together with its checklist and trigger. Remaining work
    /// orders are detached (`schedule_id` cleared). Returns whether a row was deleted.
    async fn delete_schedule(&mut self, schedule_id: i64) -> PersistenceResult<bool>;

    /// Checklist of a schedule ordered by `order_index`
    async fn schedule_tasks(&mut self, schedule_id: i64) -> PersistenceResult<Vec<ScheduleTask>>;

    /// Replace the checklist wholesale
    async fn replace_schedule_tasks(
        &mut self,
        schedule_id: i64,
        tasks: &[NewScheduleTask],
    ) -> PersistenceResult<Vec<ScheduleTask>>;

    /// The schedule's trigger, if one exists
    async fn find_trigger(&mut self, schedule_id: i64) -> PersistenceResult<Option<Trigger>>;

    async fn insert_trigger(&mut self, new_trigger: &NewTrigger) -> PersistenceResult<Trigger>;

    /// Rewrite the interval columns in place and clear `last_triggered`
    async fn update_trigger_interval(
        &mut self,
        trigger_id: i64,
        interval: IntervalFields,
    ) -> PersistenceResult<Trigger>;

    /// Work orders of the schedule whose status is not terminal
    async fn find_open_work_orders(&mut self, schedule_id: i64)
        -> PersistenceResult<Vec<WorkOrder>>;

    async fn insert_work_order(&mut self, new_work_order: &NewWorkOrder)
        -> PersistenceResult<WorkOrder>;

    async fn insert_work_order_tasks(
        &mut self,
        tasks: &[NewWorkOrderTask],
    ) -> PersistenceResult<Vec<WorkOrderTask>>;

    /// Delete work orders and their checklists. Returns the number of work orders deleted.
    async fn delete_work_orders(&mut self, work_order_ids: &[i64]) -> PersistenceResult<u64>;

    async fn commit(self: Box<Self>) -> PersistenceResult<()>;

    async fn rollback(self: Box<Self>) -> PersistenceResult<()>;
}
