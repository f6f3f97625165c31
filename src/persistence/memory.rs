//! # In-Memory Store
//!
//! Process-local implementation of the persistence port.
//!
//! A transaction holds the store-wide lock from `begin` until it commits or is
//! dropped, and works on a private copy of the data that replaces the shared
//! state on commit. Transactions are therefore fully serialized, which is a
//! stronger guarantee than the per-schedule row lock the port requires.
//!
//! Besides the port itself the store exposes seeding, inspection and fault
//! injection helpers for tests.

use super::{PersistenceError, PersistenceResult, PmStore, PmTransaction};
use crate::constants::{ScheduleState, WorkOrderStatus};
use crate::models::{
    Asset, IntervalFields, NewSchedule, NewScheduleTask, NewTrigger, NewWorkOrder,
    NewWorkOrderTask, Schedule, ScheduleChanges, ScheduleSummary, ScheduleTask, Task, Trigger,
    WorkOrder, WorkOrderTask,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    last_id: i64,
    assets: BTreeMap<i64, Asset>,
    tasks: BTreeMap<i64, Task>,
    schedules: BTreeMap<i64, Schedule>,
    schedule_tasks: BTreeMap<i64, ScheduleTask>,
    triggers: BTreeMap<i64, Trigger>,
    work_orders: BTreeMap<i64, WorkOrder>,
    work_order_tasks: BTreeMap<i64, WorkOrderTask>,
    faults: FaultPlan,
}

/// Failures to inject into otherwise healthy operations
#[derive(Debug, Clone, Default)]
struct FaultPlan {
    schedule_deletes: HashSet<i64>,
    work_order_inserts: bool,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn open_work_orders(&self, schedule_id: i64) -> impl Iterator<Item = &WorkOrder> {
        self.work_orders
            .values()
            .filter(move |wo| wo.schedule_id == Some(schedule_id) && wo.is_open())
    }

    fn summarize(&self, schedule: &Schedule, recent_limit: usize) -> ScheduleSummary {
        let mut work_orders: Vec<&WorkOrder> = self
            .work_orders
            .values()
            .filter(|wo| wo.schedule_id == Some(schedule.id))
            .collect();
        work_orders.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let task_count = self
            .schedule_tasks
            .values()
            .filter(|task| task.schedule_id == schedule.id)
            .count();

        ScheduleSummary {
            schedule: schedule.clone(),
            asset: self.assets.get(&schedule.asset_id).cloned(),
            state: ScheduleState::derive(work_orders.iter().map(|wo| wo.status)),
            work_order_count: count(work_orders.len()),
            task_count: count(task_count),
            recent_work_orders: work_orders.into_iter().take(recent_limit).cloned().collect(),
        }
    }
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// In-memory persistence adapter
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    /// Calls to `lock_schedule`, committed or not
    schedule_locks: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset as the platform would
    pub async fn seed_asset(&self, name: &str, organization_id: i64) -> Asset {
        let mut state = self.state.lock().await;
        let asset = Asset {
            id: state.next_id(),
            name: name.to_string(),
            organization_id,
        };
        state.assets.insert(asset.id, asset.clone());
        asset
    }

    /// Register a task template as the platform would
    pub async fn seed_task(
        &self,
        title: &str,
        description: Option<&str>,
        procedure: Option<&str>,
    ) -> Task {
        let mut state = self.state.lock().await;
        let task = Task {
            id: state.next_id(),
            title: title.to_string(),
            description: description.map(str::to_string),
            procedure: procedure.map(str::to_string),
        };
        state.tasks.insert(task.id, task.clone());
        task
    }

    /// Drop an asset record, as when the platform removes an asset out from under
    /// its schedules
    pub async fn remove_asset(&self, asset_id: i64) -> Option<Asset> {
        self.state.lock().await.assets.remove(&asset_id)
    }

    /// Edit a task template after the fact
    pub async fn rename_task(&self, task_id: i64, title: &str) -> PersistenceResult<()> {
        let mut state = self.state.lock().await;
        let task = state
            .tasks
            .get_mut(&task_id)
            .ok_or(PersistenceError::RowNotFound { entity: "Task", id: task_id })?;
        task.title = title.to_string();
        Ok(())
    }

    /// Move a work order to another status, as technicians do outside this engine
    pub async fn set_work_order_status(
        &self,
        work_order_id: i64,
        status: WorkOrderStatus,
    ) -> PersistenceResult<()> {
        let mut state = self.state.lock().await;
        let work_order = state.work_orders.get_mut(&work_order_id).ok_or(
            PersistenceError::RowNotFound {
                entity: "WorkOrder",
                id: work_order_id,
            },
        )?;
        work_order.status = status;
        work_order.updated_at = Utc::now();
        Ok(())
    }

    pub async fn schedule(&self, schedule_id: i64) -> Option<Schedule> {
        self.state.lock().await.schedules.get(&schedule_id).cloned()
    }

    pub async fn triggers_for(&self, schedule_id: i64) -> Vec<Trigger> {
        let state = self.state.lock().await;
        state
            .triggers
            .values()
            .filter(|trigger| trigger.schedule_id == schedule_id)
            .cloned()
            .collect()
    }

    pub async fn schedule_tasks_for(&self, schedule_id: i64) -> Vec<ScheduleTask> {
        let state = self.state.lock().await;
        let mut tasks: Vec<_> = state
            .schedule_tasks
            .values()
            .filter(|task| task.schedule_id == schedule_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|task| task.order_index);
        tasks
    }

    pub async fn work_orders_for(&self, schedule_id: i64) -> Vec<WorkOrder> {
        let state = self.state.lock().await;
        state
            .work_orders
            .values()
            .filter(|wo| wo.schedule_id == Some(schedule_id))
            .cloned()
            .collect()
    }

    pub async fn open_work_orders_for(&self, schedule_id: i64) -> Vec<WorkOrder> {
        let state = self.state.lock().await;
        state.open_work_orders(schedule_id).cloned().collect()
    }

    pub async fn work_order(&self, work_order_id: i64) -> Option<WorkOrder> {
        self.state.lock().await.work_orders.get(&work_order_id).cloned()
    }

    pub async fn work_order_tasks_for(&self, work_order_id: i64) -> Vec<WorkOrderTask> {
        let state = self.state.lock().await;
        let mut tasks: Vec<_> = state
            .work_order_tasks
            .values()
            .filter(|task| task.work_order_id == work_order_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|task| task.order_index);
        tasks
    }

    /// Record that the schedule's trigger fired at `at`
    pub async fn mark_triggered(
        &self,
        schedule_id: i64,
        at: chrono::DateTime<Utc>,
    ) -> PersistenceResult<()> {
        let mut state = self.state.lock().await;
        let trigger = state
            .triggers
            .values_mut()
            .find(|trigger| trigger.schedule_id == schedule_id)
            .ok_or(PersistenceError::RowNotFound {
                entity: "Trigger",
                id: schedule_id,
            })?;
        trigger.last_triggered = Some(at);
        Ok(())
    }

    /// How many schedule row locks transactions have taken so far
    pub fn schedule_locks_taken(&self) -> u64 {
        self.schedule_locks.load(Ordering::SeqCst)
    }

    /// Make every future delete of this schedule fail
    pub async fn fail_schedule_delete(&self, schedule_id: i64) {
        self.state
            .lock()
            .await
            .faults
            .schedule_deletes
            .insert(schedule_id);
    }

    /// Make every future work order insert fail (or succeed again)
    pub async fn fail_work_order_inserts(&self, fail: bool) {
        self.state.lock().await.faults.work_order_inserts = fail;
    }
}

#[async_trait]
impl PmStore for MemoryStore {
    async fn begin(&self) -> PersistenceResult<Box<dyn PmTransaction>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            schedule_locks: Arc::clone(&self.schedule_locks),
        }))
    }

    async fn list_schedules(
        &self,
        organization_id: Option<i64>,
        recent_limit: usize,
    ) -> PersistenceResult<Vec<ScheduleSummary>> {
        let state = self.state.lock().await;
        Ok(state
            .schedules
            .values()
            .filter(|schedule| match organization_id {
                Some(org) => state
                    .assets
                    .get(&schedule.asset_id)
                    .is_some_and(|asset| asset.organization_id == org),
                None => true,
            })
            .map(|schedule| state.summarize(schedule, recent_limit))
            .collect())
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    schedule_locks: Arc<AtomicU64>,
}

#[async_trait]
impl PmTransaction for MemoryTransaction {
    async fn lock_schedule(&mut self, schedule_id: i64) -> PersistenceResult<Option<Schedule>> {
        // The whole store is already held exclusively by this transaction
        self.schedule_locks.fetch_add(1, Ordering::SeqCst);
        Ok(self.working.schedules.get(&schedule_id).cloned())
    }

    async fn find_schedule(&mut self, schedule_id: i64) -> PersistenceResult<Option<Schedule>> {
        Ok(self.working.schedules.get(&schedule_id).cloned())
    }

    async fn find_asset(&mut self, asset_id: i64) -> PersistenceResult<Option<Asset>> {
        Ok(self.working.assets.get(&asset_id).cloned())
    }

    async fn find_tasks(&mut self, task_ids: &[i64]) -> PersistenceResult<Vec<Task>> {
        Ok(task_ids
            .iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .filter_map(|id| self.working.tasks.get(id).cloned())
            .collect())
    }

    async fn insert_schedule(&mut self, new_schedule: &NewSchedule) -> PersistenceResult<Schedule> {
        let now = Utc::now();
        let schedule = Schedule {
            id: self.working.next_id(),
            title: new_schedule.title.clone(),
            description: new_schedule.description.clone(),
            frequency: new_schedule.frequency,
            next_due: new_schedule.next_due,
            asset_id: new_schedule.asset_id,
            created_at: now,
            updated_at: now,
        };
        self.working.schedules.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn update_schedule(
        &mut self,
        schedule_id: i64,
        changes: &ScheduleChanges,
    ) -> PersistenceResult<Schedule> {
        let schedule = self.working.schedules.get_mut(&schedule_id).ok_or(
            PersistenceError::RowNotFound {
                entity: "Schedule",
                id: schedule_id,
            },
        )?;
        changes.apply_to(schedule);
        schedule.updated_at = Utc::now();
        Ok(schedule.clone())
    }

    async fn delete_schedule(&mut self, schedule_id: i64) -> PersistenceResult<bool> {
        if self.working.faults.schedule_deletes.contains(&schedule_id) {
            return Err(PersistenceError::Injected(format!(
                "delete of schedule {schedule_id}"
            )));
        }
        if self.working.schedules.remove(&schedule_id).is_none() {
            return Ok(false);
        }
        self.working
            .schedule_tasks
            .retain(|_, task| task.schedule_id != schedule_id);
        self.working
            .triggers
            .retain(|_, trigger| trigger.schedule_id != schedule_id);
        for work_order in self.working.work_orders.values_mut() {
            if work_order.schedule_id == Some(schedule_id) {
                work_order.schedule_id = None;
            }
        }
        Ok(true)
    }

    async fn schedule_tasks(&mut self, schedule_id: i64) -> PersistenceResult<Vec<ScheduleTask>> {
        let mut tasks: Vec<_> = self
            .working
            .schedule_tasks
            .values()
            .filter(|task| task.schedule_id == schedule_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|task| task.order_index);
        Ok(tasks)
    }

    async fn replace_schedule_tasks(
        &mut self,
        schedule_id: i64,
        tasks: &[NewScheduleTask],
    ) -> PersistenceResult<Vec<ScheduleTask>> {
        self.working
            .schedule_tasks
            .retain(|_, task| task.schedule_id != schedule_id);

        let mut created = Vec::with_capacity(tasks.len());
        for new_task in tasks {
            let task = ScheduleTask {
                id: self.working.next_id(),
                schedule_id,
                task_id: new_task.task_id,
                order_index: new_task.order_index,
                is_required: new_task.is_required,
            };
            self.working.schedule_tasks.insert(task.id, task.clone());
            created.push(task);
        }
        Ok(created)
    }

    async fn find_trigger(&mut self, schedule_id: i64) -> PersistenceResult<Option<Trigger>> {
        Ok(self
            .working
            .triggers
            .values()
            .find(|trigger| trigger.schedule_id == schedule_id)
            .cloned())
    }

    async fn insert_trigger(&mut self, new_trigger: &NewTrigger) -> PersistenceResult<Trigger> {
        let trigger = Trigger {
            id: self.working.next_id(),
            schedule_id: new_trigger.schedule_id,
            trigger_type: new_trigger.trigger_type,
            interval_days: new_trigger.interval.days,
            interval_weeks: new_trigger.interval.weeks,
            interval_months: new_trigger.interval.months,
            is_active: new_trigger.is_active,
            last_triggered: None,
        };
        self.working.triggers.insert(trigger.id, trigger.clone());
        Ok(trigger)
    }

    async fn update_trigger_interval(
        &mut self,
        trigger_id: i64,
        interval: IntervalFields,
    ) -> PersistenceResult<Trigger> {
        let trigger = self.working.triggers.get_mut(&trigger_id).ok_or(
            PersistenceError::RowNotFound {
                entity: "Trigger",
                id: trigger_id,
            },
        )?;
        trigger.interval_days = interval.days;
        trigger.interval_weeks = interval.weeks;
        trigger.interval_months = interval.months;
        trigger.last_triggered = None;
        Ok(trigger.clone())
    }

    async fn find_open_work_orders(
        &mut self,
        schedule_id: i64,
    ) -> PersistenceResult<Vec<WorkOrder>> {
        Ok(self.working.open_work_orders(schedule_id).cloned().collect())
    }

    async fn insert_work_order(
        &mut self,
        new_work_order: &NewWorkOrder,
    ) -> PersistenceResult<WorkOrder> {
        if self.working.faults.work_order_inserts {
            return Err(PersistenceError::Injected("work order insert".to_string()));
        }
        let now = Utc::now();
        let work_order = WorkOrder {
            id: self.working.next_id(),
            title: new_work_order.title.clone(),
            description: new_work_order.description.clone(),
            status: new_work_order.status,
            priority: new_work_order.priority,
            due_date: new_work_order.due_date,
            asset_id: new_work_order.asset_id,
            assigned_to_id: new_work_order.assigned_to_id,
            schedule_id: new_work_order.schedule_id,
            organization_id: new_work_order.organization_id,
            estimated_hours: new_work_order.estimated_hours,
            created_at: now,
            updated_at: now,
        };
        self.working
            .work_orders
            .insert(work_order.id, work_order.clone());
        Ok(work_order)
    }

    async fn insert_work_order_tasks(
        &mut self,
        tasks: &[NewWorkOrderTask],
    ) -> PersistenceResult<Vec<WorkOrderTask>> {
        let mut created = Vec::with_capacity(tasks.len());
        for new_task in tasks {
            let task = WorkOrderTask {
                id: self.working.next_id(),
                work_order_id: new_task.work_order_id,
                task_id: new_task.task_id,
                title: new_task.title.clone(),
                description: new_task.description.clone(),
                procedure: new_task.procedure.clone(),
                order_index: new_task.order_index,
                status: new_task.status,
            };
            self.working.work_order_tasks.insert(task.id, task.clone());
            created.push(task);
        }
        Ok(created)
    }

    async fn delete_work_orders(&mut self, work_order_ids: &[i64]) -> PersistenceResult<u64> {
        let ids: HashSet<i64> = work_order_ids.iter().copied().collect();
        self.working
            .work_order_tasks
            .retain(|_, task| !ids.contains(&task.work_order_id));
        let before = self.working.work_orders.len();
        self.working.work_orders.retain(|id, _| !ids.contains(id));
        Ok(u64::try_from(before - self.working.work_orders.len()).unwrap_or(u64::MAX))
    }

    async fn commit(self: Box<Self>) -> PersistenceResult<()> {
        let MemoryTransaction { mut guard, working, .. } = *self;
        *guard = working;
        debug!(last_id = guard.last_id, "Memory transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> PersistenceResult<()> {
        debug!("Memory transaction rolled back");
        Ok(())
    }
}
