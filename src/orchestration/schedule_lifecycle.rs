//! # Schedule Lifecycle Manager
//!
//! Entry point for creating, updating, reading and deleting PM schedules.
//!
//! ## Overview
//!
//! Every write runs in exactly one transaction opened from the injected
//! [`PmStore`]. A failure anywhere inside it rolls the whole operation back and is
//! surfaced as [`PmScheduleError::TransactionFailure`]; nothing is retried.
//!
//! Ownership is decided by the organization of the schedule's asset. Organization
//! ids always come from the caller's session. A schedule owned by another
//! organization is reported as not found.
//!
//! ## Usage
//!
//! ```rust
//! use pm_scheduler::orchestration::{CreateScheduleInput, ScheduleLifecycleManager, UpdateSchedulePayload};
//! use pm_scheduler::persistence::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! let asset = store.seed_asset("Air Handler 3", 1).await;
//! let manager = ScheduleLifecycleManager::new(Arc::new(store));
//!
//! let input = CreateScheduleInput::new("Replace filters", asset.id).with_frequency("weekly");
//! let created = manager.create_schedule(input, 1).await?;
//!
//! let payload = UpdateSchedulePayload {
//!     frequency: Some("monthly".to_string()),
//!     ..Default::default()
//! };
//! let updated = manager.update_schedule(created.schedule.id, 1, payload).await?;
//! assert!(updated.open_work_order.is_some());
//! # Ok(())
//! # }
//! ```

use super::bulk_cascade::BulkCascadeProcessor;
use super::trigger_lifecycle;
use super::types::{
    BulkDeleteResult, CreateScheduleInput, ScheduleUpdateInput, UpdateSchedulePayload,
    WorkOrderSeedInput,
};
use super::work_order_materializer::WorkOrderMaterializer;
use crate::config::SchedulingConfig;
use crate::error::{PmScheduleError, Result};
use crate::frequency::{self, normalize};
use crate::logging::log_schedule_operation;
use crate::models::{
    Asset, NewSchedule, NewScheduleTask, Schedule, ScheduleChanges, ScheduleSummary,
    ScheduleWithRelations,
};
use crate::persistence::{PersistenceError, PersistenceResult, PmStore, PmTransaction};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Result of looking up a schedule on behalf of an organization
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Ownership {
    /// The schedule exists and its asset belongs to the organization, or the
    /// asset record is gone
    Owned {
        schedule: Schedule,
        asset: Option<Asset>,
    },
    Missing,
    Foreign {
        organization_id: i64,
    },
}

/// Lock a schedule and decide whether the organization may touch it
pub(crate) async fn load_owned_schedule(
    tx: &mut dyn PmTransaction,
    schedule_id: i64,
    organization_id: i64,
) -> PersistenceResult<Ownership> {
    let schedule = tx.lock_schedule(schedule_id).await?;
    classify_ownership(tx, schedule, organization_id).await
}

/// Same ownership check as [`load_owned_schedule`] without locking the row
pub(crate) async fn find_owned_schedule(
    tx: &mut dyn PmTransaction,
    schedule_id: i64,
    organization_id: i64,
) -> PersistenceResult<Ownership> {
    let schedule = tx.find_schedule(schedule_id).await?;
    classify_ownership(tx, schedule, organization_id).await
}

async fn classify_ownership(
    tx: &mut dyn PmTransaction,
    schedule: Option<Schedule>,
    organization_id: i64,
) -> PersistenceResult<Ownership> {
    let Some(schedule) = schedule else {
        return Ok(Ownership::Missing);
    };

    let asset = tx.find_asset(schedule.asset_id).await?;
    match asset {
        Some(asset) if asset.organization_id != organization_id => Ok(Ownership::Foreign {
            organization_id: asset.organization_id,
        }),
        asset => Ok(Ownership::Owned { schedule, asset }),
    }
}

/// Roll back, logging instead of failing: the caller already has an error to report
pub(crate) async fn rollback_quietly(tx: Box<dyn PmTransaction>, operation: &'static str) {
    if let Err(e) = tx.rollback().await {
        warn!(operation = operation, error = %e, "Rollback failed");
    }
}

/// Every task id must name an existing task template
async fn verify_tasks(tx: &mut dyn PmTransaction, task_ids: &[i64]) -> PersistenceResult<()> {
    if task_ids.is_empty() {
        return Ok(());
    }

    let found: HashSet<i64> = tx
        .find_tasks(task_ids)
        .await?
        .into_iter()
        .map(|task| task.id)
        .collect();

    match task_ids.iter().find(|id| !found.contains(id)) {
        Some(id) => Err(PersistenceError::RowNotFound { entity: "Task", id: *id }),
        None => Ok(()),
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(PmScheduleError::Validation(
            "Schedule title must not be blank".to_string(),
        ));
    }
    Ok(())
}

fn schedule_not_visible(schedule_id: i64, ownership: &Ownership) -> PmScheduleError {
    if let Ownership::Foreign { organization_id } = ownership {
        debug!(
            schedule_id = schedule_id,
            owner_organization_id = organization_id,
            "Schedule belongs to another organization"
        );
    }
    PmScheduleError::not_found("Schedule", schedule_id)
}

/// Orchestrates the schedule lifecycle over an injected persistence port
pub struct ScheduleLifecycleManager {
    store: Arc<dyn PmStore>,
    config: SchedulingConfig,
    materializer: WorkOrderMaterializer,
    bulk: BulkCascadeProcessor,
}

impl ScheduleLifecycleManager {
    pub fn new(store: Arc<dyn PmStore>) -> Self {
        Self::with_config(store, SchedulingConfig::default())
    }

    pub fn with_config(store: Arc<dyn PmStore>, config: SchedulingConfig) -> Self {
        Self {
            materializer: WorkOrderMaterializer::new(&config),
            bulk: BulkCascadeProcessor::new(Arc::clone(&store)),
            store,
            config,
        }
    }

    pub fn config(&self) -> &SchedulingConfig {
        &self.config
    }

    async fn begin(&self, operation: &'static str) -> Result<Box<dyn PmTransaction>> {
        self.store
            .begin()
            .await
            .map_err(|e| PmScheduleError::transaction(operation, e))
    }

    /// Commit on success, roll back on failure
    async fn finish<T>(
        &self,
        tx: Box<dyn PmTransaction>,
        operation: &'static str,
        outcome: Result<T>,
    ) -> Result<T> {
        match outcome {
            Ok(value) => {
                tx.commit()
                    .await
                    .map_err(|e| PmScheduleError::transaction(operation, e))?;
                Ok(value)
            }
            Err(err) => {
                rollback_quietly(tx, operation).await;
                warn!(operation = operation, error = %err, "PM schedule operation rolled back");
                Err(err)
            }
        }
    }

    /// Create a schedule with its checklist, trigger and first work order.
    ///
    /// `next_due` is taken from the input when given, otherwise computed from now.
    #[instrument(skip(self, input), fields(title = %input.title, asset_id = input.asset_id, organization_id = organization_id))]
    pub async fn create_schedule(
        &self,
        input: CreateScheduleInput,
        organization_id: i64,
    ) -> Result<ScheduleWithRelations> {
        validate_title(&input.title)?;

        let mut tx = self.begin("create").await?;
        let outcome = self.create_in_tx(tx.as_mut(), &input, organization_id).await;
        let created = self.finish(tx, "create", outcome).await?;

        log_schedule_operation(
            "create",
            Some(created.schedule.id),
            created.open_work_order.as_ref().map(|wo| wo.id),
            "success",
            Some(created.schedule.frequency.as_str()),
        );
        Ok(created)
    }

    async fn create_in_tx(
        &self,
        tx: &mut dyn PmTransaction,
        input: &CreateScheduleInput,
        organization_id: i64,
    ) -> Result<ScheduleWithRelations> {
        let fail = |e| PmScheduleError::transaction("create", e);

        let asset = match tx.find_asset(input.asset_id).await.map_err(fail)? {
            Some(asset) if asset.organization_id == organization_id => asset,
            _ => return Err(PmScheduleError::not_found("Asset", input.asset_id)),
        };

        let frequency = normalize(input.frequency.as_deref());
        let next_due = input
            .next_due
            .unwrap_or_else(|| frequency::next_due(frequency, Utc::now()));

        verify_tasks(tx, &input.task_ids).await.map_err(fail)?;

        let schedule = tx
            .insert_schedule(&NewSchedule {
                title: input.title.trim().to_string(),
                description: input.description.clone(),
                frequency,
                next_due,
                asset_id: asset.id,
            })
            .await
            .map_err(fail)?;
        debug!(schedule_id = schedule.id, frequency = %frequency, "Created schedule record");

        let tasks = tx
            .replace_schedule_tasks(schedule.id, &NewScheduleTask::ordered(&input.task_ids))
            .await
            .map_err(fail)?;

        let trigger = trigger_lifecycle::create_for_schedule(tx, schedule.id, frequency)
            .await
            .map_err(fail)?;

        let work_order = self
            .materializer
            .materialize(tx, &schedule, Some(&asset), &input.task_ids, &input.seed(organization_id))
            .await
            .map_err(fail)?;

        info!(
            schedule_id = schedule.id,
            work_order_id = work_order.id,
            next_due = %schedule.next_due,
            "PM schedule created"
        );

        Ok(ScheduleWithRelations {
            schedule,
            asset: Some(asset),
            tasks,
            trigger: Some(trigger),
            open_work_order: Some(work_order),
            work_order_created: true,
        })
    }

    /// Apply a partial update and make sure the schedule has an open work order.
    ///
    /// `payload.asset_id` is ignored. Priority, estimated hours and assignee only
    /// seed a work order materialized by this call.
    #[instrument(skip(self, payload), fields(schedule_id = schedule_id, organization_id = organization_id))]
    pub async fn update_schedule(
        &self,
        schedule_id: i64,
        organization_id: i64,
        payload: UpdateSchedulePayload,
    ) -> Result<ScheduleWithRelations> {
        if let Some(asset_id) = payload.asset_id {
            debug!(
                schedule_id = schedule_id,
                asset_id = asset_id,
                "Ignoring asset_id on schedule update"
            );
        }
        let (input, seed) = payload.split(organization_id);
        if let Some(title) = &input.title {
            validate_title(title)?;
        }

        let mut tx = self.begin("update").await?;
        let outcome = self
            .update_in_tx(tx.as_mut(), schedule_id, organization_id, input, &seed)
            .await;
        let updated = self.finish(tx, "update", outcome).await?;

        log_schedule_operation(
            "update",
            Some(schedule_id),
            updated.open_work_order.as_ref().map(|wo| wo.id),
            "success",
            updated.work_order_created.then_some("materialized work order"),
        );
        Ok(updated)
    }

    async fn update_in_tx(
        &self,
        tx: &mut dyn PmTransaction,
        schedule_id: i64,
        organization_id: i64,
        input: ScheduleUpdateInput,
        seed: &WorkOrderSeedInput,
    ) -> Result<ScheduleWithRelations> {
        let fail = |e| PmScheduleError::transaction("update", e);

        let (current, asset) = match load_owned_schedule(tx, schedule_id, organization_id)
            .await
            .map_err(fail)?
        {
            Ownership::Owned { schedule, asset } => (schedule, asset),
            other => return Err(schedule_not_visible(schedule_id, &other)),
        };

        let new_frequency = input.frequency.as_deref().map(|raw| normalize(Some(raw)));
        let frequency_changed = new_frequency.is_some_and(|f| f != current.frequency);
        let next_due = input.next_due.or_else(|| {
            new_frequency
                .filter(|_| frequency_changed)
                .map(|f| frequency::next_due(f, Utc::now()))
        });

        let changes = ScheduleChanges {
            title: input.title.map(|title| title.trim().to_string()),
            description: input.description,
            frequency: new_frequency,
            next_due,
        };
        let schedule = if changes.is_empty() {
            current.clone()
        } else {
            tx.update_schedule(schedule_id, &changes).await.map_err(fail)?
        };

        let trigger =
            trigger_lifecycle::reconcile(tx, schedule_id, current.frequency, schedule.frequency)
                .await
                .map_err(fail)?;

        let tasks = match input.task_ids {
            Some(task_ids) => {
                verify_tasks(tx, &task_ids).await.map_err(fail)?;
                tx.replace_schedule_tasks(schedule_id, &NewScheduleTask::ordered(&task_ids))
                    .await
                    .map_err(fail)?
            }
            None => tx.schedule_tasks(schedule_id).await.map_err(fail)?,
        };
        let task_ids: Vec<i64> = tasks.iter().map(|task| task.task_id).collect();

        let open = self
            .materializer
            .ensure_open_work_order(tx, &schedule, asset.as_ref(), &task_ids, seed)
            .await
            .map_err(fail)?;

        info!(
            schedule_id = schedule_id,
            frequency_changed = frequency_changed,
            work_order_id = open.work_order.id,
            work_order_created = open.created,
            "PM schedule updated"
        );

        Ok(ScheduleWithRelations {
            schedule,
            asset,
            tasks,
            trigger: Some(trigger),
            open_work_order: Some(open.work_order),
            work_order_created: open.created,
        })
    }

    /// Delete a schedule with its checklist and trigger. Its work orders stay,
    /// detached from the schedule.
    #[instrument(skip(self), fields(schedule_id = schedule_id, organization_id = organization_id))]
    pub async fn delete_schedule(&self, schedule_id: i64, organization_id: i64) -> Result<()> {
        let mut tx = self.begin("delete").await?;
        let outcome = Self::delete_in_tx(tx.as_mut(), schedule_id, organization_id).await;
        self.finish(tx, "delete", outcome).await?;

        log_schedule_operation("delete", Some(schedule_id), None, "success", None);
        Ok(())
    }

    async fn delete_in_tx(
        tx: &mut dyn PmTransaction,
        schedule_id: i64,
        organization_id: i64,
    ) -> Result<()> {
        let fail = |e| PmScheduleError::transaction("delete", e);

        match load_owned_schedule(tx, schedule_id, organization_id)
            .await
            .map_err(fail)?
        {
            Ownership::Owned { .. } => {}
            other => return Err(schedule_not_visible(schedule_id, &other)),
        }

        if !tx.delete_schedule(schedule_id).await.map_err(fail)? {
            return Err(PmScheduleError::not_found("Schedule", schedule_id));
        }
        info!(schedule_id = schedule_id, "PM schedule deleted");
        Ok(())
    }

    /// Delete many schedules, each in its own transaction. Per-schedule problems
    /// are reported in the result, never returned as errors.
    #[instrument(skip(self, schedule_ids), fields(requested = schedule_ids.len(), organization_id = organization_id))]
    pub async fn bulk_delete_schedules(
        &self,
        schedule_ids: &[i64],
        organization_id: i64,
    ) -> BulkDeleteResult {
        let result = self.bulk.bulk_delete(schedule_ids, organization_id).await;

        let details = format!(
            "deleted {} schedules, {} work orders, {} skipped, {} failed",
            result.deleted_schedules,
            result.deleted_work_orders,
            result.skipped.len(),
            result.failures.len()
        );
        let status = if result.failures.is_empty() { "success" } else { "partial" };
        log_schedule_operation("bulk_delete", None, None, status, Some(&details));
        result
    }

    /// Schedules with their most recent work orders, optionally scoped to an organization
    #[instrument(skip(self))]
    pub async fn list_schedules(&self, organization_id: Option<i64>) -> Result<Vec<ScheduleSummary>> {
        let summaries = self
            .store
            .list_schedules(organization_id, self.config.recent_work_order_limit)
            .await
            .map_err(|e| PmScheduleError::transaction("list", e))?;

        debug!(count = summaries.len(), "Listed PM schedules");
        Ok(summaries)
    }

    /// A single schedule with its checklist, trigger and current open work order
    #[instrument(skip(self), fields(schedule_id = schedule_id, organization_id = organization_id))]
    pub async fn get_schedule(
        &self,
        schedule_id: i64,
        organization_id: i64,
    ) -> Result<ScheduleWithRelations> {
        let mut tx = self.begin("load").await?;
        let outcome = Self::get_in_tx(tx.as_mut(), schedule_id, organization_id).await;
        // Read-only: nothing to keep
        rollback_quietly(tx, "load").await;
        outcome
    }

    async fn get_in_tx(
        tx: &mut dyn PmTransaction,
        schedule_id: i64,
        organization_id: i64,
    ) -> Result<ScheduleWithRelations> {
        let fail = |e| PmScheduleError::transaction("load", e);

        let (schedule, asset) = match find_owned_schedule(tx, schedule_id, organization_id)
            .await
            .map_err(fail)?
        {
            Ownership::Owned { schedule, asset } => (schedule, asset),
            other => return Err(schedule_not_visible(schedule_id, &other)),
        };

        let tasks = tx.schedule_tasks(schedule_id).await.map_err(fail)?;
        let trigger = tx.find_trigger(schedule_id).await.map_err(fail)?;
        let open_work_order = tx
            .find_open_work_orders(schedule_id)
            .await
            .map_err(fail)?
            .into_iter()
            .next();

        Ok(ScheduleWithRelations {
            schedule,
            asset,
            tasks,
            trigger,
            open_work_order,
            work_order_created: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    #[test]
    fn test_blank_title_is_rejected() {
        assert!(matches!(
            validate_title("   "),
            Err(PmScheduleError::Validation(_))
        ));
        assert!(validate_title("Lube Pump").is_ok());
    }

    #[test]
    fn test_ownership_of_foreign_and_missing_schedules() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            let asset = store.seed_asset("Chiller", 1).await;
            let manager = ScheduleLifecycleManager::new(Arc::new(store.clone()));
            let created = manager
                .create_schedule(CreateScheduleInput::new("Inspect chiller", asset.id), 1)
                .await
                .unwrap();

            let mut tx = store.begin().await.unwrap();
            let ownership = load_owned_schedule(tx.as_mut(), created.schedule.id, 2)
                .await
                .unwrap();
            assert_eq!(ownership, Ownership::Foreign { organization_id: 1 });

            let missing = load_owned_schedule(tx.as_mut(), 9_999, 1).await.unwrap();
            assert_eq!(missing, Ownership::Missing);
            tx.rollback().await.unwrap();
        });
    }

    #[test]
    fn test_ownership_of_schedule_without_asset_record() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            let asset = store.seed_asset("Chiller", 1).await;
            let manager = ScheduleLifecycleManager::new(Arc::new(store.clone()));
            let created = manager
                .create_schedule(CreateScheduleInput::new("Inspect chiller", asset.id), 1)
                .await
                .unwrap();
            store.remove_asset(asset.id).await;

            let mut tx = store.begin().await.unwrap();
            let locked = load_owned_schedule(tx.as_mut(), created.schedule.id, 7)
                .await
                .unwrap();
            let found = find_owned_schedule(tx.as_mut(), created.schedule.id, 7)
                .await
                .unwrap();
            tx.rollback().await.unwrap();

            let expected = Ownership::Owned {
                schedule: created.schedule,
                asset: None,
            };
            assert_eq!(locked, expected);
            assert_eq!(found, expected);
        });
    }

    #[test]
    fn test_get_schedule_does_not_lock_the_row() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            let asset = store.seed_asset("Chiller", 1).await;
            let manager = ScheduleLifecycleManager::new(Arc::new(store.clone()));
            let created = manager
                .create_schedule(CreateScheduleInput::new("Inspect chiller", asset.id), 1)
                .await
                .unwrap();
            let locks_before = store.schedule_locks_taken();

            let loaded = manager.get_schedule(created.schedule.id, 1).await.unwrap();
            assert_eq!(loaded.schedule, created.schedule);
            let foreign = manager.get_schedule(created.schedule.id, 2).await;
            assert!(foreign.unwrap_err().is_not_found());
            assert_eq!(store.schedule_locks_taken(), locks_before);

            manager
                .update_schedule(created.schedule.id, 1, UpdateSchedulePayload::default())
                .await
                .unwrap();
            assert_eq!(store.schedule_locks_taken(), locks_before + 1);
        });
    }

    #[test]
    fn test_create_with_unknown_task_rolls_back() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            let asset = store.seed_asset("Boiler", 1).await;
            let manager = ScheduleLifecycleManager::new(Arc::new(store.clone()));

            let err = manager
                .create_schedule(
                    CreateScheduleInput::new("Flush boiler", asset.id).with_tasks(vec![4_242]),
                    1,
                )
                .await
                .unwrap_err();

            assert!(matches!(
                err,
                PmScheduleError::NotFound { entity: "Task", id: 4_242 }
            ));
            assert!(manager.list_schedules(None).await.unwrap().is_empty());
        });
    }
}
