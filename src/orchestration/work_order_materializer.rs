//! # Work Order Materializer
//!
//! Turns a schedule into a concrete work order and snapshots its checklist.
//!
//! ## At-most-one-open
//!
//! A schedule may have at most one work order whose status is not COMPLETED or
//! CANCELED. [`WorkOrderMaterializer::ensure_open_work_order`] checks for one and
//! only creates a work order when none exists. The check and the insert run on
//! the caller's transaction, which must already hold the schedule lock (see
//! [`PmTransaction::lock_schedule`]) for the guarantee to hold under concurrency.

use super::types::WorkOrderSeedInput;
use crate::config::SchedulingConfig;
use crate::constants::{Priority, WorkOrderStatus, WorkOrderTaskStatus};
use crate::models::{Asset, NewWorkOrder, NewWorkOrderTask, Schedule, Task, WorkOrder};
use crate::persistence::{PersistenceError, PersistenceResult, PmTransaction};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// The open work order of a schedule after materialization ran
#[derive(Debug, Clone, PartialEq)]
pub struct OpenWorkOrder {
    pub work_order: WorkOrder,
    /// False when an existing open work order was found and kept
    pub created: bool,
}

#[derive(Debug, Clone)]
pub struct WorkOrderMaterializer {
    default_priority: Priority,
    fallback_asset_name: String,
}

impl Default for WorkOrderMaterializer {
    fn default() -> Self {
        Self::new(&SchedulingConfig::default())
    }
}

impl WorkOrderMaterializer {
    pub fn new(config: &SchedulingConfig) -> Self {
        Self {
            default_priority: config.default_priority,
            fallback_asset_name: config.fallback_asset_name.clone(),
        }
    }

    /// Work order title: `"{schedule title} - {asset name}"`
    pub fn title_for(&self, schedule: &Schedule, asset: Option<&Asset>) -> String {
        format!("{} - {}", schedule.title, self.asset_name(asset))
    }

    /// The schedule's description, or a generic one naming the asset
    pub fn description_for(&self, schedule: &Schedule, asset: Option<&Asset>) -> String {
        schedule
            .description
            .clone()
            .filter(|description| !description.trim().is_empty())
            .unwrap_or_else(|| format!("Preventive maintenance for {}", self.asset_name(asset)))
    }

    fn asset_name<'a>(&'a self, asset: Option<&'a Asset>) -> &'a str {
        asset.map_or(self.fallback_asset_name.as_str(), |asset| asset.name.as_str())
    }

    /// Create an OPEN work order for the schedule, with one checklist item per task.
    ///
    /// Checklist items follow `task_ids` order and copy the task template's
    /// title, description and procedure as they are right now.
    pub async fn materialize(
        &self,
        tx: &mut dyn PmTransaction,
        schedule: &Schedule,
        asset: Option<&Asset>,
        task_ids: &[i64],
        seed: &WorkOrderSeedInput,
    ) -> PersistenceResult<WorkOrder> {
        let templates = load_templates(tx, task_ids).await?;

        let work_order = tx
            .insert_work_order(&NewWorkOrder {
                title: self.title_for(schedule, asset),
                description: self.description_for(schedule, asset),
                status: WorkOrderStatus::Open,
                priority: seed.priority.unwrap_or(self.default_priority),
                due_date: schedule.next_due,
                asset_id: schedule.asset_id,
                assigned_to_id: seed.assigned_to_id,
                schedule_id: Some(schedule.id),
                organization_id: seed.organization_id,
                estimated_hours: seed.estimated_hours,
            })
            .await?;

        if !templates.is_empty() {
            let checklist: Vec<NewWorkOrderTask> = templates
                .into_iter()
                .zip(0..)
                .map(|(task, order_index)| NewWorkOrderTask {
                    work_order_id: work_order.id,
                    task_id: task.id,
                    title: task.title,
                    description: task.description,
                    procedure: task.procedure,
                    order_index,
                    status: WorkOrderTaskStatus::NotStarted,
                })
                .collect();
            tx.insert_work_order_tasks(&checklist).await?;
        }

        info!(
            schedule_id = schedule.id,
            work_order_id = work_order.id,
            task_count = task_ids.len(),
            due_date = %work_order.due_date,
            "Materialized PM work order"
        );
        Ok(work_order)
    }

    /// Return the schedule's open work order, materializing one if there is none
    pub async fn ensure_open_work_order(
        &self,
        tx: &mut dyn PmTransaction,
        schedule: &Schedule,
        asset: Option<&Asset>,
        task_ids: &[i64],
        seed: &WorkOrderSeedInput,
    ) -> PersistenceResult<OpenWorkOrder> {
        let mut open = tx.find_open_work_orders(schedule.id).await?;

        if open.len() > 1 {
            warn!(
                schedule_id = schedule.id,
                open_count = open.len(),
                "Schedule already has more than one open work order"
            );
        }

        if !open.is_empty() {
            let work_order = open.swap_remove(0);
            debug!(
                schedule_id = schedule.id,
                work_order_id = work_order.id,
                "Open work order exists, skipping materialization"
            );
            return Ok(OpenWorkOrder {
                work_order,
                created: false,
            });
        }

        let work_order = self.materialize(tx, schedule, asset, task_ids, seed).await?;
        Ok(OpenWorkOrder {
            work_order,
            created: true,
        })
    }
}

/// Task templates in `task_ids` order; any unknown id is an error
async fn load_templates(
    tx: &mut dyn PmTransaction,
    task_ids: &[i64],
) -> PersistenceResult<Vec<Task>> {
    if task_ids.is_empty() {
        return Ok(Vec::new());
    }

    let by_id: HashMap<i64, Task> = tx
        .find_tasks(task_ids)
        .await?
        .into_iter()
        .map(|task| (task.id, task))
        .collect();

    task_ids
        .iter()
        .map(|id| {
            by_id
                .get(id)
                .cloned()
                .ok_or(PersistenceError::RowNotFound { entity: "Task", id: *id })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::Frequency;
    use crate::models::NewSchedule;
    use crate::persistence::{MemoryStore, PmStore};
    use chrono::Utc;

    fn schedule(description: Option<&str>) -> Schedule {
        let now = Utc::now();
        Schedule {
            id: 1,
            title: "Lube Pump".to_string(),
            description: description.map(str::to_string),
            frequency: Frequency::Weekly,
            next_due: now,
            asset_id: 7,
            created_at: now,
            updated_at: now,
        }
    }

    fn asset() -> Asset {
        Asset {
            id: 7,
            name: "Cooling Pump".to_string(),
            organization_id: 1,
        }
    }

    #[test]
    fn test_title_uses_asset_name() {
        let materializer = WorkOrderMaterializer::default();
        assert_eq!(
            materializer.title_for(&schedule(None), Some(&asset())),
            "Lube Pump - Cooling Pump"
        );
    }

    #[test]
    fn test_title_falls_back_to_asset_literal() {
        let materializer = WorkOrderMaterializer::default();
        assert_eq!(materializer.title_for(&schedule(None), None), "Lube Pump - Asset");
    }

    #[test]
    fn test_description_fallback() {
        let materializer = WorkOrderMaterializer::default();
        assert_eq!(
            materializer.description_for(&schedule(None), Some(&asset())),
            "Preventive maintenance for Cooling Pump"
        );
        assert_eq!(
            materializer.description_for(&schedule(Some("Check oil level")), Some(&asset())),
            "Check oil level"
        );
        assert_eq!(
            materializer.description_for(&schedule(None), None),
            "Preventive maintenance for Asset"
        );
    }

    #[test]
    fn test_fallback_asset_name_is_configurable() {
        let config = SchedulingConfig {
            fallback_asset_name: "Equipment".to_string(),
            ..SchedulingConfig::default()
        };
        let materializer = WorkOrderMaterializer::new(&config);
        assert_eq!(materializer.title_for(&schedule(None), None), "Lube Pump - Equipment");
    }

    #[test]
    fn test_ensure_open_work_order_reports_whether_it_created_one() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            let asset = store.seed_asset("Cooling Pump", 1).await;
            let materializer = WorkOrderMaterializer::default();
            let seed = WorkOrderSeedInput {
                organization_id: 1,
                ..Default::default()
            };

            let mut tx = store.begin().await.unwrap();
            let schedule = tx
                .insert_schedule(&NewSchedule {
                    title: "Lube Pump".to_string(),
                    description: None,
                    frequency: Frequency::Weekly,
                    next_due: Utc::now(),
                    asset_id: asset.id,
                })
                .await
                .unwrap();

            let first = materializer
                .ensure_open_work_order(tx.as_mut(), &schedule, Some(&asset), &[], &seed)
                .await
                .unwrap();
            assert!(first.created);
            assert_eq!(first.work_order.status, WorkOrderStatus::Open);
            assert_eq!(first.work_order.due_date, schedule.next_due);

            let second = materializer
                .ensure_open_work_order(tx.as_mut(), &schedule, None, &[], &seed)
                .await
                .unwrap();
            assert!(!second.created);
            assert_eq!(second.work_order, first.work_order);
            tx.rollback().await.unwrap();
        });
    }
}
