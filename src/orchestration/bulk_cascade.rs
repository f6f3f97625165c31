//! # Bulk Cascade Processor
//!
//! Deletes many schedules for one organization. Each schedule is handled in its
//! own transaction: open work orders (and their checklists) are deleted first,
//! then the schedule itself, which cascades to its checklist and trigger and
//! detaches any closed work orders.
//!
//! A schedule that does not exist or belongs to another organization is skipped.
//! A schedule whose deletion fails is rolled back on its own and recorded in
//! [`BulkDeleteResult::failures`]; the remaining ids are still processed.

use super::schedule_lifecycle::{load_owned_schedule, rollback_quietly, Ownership};
use super::types::{BulkDeleteResult, BulkFailure, BulkSkip, SkipReason};
use crate::persistence::{PersistenceError, PersistenceResult, PmStore, PmTransaction};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info};

/// What happened to one schedule id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CascadeOutcome {
    Deleted { work_orders: u64 },
    Skipped(SkipReason),
}

pub struct BulkCascadeProcessor {
    store: Arc<dyn PmStore>,
}

impl BulkCascadeProcessor {
    pub fn new(store: Arc<dyn PmStore>) -> Self {
        Self { store }
    }

    /// Delete the given schedules, processing each distinct id once in input order
    pub async fn bulk_delete(&self, schedule_ids: &[i64], organization_id: i64) -> BulkDeleteResult {
        let mut seen = HashSet::new();
        let mut result = BulkDeleteResult::default();

        for &schedule_id in schedule_ids.iter().filter(|id| seen.insert(**id)) {
            match self.delete_one(schedule_id, organization_id).await {
                Ok(CascadeOutcome::Deleted { work_orders }) => {
                    result.deleted_schedules += 1;
                    result.deleted_work_orders += work_orders;
                    result.processed_ids.push(schedule_id);
                }
                Ok(CascadeOutcome::Skipped(reason)) => {
                    debug!(schedule_id = schedule_id, reason = ?reason, "Skipping schedule in bulk delete");
                    result.skipped.push(BulkSkip { schedule_id, reason });
                }
                Err(e) => {
                    error!(schedule_id = schedule_id, error = %e, "Bulk delete of schedule failed");
                    result.failures.push(BulkFailure {
                        schedule_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            requested = schedule_ids.len(),
            deleted_schedules = result.deleted_schedules,
            deleted_work_orders = result.deleted_work_orders,
            skipped = result.skipped.len(),
            failed = result.failures.len(),
            "Bulk schedule delete finished"
        );
        result
    }

    async fn delete_one(
        &self,
        schedule_id: i64,
        organization_id: i64,
    ) -> PersistenceResult<CascadeOutcome> {
        let mut tx = self.store.begin().await?;
        match cascade(tx.as_mut(), schedule_id, organization_id).await {
            Ok(outcome @ CascadeOutcome::Deleted { .. }) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Ok(skipped) => {
                rollback_quietly(tx, "bulk delete").await;
                Ok(skipped)
            }
            Err(e) => {
                rollback_quietly(tx, "bulk delete").await;
                Err(e)
            }
        }
    }
}

async fn cascade(
    tx: &mut dyn PmTransaction,
    schedule_id: i64,
    organization_id: i64,
) -> PersistenceResult<CascadeOutcome> {
    match load_owned_schedule(tx, schedule_id, organization_id).await? {
        Ownership::Owned { .. } => {}
        Ownership::Missing => return Ok(CascadeOutcome::Skipped(SkipReason::NotFound)),
        Ownership::Foreign { .. } => {
            return Ok(CascadeOutcome::Skipped(SkipReason::OtherOrganization))
        }
    }

    let open_ids: Vec<i64> = tx
        .find_open_work_orders(schedule_id)
        .await?
        .iter()
        .map(|wo| wo.id)
        .collect();
    let work_orders = if open_ids.is_empty() {
        0
    } else {
        tx.delete_work_orders(&open_ids).await?
    };

    if !tx.delete_schedule(schedule_id).await? {
        return Err(PersistenceError::RowNotFound {
            entity: "Schedule",
            id: schedule_id,
        });
    }

    Ok(CascadeOutcome::Deleted { work_orders })
}
