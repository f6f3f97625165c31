//! PostgreSQL adapter tests.
//!
//! Each test gets a fresh database from `#[sqlx::test]` and applies `db/schema.sql`.
//!
//! Requires: DATABASE_URL pointing at a PostgreSQL server
//! Enable with: --features test-database

#![cfg(feature = "test-database")]

use futures::future::join_all;
use pm_scheduler::orchestration::{CreateScheduleInput, ScheduleLifecycleManager, UpdateSchedulePayload};
use pm_scheduler::persistence::PgStore;
use pm_scheduler::{Frequency, ScheduleState, WorkOrderStatus};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const ORG: i64 = 1;
const OTHER_ORG: i64 = 2;

async fn apply_schema(pool: &PgPool) -> sqlx::Result<()> {
    sqlx::raw_sql(include_str!("../db/schema.sql"))
        .execute(pool)
        .await?;
    Ok(())
}

async fn seed_asset(pool: &PgPool, name: &str, organization_id: i64) -> sqlx::Result<i64> {
    sqlx::query_scalar("INSERT INTO assets (name, organization_id) VALUES ($1, $2) RETURNING id")
        .bind(name)
        .bind(organization_id)
        .fetch_one(pool)
        .await
}

async fn seed_task(pool: &PgPool, title: &str, procedure: Option<&str>) -> sqlx::Result<i64> {
    sqlx::query_scalar("INSERT INTO tasks (title, procedure) VALUES ($1, $2) RETURNING id")
        .bind(title)
        .bind(procedure)
        .fetch_one(pool)
        .await
}

async fn complete_work_order(pool: &PgPool, work_order_id: i64) -> sqlx::Result<()> {
    sqlx::query("UPDATE work_orders SET status = 'COMPLETED' WHERE id = $1")
        .bind(work_order_id)
        .execute(pool)
        .await?;
    Ok(())
}

async fn count_open_work_orders(pool: &PgPool, schedule_id: i64) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM work_orders WHERE schedule_id = $1 AND status = 'OPEN'")
        .bind(schedule_id)
        .fetch_one(pool)
        .await
}

fn manager_for(pool: &PgPool) -> ScheduleLifecycleManager {
    ScheduleLifecycleManager::new(Arc::new(PgStore::new(pool.clone())))
}

#[sqlx::test]
async fn test_create_update_and_bulk_delete_round_trip(pool: PgPool) -> TestResult {
    apply_schema(&pool).await?;
    let asset_id = seed_asset(&pool, "Cooling Pump", ORG).await?;
    let oil = seed_task(&pool, "Check oil", Some("Open sight glass")).await?;
    let grease = seed_task(&pool, "Grease bearings", None).await?;
    let manager = manager_for(&pool);

    let created = manager
        .create_schedule(
            CreateScheduleInput::new("Lube Pump", asset_id)
                .with_frequency("6 weeks")
                .with_tasks(vec![oil, grease]),
            ORG,
        )
        .await?;
    let schedule_id = created.schedule.id;
    assert_eq!(created.schedule.frequency, Frequency::Weekly);
    let first = created.open_work_order.expect("created with a work order");
    assert_eq!(first.title, "Lube Pump - Cooling Pump");
    assert_eq!(first.organization_id, ORG);

    let checklist: Vec<(String, Option<String>)> = sqlx::query_as(
        "SELECT title, procedure FROM work_order_tasks WHERE work_order_id = $1 ORDER BY order_index",
    )
    .bind(first.id)
    .fetch_all(&pool)
    .await?;
    assert_eq!(
        checklist,
        vec![
            ("Check oil".to_string(), Some("Open sight glass".to_string())),
            ("Grease bearings".to_string(), None),
        ]
    );

    complete_work_order(&pool, first.id).await?;
    let updated = manager
        .update_schedule(
            schedule_id,
            ORG,
            UpdateSchedulePayload {
                title: Some("Lube Pump Bearings".to_string()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(updated.schedule.title, "Lube Pump Bearings");
    assert!(updated.work_order_created);
    let second = updated.open_work_order.expect("materialized on update");

    let loaded = manager.get_schedule(schedule_id, ORG).await?;
    assert_eq!(loaded.tasks.len(), 2);
    assert_eq!(loaded.open_work_order.map(|wo| wo.id), Some(second.id));
    assert!(manager.get_schedule(schedule_id, OTHER_ORG).await.is_err());

    let summaries = manager.list_schedules(Some(ORG)).await?;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].task_count, 2);
    assert_eq!(summaries[0].work_order_count, 2);
    assert_eq!(summaries[0].state, ScheduleState::ActiveWithOpenWork);
    assert_eq!(summaries[0].recent_work_orders[0].id, second.id);
    assert_eq!(summaries[0].asset.as_ref().map(|a| a.id), Some(asset_id));
    assert!(manager.list_schedules(Some(OTHER_ORG)).await?.is_empty());

    let result = manager.bulk_delete_schedules(&[schedule_id], ORG).await;
    assert!(result.is_complete_success());
    assert_eq!(result.deleted_schedules, 1);
    assert_eq!(result.deleted_work_orders, 1);

    let remaining: Vec<(i64, Option<i64>, String)> =
        sqlx::query_as("SELECT id, schedule_id, status FROM work_orders ORDER BY id")
            .fetch_all(&pool)
            .await?;
    assert_eq!(remaining, vec![(first.id, None, "COMPLETED".to_string())]);

    let triggers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pm_triggers")
        .fetch_one(&pool)
        .await?;
    assert_eq!(triggers, 0);
    assert!(manager.list_schedules(None).await?.is_empty());
    Ok(())
}

#[sqlx::test]
async fn test_concurrent_updates_leave_exactly_one_open_work_order(pool: PgPool) -> TestResult {
    apply_schema(&pool).await?;
    let asset_id = seed_asset(&pool, "Cooling Pump", ORG).await?;
    let manager = Arc::new(manager_for(&pool));

    let created = manager
        .create_schedule(
            CreateScheduleInput::new("Lube Pump", asset_id).with_frequency("weekly"),
            ORG,
        )
        .await?;
    let schedule_id = created.schedule.id;
    let first = created.open_work_order.expect("created with a work order");
    complete_work_order(&pool, first.id).await?;

    let updates = (0..6).map(|i| {
        let manager = Arc::clone(&manager);
        async move {
            manager
                .update_schedule(
                    schedule_id,
                    ORG,
                    UpdateSchedulePayload {
                        description: Some(format!("pass {i}")),
                        ..Default::default()
                    },
                )
                .await
        }
    });

    let mut created_count = 0;
    for result in join_all(updates).await {
        if result?.work_order_created {
            created_count += 1;
        }
    }

    assert_eq!(created_count, 1);
    assert_eq!(count_open_work_orders(&pool, schedule_id).await?, 1);
    Ok(())
}

#[sqlx::test]
async fn test_frequency_change_rewrites_trigger_row_in_place(pool: PgPool) -> TestResult {
    apply_schema(&pool).await?;
    let asset_id = seed_asset(&pool, "Cooling Pump", ORG).await?;
    let manager = manager_for(&pool);

    let created = manager
        .create_schedule(
            CreateScheduleInput::new("Lube Pump", asset_id).with_frequency("weekly"),
            ORG,
        )
        .await?;
    let schedule_id = created.schedule.id;
    let original = created.trigger.expect("created with a trigger");
    sqlx::query("UPDATE pm_triggers SET last_triggered = NOW() WHERE id = $1")
        .bind(original.id)
        .execute(&pool)
        .await?;

    let updated = manager
        .update_schedule(
            schedule_id,
            ORG,
            UpdateSchedulePayload {
                frequency: Some("12-month".to_string()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(updated.schedule.frequency, Frequency::Yearly);

    let rows: Vec<(i64, Option<i32>, Option<i32>, Option<i32>, bool)> = sqlx::query_as(
        "SELECT id, interval_days, interval_weeks, interval_months, last_triggered IS NULL \
         FROM pm_triggers WHERE schedule_id = $1",
    )
    .bind(schedule_id)
    .fetch_all(&pool)
    .await?;
    assert_eq!(rows, vec![(original.id, None, None, Some(12), true)]);
    Ok(())
}

#[sqlx::test]
async fn test_get_schedule_does_not_wait_on_a_held_row_lock(pool: PgPool) -> TestResult {
    apply_schema(&pool).await?;
    let asset_id = seed_asset(&pool, "Cooling Pump", ORG).await?;
    let manager = manager_for(&pool);

    let created = manager
        .create_schedule(CreateScheduleInput::new("Lube Pump", asset_id), ORG)
        .await?;
    let schedule_id = created.schedule.id;

    let mut writer = pool.begin().await?;
    sqlx::query("SELECT id FROM pm_schedules WHERE id = $1 FOR UPDATE")
        .bind(schedule_id)
        .execute(&mut *writer)
        .await?;

    let loaded = tokio::time::timeout(
        Duration::from_secs(5),
        manager.get_schedule(schedule_id, ORG),
    )
    .await
    .expect("read blocked behind a row lock")?;
    assert_eq!(loaded.schedule.id, schedule_id);

    writer.rollback().await?;
    Ok(())
}

#[sqlx::test]
async fn test_listing_windows_recent_work_orders_per_schedule(pool: PgPool) -> TestResult {
    apply_schema(&pool).await?;
    let ours = seed_asset(&pool, "Cooling Pump", ORG).await?;
    let theirs = seed_asset(&pool, "Neighbor Pump", OTHER_ORG).await?;
    let manager = manager_for(&pool);

    let schedule = manager
        .create_schedule(CreateScheduleInput::new("Lube Pump", ours), ORG)
        .await?;
    manager
        .create_schedule(CreateScheduleInput::new("Neighbor lube", theirs), OTHER_ORG)
        .await?;

    // Cycle through seven work orders so the recent window has to cut
    let mut current = schedule.open_work_order.expect("created with a work order");
    for _ in 0..6 {
        complete_work_order(&pool, current.id).await?;
        current = manager
            .update_schedule(schedule.schedule.id, ORG, UpdateSchedulePayload::default())
            .await?
            .open_work_order
            .expect("materialized on update");
    }

    let all = manager.list_schedules(None).await?;
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].work_order_count, 7);
    assert_eq!(all[0].recent_work_orders.len(), 5);
    assert_eq!(all[0].recent_work_orders[0].id, current.id);
    assert!(all[0]
        .recent_work_orders
        .iter()
        .skip(1)
        .all(|wo| wo.status == WorkOrderStatus::Completed));
    assert_eq!(all[1].work_order_count, 1);
    assert_eq!(all[1].task_count, 0);
    assert_eq!(all[1].asset.as_ref().map(|a| a.organization_id), Some(OTHER_ORG));
    Ok(())
}
