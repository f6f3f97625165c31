#![allow(dead_code)]

pub mod strategies;

use pm_scheduler::models::{Asset, ScheduleWithRelations, Task};
use pm_scheduler::orchestration::{CreateScheduleInput, ScheduleLifecycleManager};
use pm_scheduler::persistence::MemoryStore;
use std::sync::Arc;

pub const ORG: i64 = 1;
pub const OTHER_ORG: i64 = 2;

/// A memory store with one asset and two task templates, plus a manager over it
pub struct Fixture {
    pub store: MemoryStore,
    pub manager: ScheduleLifecycleManager,
    pub asset: Asset,
    pub tasks: Vec<Task>,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = MemoryStore::new();
        let asset = store.seed_asset("Cooling Pump", ORG).await;
        let tasks = vec![
            store
                .seed_task("Check oil", Some("Verify oil level"), Some("Open sight glass"))
                .await,
            store
                .seed_task("Grease bearings", None, Some("Two pumps of grease per bearing"))
                .await,
        ];
        let manager = ScheduleLifecycleManager::new(Arc::new(store.clone()));
        Self {
            store,
            manager,
            asset,
            tasks,
        }
    }

    pub fn task_ids(&self) -> Vec<i64> {
        self.tasks.iter().map(|task| task.id).collect()
    }

    pub fn input(&self, title: &str, frequency: &str) -> CreateScheduleInput {
        CreateScheduleInput::new(title, self.asset.id).with_frequency(frequency)
    }

    pub async fn create(&self, title: &str, frequency: &str) -> ScheduleWithRelations {
        self.manager
            .create_schedule(self.input(title, frequency), ORG)
            .await
            .expect("schedule creation should succeed")
    }

    /// A schedule whose only work order has been completed
    pub async fn create_without_open_work(&self, title: &str, frequency: &str) -> ScheduleWithRelations {
        let created = self.create(title, frequency).await;
        let work_order = created.open_work_order.as_ref().expect("created with work order");
        self.store
            .set_work_order_status(work_order.id, pm_scheduler::WorkOrderStatus::Completed)
            .await
            .expect("work order exists");
        created
    }
}
