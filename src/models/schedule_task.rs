use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Ordered checklist entry joining a schedule to a task template.
/// Maps to `pm_schedule_tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ScheduleTask {
    pub id: i64,
    pub schedule_id: i64,
    pub task_id: i64,
    pub order_index: i32,
    pub is_required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewScheduleTask {
    pub task_id: i64,
    pub order_index: i32,
    pub is_required: bool,
}

impl NewScheduleTask {
    /// Build a required checklist from task ids, keeping their order
    pub fn ordered(task_ids: &[i64]) -> Vec<NewScheduleTask> {
        task_ids
            .iter()
            .zip(0..)
            .map(|(task_id, order_index)| NewScheduleTask {
                task_id: *task_id,
                order_index,
                is_required: true,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_checklist_preserves_input_order() {
        let tasks = NewScheduleTask::ordered(&[30, 10, 20]);
        let ids: Vec<_> = tasks.iter().map(|t| (t.task_id, t.order_index)).collect();
        assert_eq!(ids, vec![(30, 0), (10, 1), (20, 2)]);
        assert!(tasks.iter().all(|t| t.is_required));
    }
}
