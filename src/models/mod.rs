//! # Data Models
//!
//! Records owned by the scheduling engine plus the read-only reference data
//! (assets, task templates) it consumes from the rest of the platform.
//!
//! Each persisted model comes with a `New*` companion carrying only the
//! fields a caller supplies at creation time.

pub mod reference;
pub mod schedule;
pub mod schedule_task;
pub mod trigger;
pub mod work_order;

pub use reference::{Asset, Task};
pub use schedule::{NewSchedule, Schedule, ScheduleChanges, ScheduleSummary, ScheduleWithRelations};
pub use schedule_task::{NewScheduleTask, ScheduleTask};
pub use trigger::{IntervalFields, NewTrigger, Trigger};
pub use work_order::{NewWorkOrder, NewWorkOrderTask, WorkOrder, WorkOrderTask};
