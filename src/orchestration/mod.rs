//! # Orchestration
//!
//! Effectful side of the scheduling engine. Everything here works through the
//! injected persistence port and never holds a database client of its own.
//!
//! ## Core Components
//!
//! - **ScheduleLifecycleManager**: create, update, read and delete schedules, each
//!   in one transaction
//! - **BulkCascadeProcessor**: delete many schedules with one transaction per id and
//!   an aggregated result
//! - **WorkOrderMaterializer**: turn a schedule into an OPEN work order with a
//!   snapshot of its checklist, at most one open per schedule
//! - **trigger_lifecycle**: keep the schedule's single time-based trigger matching
//!   its frequency
//!
//! Data flows one way: lifecycle manager, then the pure frequency functions, then
//! the trigger lifecycle and materializer, then persistence.

pub mod bulk_cascade;
pub mod schedule_lifecycle;
pub mod trigger_lifecycle;
pub mod types;
pub mod work_order_materializer;

pub use bulk_cascade::BulkCascadeProcessor;
pub use schedule_lifecycle::ScheduleLifecycleManager;
pub use types::{
    BulkDeleteResult, BulkFailure, BulkSkip, CreateScheduleInput, ScheduleUpdateInput,
    SkipReason, UpdateSchedulePayload, WorkOrderSeedInput,
};
pub use work_order_materializer::{OpenWorkOrder, WorkOrderMaterializer};
