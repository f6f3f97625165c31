#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # PM Scheduler Core
//!
//! Preventive-maintenance scheduling engine for the maintenance-management platform.
//!
//! ## Overview
//!
//! The engine turns free-text recurrence descriptions ("every 6 weeks",
//! "MonthlyByWeekday|1|First_Mon", "quarterly") into a canonical [`Frequency`],
//! computes when equipment is next due, keeps each schedule's recurrence
//! [`Trigger`](models::Trigger) in sync, and guarantees that exactly one open
//! [`WorkOrder`](models::WorkOrder) exists per active schedule.
//!
//! ## Module Organization
//!
//! - [`frequency`] - Frequency normalization and next-due arithmetic (pure)
//! - [`models`] - Schedule, trigger, work order and read-only reference records
//! - [`persistence`] - Transactional persistence port plus in-memory and PostgreSQL adapters
//! - [`orchestration`] - Trigger lifecycle, work order materialization, schedule lifecycle
//!   and bulk cascade delete
//! - [`config`] - Layered configuration (defaults, file, environment)
//! - [`logging`] - Structured logging setup
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pm_scheduler::orchestration::{CreateScheduleInput, ScheduleLifecycleManager};
//! use pm_scheduler::persistence::MemoryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! let asset = store.seed_asset("Cooling Pump", 1).await;
//!
//! let manager = ScheduleLifecycleManager::new(Arc::new(store));
//! let input = CreateScheduleInput::new("Lube Pump", asset.id).with_frequency("6 weeks");
//! let created = manager.create_schedule(input, 1).await?;
//!
//! println!("{} next due {}", created.schedule.title, created.schedule.next_due);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod frequency;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod persistence;

pub use config::{DatabaseConfig, LoggingConfig, PmConfig, SchedulingConfig};
pub use constants::{Priority, ScheduleState, TriggerType, WorkOrderStatus, WorkOrderTaskStatus};
pub use error::{PmScheduleError, Result};
pub use frequency::{next_due, normalize, Frequency};
