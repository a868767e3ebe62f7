//! Deferred and recurring work for sidekick.
//!
//! This crate provides:
//!
//! - **Job scheduler**: one-time and cron-driven callbacks grouped by tag and
//!   conversation, cancellable as a group
//! - **Cron schedules**: timezone-aware next-occurrence evaluation
//! - **Debouncer**: per-key trailing-edge collapsing of event bursts

pub mod debounce;
pub mod error;
pub mod job;
pub mod schedule;

pub use debounce::Debouncer;
pub use error::ScheduleError;
pub use job::{JobFuture, JobKey, JobScheduler};
pub use schedule::CronSchedule;
