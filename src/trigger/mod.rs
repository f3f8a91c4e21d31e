//! Cron-triggered task execution

pub mod cron;
pub mod handler;

pub use cron::CronSchedule;
pub use handler::{ScheduledTask, TriggerHandler};
