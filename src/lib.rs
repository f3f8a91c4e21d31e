//! contextchain - versioned pipelines of HTTP, LLM and local tasks

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod registry;
pub mod runners;
pub mod trigger;

// Re-export commonly used types
pub use core::{
    validate_schema, ExecutionStatus, PipelineSchema, RunReport, Task, TaskContext, TaskOutcome,
    TaskType,
};
pub use execution::{ExecutionEngine, ExecutionEvent};
pub use persistence::{InMemoryStore, Store};
pub use registry::{RegistryError, SchemaLoader, VersionManager};
pub use runners::{Dispatcher, TaskError, TaskRunner};
pub use trigger::{CronSchedule, TriggerHandler};
