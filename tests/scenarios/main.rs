//! Scenario-based tests for contextchain

mod helpers;

mod failure_handling;
mod input_chaining;
mod registry_versions;
mod retry_behavior;
mod success_chain;
mod triggers;
