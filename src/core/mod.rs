//! Core domain models for ContextChain
//!
//! This module defines the pipeline schema document, its validation,
//! execution state and the connection configuration.

pub mod config;
pub mod context;
pub mod schema;
pub mod state;
pub mod validator;

pub use context::*;
pub use schema::*;
pub use state::*;
pub use validator::{domain_allowed, validate_schema, ValidationError};
