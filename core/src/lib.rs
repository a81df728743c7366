//! Plan-execute orchestration engine.
//!
//! Turns model-written plan text into a validated step DAG, runs it layer by
//! layer against a tool registry, and publishes progress and plan records.

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod events_out;
pub mod executor;
pub mod plan;
pub mod state;
pub mod tools;
