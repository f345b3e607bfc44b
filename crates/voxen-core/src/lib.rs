//! Voxen Core - Foundation types shared by the voxen engine crates.
//!
//! This crate provides the error types and the target-scoped logging macros
//! used by every runtime component. It deliberately carries no scheduler
//! logic of its own.

pub mod error;
pub mod logging;

pub use error::SchedulerError;
