//! Shared types for the atomic order orchestrator.

pub mod types;

pub use types::RequestId;
