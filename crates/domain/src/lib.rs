//! Domain layer for the atomic order orchestrator.
//!
//! This crate provides the shared request data every orchestration step
//! reads and mutates:
//! - Value objects (product IDs, money, line items)
//! - The order request itself, with its validation rules

pub mod error;
pub mod request;
pub mod value_objects;

pub use common::RequestId;
pub use error::RequestError;
pub use request::OrderRequest;
pub use value_objects::{LineItem, Money, ProductId};
