//! Order fulfillment steps for the atomic order orchestrator.
//!
//! A fulfillment run executes these steps inside one transaction:
//! 1. Reserve inventory
//! 2. Process payment
//! 3. Create the order record
//! 4. Send the confirmation (best effort)
//! 5. Write the audit log entry
//!
//! If any step fails, nothing the run wrote through the session is kept.
//! Side effects outside the session, such as an accepted charge, are not
//! reversed.

pub mod error;
pub mod order_fulfillment;
pub mod records;
pub mod services;
pub mod steps;

pub use error::FulfillmentError;
pub use order_fulfillment::standard_steps;
pub use records::{AuditRecord, OrderRecord, OrderStatus, PaymentRecord, StockRecord};
pub use services::{
    InMemoryNotifier, InMemoryPaymentGateway, Notification, Notifier, PaymentGateway,
    PaymentReceipt,
};
pub use steps::{
    AuditLogStep, CreateOrderStep, ProcessPaymentStep, ReserveInventoryStep, SendNotificationStep,
};
