//! External service traits and in-memory implementations used by the steps.

pub mod notification;
pub mod payment;

pub use notification::{InMemoryNotifier, Notification, Notifier};
pub use payment::{InMemoryPaymentGateway, PaymentGateway, PaymentReceipt};
