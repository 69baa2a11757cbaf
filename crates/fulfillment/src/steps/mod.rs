//! The order fulfillment steps.
//!
//! Every step is generic over the session type, so the same steps run
//! against any resource whose session implements `RecordSession`.

pub mod audit;
pub mod inventory;
pub mod notification;
pub mod order;
pub mod payment;

pub use audit::AuditLogStep;
pub use inventory::ReserveInventoryStep;
pub use notification::SendNotificationStep;
pub use order::CreateOrderStep;
pub use payment::ProcessPaymentStep;
