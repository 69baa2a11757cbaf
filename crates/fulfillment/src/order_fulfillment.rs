//! Order fulfillment step names, record collections and the standard pipeline.

use domain::OrderRequest;
use orchestrator::Step;
use transactor::RecordSession;

use crate::services::{Notifier, PaymentGateway};
use crate::steps::{
    AuditLogStep, CreateOrderStep, ProcessPaymentStep, ReserveInventoryStep, SendNotificationStep,
};

/// Collection holding one `StockRecord` per SKU.
pub const INVENTORY: &str = "inventory";

/// Collection holding one `PaymentRecord` per order.
pub const PAYMENTS: &str = "payments";

/// Collection holding one `OrderRecord` per order.
pub const ORDERS: &str = "orders";

/// Collection holding one `AuditRecord` per order.
pub const AUDIT_LOG: &str = "audit_log";

/// Step name: Reserve inventory for the order.
pub const STEP_RESERVE_INVENTORY: &str = "reserve_inventory";

/// Step name: Charge the order total.
pub const STEP_PROCESS_PAYMENT: &str = "process_payment";

/// Step name: Persist the order.
pub const STEP_CREATE_ORDER: &str = "create_order";

/// Step name: Send the confirmation.
pub const STEP_SEND_NOTIFICATION: &str = "send_notification";

/// Step name: Record the audit entry.
pub const STEP_AUDIT_LOG: &str = "audit_log";

/// Builds the five fulfillment steps in execution order:
/// inventory, payment, order creation, notification, audit log.
pub fn standard_steps<S, P, N>(gateway: P, notifier: N) -> Vec<Box<dyn Step<OrderRequest, S>>>
where
    S: RecordSession + 'static,
    P: PaymentGateway + 'static,
    N: Notifier + 'static,
{
    vec![
        Box::new(ReserveInventoryStep),
        Box::new(ProcessPaymentStep::new(gateway)),
        Box::new(CreateOrderStep),
        Box::new(SendNotificationStep::new(notifier)),
        Box::new(AuditLogStep),
    ]
}
