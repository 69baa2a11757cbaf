//! Records the fulfillment steps read and write through the shared session.

use chrono::{DateTime, Utc};
use domain::{LineItem, Money, OrderRequest, ProductId, RequestId};
use serde::{Deserialize, Serialize};

/// Stock level of one product, stored under `inventory/<sku>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub product_id: ProductId,
    pub available: u32,
}

impl StockRecord {
    pub fn new(product_id: impl Into<ProductId>, available: u32) -> Self {
        Self {
            product_id: product_id.into(),
            available,
        }
    }
}

/// An accepted charge, stored under `payments/<order_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: String,
    pub order_id: RequestId,
    pub amount: Money,
    pub payment_reference: String,
    pub charged_at: DateTime<Utc>,
}

/// Status of a persisted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Paid and committed; awaiting shipment.
    Confirmed,
}

/// A placed order, stored under `orders/<order_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: RequestId,
    pub status: OrderStatus,
    pub items: Vec<LineItem>,
    pub total: Money,
    pub contact_email: String,
    pub payment_id: String,
    pub created_at: DateTime<Utc>,
}

impl OrderRecord {
    /// Builds the record for a paid request.
    pub fn confirmed(request: &OrderRequest, payment_id: String) -> Self {
        Self {
            order_id: request.order_id,
            status: OrderStatus::Confirmed,
            items: request.items.clone(),
            total: request.total,
            contact_email: request.contact_email.clone(),
            payment_id,
            created_at: Utc::now(),
        }
    }
}

/// Audit trail entry for an order, stored under `audit_log/<order_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub order_id: RequestId,
    pub action: String,
    pub line_count: usize,
    pub unit_count: u64,
    pub total: Money,
    pub payment_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
