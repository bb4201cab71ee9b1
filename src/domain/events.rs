//! Domain events raised by the order aggregate.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::order::OrderStatus;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Created {
        order_id: Uuid,
        order_number: String,
        grand_total: Decimal,
    },
    StatusChanged {
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    },
    Delivered {
        order_id: Uuid,
    },
    Cancelled {
        order_id: Uuid,
    },
}

impl OrderEvent {
    /// NATS subject the event is published under.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Created { .. } => "orders.created",
            Self::StatusChanged { .. } => "orders.status_changed",
            Self::Delivered { .. } => "orders.delivered",
            Self::Cancelled { .. } => "orders.cancelled",
        }
    }
}
