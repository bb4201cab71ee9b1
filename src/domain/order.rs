//! Order aggregate: creation validation, status state machine, history log,
//! cancellation/return eligibility, summary projection.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::clock::Clock;
use crate::domain::events::OrderEvent;
use crate::domain::number::{OrderNumber, SuffixSource};
use crate::domain::pricing::PriceBreakdown;

/// Days after delivery during which a return stays eligible.
pub const RETURN_WINDOW_DAYS: i64 = 30;
/// Days after creation quoted as the estimated delivery date.
pub const ESTIMATED_DELIVERY_DAYS: i64 = 5;

const PLACED_NOTE: &str = "Order placed successfully";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Processing,
    Confirmed,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    /// Position along the fulfillment chain; side-exits have no rank.
    fn rank(self) -> Option<u8> {
        match self {
            Self::Processing => Some(0),
            Self::Confirmed => Some(1),
            Self::Shipped => Some(2),
            Self::OutForDelivery => Some(3),
            Self::Delivered => Some(4),
            Self::Cancelled | Self::Returned => None,
        }
    }

    /// Whether `next` is a legal transition. Fulfillment states move forward
    /// only (skipping intermediates is allowed); `cancelled` exits from
    /// `processing`/`confirmed`; `returned` exits from `delivered`.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        match next {
            Self::Cancelled => matches!(self, Self::Processing | Self::Confirmed),
            Self::Returned => self == Self::Delivered,
            _ => match (self.rank(), next.rank()) {
                (Some(from), Some(to)) => to > from,
                _ => false,
            },
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Processing => "processing",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Returned => "returned",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "confirmed" => Ok(Self::Confirmed),
            "shipped" => Ok(Self::Shipped),
            "out_for_delivery" => Ok(Self::OutForDelivery),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            "returned" => Ok(Self::Returned),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CashOnDelivery,
    Card,
    BankTransfer,
    Wallet,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: String,
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl LineItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub street1: String,
    pub street2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub zip: String,
    pub country: String,
    pub phone: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Append-only status history entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    pub note: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("order must contain at least one line item")]
    EmptyOrder,

    #[error("line item {product_id} has zero quantity")]
    ZeroQuantity { product_id: String },

    #[error("line item {product_id} has a negative unit price")]
    NegativePrice { product_id: String },

    #[error("payment amount must be non-negative")]
    NegativePaymentAmount,

    #[error("transaction id is required unless paying cash on delivery")]
    MissingTransactionId,

    #[error("cannot transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("order in status {0} cannot be cancelled")]
    NotCancellable(OrderStatus),

    #[error("unknown order status: {0}")]
    UnknownStatus(String),
}

#[derive(Clone, Debug)]
pub struct Order {
    id: Uuid,
    order_number: OrderNumber,
    customer_email: String,
    status: OrderStatus,
    items: Vec<LineItem>,
    shipping_address: Address,
    payment: PaymentInfo,
    pricing: PriceBreakdown,
    history: Vec<StatusEntry>,
    created_at: DateTime<Utc>,
    estimated_delivery_at: DateTime<Utc>,
    actual_delivery_at: Option<DateTime<Utc>>,
    events: Vec<OrderEvent>,
}

/// Read-only projection for lists and write-endpoint responses.
#[derive(Clone, Debug, Serialize)]
pub struct OrderSummary {
    pub order_number: String,
    pub status: OrderStatus,
    pub grand_total: Decimal,
    pub item_count: usize,
    pub created_at: DateTime<Utc>,
    pub estimated_delivery_at: DateTime<Utc>,
}

/// Full persisted shape of an order; also the API detail payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub id: Uuid,
    pub order_number: String,
    pub customer_email: String,
    pub status: OrderStatus,
    pub line_items: Vec<LineItem>,
    pub shipping_address: Address,
    pub payment: PaymentInfo,
    pub pricing: PriceBreakdown,
    pub status_history: Vec<StatusEntry>,
    pub created_at: DateTime<Utc>,
    pub estimated_delivery_at: DateTime<Utc>,
    pub actual_delivery_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Validates input, generates the order number, freezes the price
    /// breakdown and writes the first history entry. All-or-nothing: a
    /// validation failure leaves nothing behind.
    pub fn create(
        customer_email: impl Into<String>,
        items: Vec<LineItem>,
        shipping_address: Address,
        payment: PaymentInfo,
        pricing: PriceBreakdown,
        clock: &dyn Clock,
        numbers: &dyn SuffixSource,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }
        for item in &items {
            if item.quantity == 0 {
                return Err(OrderError::ZeroQuantity {
                    product_id: item.product_id.clone(),
                });
            }
            if item.unit_price < Decimal::ZERO {
                return Err(OrderError::NegativePrice {
                    product_id: item.product_id.clone(),
                });
            }
        }
        if payment.amount < Decimal::ZERO {
            return Err(OrderError::NegativePaymentAmount);
        }
        if payment.method != PaymentMethod::CashOnDelivery
            && payment.transaction_id.as_deref().map_or(true, str::is_empty)
        {
            return Err(OrderError::MissingTransactionId);
        }

        let now = clock.now();
        let id = Uuid::now_v7();
        let order_number = OrderNumber::generate(now.date_naive(), numbers);
        let mut order = Self {
            id,
            order_number: order_number.clone(),
            customer_email: customer_email.into(),
            status: OrderStatus::Processing,
            items,
            shipping_address,
            payment,
            pricing,
            history: vec![StatusEntry {
                status: OrderStatus::Processing,
                timestamp: now,
                note: PLACED_NOTE.to_string(),
            }],
            created_at: now,
            estimated_delivery_at: now + Duration::days(ESTIMATED_DELIVERY_DAYS),
            actual_delivery_at: None,
            events: vec![],
        };
        order.raise(OrderEvent::Created {
            order_id: id,
            order_number: order_number.to_string(),
            grand_total: order.pricing.grand_total,
        });
        Ok(order)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
    pub fn order_number(&self) -> &OrderNumber {
        &self.order_number
    }
    pub fn status(&self) -> OrderStatus {
        self.status
    }
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }
    pub fn pricing(&self) -> &PriceBreakdown {
        &self.pricing
    }
    pub fn history(&self) -> &[StatusEntry] {
        &self.history
    }
    pub fn actual_delivery_at(&self) -> Option<DateTime<Utc>> {
        self.actual_delivery_at
    }

    /// Moves the order to `status`, appending a history entry. Repeating the
    /// current status is a no-op; an illegal transition is rejected.
    pub fn update_status(
        &mut self,
        status: OrderStatus,
        note: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if status == self.status {
            return Ok(());
        }
        if !self.status.can_transition_to(status) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: status,
            });
        }
        let from = self.status;
        self.history.push(StatusEntry {
            status,
            timestamp: now,
            note: note.into(),
        });
        self.status = status;
        if status == OrderStatus::Delivered && self.actual_delivery_at.is_none() {
            self.actual_delivery_at = Some(now);
            self.raise(OrderEvent::Delivered { order_id: self.id });
        }
        if status == OrderStatus::Cancelled {
            self.raise(OrderEvent::Cancelled { order_id: self.id });
        }
        self.raise(OrderEvent::StatusChanged {
            order_id: self.id,
            from,
            to: status,
        });
        Ok(())
    }

    /// Customer-facing cancellation. Only pre-shipment orders qualify.
    pub fn cancel(&mut self, note: Option<String>, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.can_be_cancelled() {
            return Err(OrderError::NotCancellable(self.status));
        }
        self.update_status(
            OrderStatus::Cancelled,
            note.unwrap_or_else(|| "Order cancelled".to_string()),
            now,
        )
    }

    pub fn can_be_cancelled(&self) -> bool {
        matches!(self.status, OrderStatus::Processing | OrderStatus::Confirmed)
    }

    /// Returns stay open for [`RETURN_WINDOW_DAYS`] strictly after delivery.
    pub fn can_be_returned(&self, now: DateTime<Utc>) -> bool {
        self.status == OrderStatus::Delivered
            && self
                .actual_delivery_at
                .map_or(false, |delivered| delivered > now - Duration::days(RETURN_WINDOW_DAYS))
    }

    pub fn summary(&self) -> OrderSummary {
        OrderSummary {
            order_number: self.order_number.to_string(),
            status: self.status,
            grand_total: self.pricing.grand_total,
            item_count: self.items.len(),
            created_at: self.created_at,
            estimated_delivery_at: self.estimated_delivery_at,
        }
    }

    pub fn snapshot(&self) -> OrderSnapshot {
        OrderSnapshot {
            id: self.id,
            order_number: self.order_number.to_string(),
            customer_email: self.customer_email.clone(),
            status: self.status,
            line_items: self.items.clone(),
            shipping_address: self.shipping_address.clone(),
            payment: self.payment.clone(),
            pricing: self.pricing.clone(),
            status_history: self.history.clone(),
            created_at: self.created_at,
            estimated_delivery_at: self.estimated_delivery_at,
            actual_delivery_at: self.actual_delivery_at,
        }
    }

    /// Rehydrates a persisted order. No events are raised.
    pub fn from_snapshot(s: OrderSnapshot) -> Self {
        Self {
            id: s.id,
            order_number: OrderNumber::from(s.order_number),
            customer_email: s.customer_email,
            status: s.status,
            items: s.line_items,
            shipping_address: s.shipping_address,
            payment: s.payment,
            pricing: s.pricing,
            history: s.status_history,
            created_at: s.created_at,
            estimated_delivery_at: s.estimated_delivery_at,
            actual_delivery_at: s.actual_delivery_at,
            events: vec![],
        }
    }

    pub fn take_events(&mut self) -> Vec<OrderEvent> {
        std::mem::take(&mut self.events)
    }

    fn raise(&mut self, event: OrderEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::FixedClock;
    use crate::domain::number::FixedSuffix;
    use crate::domain::pricing::{quote, PricingContext};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    fn items() -> Vec<LineItem> {
        vec![
            LineItem {
                product_id: "P1".into(),
                name: "Widget".into(),
                image: None,
                quantity: 2,
                unit_price: Decimal::new(20, 0),
            },
            LineItem {
                product_id: "P2".into(),
                name: "Gadget".into(),
                image: Some("gadget.jpg".into()),
                quantity: 3,
                unit_price: Decimal::new(5, 0),
            },
        ]
    }

    fn cod_payment(amount: Decimal) -> PaymentInfo {
        PaymentInfo {
            method: PaymentMethod::CashOnDelivery,
            transaction_id: None,
            status: PaymentStatus::Pending,
            amount,
            paid_at: None,
        }
    }

    fn new_order() -> Order {
        let items = items();
        let ctx = PricingContext {
            tax_rate: Some(Decimal::new(10, 2)),
            distance_km: Decimal::new(10, 0),
            weight_kg: Some(Decimal::new(2, 0)),
            discount: None,
        };
        let pricing = quote(&items, &ctx);
        let amount = pricing.grand_total;
        Order::create(
            "test@example.com",
            items,
            Address::default(),
            cod_payment(amount),
            pricing,
            &FixedClock(t0()),
            &FixedSuffix(7),
        )
        .unwrap()
    }

    #[test]
    fn create_freezes_pricing_and_writes_first_history_entry() {
        let order = new_order();
        assert_eq!(order.order_number().as_str(), "ORD-20240315-00007");
        assert_eq!(order.status(), OrderStatus::Processing);
        assert_eq!(order.pricing().grand_total, Decimal::new(7050, 2));
        assert_eq!(order.history().len(), 1);
        assert_eq!(order.history()[0].status, OrderStatus::Processing);
        assert_eq!(order.history()[0].note, "Order placed successfully");
        assert_eq!(order.history()[0].timestamp, t0());
    }

    #[test]
    fn create_rejects_empty_order() {
        let pricing = quote(&[], &PricingContext::default());
        let err = Order::create(
            "test@example.com",
            vec![],
            Address::default(),
            cod_payment(Decimal::ZERO),
            pricing,
            &FixedClock(t0()),
            &FixedSuffix(0),
        )
        .unwrap_err();
        assert_eq!(err, OrderError::EmptyOrder);
    }

    #[test]
    fn create_rejects_zero_quantity_and_negative_price() {
        let mut bad = items();
        bad[0].quantity = 0;
        let err = Order::create(
            "t@e.com",
            bad,
            Address::default(),
            cod_payment(Decimal::ONE),
            quote(&[], &PricingContext::default()),
            &FixedClock(t0()),
            &FixedSuffix(0),
        )
        .unwrap_err();
        assert!(matches!(err, OrderError::ZeroQuantity { .. }));

        let mut bad = items();
        bad[1].unit_price = Decimal::new(-5, 0);
        let err = Order::create(
            "t@e.com",
            bad,
            Address::default(),
            cod_payment(Decimal::ONE),
            quote(&[], &PricingContext::default()),
            &FixedClock(t0()),
            &FixedSuffix(0),
        )
        .unwrap_err();
        assert!(matches!(err, OrderError::NegativePrice { .. }));
    }

    #[test]
    fn create_requires_transaction_id_unless_cash_on_delivery() {
        let payment = PaymentInfo {
            method: PaymentMethod::Card,
            transaction_id: None,
            status: PaymentStatus::Pending,
            amount: Decimal::ONE,
            paid_at: None,
        };
        let err = Order::create(
            "t@e.com",
            items(),
            Address::default(),
            payment,
            quote(&items(), &PricingContext::default()),
            &FixedClock(t0()),
            &FixedSuffix(0),
        )
        .unwrap_err();
        assert_eq!(err, OrderError::MissingTransactionId);
    }

    #[test]
    fn update_status_is_idempotent() {
        let mut order = new_order();
        order
            .update_status(OrderStatus::Confirmed, "Confirmed", t0())
            .unwrap();
        order
            .update_status(OrderStatus::Confirmed, "Confirmed again", t0())
            .unwrap();
        let confirmed = order
            .history()
            .iter()
            .filter(|e| e.status == OrderStatus::Confirmed)
            .count();
        assert_eq!(confirmed, 1);
        assert_eq!(order.history().len(), 2);
    }

    #[test]
    fn backward_and_post_terminal_transitions_are_rejected() {
        let mut order = new_order();
        order
            .update_status(OrderStatus::Shipped, "Shipped", t0())
            .unwrap();
        let err = order
            .update_status(OrderStatus::Processing, "Rewind", t0())
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));

        let mut order = new_order();
        order.cancel(None, t0()).unwrap();
        let err = order
            .update_status(OrderStatus::Shipped, "Too late", t0())
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[test]
    fn delivery_sets_actual_delivery_at_and_opens_return_window() {
        let mut order = new_order();
        order
            .update_status(OrderStatus::Delivered, "Left at door", t0())
            .unwrap();
        assert_eq!(order.actual_delivery_at(), Some(t0()));
        assert!(order.can_be_returned(t0()));
    }

    #[test]
    fn cancellable_only_before_shipment() {
        let mut order = new_order();
        assert!(order.can_be_cancelled()); // processing
        order
            .update_status(OrderStatus::Confirmed, "Confirmed", t0())
            .unwrap();
        assert!(order.can_be_cancelled());
        order
            .update_status(OrderStatus::Shipped, "Shipped", t0())
            .unwrap();
        assert!(!order.can_be_cancelled());
        assert!(matches!(
            order.clone().cancel(None, t0()).unwrap_err(),
            OrderError::NotCancellable(OrderStatus::Shipped)
        ));
    }

    #[test]
    fn return_window_closes_after_thirty_days() {
        let mut order = new_order();
        order
            .update_status(OrderStatus::Delivered, "Delivered", t0())
            .unwrap();
        let boundary = t0() + Duration::days(RETURN_WINDOW_DAYS);
        assert!(order.can_be_returned(boundary - Duration::seconds(1)));
        assert!(!order.can_be_returned(boundary));
        assert!(!order.can_be_returned(boundary + Duration::seconds(1)));
    }

    #[test]
    fn return_requires_delivery() {
        let order = new_order();
        assert!(!order.can_be_returned(t0()));
    }

    #[test]
    fn summary_projects_the_order() {
        let order = new_order();
        let s = order.summary();
        assert_eq!(s.order_number, "ORD-20240315-00007");
        assert_eq!(s.status, OrderStatus::Processing);
        assert_eq!(s.grand_total, Decimal::new(7050, 2));
        assert_eq!(s.item_count, 2);
        assert_eq!(s.created_at, t0());
        assert_eq!(
            s.estimated_delivery_at,
            t0() + Duration::days(ESTIMATED_DELIVERY_DAYS)
        );
    }

    #[test]
    fn snapshot_round_trips_without_raising_events() {
        let mut order = new_order();
        order.take_events();
        let restored = Order::from_snapshot(order.snapshot());
        assert_eq!(restored.id(), order.id());
        assert_eq!(restored.status(), order.status());
        assert_eq!(restored.history().len(), order.history().len());
        assert_eq!(restored.pricing(), order.pricing());
    }

    #[test]
    fn events_are_raised_and_drained() {
        let mut order = new_order();
        order
            .update_status(OrderStatus::Delivered, "Delivered", t0())
            .unwrap();
        let events = order.take_events();
        assert_eq!(events.len(), 3); // created, delivered, status_changed
        assert!(order.take_events().is_empty());
    }
}
