//! Postgres persistence for the order aggregate.
//!
//! Scalar columns carry the fields queries filter on; the nested documents
//! (line items, addresses, payment, pricing, history) live in JSONB. The
//! `order_number` unique constraint is the backstop for the probabilistic
//! number scheme; a violation surfaces as [`Error::Conflict`] and the caller
//! regenerates and retries.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Order, OrderSnapshot, OrderStatus};
use crate::{Error, Result};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    customer_email: String,
    status: String,
    line_items: serde_json::Value,
    shipping_address: serde_json::Value,
    payment: serde_json::Value,
    pricing: serde_json::Value,
    status_history: serde_json::Value,
    created_at: DateTime<Utc>,
    estimated_delivery_at: DateTime<Utc>,
    actual_delivery_at: Option<DateTime<Utc>>,
}

impl OrderRow {
    fn into_order(self) -> Result<Order> {
        let status: OrderStatus = self.status.parse()?;
        Ok(Order::from_snapshot(OrderSnapshot {
            id: self.id,
            order_number: self.order_number,
            customer_email: self.customer_email,
            status,
            line_items: serde_json::from_value(self.line_items)?,
            shipping_address: serde_json::from_value(self.shipping_address)?,
            payment: serde_json::from_value(self.payment)?,
            pricing: serde_json::from_value(self.pricing)?,
            status_history: serde_json::from_value(self.status_history)?,
            created_at: self.created_at,
            estimated_delivery_at: self.estimated_delivery_at,
            actual_delivery_at: self.actual_delivery_at,
        }))
    }
}

/// Inserts a freshly created order. All-or-nothing: the aggregate is fully
/// validated before this runs, so nothing partial is ever written.
pub async fn insert(pool: &PgPool, order: &Order) -> Result<()> {
    let s = order.snapshot();
    sqlx::query(
        "INSERT INTO orders (id, order_number, customer_email, status, line_items, \
         shipping_address, payment, pricing, status_history, created_at, \
         estimated_delivery_at, actual_delivery_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(s.id)
    .bind(&s.order_number)
    .bind(&s.customer_email)
    .bind(s.status.to_string())
    .bind(serde_json::to_value(&s.line_items)?)
    .bind(serde_json::to_value(&s.shipping_address)?)
    .bind(serde_json::to_value(&s.payment)?)
    .bind(serde_json::to_value(&s.pricing)?)
    .bind(serde_json::to_value(&s.status_history)?)
    .bind(s.created_at)
    .bind(s.estimated_delivery_at)
    .bind(s.actual_delivery_at)
    .execute(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::Conflict(s.order_number.clone())
        }
        e => Error::Storage(e),
    })?;
    Ok(())
}

pub async fn fetch(pool: &PgPool, id: Uuid) -> Result<Order> {
    sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(Error::NotFound)?
        .into_order()
}

pub async fn list(pool: &PgPool, page: u32, per_page: u32) -> Result<(Vec<Order>, i64)> {
    let rows = sqlx::query_as::<_, OrderRow>(
        "SELECT * FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(per_page as i64)
    .bind((page.saturating_sub(1) * per_page) as i64)
    .fetch_all(pool)
    .await?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
        .fetch_one(pool)
        .await?;
    let orders = rows
        .into_iter()
        .map(OrderRow::into_order)
        .collect::<Result<Vec<_>>>()?;
    Ok((orders, total.0))
}

/// Persists a status transition: status, appended history, delivery stamp.
pub async fn save_status(pool: &PgPool, order: &Order) -> Result<()> {
    let s = order.snapshot();
    let result = sqlx::query(
        "UPDATE orders SET status = $2, status_history = $3, actual_delivery_at = $4 \
         WHERE id = $1",
    )
    .bind(s.id)
    .bind(s.status.to_string())
    .bind(serde_json::to_value(&s.status_history)?)
    .bind(s.actual_delivery_at)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound);
    }
    Ok(())
}
