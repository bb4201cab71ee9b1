//! Storefront Orders
//!
//! Order pricing and lifecycle service for a storefront.
//!
//! ## Features
//! - Deterministic price quotes (items, tax, shipping, discount)
//! - Order creation with frozen price breakdown and generated order number
//! - Status state machine with append-only history
//! - Cancellation and return eligibility windows
//! - Postgres persistence with order-number uniqueness

use thiserror::Error;

pub mod domain;
pub mod store;

#[derive(Error, Debug)]
pub enum Error {
    #[error("order not found")]
    NotFound,

    #[error("order number conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Order(#[from] domain::OrderError),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
