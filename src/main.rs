//! Storefront Orders - order pricing and lifecycle HTTP service.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use validator::Validate;

use storefront_orders::domain::{
    Address, Clock, CounterSuffix, LineItem, Order, OrderError, OrderEvent, OrderSnapshot,
    OrderStatus, OrderSummary, PaymentInfo, PaymentMethod, PaymentStatus, PricingContext,
    SuffixSource, SystemClock,
};
use storefront_orders::{domain::pricing, store, Error};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub nats: Option<async_nats::Client>,
    pub clock: Arc<dyn Clock>,
    pub numbers: Arc<dyn SuffixSource>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&std::env::var("DATABASE_URL")?)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;
    let nats = match std::env::var("NATS_URL") {
        Ok(url) => async_nats::connect(&url).await.ok(),
        Err(_) => None,
    };
    let state = AppState {
        db,
        nats,
        clock: Arc::new(SystemClock),
        numbers: Arc::new(CounterSuffix::default()),
    };

    let app = Router::new()
        .route(
            "/health",
            get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront-orders"})) }),
        )
        .route("/api/orders", get(list_orders).post(create_order))
        .route("/api/orders/:id", get(get_order))
        .route("/api/orders/:id/status", put(update_status))
        .route("/api/orders/:id/cancel", put(cancel_order))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8084".to_string());
    tracing::info!("storefront-orders listening on 0.0.0.0:{}", port);
    axum::serve(
        tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?,
        app,
    )
    .await?;
    Ok(())
}

fn error_response(e: Error) -> (StatusCode, String) {
    let code = match &e {
        Error::NotFound => StatusCode::NOT_FOUND,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::Order(OrderError::InvalidTransition { .. })
        | Error::Order(OrderError::NotCancellable(_)) => StatusCode::CONFLICT,
        Error::Order(_) => StatusCode::BAD_REQUEST,
        Error::Storage(_) | Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, e.to_string())
}

async fn publish_events(nats: &Option<async_nats::Client>, events: Vec<OrderEvent>) {
    let Some(client) = nats else { return };
    for event in events {
        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("failed to encode order event: {}", e);
                continue;
            }
        };
        if let Err(e) = client.publish(event.subject(), payload.into()).await {
            tracing::warn!("failed to publish {}: {}", event.subject(), e);
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub summary: OrderSummary,
    pub order: OrderSnapshot,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(email)]
    pub customer_email: String,
    #[validate(length(min = 1, message = "order must contain at least one line item"))]
    pub items: Vec<LineItemRequest>,
    pub shipping_address: Address,
    pub payment: PaymentRequest,
    #[serde(default)]
    pub pricing: PricingContext,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LineItemRequest {
    pub product_id: String,
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    pub transaction_id: Option<String>,
}

async fn create_order(
    State(s): State<AppState>,
    Json(r): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), (StatusCode, String)> {
    r.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let items: Vec<LineItem> = r
        .items
        .into_iter()
        .map(|i| LineItem {
            product_id: i.product_id,
            name: i.name,
            image: i.image,
            quantity: i.quantity,
            unit_price: i.unit_price,
        })
        .collect();
    let quote = pricing::quote(&items, &r.pricing);
    let payment = PaymentInfo {
        method: r.payment.method,
        transaction_id: r.payment.transaction_id,
        status: PaymentStatus::Pending,
        amount: quote.grand_total,
        paid_at: None,
    };
    let mut order = Order::create(
        r.customer_email,
        items,
        r.shipping_address,
        payment,
        quote,
        s.clock.as_ref(),
        s.numbers.as_ref(),
    )
    .map_err(|e| error_response(e.into()))?;
    // No retry here: on a number collision the caller resubmits (409).
    store::insert(&s.db, &order).await.map_err(error_response)?;
    publish_events(&s.nats, order.take_events()).await;
    tracing::info!(order_number = %order.order_number(), "order created");
    Ok((
        StatusCode::CREATED,
        Json(OrderResponse {
            summary: order.summary(),
            order: order.snapshot(),
        }),
    ))
}

async fn list_orders(
    State(s): State<AppState>,
    Query(p): Query<ListParams>,
) -> Result<Json<PaginatedResponse<OrderSummary>>, (StatusCode, String)> {
    let page = p.page.unwrap_or(1).max(1);
    let per_page = p.per_page.unwrap_or(20).min(100);
    let (orders, total) = store::list(&s.db, page, per_page)
        .await
        .map_err(error_response)?;
    let data = orders.iter().map(Order::summary).collect();
    Ok(Json(PaginatedResponse { data, total, page }))
}

async fn get_order(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, (StatusCode, String)> {
    let order = store::fetch(&s.db, id).await.map_err(error_response)?;
    Ok(Json(OrderResponse {
        summary: order.summary(),
        order: order.snapshot(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub note: Option<String>,
}

async fn update_status(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    Json(r): Json<UpdateStatusRequest>,
) -> Result<Json<OrderSummary>, (StatusCode, String)> {
    let mut order = store::fetch(&s.db, id).await.map_err(error_response)?;
    order
        .update_status(
            r.status,
            r.note.unwrap_or_else(|| "Status updated".to_string()),
            s.clock.now(),
        )
        .map_err(|e| error_response(e.into()))?;
    store::save_status(&s.db, &order)
        .await
        .map_err(error_response)?;
    publish_events(&s.nats, order.take_events()).await;
    Ok(Json(order.summary()))
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub note: Option<String>,
}

async fn cancel_order(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<OrderSummary>, (StatusCode, String)> {
    let note = body.and_then(|Json(r)| r.note);
    let mut order = store::fetch(&s.db, id).await.map_err(error_response)?;
    order
        .cancel(note, s.clock.now())
        .map_err(|e| error_response(e.into()))?;
    store::save_status(&s.db, &order)
        .await
        .map_err(error_response)?;
    publish_events(&s.nats, order.take_events()).await;
    Ok(Json(order.summary()))
}
