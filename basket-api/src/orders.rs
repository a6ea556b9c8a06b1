use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use basket_core::payment::{PaymentMethod, PaymentStatus};
use basket_order::models::{AddressSnapshot, Order, OrderStatus};
use basket_order::orchestrator::{CheckoutRequest, RequestedLine};
use basket_shared::{from_cents, to_cents};

use crate::error::AppError;
use crate::middleware::auth::{admin_auth_middleware, user_auth_middleware, UserClaims};
use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

/// Body shared by the cash-on-delivery and card checkout endpoints. Field
/// names follow the storefront's existing JSON contract.
#[derive(Debug, Deserialize)]
pub struct CheckoutPayload {
    pub list_items: Vec<CheckoutItem>,
    #[serde(rename = "addressId")]
    pub address_id: Uuid,
    #[serde(rename = "subTotalAmt")]
    pub sub_total_amt: f64,
    #[serde(rename = "totalAmt")]
    pub total_amt: f64,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutItem {
    #[serde(rename = "productId")]
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusPayload {
    #[serde(rename = "orderId")]
    pub order_id: Uuid,
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: Uuid,
    pub invoice_no: String,
    pub user_id: Uuid,
    pub items: Vec<OrderItemResponse>,
    pub address: AddressSnapshot,
    pub sub_total_amt: f64,
    pub total_amt: f64,
    pub order_status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub product_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub unit_price: f64,
    pub line_total: f64,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            invoice_no: order.invoice_no,
            user_id: order.user_id,
            items: order
                .lines
                .into_iter()
                .map(|l| OrderItemResponse {
                    unit_price: from_cents(l.unit_price_cents),
                    line_total: from_cents(l.line_total_cents()),
                    product_id: l.product_id,
                    name: l.name,
                    image: l.image,
                    quantity: l.quantity,
                })
                .collect(),
            address: order.address,
            sub_total_amt: from_cents(order.subtotal_cents),
            total_amt: from_cents(order.total_cents),
            order_status: order.status,
            payment_method: order.payment.method,
            payment_status: order.payment.status,
            created_at: order.created_at,
        }
    }
}

fn envelope(message: &str, data: serde_json::Value) -> serde_json::Value {
    json!({
        "message": message,
        "error": false,
        "success": true,
        "data": data,
    })
}

fn checkout_request(claims: &UserClaims, payload: CheckoutPayload) -> Result<CheckoutRequest, AppError> {
    if payload.list_items.is_empty() {
        return Err(AppError::ValidationError(
            "Provide at least one item".to_string(),
        ));
    }

    Ok(CheckoutRequest {
        user_id: claims.user_id()?,
        customer_email: claims.email.clone(),
        lines: payload
            .list_items
            .into_iter()
            .map(|i| RequestedLine {
                product_id: i.product_id,
                quantity: i.quantity,
            })
            .collect(),
        address_id: payload.address_id,
        subtotal_cents: to_cents(payload.sub_total_amt),
        total_cents: to_cents(payload.total_amt),
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/order/cash-on-delivery
/// Place an order paid on delivery. Stock is taken immediately.
pub async fn cash_on_delivery(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Json(payload): Json<CheckoutPayload>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let request = checkout_request(&claims, payload)?;

    let order = state
        .orchestrator
        .submit_cash_on_delivery(&request)
        .await
        .map_err(AppError::checkout)?;

    Ok((
        StatusCode::CREATED,
        Json(envelope(
            "Order placed",
            serde_json::to_value(OrderResponse::from(order))?,
        )),
    ))
}

/// POST /api/order/checkout
/// Create a hosted payment session. No order exists until the payment
/// processor confirms via webhook.
pub async fn checkout(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Json(payload): Json<CheckoutPayload>,
) -> Result<Json<serde_json::Value>, AppError> {
    let request = checkout_request(&claims, payload)?;

    let session = state
        .orchestrator
        .create_payment_session(&request)
        .await
        .map_err(AppError::checkout)?;

    Ok(Json(envelope(
        "Checkout session created",
        json!({ "id": session.id, "url": session.url }),
    )))
}

/// GET /api/order/order-list
/// Orders belonging to the authenticated user, newest first.
pub async fn order_list(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<serde_json::Value>, AppError> {
    let orders = state
        .orchestrator
        .list_orders(claims.user_id()?)
        .await
        .map_err(AppError::checkout)?;

    let items: Vec<OrderResponse> = orders.into_iter().map(OrderResponse::from).collect();
    Ok(Json(envelope("Order list", serde_json::to_value(items)?)))
}

/// POST /api/order/admin/get-all-orders
pub async fn all_orders(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let orders = state
        .orchestrator
        .list_all_orders()
        .await
        .map_err(AppError::checkout)?;

    let items: Vec<OrderResponse> = orders.into_iter().map(OrderResponse::from).collect();
    Ok(Json(envelope("All orders", serde_json::to_value(items)?)))
}

/// POST /api/order/admin/update-status
/// Move an order forward through its lifecycle. Backward moves are rejected.
pub async fn update_status(
    State(state): State<AppState>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<Json<serde_json::Value>, AppError> {
    let status = OrderStatus::parse(&payload.status).ok_or_else(|| {
        AppError::ValidationError(format!("Unknown order status: {}", payload.status))
    })?;

    let order = state
        .orchestrator
        .update_status(payload.order_id, status)
        .await
        .map_err(AppError::checkout)?;

    Ok(Json(envelope(
        "Order status updated",
        serde_json::to_value(OrderResponse::from(order))?,
    )))
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes(state: AppState) -> Router<AppState> {
    let user_routes = Router::new()
        .route("/api/order/cash-on-delivery", post(cash_on_delivery))
        .route("/api/order/checkout", post(checkout))
        .route("/api/order/order-list", get(order_list))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            user_auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/api/order/admin/get-all-orders", post(all_orders))
        .route("/api/order/admin/update-status", post(update_status))
        .layer(axum::middleware::from_fn_with_state(
            state,
            admin_auth_middleware,
        ));

    user_routes.merge(admin_routes)
}
