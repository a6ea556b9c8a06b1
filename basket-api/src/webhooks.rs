use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;

use basket_core::webhook::GatewayEvent;
use basket_order::orchestrator::CheckoutError;

use crate::state::AppState;

fn rejection(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({
            "message": message,
            "error": true,
            "success": false,
        })),
    )
        .into_response()
}

/// POST /api/order/webhook
/// Receive payment confirmations from the processor. The signature is checked
/// against the raw body before anything is parsed or stored; a bad signature
/// is a 400 so the processor does not keep redelivering forged requests.
///
/// After verification the response encodes the delivery contract: business
/// outcomes (including duplicates) are 200 so the processor stops retrying,
/// while storage faults are 500 to request redelivery.
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = match headers.get("stripe-signature").and_then(|h| h.to_str().ok()) {
        Some(s) => s,
        None => return rejection(StatusCode::BAD_REQUEST, "Missing stripe-signature header"),
    };

    if let Err(e) = state.webhook_verifier.verify(&body, signature, Utc::now()) {
        tracing::warn!(error = %e, "webhook signature rejected");
        return rejection(StatusCode::BAD_REQUEST, "Invalid webhook signature");
    }

    let event: GatewayEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "webhook payload failed to parse");
            return rejection(StatusCode::BAD_REQUEST, "Malformed webhook payload");
        }
    };

    tracing::info!(event_id = %event.id, event_type = %event.event_type, "webhook received");

    if event.event_type != "checkout.session.completed" {
        // Unhandled event types are acknowledged so the processor does not
        // retry them.
        return StatusCode::OK.into_response();
    }

    match state
        .orchestrator
        .complete_checkout_session(&event.data.object)
        .await
    {
        Ok(_) => StatusCode::OK.into_response(),
        Err(CheckoutError::Store(e)) => {
            tracing::error!(error = %e, "webhook reconciliation hit storage fault");
            rejection(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
            )
        }
        Err(e) => {
            // The signature already proved the processor sent this; retrying a
            // semantically broken event cannot fix it, so acknowledge it.
            tracing::warn!(error = %e, "webhook event could not be applied");
            StatusCode::OK.into_response()
        }
    }
}
