use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    CashOnDelivery,
    Card,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "CASH_ON_DELIVERY",
            PaymentMethod::Card => "CARD",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CASH_ON_DELIVERY" => Some(PaymentMethod::CashOnDelivery),
            "CARD" => Some(PaymentMethod::Card),
            _ => None,
        }
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            "COMPLETED" => Some(PaymentStatus::Completed),
            "FAILED" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

/// One line entry sent to the processor's hosted checkout page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLineItem {
    pub product_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub unit_amount_cents: i64,
    pub quantity: u32,
}

/// Everything the gateway needs to open a hosted checkout session. The order
/// ingredients ride along in session metadata so the webhook can rebuild the
/// order without trusting anything client-side.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub user_id: Uuid,
    pub address_id: Uuid,
    pub customer_email: Option<String>,
    pub line_items: Vec<SessionLineItem>,
    pub subtotal_cents: i64,
    pub total_cents: i64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Handle to a hosted checkout flow: the buyer is redirected to `url` and
/// the processor reports the outcome asynchronously via webhook.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a hosted checkout session with the payment processor.
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, Box<dyn std::error::Error + Send + Sync>>;
}
