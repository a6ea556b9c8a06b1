use basket_core::payment::{PaymentMethod, PaymentStatus};
use basket_core::repository::Address;
use basket_shared::pii::Masked;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fulfillment status of an order. Movement is strictly forward; see
/// [`crate::lifecycle`] for the transition rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "CONFIRMED" => Some(OrderStatus::Confirmed),
            "PROCESSING" => Some(OrderStatus::Processing),
            "SHIPPED" => Some(OrderStatus::Shipped),
            "DELIVERED" => Some(OrderStatus::Delivered),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

/// How this order is being paid and where that stands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// The processor's checkout-session id for card payments. Unique across
    /// orders; the storage layer enforces it so a redelivered webhook can
    /// never create a second order.
    pub session_id: Option<String>,
}

impl PaymentDetails {
    pub fn cash_on_delivery() -> Self {
        Self {
            method: PaymentMethod::CashOnDelivery,
            status: PaymentStatus::Pending,
            session_id: None,
        }
    }

    pub fn card_completed(session_id: String) -> Self {
        Self {
            method: PaymentMethod::Card,
            status: PaymentStatus::Completed,
            session_id: Some(session_id),
        }
    }
}

/// Delivery address copied onto the order at creation time, so later edits to
/// the address book do not rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddressSnapshot {
    pub address_line: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub country: String,
    pub mobile: Masked<String>,
}

impl From<&Address> for AddressSnapshot {
    fn from(a: &Address) -> Self {
        Self {
            address_line: a.address_line.clone(),
            city: a.city.clone(),
            state: a.state.clone(),
            pincode: a.pincode.clone(),
            country: a.country.clone(),
            mobile: a.mobile.clone(),
        }
    }
}

impl AddressSnapshot {
    /// Placeholder snapshot for the rare case where the address was deleted
    /// between session creation and payment confirmation.
    pub fn unavailable() -> Self {
        Self {
            address_line: String::new(),
            city: String::new(),
            state: String::new(),
            pincode: String::new(),
            country: String::new(),
            mobile: Masked(String::new()),
        }
    }
}

/// One product line on an order, with the unit price snapshotted at
/// submission time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

impl OrderLine {
    pub fn line_total_cents(&self) -> i64 {
        self.unit_price_cents * i64::from(self.quantity)
    }
}

/// Persisted record of a purchase and its fulfillment/payment state. Orders
/// are never deleted, only status-transitioned, and the amounts are frozen
/// once payment completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub invoice_no: String,
    pub lines: Vec<OrderLine>,
    pub address: AddressSnapshot,
    pub subtotal_cents: i64,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub payment: PaymentDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        user_id: Uuid,
        lines: Vec<OrderLine>,
        address: AddressSnapshot,
        subtotal_cents: i64,
        total_cents: i64,
        payment: PaymentDetails,
    ) -> Self {
        let now = Utc::now();
        let id = Uuid::new_v4();
        Self {
            id,
            user_id,
            invoice_no: invoice_no(id, now),
            lines,
            address,
            subtotal_cents,
            total_cents,
            status: OrderStatus::Pending,
            payment,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sum of quantity x snapshotted unit price across all lines.
    pub fn computed_subtotal_cents(&self) -> i64 {
        self.lines.iter().map(OrderLine::line_total_cents).sum()
    }
}

/// Invoice references look like `INV-20260825-1A2B3C4D`.
fn invoice_no(order_id: Uuid, at: DateTime<Utc>) -> String {
    let compact = order_id.simple().to_string();
    let short = compact.get(..8).unwrap_or(&compact);
    format!("INV-{}-{}", at.format("%Y%m%d"), short.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: u32, unit_price_cents: i64) -> OrderLine {
        OrderLine {
            product_id: Uuid::new_v4(),
            name: "item".to_string(),
            image: None,
            quantity,
            unit_price_cents,
        }
    }

    #[test]
    fn line_total_multiplies_quantity_and_price() {
        assert_eq!(line(2, 599).line_total_cents(), 1198);
    }

    #[test]
    fn computed_subtotal_sums_all_lines() {
        let order = Order::new(
            Uuid::new_v4(),
            vec![line(2, 599), line(1, 200)],
            AddressSnapshot::unavailable(),
            1398,
            1398,
            PaymentDetails::cash_on_delivery(),
        );
        assert_eq!(order.computed_subtotal_cents(), 1398);
    }

    #[test]
    fn new_orders_start_pending() {
        let order = Order::new(
            Uuid::new_v4(),
            vec![],
            AddressSnapshot::unavailable(),
            0,
            0,
            PaymentDetails::cash_on_delivery(),
        );
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.invoice_no.starts_with("INV-"));
        // INV-YYYYMMDD-XXXXXXXX
        assert_eq!(order.invoice_no.len(), 4 + 8 + 1 + 8);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("PAID"), None);
    }
}
