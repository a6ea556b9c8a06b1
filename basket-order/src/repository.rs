use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Order, OrderStatus};
use basket_core::payment::PaymentStatus;

/// Outcome of an idempotent, session-keyed order insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderInsert {
    /// The order was persisted for the first time.
    Created(Uuid),
    /// An order for this session id already exists; nothing was written.
    AlreadyProcessed(Uuid),
}

/// Repository trait for order persistence.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create_order(
        &self,
        order: &Order,
    ) -> Result<Uuid, Box<dyn std::error::Error + Send + Sync>>;

    /// Insert an order keyed by the processor's checkout-session id. The
    /// store must hold a uniqueness constraint on the session id so that
    /// concurrent duplicate webhook deliveries serialize to a single order.
    async fn create_order_for_session(
        &self,
        order: &Order,
        session_id: &str,
    ) -> Result<OrderInsert, Box<dyn std::error::Error + Send + Sync>>;

    async fn get_order(
        &self,
        id: Uuid,
    ) -> Result<Option<Order>, Box<dyn std::error::Error + Send + Sync>>;

    /// Update the fulfillment status only. Amounts and lines are immutable
    /// through this path.
    async fn update_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn list_orders(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Order>, Box<dyn std::error::Error + Send + Sync>>;

    async fn list_all_orders(
        &self,
    ) -> Result<Vec<Order>, Box<dyn std::error::Error + Send + Sync>>;
}
