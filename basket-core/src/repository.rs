use async_trait::async_trait;
use basket_shared::pii::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A delivery address from the customer's address book. The checkout flow
/// only reads addresses; the address CRUD surface lives elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    pub address_line: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub country: String,
    pub mobile: Masked<String>,
}

/// Repository trait for delivery address lookup.
#[async_trait]
pub trait AddressRepository: Send + Sync {
    /// Fetch an address, scoped to its owner so one user cannot ship against
    /// another user's address book.
    async fn get_address(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Address>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Repository trait for the cart store. Checkout only ever empties a cart
/// after converting it into an order.
#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn clear_cart(
        &self,
        user_id: Uuid,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
