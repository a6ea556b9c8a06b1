use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A grocery product as the checkout flow sees it. Prices are integer cents;
/// `discount` is a percentage (0-100) applied at snapshot time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub unit: Option<String>,
    pub price_cents: i64,
    pub discount_percent: f64,
    pub stock: i64,
    pub is_active: bool,
}

impl Product {
    /// The price a buyer actually pays per unit, with the catalog discount
    /// applied and rounded to the nearest cent. This is what gets snapshotted
    /// onto order lines.
    pub fn sale_price_cents(&self) -> i64 {
        if self.discount_percent <= 0.0 {
            return self.price_cents;
        }
        let factor = 1.0 - (self.discount_percent / 100.0).clamp(0.0, 1.0);
        (self.price_cents as f64 * factor).round() as i64
    }
}

/// Repository trait for product catalog access during checkout.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn get_product(
        &self,
        id: Uuid,
    ) -> Result<Option<Product>, Box<dyn std::error::Error + Send + Sync>>;

    /// Atomically take `quantity` units out of stock. Returns `false` when
    /// the product does not have that many units left; the caller decides
    /// whether that is fatal.
    async fn decrement_stock(
        &self,
        id: Uuid,
        quantity: u32,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;

    /// Put units back, used to unwind a partially-applied checkout.
    async fn restore_stock(
        &self,
        id: Uuid,
        quantity: u32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price_cents: i64, discount_percent: f64) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "Red Rice 1kg".to_string(),
            image: None,
            unit: Some("1 kg".to_string()),
            price_cents,
            discount_percent,
            stock: 10,
            is_active: true,
        }
    }

    #[test]
    fn sale_price_without_discount_is_list_price() {
        assert_eq!(product(599, 0.0).sale_price_cents(), 599);
    }

    #[test]
    fn sale_price_applies_discount_rounded_to_cents() {
        // 10% off 599 = 539.1 -> 539
        assert_eq!(product(599, 10.0).sale_price_cents(), 539);
        // 25% off 200 = 150
        assert_eq!(product(200, 25.0).sale_price_cents(), 150);
    }

    #[test]
    fn discount_is_clamped() {
        assert_eq!(product(599, 150.0).sale_price_cents(), 0);
        assert_eq!(product(599, -5.0).sale_price_cents(), 599);
    }
}
