//! In-memory repository implementations, used by the API integration tests
//! and for running the service without Postgres (`database.url = "memory"`).

use async_trait::async_trait;
use basket_catalog::product::{Product, ProductRepository};
use basket_core::payment::PaymentStatus;
use basket_core::repository::{Address, AddressRepository, CartRepository};
use basket_order::models::{Order, OrderStatus};
use basket_order::repository::{OrderInsert, OrderRepository};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Default)]
pub struct MemoryOrderRepository {
    orders: Mutex<Vec<Order>>,
}

impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn create_order(&self, order: &Order) -> Result<Uuid, BoxError> {
        self.orders
            .lock()
            .map_err(|_| "order store poisoned")?
            .push(order.clone());
        Ok(order.id)
    }

    async fn create_order_for_session(
        &self,
        order: &Order,
        session_id: &str,
    ) -> Result<OrderInsert, BoxError> {
        let mut orders = self.orders.lock().map_err(|_| "order store poisoned")?;
        // Single-lock check-then-insert mirrors the unique index the
        // Postgres store relies on.
        if let Some(existing) = orders
            .iter()
            .find(|o| o.payment.session_id.as_deref() == Some(session_id))
        {
            return Ok(OrderInsert::AlreadyProcessed(existing.id));
        }
        orders.push(order.clone());
        Ok(OrderInsert::Created(order.id))
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, BoxError> {
        Ok(self
            .orders
            .lock()
            .map_err(|_| "order store poisoned")?
            .iter()
            .find(|o| o.id == id)
            .cloned())
    }

    async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> Result<(), BoxError> {
        let mut orders = self.orders.lock().map_err(|_| "order store poisoned")?;
        let order = orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or("order not found")?;
        order.status = status;
        order.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn update_payment_status(&self, id: Uuid, status: PaymentStatus) -> Result<(), BoxError> {
        let mut orders = self.orders.lock().map_err(|_| "order store poisoned")?;
        let order = orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or("order not found")?;
        order.payment.status = status;
        order.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn list_orders(&self, user_id: Uuid) -> Result<Vec<Order>, BoxError> {
        Ok(self
            .orders
            .lock()
            .map_err(|_| "order store poisoned")?
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_all_orders(&self) -> Result<Vec<Order>, BoxError> {
        Ok(self
            .orders
            .lock()
            .map_err(|_| "order store poisoned")?
            .clone())
    }
}

#[derive(Default)]
pub struct MemoryProductRepository {
    products: Mutex<HashMap<Uuid, Product>>,
}

impl MemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, product: Product) {
        if let Ok(mut products) = self.products.lock() {
            products.insert(product.id, product);
        }
    }

    pub fn stock_of(&self, id: Uuid) -> Option<i64> {
        self.products.lock().ok()?.get(&id).map(|p| p.stock)
    }
}

#[async_trait]
impl ProductRepository for MemoryProductRepository {
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, BoxError> {
        Ok(self
            .products
            .lock()
            .map_err(|_| "product store poisoned")?
            .get(&id)
            .cloned())
    }

    async fn decrement_stock(&self, id: Uuid, quantity: u32) -> Result<bool, BoxError> {
        let mut products = self.products.lock().map_err(|_| "product store poisoned")?;
        let product = products.get_mut(&id).ok_or("product not found")?;
        if product.stock < i64::from(quantity) {
            return Ok(false);
        }
        product.stock -= i64::from(quantity);
        Ok(true)
    }

    async fn restore_stock(&self, id: Uuid, quantity: u32) -> Result<(), BoxError> {
        let mut products = self.products.lock().map_err(|_| "product store poisoned")?;
        let product = products.get_mut(&id).ok_or("product not found")?;
        product.stock += i64::from(quantity);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryAddressRepository {
    addresses: Mutex<Vec<Address>>,
}

impl MemoryAddressRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, address: Address) {
        if let Ok(mut addresses) = self.addresses.lock() {
            addresses.push(address);
        }
    }
}

#[async_trait]
impl AddressRepository for MemoryAddressRepository {
    async fn get_address(&self, id: Uuid, user_id: Uuid) -> Result<Option<Address>, BoxError> {
        Ok(self
            .addresses
            .lock()
            .map_err(|_| "address store poisoned")?
            .iter()
            .find(|a| a.id == id && a.user_id == user_id)
            .cloned())
    }
}

#[derive(Default)]
pub struct MemoryCartRepository {
    cleared: Mutex<Vec<Uuid>>,
}

impl MemoryCartRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cleared_for(&self, user_id: Uuid) -> bool {
        self.cleared
            .lock()
            .map(|c| c.contains(&user_id))
            .unwrap_or(false)
    }
}

#[async_trait]
impl CartRepository for MemoryCartRepository {
    async fn clear_cart(&self, user_id: Uuid) -> Result<(), BoxError> {
        self.cleared
            .lock()
            .map_err(|_| "cart store poisoned")?
            .push(user_id);
        Ok(())
    }
}
