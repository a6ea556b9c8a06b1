use async_trait::async_trait;
use basket_catalog::product::{Product, ProductRepository};
use basket_core::repository::{Address, AddressRepository, CartRepository};
use basket_shared::pii::Masked;
use sqlx::PgPool;
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    image: Option<String>,
    unit: Option<String>,
    price_cents: i64,
    discount_percent: f64,
    stock: i64,
    is_active: bool,
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, BoxError> {
        let row: Option<ProductRow> = sqlx::query_as(
            r#"
            SELECT id, name, image, unit, price_cents, discount_percent, stock, is_active
            FROM products WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Product {
            id: r.id,
            name: r.name,
            image: r.image,
            unit: r.unit,
            price_cents: r.price_cents,
            discount_percent: r.discount_percent,
            stock: r.stock,
            is_active: r.is_active,
        }))
    }

    async fn decrement_stock(&self, id: Uuid, quantity: u32) -> Result<bool, BoxError> {
        // Guarded update; rows_affected = 0 means another checkout got there
        // first or the product vanished.
        let result =
            sqlx::query("UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2")
                .bind(id)
                .bind(i64::from(quantity))
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn restore_stock(&self, id: Uuid, quantity: u32) -> Result<(), BoxError> {
        sqlx::query("UPDATE products SET stock = stock + $2 WHERE id = $1")
            .bind(id)
            .bind(i64::from(quantity))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct PgAddressRepository {
    pool: PgPool,
}

impl PgAddressRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: Uuid,
    user_id: Uuid,
    address_line: String,
    city: String,
    state: String,
    pincode: String,
    country: String,
    mobile: String,
}

#[async_trait]
impl AddressRepository for PgAddressRepository {
    async fn get_address(&self, id: Uuid, user_id: Uuid) -> Result<Option<Address>, BoxError> {
        let row: Option<AddressRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, address_line, city, state, pincode, country, mobile
            FROM addresses WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Address {
            id: r.id,
            user_id: r.user_id,
            address_line: r.address_line,
            city: r.city,
            state: r.state,
            pincode: r.pincode,
            country: r.country,
            mobile: Masked(r.mobile),
        }))
    }
}

pub struct PgCartRepository {
    pool: PgPool,
}

impl PgCartRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartRepository for PgCartRepository {
    async fn clear_cart(&self, user_id: Uuid) -> Result<(), BoxError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
