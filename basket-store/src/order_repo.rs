use async_trait::async_trait;
use basket_core::payment::{PaymentMethod, PaymentStatus};
use basket_order::models::{AddressSnapshot, Order, OrderLine, OrderStatus, PaymentDetails};
use basket_order::repository::{OrderInsert, OrderRepository};
use sqlx::PgPool;
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Postgres-backed order store. The `orders.payment_session_id` column
/// carries a unique index, which is what makes `create_order_for_session`
/// safe under concurrent duplicate webhook deliveries.
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    invoice_no: String,
    address: serde_json::Value,
    subtotal_cents: i64,
    total_cents: i64,
    status: String,
    payment_method: String,
    payment_status: String,
    payment_session_id: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    product_id: Uuid,
    name: String,
    image: Option<String>,
    quantity: i32,
    unit_price_cents: i64,
}

fn row_to_order(row: OrderRow, line_rows: Vec<OrderLineRow>) -> Result<Order, BoxError> {
    let address: AddressSnapshot = serde_json::from_value(row.address)?;
    let status = OrderStatus::parse(&row.status)
        .ok_or_else(|| format!("unknown order status {:?}", row.status))?;
    let method = PaymentMethod::parse(&row.payment_method)
        .ok_or_else(|| format!("unknown payment method {:?}", row.payment_method))?;
    let payment_status = PaymentStatus::parse(&row.payment_status)
        .ok_or_else(|| format!("unknown payment status {:?}", row.payment_status))?;

    Ok(Order {
        id: row.id,
        user_id: row.user_id,
        invoice_no: row.invoice_no,
        lines: line_rows
            .into_iter()
            .map(|l| OrderLine {
                product_id: l.product_id,
                name: l.name,
                image: l.image,
                quantity: l.quantity.max(0) as u32,
                unit_price_cents: l.unit_price_cents,
            })
            .collect(),
        address,
        subtotal_cents: row.subtotal_cents,
        total_cents: row.total_cents,
        status,
        payment: PaymentDetails {
            method,
            status: payment_status,
            session_id: row.payment_session_id,
        },
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

impl PgOrderRepository {
    async fn insert_lines(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        order_id: Uuid,
        lines: &[OrderLine],
    ) -> Result<(), sqlx::Error> {
        for (position, line) in lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, position, product_id, name, image, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(order_id)
            .bind(position as i32)
            .bind(line.product_id)
            .bind(&line.name)
            .bind(&line.image)
            .bind(line.quantity as i32)
            .bind(line.unit_price_cents)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn fetch_order(&self, id: Uuid) -> Result<Option<Order>, BoxError> {
        let row: Option<OrderRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, invoice_no, address, subtotal_cents, total_cents,
                   status, payment_method, payment_status, payment_session_id,
                   created_at, updated_at
            FROM orders WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };

        let lines: Vec<OrderLineRow> = sqlx::query_as(
            r#"
            SELECT product_id, name, image, quantity, unit_price_cents
            FROM order_lines WHERE order_id = $1 ORDER BY position
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(row_to_order(row, lines)?))
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create_order(&self, order: &Order) -> Result<Uuid, BoxError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, invoice_no, address, subtotal_cents, total_cents,
                                status, payment_method, payment_status, payment_session_id,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(&order.invoice_no)
        .bind(serde_json::to_value(&order.address)?)
        .bind(order.subtotal_cents)
        .bind(order.total_cents)
        .bind(order.status.as_str())
        .bind(order.payment.method.as_str())
        .bind(order.payment.status.as_str())
        .bind(&order.payment.session_id)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        Self::insert_lines(&mut tx, order.id, &order.lines).await?;
        tx.commit().await?;
        Ok(order.id)
    }

    async fn create_order_for_session(
        &self,
        order: &Order,
        session_id: &str,
    ) -> Result<OrderInsert, BoxError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, invoice_no, address, subtotal_cents, total_cents,
                                status, payment_method, payment_status, payment_session_id,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (payment_session_id) DO NOTHING
            "#,
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(&order.invoice_no)
        .bind(serde_json::to_value(&order.address)?)
        .bind(order.subtotal_cents)
        .bind(order.total_cents)
        .bind(order.status.as_str())
        .bind(order.payment.method.as_str())
        .bind(order.payment.status.as_str())
        .bind(session_id)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            let (existing_id,): (Uuid,) =
                sqlx::query_as("SELECT id FROM orders WHERE payment_session_id = $1")
                    .bind(session_id)
                    .fetch_one(&self.pool)
                    .await?;
            return Ok(OrderInsert::AlreadyProcessed(existing_id));
        }

        Self::insert_lines(&mut tx, order.id, &order.lines).await?;
        tx.commit().await?;
        Ok(OrderInsert::Created(order.id))
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, BoxError> {
        self.fetch_order(id).await
    }

    async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> Result<(), BoxError> {
        sqlx::query("UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_payment_status(&self, id: Uuid, status: PaymentStatus) -> Result<(), BoxError> {
        sqlx::query("UPDATE orders SET payment_status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_orders(&self, user_id: Uuid) -> Result<Vec<Order>, BoxError> {
        let ids: Vec<(Uuid,)> =
            sqlx::query_as("SELECT id FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        let mut orders = Vec::with_capacity(ids.len());
        for (id,) in ids {
            if let Some(order) = self.fetch_order(id).await? {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    async fn list_all_orders(&self) -> Result<Vec<Order>, BoxError> {
        let ids: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM orders ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        let mut orders = Vec::with_capacity(ids.len());
        for (id,) in ids {
            if let Some(order) = self.fetch_order(id).await? {
                orders.push(order);
            }
        }
        Ok(orders)
    }
}
