use std::sync::Arc;

use basket_catalog::product::ProductRepository;
use basket_catalog::stock;
use basket_core::payment::{
    CheckoutSession, CheckoutSessionRequest, PaymentGateway, PaymentMethod, PaymentStatus,
    SessionLineItem,
};
use basket_core::repository::{AddressRepository, CartRepository};
use basket_core::webhook::CheckoutSessionObject;
use serde::Deserialize;
use uuid::Uuid;

use crate::lifecycle::{self, InvalidTransition};
use crate::models::{AddressSnapshot, Order, OrderLine, OrderStatus, PaymentDetails};
use crate::repository::{OrderInsert, OrderRepository};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A cart line as submitted by the storefront: a product reference and a
/// quantity. Prices are never taken from the client.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestedLine {
    pub product_id: Uuid,
    pub quantity: u32,
}

/// A checkout submission, shared by the cash-on-delivery and hosted-session
/// paths. Amounts are the client's idea of the totals; the orchestrator
/// recomputes them from catalog prices and rejects the request when they do
/// not reconcile.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub customer_email: Option<String>,
    pub lines: Vec<RequestedLine>,
    pub address_id: Uuid,
    pub subtotal_cents: i64,
    pub total_cents: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("payment processor error: {0}")]
    Upstream(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("storage error: {0}")]
    Store(#[source] BoxError),
}

/// Checkout behaviour knobs, loaded from config by the binary.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Maximum allowed difference, in cents, between client-submitted totals
    /// and the server-side recomputation.
    pub totals_tolerance_cents: i64,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            currency: "lkr".to_string(),
            success_url: "http://localhost:5173/success".to_string(),
            cancel_url: "http://localhost:5173/cancel".to_string(),
            totals_tolerance_cents: 1,
        }
    }
}

/// Coordinates the multi-step checkout workflow: order creation for
/// cash-on-delivery, hosted payment-session creation, and idempotent
/// reconciliation of payment webhooks into order records. This is the only
/// writer of order status.
pub struct CheckoutOrchestrator {
    orders: Arc<dyn OrderRepository>,
    products: Arc<dyn ProductRepository>,
    addresses: Arc<dyn AddressRepository>,
    carts: Arc<dyn CartRepository>,
    gateway: Arc<dyn PaymentGateway>,
    config: CheckoutConfig,
}

impl CheckoutOrchestrator {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        products: Arc<dyn ProductRepository>,
        addresses: Arc<dyn AddressRepository>,
        carts: Arc<dyn CartRepository>,
        gateway: Arc<dyn PaymentGateway>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            orders,
            products,
            addresses,
            carts,
            gateway,
            config,
        }
    }

    /// Create an order paid on delivery. The order starts with fulfillment
    /// status `Pending` and payment status `Pending`; stock is taken
    /// immediately.
    pub async fn submit_cash_on_delivery(
        &self,
        request: &CheckoutRequest,
    ) -> Result<Order, CheckoutError> {
        let address = self.require_address(request).await?;
        let lines = self.snapshot_lines(request).await?;
        self.reconcile_totals(&lines, request.subtotal_cents, request.total_cents)?;

        self.take_stock(&lines).await?;

        let order = Order::new(
            request.user_id,
            lines,
            AddressSnapshot::from(&address),
            request.subtotal_cents,
            request.total_cents,
            PaymentDetails::cash_on_delivery(),
        );

        // Stock is already taken; a failed persist must give it back or the
        // units are lost with no order to show for them.
        if let Err(e) = self.orders.create_order(&order).await {
            self.put_back_stock(&order.lines).await;
            return Err(CheckoutError::Store(e));
        }

        self.clear_cart(request.user_id).await;

        tracing::info!(
            order_id = %order.id,
            invoice = %order.invoice_no,
            total_cents = order.total_cents,
            "cash-on-delivery order created"
        );
        Ok(order)
    }

    /// Ask the payment processor for a hosted checkout session. No order is
    /// created here; creation is deferred to the confirmation webhook so an
    /// abandoned payment leaves nothing behind.
    pub async fn create_payment_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, CheckoutError> {
        self.require_address(request).await?;
        let lines = self.snapshot_lines(request).await?;
        self.reconcile_totals(&lines, request.subtotal_cents, request.total_cents)?;

        let session_request = CheckoutSessionRequest {
            user_id: request.user_id,
            address_id: request.address_id,
            customer_email: request.customer_email.clone(),
            line_items: lines
                .iter()
                .map(|l| SessionLineItem {
                    product_id: l.product_id,
                    name: l.name.clone(),
                    image: l.image.clone(),
                    unit_amount_cents: l.unit_price_cents,
                    quantity: l.quantity,
                })
                .collect(),
            subtotal_cents: request.subtotal_cents,
            total_cents: request.total_cents,
            currency: self.config.currency.clone(),
            success_url: self.config.success_url.clone(),
            cancel_url: self.config.cancel_url.clone(),
        };

        let session = self
            .gateway
            .create_checkout_session(&session_request)
            .await
            .map_err(|e| CheckoutError::Upstream(e.to_string()))?;

        tracing::info!(session_id = %session.id, user_id = %request.user_id, "checkout session created");
        Ok(session)
    }

    /// Apply a verified `checkout.session.completed` event. The order is
    /// rebuilt from session metadata and inserted keyed by the session id, so
    /// redelivery of the same event is absorbed without a second order or a
    /// second stock decrement.
    pub async fn complete_checkout_session(
        &self,
        session: &CheckoutSessionObject,
    ) -> Result<OrderInsert, CheckoutError> {
        // Async payment methods deliver `checkout.session.completed` before
        // the money moves; only a paid session becomes an order.
        if session.payment_status.as_deref() != Some("paid") {
            return Err(CheckoutError::Validation(format!(
                "checkout session {} is not paid (payment_status {:?})",
                session.id, session.payment_status
            )));
        }

        let meta = &session.metadata;
        let user_id = meta
            .user_id()
            .map_err(|e| CheckoutError::Validation(e.to_string()))?;
        let address_id = meta
            .address_id()
            .map_err(|e| CheckoutError::Validation(e.to_string()))?;
        let snapshot_lines = meta
            .lines()
            .map_err(|e| CheckoutError::Validation(e.to_string()))?;
        let subtotal_cents = meta
            .subtotal_cents()
            .map_err(|e| CheckoutError::Validation(e.to_string()))?;
        let total_cents = meta
            .total_cents()
            .map_err(|e| CheckoutError::Validation(e.to_string()))?;

        if snapshot_lines.is_empty() {
            return Err(CheckoutError::Validation(
                "checkout session carries no line items".to_string(),
            ));
        }

        if let Some(amount_total) = session.amount_total {
            if amount_total != total_cents {
                tracing::warn!(
                    session_id = %session.id,
                    metadata_total = total_cents,
                    processor_total = amount_total,
                    "processor total differs from session metadata"
                );
            }
        }

        let lines: Vec<OrderLine> = snapshot_lines
            .into_iter()
            .map(|l| OrderLine {
                product_id: l.product_id,
                name: l.name,
                image: l.image,
                quantity: l.quantity,
                unit_price_cents: l.unit_amount_cents,
            })
            .collect();

        // The address may have been deleted while the buyer sat on the
        // payment page. The payment is already captured at this point, so the
        // order is still recorded.
        let address = match self
            .addresses
            .get_address(address_id, user_id)
            .await
            .map_err(CheckoutError::Store)?
        {
            Some(a) => AddressSnapshot::from(&a),
            None => {
                tracing::warn!(%address_id, %user_id, "address missing at payment confirmation");
                AddressSnapshot::unavailable()
            }
        };

        let order = Order::new(
            user_id,
            lines,
            address,
            subtotal_cents,
            total_cents,
            PaymentDetails::card_completed(session.id.clone()),
        );

        let insert = self
            .orders
            .create_order_for_session(&order, &session.id)
            .await
            .map_err(CheckoutError::Store)?;

        match &insert {
            OrderInsert::Created(order_id) => {
                // Stock shortfall after a captured payment is logged, not
                // failed; the shop resolves it out of band.
                for line in &order.lines {
                    match self
                        .products
                        .decrement_stock(line.product_id, line.quantity)
                        .await
                    {
                        Ok(true) => {}
                        Ok(false) => tracing::warn!(
                            product_id = %line.product_id,
                            quantity = line.quantity,
                            "stock shortfall while confirming paid order"
                        ),
                        Err(e) => tracing::warn!(
                            product_id = %line.product_id,
                            error = %e,
                            "stock decrement failed while confirming paid order"
                        ),
                    }
                }
                self.clear_cart(user_id).await;
                tracing::info!(%order_id, session_id = %session.id, "order created from payment webhook");
            }
            OrderInsert::AlreadyProcessed(order_id) => {
                tracing::info!(
                    %order_id,
                    session_id = %session.id,
                    "duplicate webhook delivery; order already recorded"
                );
            }
        }

        Ok(insert)
    }

    pub async fn list_orders(&self, user_id: Uuid) -> Result<Vec<Order>, CheckoutError> {
        self.orders
            .list_orders(user_id)
            .await
            .map_err(CheckoutError::Store)
    }

    pub async fn list_all_orders(&self) -> Result<Vec<Order>, CheckoutError> {
        self.orders
            .list_all_orders()
            .await
            .map_err(CheckoutError::Store)
    }

    /// Administrative status change, guarded by the forward-only state
    /// machine. Amounts are never touched through this path.
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<Order, CheckoutError> {
        let mut order = self
            .orders
            .get_order(order_id)
            .await
            .map_err(CheckoutError::Store)?
            .ok_or_else(|| CheckoutError::NotFound(format!("order {} not found", order_id)))?;

        lifecycle::validate_transition(order.status, new_status)?;

        self.orders
            .update_order_status(order_id, new_status)
            .await
            .map_err(CheckoutError::Store)?;

        // Cash collected at the door settles the payment.
        if new_status == OrderStatus::Delivered
            && order.payment.method == PaymentMethod::CashOnDelivery
            && order.payment.status == PaymentStatus::Pending
        {
            self.orders
                .update_payment_status(order_id, PaymentStatus::Completed)
                .await
                .map_err(CheckoutError::Store)?;
            order.payment.status = PaymentStatus::Completed;
        }

        order.status = new_status;
        order.updated_at = chrono::Utc::now();
        tracing::info!(%order_id, status = new_status.as_str(), "order status updated");
        Ok(order)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn require_address(
        &self,
        request: &CheckoutRequest,
    ) -> Result<basket_core::repository::Address, CheckoutError> {
        self.addresses
            .get_address(request.address_id, request.user_id)
            .await
            .map_err(CheckoutError::Store)?
            .ok_or_else(|| {
                CheckoutError::NotFound(format!("address {} not found", request.address_id))
            })
    }

    /// Resolve requested lines against the catalog, validating stock and
    /// snapshotting the discounted unit price.
    async fn snapshot_lines(
        &self,
        request: &CheckoutRequest,
    ) -> Result<Vec<OrderLine>, CheckoutError> {
        if request.lines.is_empty() {
            return Err(CheckoutError::Validation(
                "checkout requires at least one line item".to_string(),
            ));
        }

        let mut lines = Vec::with_capacity(request.lines.len());
        for requested in &request.lines {
            let product = self
                .products
                .get_product(requested.product_id)
                .await
                .map_err(CheckoutError::Store)?
                .ok_or_else(|| {
                    CheckoutError::NotFound(format!(
                        "product {} not found",
                        requested.product_id
                    ))
                })?;

            stock::ensure_available(&product, requested.quantity)
                .map_err(|e| CheckoutError::Validation(e.to_string()))?;

            lines.push(OrderLine {
                product_id: product.id,
                name: product.name.clone(),
                image: product.image.clone(),
                quantity: requested.quantity,
                unit_price_cents: product.sale_price_cents(),
            });
        }
        Ok(lines)
    }

    fn reconcile_totals(
        &self,
        lines: &[OrderLine],
        subtotal_cents: i64,
        total_cents: i64,
    ) -> Result<(), CheckoutError> {
        let computed: i64 = lines.iter().map(OrderLine::line_total_cents).sum();
        let tolerance = self.config.totals_tolerance_cents;

        if (computed - subtotal_cents).abs() > tolerance {
            return Err(CheckoutError::Validation(format!(
                "submitted subtotal {} does not match line items ({})",
                subtotal_cents, computed
            )));
        }
        if (computed - total_cents).abs() > tolerance {
            return Err(CheckoutError::Validation(format!(
                "submitted total {} does not match line items ({})",
                total_cents, computed
            )));
        }
        Ok(())
    }

    /// Decrement stock for every line, unwinding earlier decrements if one
    /// fails part-way so a rejected checkout leaves stock untouched.
    async fn take_stock(&self, lines: &[OrderLine]) -> Result<(), CheckoutError> {
        for (taken, line) in lines.iter().enumerate() {
            let ok = match self
                .products
                .decrement_stock(line.product_id, line.quantity)
                .await
            {
                Ok(ok) => ok,
                Err(e) => {
                    self.put_back_stock(&lines[..taken]).await;
                    return Err(CheckoutError::Store(e));
                }
            };
            if !ok {
                self.put_back_stock(&lines[..taken]).await;
                return Err(CheckoutError::Validation(format!(
                    "insufficient stock for {}",
                    line.name
                )));
            }
        }
        Ok(())
    }

    /// Best-effort restore of previously decremented lines.
    async fn put_back_stock(&self, lines: &[OrderLine]) {
        for line in lines {
            if let Err(e) = self
                .products
                .restore_stock(line.product_id, line.quantity)
                .await
            {
                tracing::warn!(product_id = %line.product_id, error = %e, "failed to restore stock");
            }
        }
    }

    /// Best effort: a stuck cart must never fail a placed order.
    async fn clear_cart(&self, user_id: Uuid) {
        if let Err(e) = self.carts.clear_cart(user_id).await {
            tracing::warn!(%user_id, error = %e, "failed to clear cart after checkout");
        }
    }
}

/// In-process gateway stand-in for tests and local runs.
pub struct MockPaymentGateway;

#[async_trait::async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, BoxError> {
        // Trigger for exercising the upstream-failure path
        if request.customer_email.as_deref() == Some("fail@upstream.test") {
            return Err("simulated payment gateway outage".into());
        }
        let id = format!("mock_cs_{}", Uuid::new_v4().simple());
        Ok(CheckoutSession {
            url: format!("https://checkout.example.test/c/{}", id),
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use basket_catalog::product::Product;
    use basket_core::payment::PaymentMethod;
    use basket_core::payment::PaymentStatus;
    use basket_core::repository::Address;
    use basket_core::webhook::SessionMetadata;
    use basket_shared::pii::Masked;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemOrders {
        orders: Mutex<Vec<Order>>,
        /// Simulates the order store being unreachable.
        fail_create: Mutex<bool>,
    }

    #[async_trait]
    impl OrderRepository for MemOrders {
        async fn create_order(&self, order: &Order) -> Result<Uuid, BoxError> {
            if *self.fail_create.lock().unwrap() {
                return Err("order store offline".into());
            }
            self.orders.lock().unwrap().push(order.clone());
            Ok(order.id)
        }

        async fn create_order_for_session(
            &self,
            order: &Order,
            session_id: &str,
        ) -> Result<OrderInsert, BoxError> {
            let mut orders = self.orders.lock().unwrap();
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
                .unwrap()
                .iter()
                .find(|o| o.id == id)
                .cloned())
        }

        async fn update_order_status(
            &self,
            id: Uuid,
            status: OrderStatus,
        ) -> Result<(), BoxError> {
            let mut orders = self.orders.lock().unwrap();
            let order = orders
                .iter_mut()
                .find(|o| o.id == id)
                .ok_or("order not found")?;
            order.status = status;
            Ok(())
        }

        async fn update_payment_status(
            &self,
            id: Uuid,
            status: PaymentStatus,
        ) -> Result<(), BoxError> {
            let mut orders = self.orders.lock().unwrap();
            let order = orders
                .iter_mut()
                .find(|o| o.id == id)
                .ok_or("order not found")?;
            order.payment.status = status;
            Ok(())
        }

        async fn list_orders(&self, user_id: Uuid) -> Result<Vec<Order>, BoxError> {
            Ok(self
                .orders
                .lock()
                .unwrap()
                .iter()
                .filter(|o| o.user_id == user_id)
                .cloned()
                .collect())
        }

        async fn list_all_orders(&self) -> Result<Vec<Order>, BoxError> {
            Ok(self.orders.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct MemProducts {
        products: Mutex<HashMap<Uuid, Product>>,
        /// Simulates a concurrent checkout winning the race on this product.
        deny_decrement: Mutex<Option<Uuid>>,
    }

    #[async_trait]
    impl ProductRepository for MemProducts {
        async fn get_product(&self, id: Uuid) -> Result<Option<Product>, BoxError> {
            Ok(self.products.lock().unwrap().get(&id).cloned())
        }

        async fn decrement_stock(&self, id: Uuid, quantity: u32) -> Result<bool, BoxError> {
            if *self.deny_decrement.lock().unwrap() == Some(id) {
                return Ok(false);
            }
            let mut products = self.products.lock().unwrap();
            let product = products.get_mut(&id).ok_or("product not found")?;
            if product.stock < i64::from(quantity) {
                return Ok(false);
            }
            product.stock -= i64::from(quantity);
            Ok(true)
        }

        async fn restore_stock(&self, id: Uuid, quantity: u32) -> Result<(), BoxError> {
            let mut products = self.products.lock().unwrap();
            let product = products.get_mut(&id).ok_or("product not found")?;
            product.stock += i64::from(quantity);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemAddresses {
        addresses: Mutex<Vec<Address>>,
    }

    #[async_trait]
    impl AddressRepository for MemAddresses {
        async fn get_address(
            &self,
            id: Uuid,
            user_id: Uuid,
        ) -> Result<Option<Address>, BoxError> {
            Ok(self
                .addresses
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.id == id && a.user_id == user_id)
                .cloned())
        }
    }

    #[derive(Default)]
    struct MemCarts {
        cleared: Mutex<Vec<Uuid>>,
    }

    #[async_trait]
    impl CartRepository for MemCarts {
        async fn clear_cart(&self, user_id: Uuid) -> Result<(), BoxError> {
            self.cleared.lock().unwrap().push(user_id);
            Ok(())
        }
    }

    struct Fixture {
        orchestrator: CheckoutOrchestrator,
        orders: Arc<MemOrders>,
        products: Arc<MemProducts>,
        carts: Arc<MemCarts>,
        user_id: Uuid,
        address_id: Uuid,
        rice_id: Uuid,
        sugar_id: Uuid,
    }

    fn product(id: Uuid, name: &str, price_cents: i64, stock: i64) -> Product {
        Product {
            id,
            name: name.to_string(),
            image: None,
            unit: None,
            price_cents,
            discount_percent: 0.0,
            stock,
            is_active: true,
        }
    }

    fn fixture() -> Fixture {
        let user_id = Uuid::new_v4();
        let address_id = Uuid::new_v4();
        let rice_id = Uuid::new_v4();
        let sugar_id = Uuid::new_v4();

        let orders = Arc::new(MemOrders::default());
        let products = Arc::new(MemProducts::default());
        let addresses = Arc::new(MemAddresses::default());
        let carts = Arc::new(MemCarts::default());

        products
            .products
            .lock()
            .unwrap()
            .insert(rice_id, product(rice_id, "Red Rice 1kg", 599, 10));
        products
            .products
            .lock()
            .unwrap()
            .insert(sugar_id, product(sugar_id, "White Sugar 500g", 200, 5));

        addresses.addresses.lock().unwrap().push(Address {
            id: address_id,
            user_id,
            address_line: "12 Galle Road".to_string(),
            city: "Colombo".to_string(),
            state: "Western".to_string(),
            pincode: "00300".to_string(),
            country: "Sri Lanka".to_string(),
            mobile: Masked("0771234567".to_string()),
        });

        let orchestrator = CheckoutOrchestrator::new(
            orders.clone(),
            products.clone(),
            addresses,
            carts.clone(),
            Arc::new(MockPaymentGateway),
            CheckoutConfig::default(),
        );

        Fixture {
            orchestrator,
            orders,
            products,
            carts,
            user_id,
            address_id,
            rice_id,
            sugar_id,
        }
    }

    fn basket_request(fx: &Fixture) -> CheckoutRequest {
        // 2 x 5.99 + 1 x 2.00 = 13.98
        CheckoutRequest {
            user_id: fx.user_id,
            customer_email: None,
            lines: vec![
                RequestedLine {
                    product_id: fx.rice_id,
                    quantity: 2,
                },
                RequestedLine {
                    product_id: fx.sugar_id,
                    quantity: 1,
                },
            ],
            address_id: fx.address_id,
            subtotal_cents: 1398,
            total_cents: 1398,
        }
    }

    fn session_object(fx: &Fixture, session_id: &str) -> CheckoutSessionObject {
        let lines = vec![
            SessionLineItem {
                product_id: fx.rice_id,
                name: "Red Rice 1kg".to_string(),
                image: None,
                unit_amount_cents: 599,
                quantity: 2,
            },
            SessionLineItem {
                product_id: fx.sugar_id,
                name: "White Sugar 500g".to_string(),
                image: None,
                unit_amount_cents: 200,
                quantity: 1,
            },
        ];
        CheckoutSessionObject {
            id: session_id.to_string(),
            payment_status: Some("paid".to_string()),
            amount_subtotal: Some(1398),
            amount_total: Some(1398),
            currency: Some("lkr".to_string()),
            metadata: SessionMetadata {
                user_id: fx.user_id.to_string(),
                address_id: fx.address_id.to_string(),
                line_items: serde_json::to_string(&lines).unwrap(),
                subtotal_cents: "1398".to_string(),
                total_cents: "1398".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn cod_creates_pending_order_matching_line_totals() {
        let fx = fixture();
        let order = fx
            .orchestrator
            .submit_cash_on_delivery(&basket_request(&fx))
            .await
            .unwrap();

        assert_eq!(order.total_cents, 1398);
        assert_eq!(order.computed_subtotal_cents(), 1398);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment.method, PaymentMethod::CashOnDelivery);
        assert_eq!(order.payment.status, PaymentStatus::Pending);

        // stock taken, cart cleared
        let products = fx.products.products.lock().unwrap();
        assert_eq!(products[&fx.rice_id].stock, 8);
        assert_eq!(products[&fx.sugar_id].stock, 4);
        drop(products);
        assert_eq!(fx.carts.cleared.lock().unwrap().as_slice(), &[fx.user_id]);
    }

    #[tokio::test]
    async fn cod_rejects_totals_that_do_not_reconcile() {
        let fx = fixture();
        let mut request = basket_request(&fx);
        request.subtotal_cents = 1200;

        let err = fx
            .orchestrator
            .submit_cash_on_delivery(&request)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)));

        // nothing persisted, stock untouched
        assert!(fx.orders.orders.lock().unwrap().is_empty());
        assert_eq!(fx.products.products.lock().unwrap()[&fx.rice_id].stock, 10);
    }

    #[tokio::test]
    async fn cod_rejects_missing_address_and_product() {
        let fx = fixture();

        let mut request = basket_request(&fx);
        request.address_id = Uuid::new_v4();
        let err = fx
            .orchestrator
            .submit_cash_on_delivery(&request)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::NotFound(_)));

        let mut request = basket_request(&fx);
        request.lines[0].product_id = Uuid::new_v4();
        let err = fx
            .orchestrator
            .submit_cash_on_delivery(&request)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::NotFound(_)));
    }

    #[tokio::test]
    async fn cod_rejects_quantity_beyond_stock() {
        let fx = fixture();
        let mut request = basket_request(&fx);
        request.lines[1].quantity = 6; // only 5 sugar in stock
        request.subtotal_cents = 2 * 599 + 6 * 200;
        request.total_cents = request.subtotal_cents;

        let err = fx
            .orchestrator
            .submit_cash_on_delivery(&request)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)));
        assert!(fx.orders.orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn partial_stock_failure_restores_earlier_decrements() {
        let fx = fixture();
        // Validation sees enough sugar, but a concurrent checkout wins the
        // atomic decrement. The rice decrement must be unwound.
        *fx.products.deny_decrement.lock().unwrap() = Some(fx.sugar_id);

        let err = fx
            .orchestrator
            .submit_cash_on_delivery(&basket_request(&fx))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)));

        let products = fx.products.products.lock().unwrap();
        assert_eq!(products[&fx.rice_id].stock, 10);
        assert_eq!(products[&fx.sugar_id].stock, 5);
        drop(products);
        assert!(fx.orders.orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_order_persist_restores_stock() {
        let fx = fixture();
        *fx.orders.fail_create.lock().unwrap() = true;

        let err = fx
            .orchestrator
            .submit_cash_on_delivery(&basket_request(&fx))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Store(_)));

        // the decrements taken before the insert are given back
        let products = fx.products.products.lock().unwrap();
        assert_eq!(products[&fx.rice_id].stock, 10);
        assert_eq!(products[&fx.sugar_id].stock, 5);
        drop(products);
        assert!(fx.orders.orders.lock().unwrap().is_empty());
        assert!(fx.carts.cleared.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn payment_session_defers_order_creation() {
        let fx = fixture();
        let session = fx
            .orchestrator
            .create_payment_session(&basket_request(&fx))
            .await
            .unwrap();

        assert!(session.id.starts_with("mock_cs_"));
        assert!(session.url.contains(&session.id));
        // no order, no stock movement until the webhook lands
        assert!(fx.orders.orders.lock().unwrap().is_empty());
        assert_eq!(fx.products.products.lock().unwrap()[&fx.rice_id].stock, 10);
    }

    #[tokio::test]
    async fn payment_session_surfaces_upstream_failure() {
        let fx = fixture();
        let mut request = basket_request(&fx);
        request.customer_email = Some("fail@upstream.test".to_string());

        let err = fx
            .orchestrator
            .create_payment_session(&request)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Upstream(_)));
    }

    #[tokio::test]
    async fn duplicate_webhook_deliveries_create_one_order() {
        let fx = fixture();
        let session = session_object(&fx, "cs_test_dup");

        let first = fx
            .orchestrator
            .complete_checkout_session(&session)
            .await
            .unwrap();
        let second = fx
            .orchestrator
            .complete_checkout_session(&session)
            .await
            .unwrap();

        let first_id = match first {
            OrderInsert::Created(id) => id,
            OrderInsert::AlreadyProcessed(_) => panic!("first delivery must create"),
        };
        assert_eq!(second, OrderInsert::AlreadyProcessed(first_id));

        let orders = fx.orders.orders.lock().unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].payment.status, PaymentStatus::Completed);
        assert_eq!(orders[0].payment.method, PaymentMethod::Card);
        assert_eq!(orders[0].status, OrderStatus::Pending);
        assert_eq!(orders[0].total_cents, 1398);
        drop(orders);

        // stock decremented exactly once
        let products = fx.products.products.lock().unwrap();
        assert_eq!(products[&fx.rice_id].stock, 8);
        assert_eq!(products[&fx.sugar_id].stock, 4);
    }

    #[tokio::test]
    async fn unpaid_session_completion_is_not_recorded() {
        let fx = fixture();
        // async payment methods complete the session before the money moves
        let mut session = session_object(&fx, "cs_test_unpaid");
        session.payment_status = Some("unpaid".to_string());

        let err = fx
            .orchestrator
            .complete_checkout_session(&session)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)));

        assert!(fx.orders.orders.lock().unwrap().is_empty());
        assert_eq!(fx.products.products.lock().unwrap()[&fx.rice_id].stock, 10);
    }

    #[tokio::test]
    async fn webhook_with_deleted_address_still_records_the_order() {
        let fx = fixture();
        let mut session = session_object(&fx, "cs_test_noaddr");
        session.metadata.address_id = Uuid::new_v4().to_string();

        let insert = fx
            .orchestrator
            .complete_checkout_session(&session)
            .await
            .unwrap();
        assert!(matches!(insert, OrderInsert::Created(_)));
        assert_eq!(fx.orders.orders.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn status_updates_move_forward_only() {
        let fx = fixture();
        let order = fx
            .orchestrator
            .submit_cash_on_delivery(&basket_request(&fx))
            .await
            .unwrap();

        let updated = fx
            .orchestrator
            .update_status(order.id, OrderStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Confirmed);

        fx.orchestrator
            .update_status(order.id, OrderStatus::Delivered)
            .await
            .unwrap();

        let err = fx
            .orchestrator
            .update_status(order.id, OrderStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn delivery_settles_cash_on_delivery_payment() {
        let fx = fixture();
        let order = fx
            .orchestrator
            .submit_cash_on_delivery(&basket_request(&fx))
            .await
            .unwrap();

        let delivered = fx
            .orchestrator
            .update_status(order.id, OrderStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(delivered.payment.status, PaymentStatus::Completed);

        let stored = fx.orders.orders.lock().unwrap();
        assert_eq!(stored[0].payment.status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn status_updates_never_touch_amounts() {
        let fx = fixture();
        let order = fx
            .orchestrator
            .submit_cash_on_delivery(&basket_request(&fx))
            .await
            .unwrap();

        fx.orchestrator
            .update_status(order.id, OrderStatus::Shipped)
            .await
            .unwrap();

        let stored = fx.orders.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.subtotal_cents, order.subtotal_cents);
        assert_eq!(stored.total_cents, order.total_cents);
        assert_eq!(stored.lines, order.lines);
    }

    #[tokio::test]
    async fn order_lists_are_scoped_by_user() {
        let fx = fixture();
        fx.orchestrator
            .submit_cash_on_delivery(&basket_request(&fx))
            .await
            .unwrap();

        let mine = fx.orchestrator.list_orders(fx.user_id).await.unwrap();
        assert_eq!(mine.len(), 1);

        let theirs = fx.orchestrator.list_orders(Uuid::new_v4()).await.unwrap();
        assert!(theirs.is_empty());

        let all = fx.orchestrator.list_all_orders().await.unwrap();
        assert_eq!(all.len(), 1);
    }
}
