use std::net::SocketAddr;
use std::sync::Arc;

use basket_api::{
    app,
    state::{AppState, AuthConfig},
};
use basket_catalog::product::ProductRepository;
use basket_core::payment::PaymentGateway;
use basket_core::repository::{AddressRepository, CartRepository};
use basket_core::webhook::WebhookVerifier;
use basket_order::orchestrator::{CheckoutConfig, CheckoutOrchestrator, MockPaymentGateway};
use basket_order::repository::OrderRepository;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "basket_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = basket_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Basket API on port {}", config.server.port);

    // Redis Connection
    let redis_client = basket_store::RedisClient::new(&config.redis.url)
        .await
        .expect("Failed to connect to Redis");
    let redis_arc = Arc::new(redis_client);

    // Repositories
    let (orders, products, addresses, carts): (
        Arc<dyn OrderRepository>,
        Arc<dyn ProductRepository>,
        Arc<dyn AddressRepository>,
        Arc<dyn CartRepository>,
    ) = if config.database.url == "memory" {
        tracing::warn!("Running with in-memory repositories; orders will not survive a restart");
        (
            Arc::new(basket_store::memory::MemoryOrderRepository::new()),
            Arc::new(basket_store::memory::MemoryProductRepository::new()),
            Arc::new(basket_store::memory::MemoryAddressRepository::new()),
            Arc::new(basket_store::memory::MemoryCartRepository::new()),
        )
    } else {
        let db = basket_store::DbClient::new(&config.database.url)
            .await
            .expect("Failed to connect to Postgres");
        db.migrate().await.expect("Failed to run migrations");
        let pool = db.pool.clone();
        (
            Arc::new(basket_store::order_repo::PgOrderRepository::new(pool.clone())),
            Arc::new(basket_store::catalog_repo::PgProductRepository::new(pool.clone())),
            Arc::new(basket_store::catalog_repo::PgAddressRepository::new(pool.clone())),
            Arc::new(basket_store::catalog_repo::PgCartRepository::new(pool)),
        )
    };

    // Payment Gateway
    let gateway: Arc<dyn PaymentGateway> = if config.stripe.secret_key == "mock" {
        tracing::warn!("Using mock payment gateway");
        Arc::new(MockPaymentGateway)
    } else {
        Arc::new(basket_store::StripeGateway::new(
            config.stripe.secret_key.clone(),
        ))
    };

    let orchestrator = Arc::new(CheckoutOrchestrator::new(
        orders,
        products,
        addresses,
        carts,
        gateway,
        CheckoutConfig {
            currency: config.business_rules.currency.clone(),
            success_url: config.stripe.success_url.clone(),
            cancel_url: config.stripe.cancel_url.clone(),
            totals_tolerance_cents: config.business_rules.totals_tolerance_cents,
        },
    ));

    let webhook_verifier = Arc::new(WebhookVerifier::new(
        config.stripe.webhook_secret.clone(),
        config.stripe.signature_tolerance_seconds,
    ));

    let app_state = AppState {
        orchestrator,
        redis: redis_arc,
        webhook_verifier,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        rate_limit_per_minute: config.business_rules.rate_limit_per_minute,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
