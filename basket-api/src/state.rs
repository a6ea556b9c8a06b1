use std::sync::Arc;

use basket_core::webhook::WebhookVerifier;
use basket_order::orchestrator::CheckoutOrchestrator;
use basket_store::RedisClient;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<CheckoutOrchestrator>,
    pub redis: Arc<RedisClient>,
    pub webhook_verifier: Arc<WebhookVerifier>,
    pub auth: AuthConfig,
    pub rate_limit_per_minute: i64,
}
