use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub stripe: StripeConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub success_url: String,
    pub cancel_url: String,
    #[serde(default = "default_signature_tolerance")]
    pub signature_tolerance_seconds: i64,
}

fn default_signature_tolerance() -> i64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_tolerance")]
    pub totals_tolerance_cents: i64,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

fn default_currency() -> String {
    "lkr".to_string()
}

fn default_tolerance() -> i64 {
    1
}

fn default_rate_limit() -> i64 {
    100
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Base configuration, always present
            .add_source(config::File::with_name("config/default"))
            // Environment-specific overrides (config/production.toml etc.)
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Machine-local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // `BASKET__AUTH__JWT_SECRET=...` style environment overrides
            .add_source(config::Environment::with_prefix("BASKET").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
