pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod memory;
pub mod order_repo;
pub mod redis_repo;
pub mod stripe_gateway;

pub use database::DbClient;
pub use redis_repo::RedisClient;
pub use stripe_gateway::StripeGateway;
