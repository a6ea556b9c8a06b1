pub mod payment;
pub mod repository;
pub mod webhook;

pub use payment::{CheckoutSession, PaymentGateway, PaymentMethod, PaymentStatus};
pub use webhook::WebhookVerifier;
