pub mod lifecycle;
pub mod models;
pub mod orchestrator;
pub mod repository;

pub use models::{AddressSnapshot, Order, OrderLine, OrderStatus, PaymentDetails};
pub use orchestrator::{CheckoutError, CheckoutOrchestrator};
pub use repository::{OrderInsert, OrderRepository};
