pub mod product;
pub mod stock;

pub use product::{Product, ProductRepository};
pub use stock::{ensure_available, StockError};
