pub mod currency;
pub mod pii;

pub use currency::{from_cents, to_cents};
pub use pii::Masked;
