//! Money is carried as integer cents (minor units) everywhere inside the
//! system. Floating-point rupee amounts exist only at the HTTP boundary,
//! where the storefront submits them.

/// Convert a major-unit amount (e.g. 13.98) to integer cents, rounding to
/// the nearest cent.
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Convert integer cents back to a major-unit amount for API responses.
pub fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_storefront_amounts() {
        assert_eq!(to_cents(13.98), 1398);
        assert_eq!(to_cents(5.99), 599);
        assert_eq!(to_cents(2.00), 200);
        assert_eq!(from_cents(1398), 13.98);
    }

    #[test]
    fn rounds_float_noise_to_nearest_cent() {
        // 2 * 5.99 + 2.00 accumulated in f64
        let noisy = 5.99_f64 + 5.99 + 2.00;
        assert_eq!(to_cents(noisy), 1398);
        assert_eq!(to_cents(0.1 + 0.2), 30);
    }
}
