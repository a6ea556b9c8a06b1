use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wrapper for sensitive customer data (phone numbers, emails) that masks its
/// value in Debug/Display output so it never ends up in log lines.
#[derive(Clone, Deserialize)]
pub struct Masked<T>(pub T);

impl<T: fmt::Display> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: fmt::Display> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // API responses need the real value; the masking is for log macros
        // like tracing::info!("{:?}", order).
        self.0.serialize(serializer)
    }
}

impl<T: PartialEq> PartialEq for Masked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T> From<T> for Masked<T> {
    fn from(value: T) -> Self {
        Masked(value)
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }

    pub fn inner(&self) -> &T {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_masked() {
        let mobile: Masked<String> = Masked("0771234567".to_string());
        assert_eq!(format!("{:?}", mobile), "********");
        assert_eq!(format!("{}", mobile), "********");
    }

    #[test]
    fn serializes_inner_value() {
        let mobile: Masked<String> = Masked("0771234567".to_string());
        let json = serde_json::to_string(&mobile).unwrap();
        assert_eq!(json, "\"0771234567\"");
    }
}
