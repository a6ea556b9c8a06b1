use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::payment::SessionLineItem;

type HmacSha256 = Hmac<Sha256>;

/// Verifies Stripe-style webhook signatures.
///
/// The signature header carries a unix timestamp and one or more HMAC-SHA256
/// digests over `"{timestamp}.{raw_body}"`, e.g.
/// `t=1712000000,v1=5257a8...`. Verification must succeed before any order
/// state is read or written.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_seconds: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("signature header is missing the timestamp or digest element")]
    MalformedHeader,

    #[error("signature digest is not valid hex")]
    BadEncoding,

    #[error("signature does not match the payload")]
    Mismatch,

    #[error("signature timestamp is outside the tolerance window")]
    StaleTimestamp,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_seconds: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_seconds,
        }
    }

    /// Check `signature_header` against the raw request body. `now` is passed
    /// in so the replay window is testable.
    pub fn verify(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        let mut timestamp: Option<i64> = None;
        let mut digests: Vec<Vec<u8>> = Vec::new();

        for element in signature_header.split(',') {
            match element.trim().split_once('=') {
                Some(("t", value)) => {
                    timestamp = value.parse::<i64>().ok();
                }
                Some(("v1", value)) => {
                    digests.push(hex::decode(value).map_err(|_| SignatureError::BadEncoding)?);
                }
                _ => {} // unknown scheme versions are ignored
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
        if digests.is_empty() {
            return Err(SignatureError::MalformedHeader);
        }

        if (now.timestamp() - timestamp).abs() > self.tolerance_seconds {
            return Err(SignatureError::StaleTimestamp);
        }

        for digest in &digests {
            let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
                .map_err(|_| SignatureError::Mismatch)?;
            mac.update(format!("{}.", timestamp).as_bytes());
            mac.update(payload);
            if mac.verify_slice(digest).is_ok() {
                return Ok(());
            }
        }

        Err(SignatureError::Mismatch)
    }
}

/// Produce a signature header for `payload` at `timestamp`. Used by tests and
/// by the mock gateway when simulating processor callbacks.
pub fn sign(secret: &str, payload: &[u8], timestamp: i64) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

// ============================================================================
// Event payloads
// ============================================================================

/// Top-level webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: GatewayEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEventData {
    pub object: CheckoutSessionObject,
}

/// The processor's view of a completed (or otherwise settled) checkout
/// session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub amount_subtotal: Option<i64>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    pub metadata: SessionMetadata,
}

/// Order ingredients we stashed in session metadata at session-creation time.
/// Processor metadata values are always strings, so ids and amounts come back
/// string-encoded and `line_items` is a nested JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub user_id: String,
    pub address_id: String,
    pub line_items: String,
    pub subtotal_cents: String,
    pub total_cents: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("metadata field {0} is not valid: {1}")]
    Invalid(&'static str, String),
}

impl SessionMetadata {
    pub fn user_id(&self) -> Result<Uuid, MetadataError> {
        Uuid::parse_str(&self.user_id)
            .map_err(|e| MetadataError::Invalid("user_id", e.to_string()))
    }

    pub fn address_id(&self) -> Result<Uuid, MetadataError> {
        Uuid::parse_str(&self.address_id)
            .map_err(|e| MetadataError::Invalid("address_id", e.to_string()))
    }

    pub fn lines(&self) -> Result<Vec<SessionLineItem>, MetadataError> {
        serde_json::from_str(&self.line_items)
            .map_err(|e| MetadataError::Invalid("line_items", e.to_string()))
    }

    pub fn subtotal_cents(&self) -> Result<i64, MetadataError> {
        self.subtotal_cents
            .parse::<i64>()
            .map_err(|e| MetadataError::Invalid("subtotal_cents", e.to_string()))
    }

    pub fn total_cents(&self) -> Result<i64, MetadataError> {
        self.total_cents
            .parse::<i64>()
            .map_err(|e| MetadataError::Invalid("total_cents", e.to_string()))
    }
}
