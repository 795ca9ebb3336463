//! Clerk user webhooks, delivered through Svix.

use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::Mac;
use serde::Deserialize;

use super::{HmacSha256, header};
use crate::error::{Result, ServerError};

pub const SVIX_ID: &str = "svix-id";
pub const SVIX_TIMESTAMP: &str = "svix-timestamp";
pub const SVIX_SIGNATURE: &str = "svix-signature";

const SECRET_PREFIX: &str = "whsec_";
const SIGNATURE_VERSION: &str = "v1,";
/// Accepted clock skew, in seconds.
const TOLERANCE: i64 = 5 * 60;

/// Check Svix signatures.
#[derive(Clone)]
pub struct SvixVerifier {
    key: Vec<u8>,
}

impl SvixVerifier {
    /// Create a new [`SvixVerifier`] from a `whsec_` signing secret.
    pub fn new(secret: &str) -> std::result::Result<Self, base64::DecodeError> {
        let secret = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
        Ok(Self {
            key: STANDARD.decode(secret)?,
        })
    }

    fn mac(&self, id: &str, timestamp: &str, body: &[u8]) -> Result<HmacSha256> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).map_err(|_| ServerError::InvalidSignature)?;
        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        Ok(mac)
    }

    /// Verify a delivery against its raw `body`.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<()> {
        self.verify_at(headers, body, chrono::Utc::now().timestamp())
    }

    fn verify_at(&self, headers: &HeaderMap, body: &[u8], now: i64) -> Result<()> {
        let (Some(id), Some(timestamp), Some(signatures)) = (
            header(headers, SVIX_ID),
            header(headers, SVIX_TIMESTAMP),
            header(headers, SVIX_SIGNATURE),
        ) else {
            tracing::warn!("Svix headers missing");
            return Err(ServerError::InvalidSignature);
        };

        let sent_at = timestamp
            .parse::<i64>()
            .map_err(|_| ServerError::InvalidSignature)?;
        if (now - sent_at).abs() > TOLERANCE {
            tracing::warn!(%id, sent_at, now, "Svix timestamp outside tolerance");
            return Err(ServerError::InvalidSignature);
        }

        let mac = self.mac(id, timestamp, body)?;
        let matches = signatures
            .split_whitespace()
            .filter_map(|entry| entry.strip_prefix(SIGNATURE_VERSION))
            .filter_map(|signature| STANDARD.decode(signature).ok())
            .any(|signature| mac.clone().verify_slice(&signature).is_ok());

        if matches {
            Ok(())
        } else {
            tracing::warn!(%id, "Svix signature mismatch");
            Err(ServerError::InvalidSignature)
        }
    }

    /// Sign a delivery the way Svix does.
    #[cfg(test)]
    pub fn sign(&self, id: &str, timestamp: i64, body: &[u8]) -> String {
        let mac = self.mac(id, &timestamp.to_string(), body).unwrap();
        format!("{SIGNATURE_VERSION}{}", STANDARD.encode(mac.finalize().into_bytes()))
    }
}

/// User event.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub data: UserData,
}

impl Event {
    /// Payloads without a type are read as user creations.
    pub fn is_user_created(&self) -> bool {
        self.kind.as_deref().is_none_or(|kind| kind == "user.created")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserData {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    pub primary_email_address_id: Option<String>,
}

impl UserData {
    /// Primary address, or the first one when none is flagged.
    pub fn primary_email(&self) -> Option<&str> {
        let primary = self
            .primary_email_address_id
            .as_deref()
            .and_then(|id| self.email_addresses.iter().find(|e| e.id == id));

        primary
            .or(self.email_addresses.first())
            .map(|e| e.email_address.as_str())
            .filter(|email| !email.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailAddress {
    pub id: String,
    pub email_address: String,
}
