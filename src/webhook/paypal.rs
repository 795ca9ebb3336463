//! PayPal subscription webhooks.

use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::Mac;
use serde::Deserialize;

use super::{HmacSha256, header};
use crate::error::{Result, ServerError};

pub const TRANSMISSION_ID: &str = "paypal-transmission-id";
pub const TRANSMISSION_TIME: &str = "paypal-transmission-time";
pub const TRANSMISSION_SIG: &str = "paypal-transmission-sig";

/// Check transmission signatures with the webhook identifier as HMAC key.
#[derive(Clone, Debug, Default)]
pub struct PayPalVerifier {
    webhook_id: Option<String>,
}

impl PayPalVerifier {
    /// Create a new [`PayPalVerifier`]. Without an identifier, every
    /// transmission is refused.
    pub fn new(webhook_id: Option<String>) -> Self {
        Self {
            webhook_id: webhook_id.filter(|id| !id.is_empty()),
        }
    }

    fn mac(webhook_id: &str, transmission_id: &str, time: &str, body: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(webhook_id.as_bytes())
            .map_err(|_| ServerError::InvalidSignature)?;
        mac.update(transmission_id.as_bytes());
        mac.update(b"|");
        mac.update(time.as_bytes());
        mac.update(b"|");
        mac.update(body);
        Ok(mac)
    }

    /// Verify a transmission against its raw `body`.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<()> {
        let Some(webhook_id) = &self.webhook_id else {
            tracing::error!("PayPal webhook identifier is not configured");
            return Err(ServerError::InvalidSignature);
        };

        let (Some(transmission_id), Some(time), Some(signature)) = (
            header(headers, TRANSMISSION_ID),
            header(headers, TRANSMISSION_TIME),
            header(headers, TRANSMISSION_SIG),
        ) else {
            tracing::warn!("PayPal transmission headers missing");
            return Err(ServerError::InvalidSignature);
        };

        let signature = STANDARD
            .decode(signature)
            .map_err(|_| ServerError::InvalidSignature)?;

        Self::mac(webhook_id, transmission_id, time, body)?
            .verify_slice(&signature)
            .map_err(|_| {
                tracing::warn!(%transmission_id, "PayPal signature mismatch");
                ServerError::InvalidSignature
            })
    }

    /// Sign a transmission the way the processor does.
    #[cfg(test)]
    pub fn sign(&self, transmission_id: &str, time: &str, body: &[u8]) -> String {
        let webhook_id = self.webhook_id.as_deref().unwrap_or_default();
        let mac = Self::mac(webhook_id, transmission_id, time, body).unwrap();
        STANDARD.encode(mac.finalize().into_bytes())
    }
}

/// Processor notification.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub event_type: String,
    pub resource: Option<Resource>,
}

/// Subscription the notification is about.
#[derive(Debug, Clone, Deserialize)]
pub struct Resource {
    pub id: String,
    pub plan_id: Option<String>,
    pub status: Option<String>,
    pub subscriber: Option<Subscriber>,
}

impl Resource {
    pub fn email(&self) -> Option<&str> {
        self.subscriber
            .as_ref()
            .and_then(|s| s.email_address.as_deref())
            .filter(|email| !email.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscriber {
    pub email_address: Option<String>,
}

/// Handled `event_type` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Cancelled,
    Suspended,
    Updated,
    Other,
}

impl From<&str> for EventKind {
    fn from(event_type: &str) -> Self {
        match event_type {
            "BILLING.SUBSCRIPTION.CREATED" => EventKind::Created,
            "BILLING.SUBSCRIPTION.CANCELLED" => EventKind::Cancelled,
            "BILLING.SUBSCRIPTION.SUSPENDED" => EventKind::Suspended,
            "BILLING.SUBSCRIPTION.UPDATED" => EventKind::Updated,
            _ => EventKind::Other,
        }
    }
}
