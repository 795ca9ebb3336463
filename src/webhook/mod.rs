//! Signed webhook payloads sent by the payment processor and the
//! authentication provider.

pub mod clerk;
pub mod paypal;

use axum::http::HeaderMap;
use hmac::Hmac;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Non-empty textual header value.
fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
