//! Verify session tokens issued by the authentication provider.

use axum::extract::FromRef;
use axum::http::{HeaderMap, header};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::{Result, ServerError};

const BEARER: &str = "Bearer ";
/// Cookie holding the session token on same-site browser requests.
const SESSION_COOKIE: &str = "__session";

/// Pieces of information asserted on a session JWT.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Claims {
    /// Provider user ID.
    pub sub: String,
    /// Identifies the expiration time on or after which the JWT must not be
    /// accepted for processing.
    pub exp: u64,
    #[serde(default)]
    pub iat: u64,
    /// Identifies the organization that issued the JWT.
    #[serde(default)]
    pub iss: String,
    /// Session ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
}

/// Check session JWTs. Without a key, every token is refused.
#[derive(Clone, Default)]
pub struct SessionVerifier {
    algorithm: Option<Algorithm>,
    public_key: Option<DecodingKey>,
}

impl SessionVerifier {
    /// Create a [`SessionVerifier`] from the provider's RSA public key.
    pub fn from_rsa_pem(public_key_pem: &str) -> std::result::Result<Self, jsonwebtoken::errors::Error> {
        Ok(Self {
            algorithm: Some(Algorithm::RS256),
            public_key: Some(DecodingKey::from_rsa_pem(public_key_pem.as_bytes())?),
        })
    }

    /// Create a [`SessionVerifier`] over a shared HMAC secret.
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            algorithm: Some(Algorithm::HS256),
            public_key: Some(DecodingKey::from_secret(secret)),
        }
    }

    /// Decode and check a token.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let (Some(algorithm), Some(public_key)) = (self.algorithm, &self.public_key) else {
            tracing::warn!("session token received but no verification key is configured");
            return Err(ServerError::Unauthorized);
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_aud = false;

        decode::<Claims>(token, public_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!(%err, "session token refused");
                ServerError::Unauthorized
            })
    }

    /// Verify the token carried by a request, if any.
    pub fn from_headers(&self, headers: &HeaderMap) -> Result<Claims> {
        let token = token(headers).ok_or(ServerError::Unauthorized)?;
        self.decode(token)
    }
}

/// Session token of a request: `Authorization` bearer first, then the
/// session cookie.
pub fn token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    bearer.or_else(|| {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|cookie| cookie.trim().split_once('='))
            .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
            .map(|(_, value)| value)
    })
}

impl FromRef<AppState> for SessionVerifier {
    fn from_ref(state: &AppState) -> SessionVerifier {
        state.session.clone()
    }
}
