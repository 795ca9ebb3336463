//! Mirror subscription state into the authentication provider's user
//! metadata.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Clerk;
use crate::subscription::SubscriptionStatus;

#[derive(thiserror::Error, Debug)]
pub enum IdentityError {
    #[error("identity provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("identity provider answered {status}: {message}")]
    Status { status: u16, message: String },
}

/// User as returned by the provider API.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderUser {
    pub id: String,
}

/// Subscription part of the private metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionMetadata {
    pub status: SubscriptionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
}

/// Private metadata written on the provider user.
///
/// The provider deep-merges it into what is already stored, so unset
/// fields keep their previous value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrivateMetadata {
    pub subscription: SubscriptionMetadata,
    #[serde(rename = "isAdmin", skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

impl PrivateMetadata {
    /// Only move the subscription status.
    pub fn status(status: SubscriptionStatus) -> Self {
        Self {
            subscription: SubscriptionMetadata {
                status,
                plan_id: None,
                subscription_id: None,
            },
            is_admin: None,
            user_id: None,
        }
    }
}

#[derive(Serialize)]
struct MetadataUpdate<'a> {
    private_metadata: &'a PrivateMetadata,
}

#[derive(Debug, Clone)]
struct Connection {
    client: Client,
    secret_key: String,
}

/// Backend API client of the authentication provider.
///
/// The default value is disabled: every sync is skipped.
#[derive(Debug, Clone, Default)]
pub struct IdentityManager {
    api_url: String,
    conn: Option<Connection>,
}

impl IdentityManager {
    /// Create a new [`IdentityManager`].
    pub fn new(config: &Clerk) -> Self {
        let conn = config
            .secret_key
            .as_ref()
            .filter(|key| !key.is_empty())
            .map(|key| Connection {
                client: Client::new(),
                secret_key: key.clone(),
            });

        if conn.is_none() {
            tracing::warn!("identity provider secret key missing, metadata sync disabled");
        }

        Self {
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            conn,
        }
    }

    /// Find the first provider user owning `email`.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<ProviderUser>, IdentityError> {
        let Some(conn) = &self.conn else {
            return Ok(None);
        };

        let response = conn
            .client
            .get(format!("{}/v1/users", self.api_url))
            .query(&[("email_address", email)])
            .bearer_auth(&conn.secret_key)
            .send()
            .await?;
        let users: Vec<ProviderUser> = check(response).await?.json().await?;

        Ok(users.into_iter().next())
    }

    /// Merge `metadata` into the private metadata of `user_id`.
    pub async fn update_private_metadata(
        &self,
        user_id: &str,
        metadata: &PrivateMetadata,
    ) -> Result<(), IdentityError> {
        let Some(conn) = &self.conn else {
            return Ok(());
        };

        let response = conn
            .client
            .patch(format!("{}/v1/users/{user_id}/metadata", self.api_url))
            .bearer_auth(&conn.secret_key)
            .json(&MetadataUpdate {
                private_metadata: metadata,
            })
            .send()
            .await?;
        check(response).await?;

        Ok(())
    }

    /// Write `metadata` on the user owning `email`.
    ///
    /// Returns `false` when the client is disabled or no user matches.
    pub async fn sync(&self, email: &str, metadata: &PrivateMetadata) -> Result<bool, IdentityError> {
        if self.conn.is_none() {
            tracing::debug!(%email, "metadata sync skipped");
            return Ok(false);
        }

        let Some(user) = self.find_user_by_email(email).await? else {
            tracing::error!(%email, "no identity provider user for subscriber");
            return Ok(false);
        };

        self.update_private_metadata(&user.id, metadata).await?;
        tracing::info!(user_id = user.id, status = %metadata.subscription.status, "identity metadata updated");

        Ok(true)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, IdentityError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(IdentityError::Status {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        })
    }
}
