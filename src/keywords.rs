//! Keyword suggestions from the RapidAPI keyword insight service.

use reqwest::Client;
use serde_json::Value;

use crate::config::Configuration;

const DEFAULT_ERROR: &str = "Unable to fetch keywords";

#[derive(thiserror::Error, Debug)]
pub enum KeywordError {
    #[error("keyword request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Upstream(String),
    #[error("keyword API key is missing")]
    NotConfigured,
}

/// Client of the `/keysuggest/` endpoint.
#[derive(Debug, Clone)]
pub struct KeywordClient {
    client: Client,
    base_url: String,
    api_key: String,
    host: String,
}

impl KeywordClient {
    /// Create a new [`KeywordClient`].
    pub fn new(config: &Configuration) -> Self {
        Self {
            client: Client::new(),
            base_url: config.keywords_url(),
            api_key: config.keywords.api_key.clone(),
            host: config.keywords.host.clone(),
        }
    }

    /// Look `keyword` up and return the upstream JSON untouched.
    pub async fn lookup(
        &self,
        keyword: &str,
        location: &str,
        lang: &str,
    ) -> Result<Value, KeywordError> {
        if self.api_key.is_empty() {
            return Err(KeywordError::NotConfigured);
        }

        let response = self
            .client
            .get(format!("{}/keysuggest/", self.base_url))
            .query(&[("keyword", keyword), ("location", location), ("lang", lang)])
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", &self.host)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(%status, %keyword, "keyword lookup rejected");
            return Err(KeywordError::Upstream(upstream_error(&body)));
        }

        serde_json::from_str(&body).map_err(|_| KeywordError::Upstream(DEFAULT_ERROR.to_owned()))
    }
}

/// Message of an upstream failure body.
fn upstream_error(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| match v.get("error") {
            Some(Value::String(message)) if !message.is_empty() => Some(message.clone()),
            _ => None,
        })
        .unwrap_or_else(|| DEFAULT_ERROR.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_error_message() {
        assert_eq!(upstream_error(r#"{"error":"Quota exceeded"}"#), "Quota exceeded");
        assert_eq!(upstream_error(r#"{"message":"nope"}"#), DEFAULT_ERROR);
        assert_eq!(upstream_error("<html>502</html>"), DEFAULT_ERROR);
    }

    #[tokio::test]
    async fn test_missing_key_is_rejected_without_network() {
        let client = KeywordClient::new(&Configuration::default());
        let err = client.lookup("rust", "US", "en").await.unwrap_err();
        assert!(matches!(err, KeywordError::NotConfigured));
    }
}
