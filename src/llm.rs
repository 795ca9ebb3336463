//! Chat-completion client for the hosted language model.
//!
//! Handlers only see the [`ChatModel`] trait. [`OpenAiClient`] speaks the
//! `/chat/completions` wire format over HTTPS.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::OpenAi;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a `system` message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a `user` message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Prompt sent to a [`ChatModel`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// Create a request made of a system and a user message.
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            ..Default::default()
        }
    }

    /// Update sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Bound the answer length.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Content of the last `user` message.
    pub fn user_prompt(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    #[error("language model request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("language model answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("No response from the language model.")]
    Empty,
    #[error("language model API key is missing")]
    NotConfigured,
}

/// Something able to answer a chat prompt.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Return the text of the first answer, or an empty string.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: Option<WireMessage>,
}

#[derive(Deserialize)]
struct WireMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireError {
    error: WireErrorBody,
}

#[derive(Deserialize)]
struct WireErrorBody {
    message: String,
}

impl WireResponse {
    fn into_content(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default()
    }
}

/// OpenAI-compatible chat-completion client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    /// Create a new [`OpenAiClient`].
    pub fn new(config: &OpenAi) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Create with a custom reqwest [`Client`] (for timeouts, proxies, etc.).
    pub fn with_client(client: Client, config: &OpenAi) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::NotConfigured);
        }

        let body = WireRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        tracing::trace!(model = %self.model, max_tokens = ?request.max_tokens, "completion requested");

        let start = std::time::Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        metrics::histogram!(
            crate::telemetry::LLM_REQUESTS_DURATION,
            "status" => status.as_u16().to_string()
        )
        .record(start.elapsed().as_secs_f64());

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<WireError>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(LlmError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let content = response.json::<WireResponse>().await?.into_content();
        tracing::debug!(%content, "completion received");

        Ok(content)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_request_omits_unset_options() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let body = WireRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            temperature: None,
            max_tokens: Some(12),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 12);
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_first_choice_is_the_answer() {
        let response: WireResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"first"}},{"message":{"content":"second"}}]}"#,
        )
        .unwrap();
        assert_eq!(response.into_content(), "first");

        let response: WireResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(response.into_content(), "");
    }

    #[test]
    fn test_user_prompt() {
        let request = CompletionRequest::new("system", "user").max_tokens(10);
        assert_eq!(request.user_prompt(), "user");
        assert_eq!(request.max_tokens, Some(10));
    }

    #[tokio::test]
    async fn test_missing_key_is_rejected_without_network() {
        let client = OpenAiClient::new(&OpenAi::default());
        let err = client
            .complete(CompletionRequest::new("s", "u"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured));
    }
}
