//! Configuration manager for bookwright.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_PORT: u16 = 8080;
/// Full ebook generation issues one completion per subchapter, sequentially.
const DEFAULT_TIMEOUT: u64 = 600;
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_KEYWORDS_HOST: &str = "google-keyword-insight1.p.rapidapi.com";
const DEFAULT_CLERK_URL: &str = "https://api.clerk.com";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Domain name of current instance.
    pub url: String,
    /// Listening port.
    pub port: u16,
    /// Request timeout, in seconds.
    pub timeout: u64,
    /// Whether generation routes require an active subscription.
    pub subscription_required: bool,
    /// Subscriber flagged as administrator on the identity provider.
    #[serde(skip_serializing)]
    pub admin_email: Option<String>,
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to PostgreSQL configuration.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
    /// Related to the chat-completion provider.
    #[serde(skip_serializing)]
    pub openai: OpenAi,
    /// Related to the keyword suggestion API.
    #[serde(skip_serializing)]
    pub keywords: Keywords,
    /// Related to payment processor webhooks.
    #[serde(skip_serializing)]
    pub paypal: PayPal,
    /// Related to the authentication provider.
    #[serde(skip_serializing)]
    pub clerk: Clerk,
    /// Shape of generated ebooks.
    pub generation: Generation,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: env!("CARGO_CRATE_NAME").to_owned(),
            url: String::default(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            subscription_required: false,
            admin_email: None,
            version: VERSION.to_owned(),
            path: PathBuf::default(),
            postgres: None,
            openai: OpenAi::default(),
            keywords: Keywords::default(),
            paypal: PayPal::default(),
            clerk: Clerk::default(),
            generation: Generation::default(),
        }
    }
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

/// Chat-completion provider configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAi {
    pub api_key: String,
    /// Base URL, without the `/chat/completions` suffix.
    pub base_url: String,
    pub model: String,
}

impl Default for OpenAi {
    fn default() -> Self {
        Self {
            api_key: String::default(),
            base_url: DEFAULT_OPENAI_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
        }
    }
}

/// RapidAPI keyword insight configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Keywords {
    pub api_key: String,
    /// Value of the `x-rapidapi-host` header.
    pub host: String,
    /// Defaults to `https://{host}`.
    pub base_url: Option<String>,
}

impl Default for Keywords {
    fn default() -> Self {
        Self {
            api_key: String::default(),
            host: DEFAULT_KEYWORDS_HOST.to_owned(),
            base_url: None,
        }
    }
}

/// PayPal webhook configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct PayPal {
    /// Webhook identifier, also the HMAC key of transmissions.
    pub webhook_id: Option<String>,
}

/// Clerk configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Clerk {
    /// Backend API secret key. Metadata sync is disabled without it.
    pub secret_key: Option<String>,
    pub api_url: String,
    /// `whsec_` signing secret of the user webhook.
    pub webhook_secret: Option<String>,
    /// PEM public key used to verify session tokens.
    pub jwt_public_key: Option<String>,
}

impl Default for Clerk {
    fn default() -> Self {
        Self {
            secret_key: None,
            api_url: DEFAULT_CLERK_URL.to_owned(),
            webhook_secret: None,
            jwt_public_key: None,
        }
    }
}

/// Generated ebook shape.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Generation {
    pub chapters: u32,
    pub subchapters: u32,
    /// Links the closing "Thank You" chapter must mention.
    pub author_links: Vec<String>,
}

impl Default for Generation {
    fn default() -> Self {
        Self {
            chapters: 15,
            subchapters: 3,
            author_links: Vec::new(),
        }
    }
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`).
    fn normalize_url(&self, url: &str) -> Result<String, url::ParseError> {
        let url_with_scheme =
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

        let parsed_url = Url::parse(&url_with_scheme)?;
        Ok(parsed_url.to_string())
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location, then applies environment overrides.
    pub fn read(self) -> Result<Arc<Self>, url::ParseError> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        let mut config = match File::open(file_path) {
            Ok(file) => match serde_yaml::from_reader::<_, Configuration>(file)
            {
                Ok(config) => config,
                Err(err) => self.error(err),
            },
            Err(err) => self.error(err),
        };

        // set app version.
        config.version = VERSION.to_owned();

        // normalize URLs.
        if !config.url.is_empty() {
            config.url = self.normalize_url(&config.url)?;
        }
        config.openai.base_url = self
            .normalize_url(&config.openai.base_url)?
            .trim_end_matches('/')
            .to_owned();
        config.keywords.base_url = config
            .keywords
            .base_url
            .map(|u| self.normalize_url(&u))
            .transpose()?;

        Ok(Arc::new(config.with_env()))
    }

    /// Secrets are preferably given through the environment.
    fn with_env(mut self) -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let Some(key) = var("OPENAI_API_KEY") {
            self.openai.api_key = key;
        }
        if let Some(key) = var("RAPIDAPI_KEY") {
            self.keywords.api_key = key;
        }
        if let Some(id) = var("PAYPAL_WEBHOOK_ID") {
            self.paypal.webhook_id = Some(id);
        }
        if let Some(key) = var("CLERK_SECRET_KEY") {
            self.clerk.secret_key = Some(key);
        }
        if let Some(secret) = var("CLERK_WEBHOOK_SECRET") {
            self.clerk.webhook_secret = Some(secret);
        }
        if let Some(pem) = var("CLERK_JWT_KEY") {
            self.clerk.jwt_public_key = Some(pem);
        }
        if let Some(email) = var("ADMIN_EMAIL") {
            self.admin_email = Some(email);
        }

        self
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found or invalid");
        Self::default()
    }

    /// Base URL of the keyword API.
    pub fn keywords_url(&self) -> String {
        self.keywords
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}", self.keywords.host))
            .trim_end_matches('/')
            .to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: Configuration = serde_yaml::from_str(
            "name: bookwright\nsubscription_required: true\ngeneration:\n  chapters: 4\n",
        )
        .unwrap();

        assert!(config.subscription_required);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.generation.chapters, 4);
        assert_eq!(config.generation.subchapters, 3);
        assert_eq!(config.openai.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_normalize_url() {
        let config = Configuration::default();
        assert_eq!(
            config.normalize_url("books.example.com").unwrap(),
            "https://books.example.com/"
        );
        assert_eq!(
            config.normalize_url("http://localhost:8080").unwrap(),
            "http://localhost:8080/"
        );
    }

    #[test]
    fn test_keywords_url() {
        let mut config = Configuration::default();
        assert_eq!(
            config.keywords_url(),
            format!("https://{DEFAULT_KEYWORDS_HOST}")
        );

        config.keywords.base_url = Some("http://127.0.0.1:9000/".into());
        assert_eq!(config.keywords_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let mut config = Configuration::default();
        config.openai.api_key = "sk-secret".into();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("sk-secret"));
    }
}
