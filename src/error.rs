//! Error handler for bookwright.

use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sqlx::Error as SQLxError;
use thiserror::Error;
use validator::ValidationErrors;

use crate::keywords::KeywordError;
use crate::llm::LlmError;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error("error parsing form data")]
    ParsingForm(Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Axum(#[from] JsonRejection),

    #[error("SQL request failed: {0}")]
    Sql(#[from] SQLxError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Keywords(#[from] KeywordError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid 'Authorization' header")]
    Unauthorized,

    #[error("an active subscription is required")]
    PaymentRequired,

    #[error("internal server error, {details}")]
    Internal {
        details: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ServerError {
    /// Create an [`ServerError::Internal`] from any error.
    pub fn internal(
        details: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal {
            details: details.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    r#type: Option<String>,
    title: String,
    status: u16,
    detail: String,
    instance: Option<String>,
    errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Update `title` field.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    /// Add detailed error.
    pub fn details(mut self, description: &str) -> Self {
        self.detail = description.into();
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(self) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            r#type: None,
            title: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: String::default(),
            instance: None,
            errors: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| issue.code.to_string()),
            })
        })
        .collect()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = ResponseError::default()
            .title("There were validation errors with your request.")
            .details(&self.to_string())
            .status(StatusCode::BAD_REQUEST);

        let response = match &self {
            ServerError::Validation(validation_errors) => response.errors(validation_errors),

            ServerError::ParsingForm(err) => response
                .title("Server error during data parsing.")
                .details(&err.to_string()),

            ServerError::Axum(rejection) => response
                .title("Invalid request body.")
                .details(&rejection.body_text())
                .status(rejection.status()),

            ServerError::BadRequest(_) => response.title("Invalid request."),

            ServerError::Sql(SQLxError::RowNotFound) => response
                .title("Resource not found.")
                .status(StatusCode::NOT_FOUND),

            ServerError::Sql(err) => {
                tracing::error!(%err, "database request failed");
                ResponseError::default().details("Database request failed.")
            },

            ServerError::Llm(err) => {
                tracing::error!(%err, "language model request failed");
                ResponseError::default()
                    .title("Generation failed.")
                    .details(&err.to_string())
            },

            ServerError::Keywords(err) => {
                tracing::error!(%err, "keyword lookup failed");
                ResponseError::default().details(&err.to_string())
            },

            ServerError::MissingField(field) => {
                tracing::error!(field, "generated answer is incomplete");
                ResponseError::default()
                    .title("Generation failed.")
                    .details(&self.to_string())
            },

            ServerError::InvalidSignature => response
                .title("Invalid signature.")
                .status(StatusCode::UNAUTHORIZED),

            ServerError::Unauthorized => response
                .title("Missing or invalid 'Authorization' header.")
                .status(StatusCode::UNAUTHORIZED),

            ServerError::PaymentRequired => response
                .title("Subscription required.")
                .status(StatusCode::PAYMENT_REQUIRED),

            ServerError::Internal { details, source } => {
                tracing::error!(err = source, %details, "server returned 500 status");

                ResponseError::default().details(details)
            },
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({
                "type": null,
                "title": "Internal server error.",
                "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "detail": null,
                "instance": null,
                "errors": null,
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(error: ServerError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_missing_field_is_server_error() {
        let (status, body) = body_of(ServerError::MissingField("bookSeries")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Missing field: bookSeries");
    }

    #[tokio::test]
    async fn test_bad_request_keeps_message() {
        let (status, body) =
            body_of(ServerError::BadRequest("Keyword is required".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Keyword is required");
    }

    #[tokio::test]
    async fn test_auth_statuses() {
        let (status, _) = body_of(ServerError::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, body) = body_of(ServerError::InvalidSignature).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["title"], "Invalid signature.");
        let (status, _) = body_of(ServerError::PaymentRequired).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    }

    #[tokio::test]
    async fn test_row_not_found() {
        let (status, _) = body_of(ServerError::Sql(SQLxError::RowNotFound)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
