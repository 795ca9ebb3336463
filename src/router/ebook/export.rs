use axum::body::Body as ResponseBody;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{Result, ServerError};
use crate::export::{self, DOCX_CONTENT_TYPE, TXT_CONTENT_TYPE};
use crate::router::Valid;

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct Body {
    #[validate(length(min = 1, message = "No content provided for export"))]
    full_ebook_content: String,
    #[validate(length(max = 255, message = "Title is too long."))]
    title: String,
}

fn attachment(content_type: &'static str, file_name: &str, bytes: Vec<u8>) -> Result<Response> {
    let disposition = HeaderValue::from_bytes(export::content_disposition(file_name).as_bytes())
        .map_err(|err| ServerError::internal("Invalid file name", err))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(ResponseBody::from(bytes))
        .map_err(|err| ServerError::internal("Failed to build download", err))
}

/// Download the ebook as plain text.
pub async fn txt(Valid(body): Valid<Body>) -> Result<Response> {
    let file_name = export::file_name(&body.title, "txt");
    attachment(TXT_CONTENT_TYPE, &file_name, body.full_ebook_content.into_bytes())
}

/// Download the ebook as a Word document.
pub async fn docx(Valid(body): Valid<Body>) -> Result<Response> {
    let bytes = export::docx::render(&body.full_ebook_content)
        .map_err(|err| ServerError::internal("Failed to export DOCX", err))?;

    let file_name = export::file_name(&body.title, "docx");
    tracing::info!(%file_name, size = bytes.len(), "docx exported");

    attachment(DOCX_CONTENT_TYPE, &file_name, bytes)
}

#[cfg(test)]
mod tests {
    use crate::*;
    use axum::http::{StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_txt_export() {
        let app = app(router::state(router::lazy_pool()));
        let response = make_request(
            app,
            Method::POST,
            "/ebook/export/txt",
            json!({ "fullEbookContent": "# Book\n\nHello", "title": "Deep Roots" }).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Deep_Roots.txt\""
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"# Book\n\nHello");
    }

    #[tokio::test]
    async fn test_docx_export() {
        let app = app(router::state(router::lazy_pool()));
        let response = make_request(
            app,
            Method::POST,
            "/ebook/export/docx",
            json!({ "fullEbookContent": "# Book\n\n- **bold** item", "title": "Été" }).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION].as_bytes(),
            "attachment; filename=\"Été.docx\"".as_bytes()
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn test_empty_content() {
        let app = app(router::state(router::lazy_pool()));
        let response = make_request(
            app,
            Method::POST,
            "/ebook/export/docx",
            json!({ "fullEbookContent": "", "title": "Book" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
