//! Ebook generation HTTP API.

mod content;
mod details;
mod export;
mod marketing;
mod outline;

use axum::Router;
use axum::routing::post;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::ebook::Profile;

/// Upper bound of a requested ebook length.
const MAX_WORD_COUNT: u32 = 200_000;

/// Profile of a book whose outline already exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Drafted {
    #[serde(flatten)]
    #[validate(nested)]
    pub profile: Profile,
    #[validate(range(min = 1, max = MAX_WORD_COUNT, message = "Word count must be positive."))]
    pub word_count: u32,
    #[validate(length(min = 1, message = "Outline is required."))]
    pub outline: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        // `POST /ebook/details` goes to `details`.
        .route("/details", post(details::handler))
        .route("/outline", post(outline::handler))
        .route("/content", post(content::handler))
        .route("/marketing", post(marketing::handler))
        .route("/export/txt", post(export::txt))
        .route("/export/docx", post(export::docx))
}
