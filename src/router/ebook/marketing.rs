use axum::Json;
use axum::extract::State;

use super::Drafted;
use crate::AppState;
use crate::ebook::marketing::{self, Marketing};
use crate::error::Result;
use crate::router::Valid;

/// Handler to write Amazon and social media copy for a book.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Drafted>,
) -> Result<Json<Marketing>> {
    let answer = state
        .llm
        .complete(marketing::prompt(&body.profile, body.word_count, &body.outline))
        .await?;

    Ok(Json(marketing::parse(&answer)?))
}
