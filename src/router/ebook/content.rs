use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use super::Drafted;
use crate::AppState;
use crate::ebook::assemble::assemble;
use crate::ebook::outline::Outline;
use crate::error::Result;
use crate::router::Valid;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub full_ebook_content: String,
}

/// Handler to write a whole ebook from its outline.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Drafted>,
) -> Result<Json<Response>> {
    let outline = Outline::parse(&body.outline);

    let full_ebook_content =
        assemble(state.llm.as_ref(), &body.profile, body.word_count, &outline).await?;

    tracing::info!(
        title = %outline.title,
        chapters = outline.chapters.len(),
        length = full_ebook_content.len(),
        "ebook generated"
    );

    Ok(Json(Response { full_ebook_content }))
}
