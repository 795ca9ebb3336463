//! Ebook generation: detail suggestion, outline, content assembly and
//! marketing copy.

pub mod assemble;
pub mod details;
pub mod marketing;
pub mod outline;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// What the reader asked for, shared by every ebook prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    #[validate(length(max = 64, message = "Language is too long."))]
    pub language: String,
    #[validate(length(max = 1000, message = "Topic is too long."))]
    pub topic: String,
    #[validate(length(max = 64))]
    pub ebook_type: String,
    #[validate(length(max = 255, message = "Title is too long."))]
    pub title: String,
    #[validate(length(max = 255))]
    pub genre: String,
    #[validate(length(max = 255))]
    pub target_audience: String,
    #[validate(length(max = 255))]
    pub writing_style: String,
}
