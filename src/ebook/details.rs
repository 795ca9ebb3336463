//! Suggest a title, genre, audience and writing style for a topic.

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::llm::CompletionRequest;

const NON_FICTION: &str = "Non-Fiction";
const NON_FICTION_PREFIX: &str = "Non-fiction / ";
const UNTITLED: &str = "Untitled";
const NOT_AVAILABLE: &str = "N/A";
const DEFAULT_WRITING_STYLE: &str = "Default Writing Style";

static TITLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Title: (.*?)\];").unwrap());
static GENRE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Genre: (.*?)\];").unwrap());
static TARGET_AUDIENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Target Audience: (.*?)\];").unwrap());
static WRITING_STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)Writing Style: (.*?)(?:\];|\]?\.?$)").unwrap());

/// Suggested ebook details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Details {
    pub title: String,
    pub genre: String,
    pub target_audience: String,
    pub writing_style: String,
}

/// Build the suggestion prompt.
pub fn prompt(topic: &str, ebook_type: &str) -> CompletionRequest {
    CompletionRequest::new(
        format!(
            "You are a writing assistant that provides detailed context for eBook topics. Consider the eBook type: {ebook_type}. Along with other suggestions, include a creative eBook title. Provide a response in the format: [Title: Some Title]; [Genre: XYZ]; [Target Audience: ABC]; [Writing Style: DEF]."
        ),
        format!(
            "For an eBook of type {ebook_type}, suggest a title, genre, target audience, and writing style for the topic: {topic}."
        ),
    )
}

/// Prefix the first genre with `Non-fiction / ` unless already present.
fn mark_non_fiction(content: &str) -> String {
    if content.contains(NON_FICTION_PREFIX.trim_end()) {
        return content.to_owned();
    }

    match GENRE.captures(content).and_then(|c| c.get(1)) {
        Some(genre) => {
            let mut content = content.to_owned();
            content.insert_str(genre.start(), NON_FICTION_PREFIX);
            content
        },
        None => content.to_owned(),
    }
}

fn capture(regex: &Regex, content: &str) -> Option<String> {
    regex
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_owned())
}

/// Extract [`Details`] from the model answer.
pub fn parse(content: &str, topic: &str, ebook_type: &str) -> Details {
    let content = if ebook_type == NON_FICTION {
        mark_non_fiction(content)
    } else {
        content.to_owned()
    };

    let mut writing_style =
        capture(&WRITING_STYLE, &content).unwrap_or_else(|| NOT_AVAILABLE.to_owned());
    if !topic.is_empty() && writing_style == NOT_AVAILABLE {
        writing_style = DEFAULT_WRITING_STYLE.to_owned();
    }

    Details {
        title: capture(&TITLE, &content).unwrap_or_else(|| UNTITLED.to_owned()),
        genre: capture(&GENRE, &content).unwrap_or_else(|| NOT_AVAILABLE.to_owned()),
        target_audience: capture(&TARGET_AUDIENCE, &content)
            .unwrap_or_else(|| NOT_AVAILABLE.to_owned()),
        writing_style,
    }
}
