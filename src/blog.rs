//! SEO blog post generation.
//!
//! An outline is generated first, then the post, then every piece of
//! metadata is derived from the post in its own completion.

use serde::{Deserialize, Serialize};

use crate::llm::{ChatModel, CompletionRequest, LlmError};

/// Generated post with its metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub content: String,
    pub meta_title: String,
    pub meta_description: String,
    pub meta_keywords: Vec<String>,
    pub twitter_post: String,
}

fn outline_prompt(keywords: &str) -> CompletionRequest {
    CompletionRequest::new(
        "You create detailed outlines for blog posts. NEVER add Additional Resources or Call To Action after the Conclusion. Format the outline using Markdown syntax, including headings and bullet points.",
        format!(
            "Create a detailed outline for a blog post with the following keywords: {keywords}. Use Markdown formatting."
        ),
    )
}

fn post_prompt(outline: &str, length: u32) -> CompletionRequest {
    CompletionRequest::new(
        "You generate blog posts based on given outlines. Format the blog post using Markdown syntax, including appropriate headings, subheadings, bold text, bullet points, and other relevant Markdown formatting.",
        format!(
            "Based on the following outline, write a {length}-word blog post using Markdown formatting: {outline}"
        ),
    )
}

/// Metadata derived from a finished post.
#[derive(Clone, Copy)]
enum Meta {
    Title,
    Description,
    Keywords,
    TwitterPost,
}

impl Meta {
    fn instruction(self) -> &'static str {
        match self {
            Meta::Title => {
                "Generate a concise meta title for the given blog post content, with a maximum of 65 characters."
            },
            Meta::Description => {
                "Generate a short meta description for the given blog post content, with a maximum of 155 characters."
            },
            Meta::Keywords => {
                "Generate a list of 5 highly relevant keywords for the given blog post content. List them as bullet points without any numeric prefixes."
            },
            Meta::TwitterPost => {
                "Generate a catchy Twitter post for the given blog post content, with a maximum of 250 characters, including emojis and exactly 3 hashtags."
            },
        }
    }

    fn prompt(self, post: &str) -> CompletionRequest {
        CompletionRequest::new(self.instruction(), post)
    }
}

/// Split a keyword answer written as bullets, numbered lines or a
/// comma-separated list.
pub fn parse_keywords(answer: &str) -> Vec<String> {
    answer
        .split(['\n', ','])
        .map(|keyword| {
            let keyword = keyword.trim().trim_start_matches(['-', '*', '+', '•']).trim_start();
            strip_numbering(keyword).trim().to_owned()
        })
        .filter(|keyword| !keyword.is_empty())
        .collect()
}

/// Drop a `1.` or `2)` list marker. `3.5 inch` is kept whole.
fn strip_numbering(keyword: &str) -> &str {
    let digits = keyword.len() - keyword.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return keyword;
    }

    match keyword[digits..].strip_prefix(['.', ')']) {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest,
        _ => keyword,
    }
}

/// Run the whole generation chain, one completion at a time.
pub async fn generate(
    model: &dyn ChatModel,
    keywords: &str,
    length: u32,
) -> Result<BlogPost, LlmError> {
    let outline = model.complete(outline_prompt(keywords)).await?;
    tracing::debug!(%outline, "blog outline generated");

    let content = model.complete(post_prompt(&outline, length)).await?;
    let content = content.trim();

    let meta_title = model.complete(Meta::Title.prompt(content)).await?;
    let meta_description = model.complete(Meta::Description.prompt(content)).await?;
    let meta_keywords = model.complete(Meta::Keywords.prompt(content)).await?;
    let twitter_post = model.complete(Meta::TwitterPost.prompt(content)).await?;

    Ok(BlogPost {
        content: content.to_owned(),
        meta_title: meta_title.trim().to_owned(),
        meta_description: meta_description.trim().to_owned(),
        meta_keywords: parse_keywords(&meta_keywords),
        twitter_post: twitter_post.trim().to_owned(),
    })
}
