//! Full-content generation: one completion per subchapter, concatenated
//! into a single Markdown document.

use crate::ebook::Profile;
use crate::ebook::outline::{Outline, clean_content};
use crate::llm::{ChatModel, CompletionRequest, LlmError};

/// Tokens requested per expected word.
const TOKENS_PER_WORD: f64 = 1.5;

#[derive(thiserror::Error, Debug)]
pub enum AssemblyError {
    #[error("outline has no subchapter to write")]
    NoSubchapters,
    #[error("failed to write subchapter '{subchapter}': {source}")]
    Subchapter {
        subchapter: String,
        #[source]
        source: LlmError,
    },
}

impl From<AssemblyError> for crate::error::ServerError {
    fn from(err: AssemblyError) -> Self {
        match err {
            AssemblyError::NoSubchapters => Self::BadRequest(err.to_string()),
            AssemblyError::Subchapter { source, .. } => Self::Llm(source),
        }
    }
}

/// Words allotted to each subchapter.
pub fn words_per_subchapter(word_count: u32, outline: &Outline) -> Option<u32> {
    match outline.subchapter_count() {
        0 => None,
        total => Some(word_count / total as u32),
    }
}

/// Build the prompt of a single subchapter.
pub fn subchapter_prompt(profile: &Profile, subchapter: &str, words: u32) -> CompletionRequest {
    let max_tokens = (words as f64 * TOKENS_PER_WORD).ceil() as u32;

    CompletionRequest::new(
        format!(
            "You are a skilled writer who creates detailed eBook content in {} for a {} eBook of type {}. The writing style is {}, and the target audience is {}. Use Markdown formatting with appropriate '#' symbols for headers. Include bullet lists when appropriate, using correct Markdown syntax.",
            profile.language,
            profile.genre,
            profile.ebook_type,
            profile.writing_style,
            profile.target_audience,
        ),
        format!(
            "Please write the content for the subchapter titled '{subchapter}' in the context of the topic '{}'. The content should be approximately {words} words. **Do not include the subchapter title in your response.** When relevant, include bullet lists using Markdown syntax. Ensure the content is coherent, informative, and follows the subchapter title closely.",
            profile.topic,
        ),
    )
    .max_tokens(max_tokens.max(1))
}

/// Drop the first line of `content` when it repeats the subchapter title.
pub fn remove_subchapter_title(content: &str, subchapter: &str) -> String {
    let mut lines = content.split('\n');
    let echoes_title = lines
        .next()
        .is_some_and(|first| first.to_lowercase().contains(&subchapter.to_lowercase()));

    if echoes_title {
        lines.collect::<Vec<_>>().join("\n").trim().to_owned()
    } else {
        content.trim().to_owned()
    }
}

/// Write every subchapter of `outline`, in order, and return the document.
///
/// Any failed completion aborts the whole document.
pub async fn assemble(
    model: &dyn ChatModel,
    profile: &Profile,
    word_count: u32,
    outline: &Outline,
) -> Result<String, AssemblyError> {
    let words = words_per_subchapter(word_count, outline).ok_or(AssemblyError::NoSubchapters)?;

    tracing::info!(
        subchapters = outline.subchapter_count(),
        words_per_subchapter = words,
        "assembling ebook"
    );

    let mut document = format!("# {}\n\n", outline.title);

    if !outline.introduction.is_empty() {
        document.push_str(&format!(
            "## Introduction\n\n{}\n\n",
            clean_content(&outline.introduction)
        ));
    }

    for chapter in &outline.chapters {
        document.push_str(&format!("## {}\n\n", chapter.title));

        for subchapter in &chapter.subchapters {
            tracing::debug!(%subchapter, words, "writing subchapter");

            let content = model
                .complete(subchapter_prompt(profile, subchapter, words))
                .await
                .map_err(|source| AssemblyError::Subchapter {
                    subchapter: subchapter.clone(),
                    source,
                })?;

            document.push_str(&format!(
                "### {subchapter}\n\n{}\n\n",
                remove_subchapter_title(&content, subchapter)
            ));
        }
    }

    if !outline.thank_you.is_empty() {
        document.push_str(&format!(
            "## Thank You\n\n{}\n\n",
            clean_content(&outline.thank_you)
        ));
    }

    Ok(document)
}
