//! Amazon publishing and social media copy for a finished ebook.

use serde::{Deserialize, Serialize};

use crate::ebook::Profile;
use crate::error::ServerError;
use crate::llm::CompletionRequest;

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1500;

/// Generated marketing copy, one Markdown block per field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marketing {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amazon_blurb: Option<String>,
    pub amazon_categories: String,
    pub long_tail_keywords: String,
    pub price_suggestions: String,
    pub twitter_post: String,
    pub blog_post_titles: String,
    pub book_series: String,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Heading {
    AmazonBlurb,
    AmazonCategories,
    LongTailKeywords,
    PriceSuggestions,
    TwitterPost,
    BlogPostTitles,
    BookSeries,
}

impl Heading {
    const ALL: [Heading; 7] = [
        Heading::AmazonBlurb,
        Heading::AmazonCategories,
        Heading::LongTailKeywords,
        Heading::PriceSuggestions,
        Heading::TwitterPost,
        Heading::BlogPostTitles,
        Heading::BookSeries,
    ];

    fn title(self) -> &'static str {
        match self {
            Heading::AmazonBlurb => "Amazon Blurb",
            Heading::AmazonCategories => "Amazon Categories",
            Heading::LongTailKeywords => "Long-Tail Keywords",
            Heading::PriceSuggestions => "Price Suggestions",
            Heading::TwitterPost => "Twitter/X Post",
            Heading::BlogPostTitles => "Blog Post Titles",
            Heading::BookSeries => "Book Series",
        }
    }

    /// JSON name reported when the section is missing.
    fn field(self) -> &'static str {
        match self {
            Heading::AmazonBlurb => "amazonBlurb",
            Heading::AmazonCategories => "amazonCategories",
            Heading::LongTailKeywords => "longTailKeywords",
            Heading::PriceSuggestions => "priceSuggestions",
            Heading::TwitterPost => "twitterPost",
            Heading::BlogPostTitles => "blogPostTitles",
            Heading::BookSeries => "bookSeries",
        }
    }

    /// Recognize `## Title`, `### 2. Title:`, `**Title**` or
    /// `1. **Title:** text` lines. Text after a bold title is returned
    /// as the first line of the section.
    fn from_line(line: &str) -> Option<(Heading, &str)> {
        let line = strip_numbering(line.trim());
        let (title, inline) = match line.strip_prefix('#') {
            Some(rest) => {
                let rest = strip_numbering(rest.trim_start_matches('#').trim());
                split_bold(rest).unwrap_or((rest, ""))
            },
            None => split_bold(line)?,
        };

        let title = strip_numbering(title.trim()).trim_end_matches(':').trim();

        Heading::ALL
            .into_iter()
            .find(|h| h.title().eq_ignore_ascii_case(title))
            .map(|heading| (heading, inline))
    }
}

/// Drop a `3.` list marker.
fn strip_numbering(text: &str) -> &str {
    let rest = text.trim_start_matches(|c: char| c.is_ascii_digit());
    match rest.strip_prefix('.') {
        Some(rest) if rest.len() + 1 < text.len() => rest.trim_start(),
        _ => text,
    }
}

/// Split `**bold**: rest` into its bold part and the rest.
fn split_bold(line: &str) -> Option<(&str, &str)> {
    let inner = line.strip_prefix("**")?;
    let end = inner.find("**")?;
    let rest = inner[end + 2..].trim_start().trim_start_matches(':').trim();
    Some((&inner[..end], rest))
}

/// Build the marketing prompt.
pub fn prompt(profile: &Profile, word_count: u32, outline: &str) -> CompletionRequest {
    let details = |writing_style: &str| {
        format!(
            "**Ebook Details:**\n- **Language:** {}\n- **Ebook Type:** {}\n- **Title:** {}\n- **Genre:** {}\n- **Target Audience:** {}\n- **Writing Style:** {writing_style}\n- **Word Count:** {word_count}\n- **Outline:** {outline}\n",
            profile.language, profile.ebook_type, profile.title, profile.genre, profile.target_audience,
        )
    };

    let headings = Heading::ALL
        .iter()
        .map(|h| format!("## {}", h.title()))
        .collect::<Vec<_>>()
        .join(", ");

    let system = format!(
        "You are an expert copywriter specialized in Amazon publishing. Based on the following ebook details, generate the required Amazon Publishing data with proper Markdown formatting.\n\n{}\n\
        **Tasks:**\n\
        1. **Amazon Blurb:** Provide a long and engaging blurb using Markdown syntax, incorporating emojis and bullet points if necessary to attract Amazon buyers.\n\
        2. **Amazon Categories:** Suggest the three most relevant and real Amazon categories for the ebook, displaying the full path of each category.\n\
        3. **Long-Tail Keywords:** Generate a bullet-point list of the seven most relevant long-tail keywords based on the ebook's title and topic. Do not include the book genre.\n\
        4. **Price Suggestions:** Offer a range for both ebook and paperback formats, specifying the lowest and highest prices.\n\
        5. **Twitter/X Post:** Create a catchy Twitter/X post to promote the ebook on social media, including relevant hashtags and emojis. Ensure the post does not exceed 230 characters.\n\
        6. **Blog Post Titles:** List five engaging blog post titles related to the ebook.\n\
        7. **Book Series:** Develop a complete book series with a unique series title and ten short book titles without numerical suffixes.\n\n\
        **Output Format:**\n\
        Use Markdown syntax for all generated data to ensure proper rendering in text fields. Start each task with its own heading, exactly: {headings}.",
        details("Provide a clear and engaging writing style that reflects the tone of the book."),
    );

    CompletionRequest::new(system, details(&profile.writing_style))
        .temperature(TEMPERATURE)
        .max_tokens(MAX_TOKENS)
}

/// Split the answer at known headings and collect each section's text.
pub fn parse(answer: &str) -> Result<Marketing, ServerError> {
    if answer.trim().is_empty() {
        return Err(crate::llm::LlmError::Empty.into());
    }

    let mut sections: Vec<(Heading, String)> = Vec::new();
    let mut current: Option<usize> = None;

    for line in answer.lines() {
        if let Some((heading, inline)) = Heading::from_line(line) {
            let body = if inline.is_empty() {
                String::new()
            } else {
                format!("{inline}\n")
            };
            sections.push((heading, body));
            current = Some(sections.len() - 1);
        } else if let Some(index) = current {
            let body = &mut sections[index].1;
            body.push_str(line);
            body.push('\n');
        }
    }

    let section = |heading: Heading| {
        sections
            .iter()
            .find(|(h, body)| *h == heading && !body.trim().is_empty())
            .map(|(_, body)| body.trim().to_owned())
    };
    let required = |heading: Heading| section(heading).ok_or(ServerError::MissingField(heading.field()));

    Ok(Marketing {
        amazon_blurb: section(Heading::AmazonBlurb),
        amazon_categories: required(Heading::AmazonCategories)?,
        long_tail_keywords: required(Heading::LongTailKeywords)?,
        price_suggestions: required(Heading::PriceSuggestions)?,
        twitter_post: required(Heading::TwitterPost)?,
        blog_post_titles: required(Heading::BlogPostTitles)?,
        book_series: required(Heading::BookSeries)?,
    })
}
