//! Outline prompt and parser.

use crate::config::Generation;
use crate::ebook::Profile;
use crate::llm::CompletionRequest;

/// Structured view of a Markdown outline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outline {
    pub title: String,
    pub introduction: String,
    pub chapters: Vec<Chapter>,
    pub thank_you: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chapter {
    pub title: String,
    pub subchapters: Vec<String>,
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Body,
    Introduction,
    ThankYou,
}

impl Outline {
    /// Parse a Markdown outline.
    ///
    /// The first non-empty line is the book title. `Introduction` and
    /// `Thank You` headings open free-text sections, `## ` opens a chapter and
    /// `### ` adds a subchapter to the last opened chapter.
    pub fn parse(text: &str) -> Self {
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        let mut outline = Outline::default();
        let mut section = Section::Body;
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];
            i += 1;

            if line.is_empty() {
                continue;
            }

            if outline.title.is_empty() {
                outline.title = strip_hashes(line).to_owned();
                continue;
            }

            let normalized = line.to_lowercase();
            match strip_hashes(&normalized) {
                "introduction" => {
                    section = Section::Introduction;
                    continue;
                },
                "thank you" => {
                    section = Section::ThankYou;
                    continue;
                },
                _ => {},
            }

            match section {
                Section::Introduction if line.starts_with("##") => {
                    // heading ends the introduction, read it again as a chapter.
                    section = Section::Body;
                    i -= 1;
                    continue;
                },
                Section::Introduction => {
                    outline.introduction.push_str(line);
                    outline.introduction.push('\n');
                    continue;
                },
                Section::ThankYou => {
                    outline.thank_you.push_str(line);
                    outline.thank_you.push('\n');
                    continue;
                },
                Section::Body => {},
            }

            if let Some(title) = line.strip_prefix("## ") {
                outline.chapters.push(Chapter {
                    title: title.trim().to_owned(),
                    subchapters: Vec::new(),
                });
            } else if let Some(title) = line.strip_prefix("### ") {
                if let Some(chapter) = outline.chapters.last_mut() {
                    chapter.subchapters.push(title.trim().to_owned());
                }
            }
        }

        outline
    }

    /// Number of subchapters across every chapter.
    pub fn subchapter_count(&self) -> usize {
        self.chapters.iter().map(|c| c.subchapters.len()).sum()
    }
}

/// Remove leading `#` markers and the whitespace after them.
pub(crate) fn strip_hashes(line: &str) -> &str {
    line.trim_start_matches('#').trim()
}

/// Strip heading markers from every line of a free-text section.
pub fn clean_content(content: &str) -> String {
    content
        .split('\n')
        .map(strip_hashes)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the outline prompt.
pub fn prompt(profile: &Profile, shape: &Generation) -> CompletionRequest {
    let system = format!(
        "You are an AI specialized in creating detailed outlines for eBooks. You generate these outlines in {}, the topic is {}, the title is {}, focusing on the genre of {}. The target audience is {}, with a writing style that is {}. Topical coherence and creativity are essential.",
        profile.language,
        profile.topic,
        profile.title,
        profile.genre,
        profile.target_audience,
        profile.writing_style,
    );

    let mut user = format!(
        "Please create a structured eBook outline comprising only a generated book title, an introduction of around 50-70 words, all {} chapters with {} subchapters, and a single concluding chapter titled 'Thank You'. Use Markdown formatting with appropriate '#' symbols for headers. Omit any additional comments or content that isn't part of the structured outline or the final chapter. Example format:\n\n#[Book Title]\n\n## Introduction\n\n[Brief introduction]\n\n",
        shape.chapters, shape.subchapters,
    );

    for chapter in 1..=shape.chapters {
        user.push_str(&format!("## Chapter {chapter}: [Chapter Title]\n\n"));
        for sub in 1..=shape.subchapters {
            user.push_str(&format!("### {chapter}.{sub} [Unique Subchapter Title]\n\n"));
        }
    }

    user.push_str("## Thank You\n\n[Thank the reader");
    if !shape.author_links.is_empty() {
        user.push_str(&format!(
            ", mention and encourage them to visit: {}. Include the full links as specified",
            shape.author_links.join(", ")
        ));
    }
    user.push_str(".]");

    CompletionRequest::new(system, user)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTLINE: &str = "# The Quiet Garden

## Introduction

Gardens teach patience.
They also teach ## humility.

## Chapter 1: Soil

### 1.1 Reading the ground

### 1.2 Compost basics

## Chapter 2: Seeds

### 2.1 Choosing varieties

## Thank You

Thanks for reading!
### Visit us online
";

    #[test]
    fn test_parse_outline() {
        let outline = Outline::parse(OUTLINE);

        assert_eq!(outline.title, "The Quiet Garden");
        assert_eq!(
            outline.introduction,
            "Gardens teach patience.\nThey also teach ## humility.\n"
        );
        assert_eq!(outline.chapters.len(), 2);
        assert_eq!(outline.chapters[0].title, "Chapter 1: Soil");
        assert_eq!(
            outline.chapters[0].subchapters,
            vec!["1.1 Reading the ground", "1.2 Compost basics"]
        );
        assert_eq!(outline.chapters[1].subchapters, vec!["2.1 Choosing varieties"]);
        assert_eq!(outline.thank_you, "Thanks for reading!\n### Visit us online\n");
        assert_eq!(outline.subchapter_count(), 3);
    }

    #[test]
    fn test_introduction_ends_on_chapter_heading() {
        let outline = Outline::parse("Title\nIntroduction\nSome words\n## Chapter 1\n### 1.1 A");

        assert_eq!(outline.title, "Title");
        assert_eq!(outline.introduction, "Some words\n");
        assert_eq!(outline.chapters[0].title, "Chapter 1");
        assert_eq!(outline.chapters[0].subchapters, vec!["1.1 A"]);
    }

    #[test]
    fn test_orphan_subchapter_is_ignored() {
        let outline = Outline::parse("#Book\n### 0.1 Lost\n## Chapter 1\n");
        assert_eq!(outline.title, "Book");
        assert_eq!(outline.chapters.len(), 1);
        assert!(outline.chapters[0].subchapters.is_empty());
    }

    #[test]
    fn test_empty_outline() {
        let outline = Outline::parse("\n\n   \n");
        assert_eq!(outline, Outline::default());
        assert_eq!(outline.subchapter_count(), 0);
    }

    #[test]
    fn test_clean_content() {
        assert_eq!(
            clean_content("## Hello\n  world  \n### again"),
            "Hello\nworld\nagain"
        );
    }

    #[test]
    fn test_prompt_lists_every_subchapter() {
        let shape = Generation {
            chapters: 2,
            subchapters: 2,
            author_links: vec!["https://example.com/author".into()],
        };
        let request = prompt(&Profile::default(), &shape);
        let user = request.user_prompt();

        assert!(user.contains("all 2 chapters with 2 subchapters"));
        assert!(user.contains("## Chapter 2: [Chapter Title]"));
        assert!(user.contains("### 2.2 [Unique Subchapter Title]"));
        assert!(!user.contains("### 3.1"));
        assert!(user.contains("https://example.com/author"));
    }
}
