//! Line-oriented reader for the Markdown subset produced by generation.
//!
//! Every line stands alone: there is no paragraph merging and no nested
//! block structure.

use std::sync::LazyLock;

use regex_lite::Regex;

static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.*)").unwrap());
static BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\s*)[-*+] (.*)").unwrap());
static QUOTE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^>\s+(.*)").unwrap());
static EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*|__(.*?)__|\*(.*?)\*|_(.*?)_").unwrap());

/// Run of text sharing one style.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Span {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

impl Span {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// `level` goes from 1 to 6.
    Heading { level: usize, spans: Vec<Span> },
    /// `level` is the leading indentation divided by two.
    Bullet { level: usize, spans: Vec<Span> },
    Quote(Vec<Span>),
    Paragraph(Vec<Span>),
}

/// Split inline `**bold**`, `__bold__`, `*italic*` and `_italic_` markers.
pub fn spans(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut last = 0;

    for captures in EMPHASIS.captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };

        if whole.start() > last {
            spans.push(Span::plain(&text[last..whole.start()]));
        }

        let (inner, bold) = match (captures.get(1).or(captures.get(2)), captures.get(3).or(captures.get(4))) {
            (Some(inner), _) => (inner.as_str(), true),
            (None, Some(inner)) => (inner.as_str(), false),
            (None, None) => ("", false),
        };
        spans.push(Span {
            text: inner.to_owned(),
            bold,
            italic: !bold,
        });

        last = whole.end();
    }

    if last < text.len() {
        spans.push(Span::plain(&text[last..]));
    }

    spans
}

/// Classify one line. Blank lines yield nothing.
pub fn block(line: &str) -> Option<Block> {
    if line.trim().is_empty() {
        return None;
    }

    let block = if let Some(captures) = HEADING.captures(line) {
        Block::Heading {
            level: captures[1].len(),
            spans: spans(&captures[2]),
        }
    } else if let Some(captures) = BULLET.captures(line) {
        Block::Bullet {
            level: captures[1].len() / 2,
            spans: spans(&captures[2]),
        }
    } else if let Some(captures) = QUOTE.captures(line) {
        Block::Quote(spans(&captures[1]))
    } else {
        Block::Paragraph(spans(line))
    };

    Some(block)
}

/// Read a whole document.
pub fn parse(content: &str) -> Vec<Block> {
    content.lines().filter_map(block).collect()
}
