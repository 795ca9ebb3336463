//! Word-processing (`.docx`) rendition.

use std::io::Cursor;

use docx_rs::{
    AbstractNumbering, Docx, IndentLevel, Level, LevelJc, LevelText, NumberFormat, Numbering,
    NumberingId, Paragraph, ParagraphBorder, ParagraphBorderPosition, Run, SpecialIndentType, Start,
};

use super::markdown::{self, Block, Span};

/// Body text size, in points.
const BODY_SIZE: usize = 12;
/// Size of a level 1 heading, in points. Each level below is 2pt smaller.
const HEADING_SIZE: usize = 24;
/// Half an inch, in twentieths of a point.
const INDENT: i32 = 720;
const BULLET_INDENT: i32 = 360;
const QUOTE_COLOR: &str = "666666";
const QUOTE_BORDER_COLOR: &str = "999999";
/// Eighths of a point.
const QUOTE_BORDER_SIZE: usize = 6;
/// Numbering 1 is the library's default decimal list.
const BULLET_LIST: usize = 2;
/// Deepest list level a document can hold.
const MAX_BULLET_LEVEL: usize = 8;

#[derive(thiserror::Error, Debug)]
#[error("failed to pack document: {0}")]
pub struct PackError(String);

/// Run styling shared by every span of a paragraph.
#[derive(Clone, Copy, Default)]
struct Style {
    size: usize,
    bold: bool,
    italic: bool,
    color: Option<&'static str>,
}

impl Style {
    fn body() -> Self {
        Self {
            size: BODY_SIZE,
            ..Default::default()
        }
    }

    fn run(self, span: &Span) -> Run {
        // docx sizes are half-points.
        let mut run = Run::new().add_text(&span.text).size(self.size * 2);
        if self.bold || span.bold {
            run = run.bold();
        }
        if self.italic || span.italic {
            run = run.italic();
        }
        if let Some(color) = self.color {
            run = run.color(color);
        }
        run
    }
}

fn paragraph(mut paragraph: Paragraph, spans: &[Span], style: Style) -> Paragraph {
    for span in spans {
        paragraph = paragraph.add_run(style.run(span));
    }
    paragraph
}

fn render_block(block: &Block) -> Paragraph {
    match block {
        Block::Heading { level, spans } => paragraph(
            Paragraph::new(),
            spans,
            Style {
                size: HEADING_SIZE.saturating_sub((level - 1) * 2),
                bold: true,
                ..Default::default()
            },
        ),
        Block::Bullet { level, spans } => paragraph(
            Paragraph::new().numbering(
                NumberingId::new(BULLET_LIST),
                IndentLevel::new((*level).min(MAX_BULLET_LEVEL)),
            ),
            spans,
            Style::body(),
        ),
        Block::Quote(spans) => {
            let mut quote = Paragraph::new().indent(Some(INDENT), None, None, None);
            quote.property = quote.property.set_border(
                ParagraphBorder::new(ParagraphBorderPosition::Left)
                    .size(QUOTE_BORDER_SIZE)
                    .color(QUOTE_BORDER_COLOR),
            );
            paragraph(
                quote,
                spans,
                Style {
                    italic: true,
                    color: Some(QUOTE_COLOR),
                    ..Style::body()
                },
            )
        },
        Block::Paragraph(spans) => paragraph(Paragraph::new(), spans, Style::body()),
    }
}

/// Dotted list, one level per two spaces of Markdown indentation.
fn bullets() -> AbstractNumbering {
    (0..=MAX_BULLET_LEVEL).fold(AbstractNumbering::new(BULLET_LIST), |list, level| {
        let indent = BULLET_INDENT * (level as i32 + 1);
        list.add_level(
            Level::new(
                level,
                Start::new(1),
                NumberFormat::new("bullet"),
                LevelText::new("•"),
                LevelJc::new("left"),
            )
            .indent(Some(indent), Some(SpecialIndentType::Hanging(BULLET_INDENT)), None, None),
        )
    })
}

fn document(blocks: &[Block]) -> Docx {
    blocks.iter().fold(
        Docx::new()
            .add_abstract_numbering(bullets())
            .add_numbering(Numbering::new(BULLET_LIST, BULLET_LIST)),
        |docx, block| docx.add_paragraph(render_block(block)),
    )
}

/// Convert Markdown `content` into a packed `.docx` archive.
pub fn render(content: &str) -> Result<Vec<u8>, PackError> {
    let blocks = markdown::parse(content);
    tracing::debug!(blocks = blocks.len(), "rendering docx");

    let mut buffer = Cursor::new(Vec::new());
    document(&blocks)
        .build()
        .pack(&mut buffer)
        .map_err(|err| PackError(err.to_string()))?;

    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_is_a_zip_archive() {
        let bytes = render("# Title\n\nSome **bold** text.\n- item\n> quote").unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_render_empty_document() {
        let bytes = render("").unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    /// Body of `word/document.xml` for `markdown`.
    fn document_xml(markdown: &str) -> String {
        let blocks = markdown::parse(markdown);
        String::from_utf8(document(&blocks).build().document).unwrap()
    }

    fn has(xml: &str, tag: &str) -> bool {
        xml.contains(&format!("<{tag} ")) || xml.contains(&format!("<{tag}/>"))
    }

    #[test]
    fn test_heading_runs() {
        let xml = document_xml("# Title");
        assert!(xml.contains(r#"<w:sz w:val="48""#));
        assert!(has(&xml, "w:b"));

        let xml = document_xml("### Third");
        assert!(xml.contains(r#"<w:sz w:val="40""#));

        let xml = document_xml("###### Sixth");
        assert!(xml.contains(r#"<w:sz w:val="28""#));
    }

    #[test]
    fn test_body_runs() {
        let xml = document_xml("Plain and **strong** words.");
        assert!(xml.contains(r#"<w:sz w:val="24""#));
        assert!(!xml.contains(r#"<w:sz w:val="48""#));
        assert!(has(&xml, "w:b"));
        assert!(!has(&xml, "w:i"));

        let xml = document_xml("Only plain words.");
        assert!(!has(&xml, "w:b"));
    }

    #[test]
    fn test_quote_paragraph() {
        let xml = document_xml("> Patience grows.");
        assert!(xml.contains(r#"<w:ind w:left="720""#));
        assert!(has(&xml, "w:i"));
        assert!(xml.contains(r#"<w:color w:val="666666""#));
        assert!(xml.contains("<w:pBdr>"));
        assert!(xml.contains(r#"<w:left w:val="single" w:space="0" w:sz="6" w:color="999999""#));
    }

    #[test]
    fn test_bullets_are_a_list() {
        let xml = document_xml("- top\n    - nested");
        assert!(xml.contains(r#"<w:numId w:val="2""#));
        assert!(xml.contains(r#"<w:ilvl w:val="0""#));
        assert!(xml.contains(r#"<w:ilvl w:val="2""#));
        assert!(!xml.contains("•"));

        let blocks = markdown::parse("- item");
        let numbering = String::from_utf8(document(&blocks).build().numberings).unwrap();
        assert!(numbering.contains(r#"w:val="bullet""#));
        assert!(numbering.contains("•"));
    }
}
