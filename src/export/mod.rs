//! Downloadable renditions of a generated ebook.

pub mod docx;
pub mod markdown;

pub const TXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const DEFAULT_FILE_NAME: &str = "ebook";
const UNSAFE_CHARACTERS: &[char] = &['"', '\\', '/', ':', '*', '?', '<', '>', '|', ';'];

/// Turn a title into a download file name.
///
/// Whitespace runs become `_` and characters that would break a
/// `Content-Disposition` header are dropped.
pub fn file_name(title: &str, extension: &str) -> String {
    let name = title
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| !c.is_control() && !UNSAFE_CHARACTERS.contains(c))
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    if name.is_empty() {
        format!("{DEFAULT_FILE_NAME}.{extension}")
    } else {
        format!("{name}.{extension}")
    }
}

/// Value of the `Content-Disposition` header of a download.
pub fn content_disposition(file_name: &str) -> String {
    format!("attachment; filename=\"{file_name}\"")
}
