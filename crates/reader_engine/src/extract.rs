//! Chapter resource → plain text.

use reader_core::ChapterStatus;
use reader_logging::{reader_debug, reader_warn};
use thiserror::Error;

use crate::decode::{decode_bytes, DecodeError};
use crate::encoding::{detect, TextEncoding};
use crate::source::SourceError;

pub const UNAVAILABLE_PLACEHOLDER: &str = "This chapter could not be loaded.";
pub const TOO_LARGE_PLACEHOLDER: &str = "This chapter is too large to load.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("chapter content unavailable: {0}")]
    ContentUnavailable(String),
    #[error("chapter too large to load ({size} bytes)")]
    ChapterTooLarge { size: usize },
}

impl From<SourceError> for ExtractError {
    fn from(err: SourceError) -> Self {
        Self::ContentUnavailable(err.to_string())
    }
}

impl From<DecodeError> for ExtractError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Allocation { requested, .. } => {
                Self::ChapterTooLarge { size: requested }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractSettings {
    /// Prefix length used for encoding detection.
    pub sample_window: usize,
    pub max_resource_bytes: usize,
}

/// Decoded chapter text, possibly a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterText {
    pub text: String,
    pub status: ChapterStatus,
}

impl ChapterText {
    pub fn complete(text: String) -> Self {
        Self {
            text,
            status: ChapterStatus::Complete,
        }
    }

    pub fn placeholder(err: &ExtractError) -> Self {
        match err {
            ExtractError::ContentUnavailable(_) => Self {
                text: UNAVAILABLE_PLACEHOLDER.to_string(),
                status: ChapterStatus::Unavailable,
            },
            ExtractError::ChapterTooLarge { .. } => Self {
                text: TOO_LARGE_PLACEHOLDER.to_string(),
                status: ChapterStatus::TooLarge,
            },
        }
    }
}

/// Decode and strip a chapter resource. Failures become placeholders.
pub fn extract_chapter_text(
    raw: Result<Vec<u8>, SourceError>,
    declared_encoding: Option<&str>,
    settings: ExtractSettings,
) -> ChapterText {
    let result = raw
        .map_err(ExtractError::from)
        .and_then(|bytes| plain_text(&bytes, declared_encoding, settings));
    match result {
        Ok(text) => ChapterText::complete(text),
        Err(err) => {
            reader_warn!("Chapter replaced by placeholder: {err}");
            ChapterText::placeholder(&err)
        }
    }
}

/// Decoded, markup-free text of one resource.
pub fn plain_text(
    raw: &[u8],
    declared_encoding: Option<&str>,
    settings: ExtractSettings,
) -> Result<String, ExtractError> {
    if raw.len() > settings.max_resource_bytes {
        return Err(ExtractError::ChapterTooLarge { size: raw.len() });
    }
    let encoding = resolve_encoding(raw, declared_encoding, settings.sample_window);
    let decoded = decode_bytes(raw, encoding)?;
    let text = strip_markup(&decoded);
    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractError::ContentUnavailable(
            "resource has no text".to_string(),
        ));
    }
    Ok(text.to_string())
}

fn resolve_encoding(raw: &[u8], declared: Option<&str>, sample_window: usize) -> TextEncoding {
    if let Some(encoding) = declared.and_then(TextEncoding::from_label) {
        return encoding;
    }
    let sample = &raw[..raw.len().min(sample_window)];
    let encoding = detect(sample);
    reader_debug!(
        "Detected {encoding} (declared: {})",
        declared.unwrap_or("none")
    );
    encoding
}

/// Removes every `<...>` span. Not an HTML parser: entities stay as they are
/// and an unterminated `<` is kept verbatim with the rest of the text.
pub fn strip_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(open) = rest.find('<') {
        let Some(close) = rest[open..].find('>') else {
            break;
        };
        out.push_str(&rest[..open]);
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out
}
