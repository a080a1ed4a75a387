use std::fmt;
use std::path::Path;

/// How a book's chapters are delineated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookFormat {
    /// Container with an ordered chapter list (EPUB-style archive).
    #[default]
    Structured,
    /// Plain text file split into virtual chapters.
    FlatText,
}

impl BookFormat {
    /// `.txt` (any case) is flat text, everything else is a structured container.
    pub fn detect(book_id: &str) -> Self {
        let is_txt = Path::new(book_id)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
        if is_txt {
            Self::FlatText
        } else {
            Self::Structured
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::FlatText => "flat_text",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "structured" => Some(Self::Structured),
            "flat_text" => Some(Self::FlatText),
            _ => None,
        }
    }
}

impl fmt::Display for BookFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display title derived from a book id: its file stem, or the id itself.
pub fn title_from_book_id(book_id: &str) -> String {
    Path::new(book_id)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.trim().is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| book_id.to_string())
}
