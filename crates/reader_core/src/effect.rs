use std::fmt;

use crate::{OutOfRange, ProgressSnapshot, RequestId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Extract and decode chapter `chapter_index`, answering with `Msg::ChapterLoaded`.
    ExtractChapter {
        request_id: RequestId,
        chapter_index: usize,
    },
    /// Persist the committed position (write-through).
    CommitProgress(ProgressSnapshot),
    /// The session closed with a load in flight.
    CancelExtraction,
    Notice(Notice),
}

/// Non-fatal status the host should surface to the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Refused(TurnError),
    OutOfRange(OutOfRange),
    ChapterUnavailable { chapter_index: usize },
    ChapterTooLarge { chapter_index: usize },
}

/// Why a page turn did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnError {
    AtStart,
    AtEnd,
    ChapterLoading,
    Inactive,
}

impl fmt::Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::AtStart => "already at the first page",
            Self::AtEnd => "already at the last page",
            Self::ChapterLoading => "chapter is still loading",
            Self::Inactive => "no book is open",
        };
        f.write_str(text)
    }
}

/// Why a chapter jump did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpError {
    OutOfRange(OutOfRange),
    Refused(TurnError),
}

impl fmt::Display for JumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange(err) => err.fmt(f),
            Self::Refused(reason) => reason.fmt(f),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Refused(reason) => reason.fmt(f),
            Self::OutOfRange(err) => err.fmt(f),
            Self::ChapterUnavailable { chapter_index } => {
                write!(f, "chapter {} could not be loaded", chapter_index + 1)
            }
            Self::ChapterTooLarge { chapter_index } => {
                write!(f, "chapter {} is too large to load", chapter_index + 1)
            }
        }
    }
}
