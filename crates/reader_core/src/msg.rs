use crate::{ChapterStatus, RequestId, ResumePoint, TocNode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Container scanned; chapter list and TOC are known.
    BookOpened {
        chapter_count: usize,
        toc: Option<Vec<TocNode>>,
        resume: Option<ResumePoint>,
    },
    /// Container could not be opened or parsed.
    BookFailed { reason: String },
    /// Engine finished extracting a chapter.
    ChapterLoaded {
        request_id: RequestId,
        chapter_index: usize,
        text: String,
        status: ChapterStatus,
    },
    NextPage,
    PreviousPage,
    /// Jump request; signed so that negative input can be rejected explicitly.
    GotoChapter(i64),
    /// Viewport or font change from the host.
    CapacityChanged(usize),
    Close,
}
