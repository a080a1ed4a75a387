use crate::{ChapterStatus, SessionPhase};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReaderViewModel {
    pub phase: SessionPhase,
    pub failure: Option<String>,
    pub chapter_index: usize,
    pub chapter_count: usize,
    pub chapter_title: String,
    pub page_index: usize,
    pub page_count: usize,
    pub page_text: String,
    pub chapter_status: ChapterStatus,
    /// Chapter being extracted, if any.
    pub pending_chapter: Option<usize>,
}
