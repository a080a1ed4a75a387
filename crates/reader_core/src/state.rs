use crate::pagination::{clamp_page_index, paginate, Page};
use crate::progress::ProgressSnapshot;
use crate::toc::{chapter_title, TocEntry};
use crate::view_model::ReaderViewModel;

/// Tag correlating an extraction request with its completion.
pub type RequestId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Unloaded,
    /// First chapter of a freshly opened book is being extracted.
    Loading,
    Ready,
    /// A chapter change is being extracted; the previous chapter stays displayed.
    Navigating,
    LoadFailed,
    Closed,
}

/// Outcome of extracting one chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChapterStatus {
    #[default]
    Complete,
    /// Text is the "unavailable" placeholder.
    Unavailable,
    /// Text is the "too large" placeholder.
    TooLarge,
}

/// Page to land on once a pending chapter arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    FirstPage,
    /// Clamped to the chapter's page count.
    Page(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingLoad {
    pub request_id: RequestId,
    pub chapter_index: usize,
    pub landing: Landing,
}

/// Everything a reading session owns. Mutated only through [`crate::update`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReaderState {
    phase: SessionPhase,
    failure: Option<String>,
    chapter_count: usize,
    chapter_index: usize,
    page_index: usize,
    capacity: usize,
    chapter_text: String,
    chapter_status: ChapterStatus,
    pages: Vec<Page>,
    toc: Vec<TocEntry>,
    pending: Option<PendingLoad>,
    last_request_id: RequestId,
}

impl ReaderState {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            ..Self::default()
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn chapter_count(&self) -> usize {
        self.chapter_count
    }

    pub fn chapter_index(&self) -> usize {
        self.chapter_index
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn toc(&self) -> &[TocEntry] {
        &self.toc
    }

    pub fn pending(&self) -> Option<&PendingLoad> {
        self.pending.as_ref()
    }

    pub fn chapter_status(&self) -> ChapterStatus {
        self.chapter_status
    }

    /// Text of the current page, empty while nothing is displayed.
    pub fn current_page_text(&self) -> &str {
        self.pages
            .get(self.page_index)
            .map(|page| page.text(&self.chapter_text))
            .unwrap_or("")
    }

    pub fn view(&self) -> ReaderViewModel {
        ReaderViewModel {
            phase: self.phase,
            failure: self.failure.clone(),
            chapter_index: self.chapter_index,
            chapter_count: self.chapter_count,
            chapter_title: self.current_chapter_title(),
            page_index: self.page_index,
            page_count: self.pages.len(),
            page_text: self.current_page_text().to_string(),
            chapter_status: self.chapter_status,
            pending_chapter: self.pending.map(|p| p.chapter_index),
        }
    }

    pub(crate) fn set_phase(&mut self, phase: SessionPhase) {
        self.phase = phase;
    }

    pub(crate) fn fail(&mut self, reason: String) {
        self.failure = Some(reason);
        self.pending = None;
        self.set_phase(SessionPhase::LoadFailed);
    }

    pub(crate) fn open(&mut self, chapter_count: usize, toc: Vec<TocEntry>) {
        self.chapter_count = chapter_count;
        self.toc = toc;
    }

    /// Replaces any pending load; the previous request id becomes stale.
    pub(crate) fn begin_load(&mut self, chapter_index: usize, landing: Landing) -> RequestId {
        self.last_request_id += 1;
        let request_id = self.last_request_id;
        self.pending = Some(PendingLoad {
            request_id,
            chapter_index,
            landing,
        });
        request_id
    }

    pub(crate) fn take_pending(&mut self) -> Option<PendingLoad> {
        self.pending.take()
    }

    pub(crate) fn is_pending(&self, request_id: RequestId, chapter_index: usize) -> bool {
        self.pending
            .is_some_and(|p| p.request_id == request_id && p.chapter_index == chapter_index)
    }

    pub(crate) fn install_chapter(
        &mut self,
        chapter_index: usize,
        text: String,
        status: ChapterStatus,
        landing: Landing,
    ) {
        self.pages = paginate(&text, self.capacity);
        self.chapter_text = text;
        self.chapter_status = status;
        self.chapter_index = chapter_index;
        self.page_index = match landing {
            Landing::FirstPage => 0,
            Landing::Page(page) => clamp_page_index(page, self.pages.len()),
        };
    }

    pub(crate) fn set_page_index(&mut self, page_index: usize) {
        self.page_index = page_index;
    }

    /// Re-paginates the displayed chapter, keeping the page index where possible.
    /// Returns `false` when the capacity did not change.
    pub(crate) fn set_capacity(&mut self, capacity: usize) -> bool {
        let capacity = capacity.max(1);
        if capacity == self.capacity {
            return false;
        }
        self.capacity = capacity;
        if !self.pages.is_empty() {
            self.pages = paginate(&self.chapter_text, capacity);
            self.page_index = clamp_page_index(self.page_index, self.pages.len());
        }
        true
    }

    pub(crate) fn has_chapter(&self) -> bool {
        !self.pages.is_empty()
    }

    pub(crate) fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            chapter_index: self.chapter_index,
            page_index: self.page_index,
            total_chapters: self.chapter_count,
            total_pages_in_chapter: self.pages.len(),
            last_chapter_title: self.current_chapter_title(),
            final_chapter_title: chapter_title(&self.toc, self.chapter_count.saturating_sub(1)),
        }
    }

    fn current_chapter_title(&self) -> String {
        if self.chapter_count == 0 {
            return String::new();
        }
        chapter_title(&self.toc, self.chapter_index)
    }
}
