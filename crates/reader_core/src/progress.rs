//! Reading-position records and the library projection derived from them.

use crate::BookFormat;

/// Per-book reading position; the source of truth for resuming.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadingProgress {
    pub chapter_index: usize,
    pub page_index: usize,
    pub total_chapters: usize,
    pub total_pages_in_chapter: usize,
    pub last_chapter_title: String,
    pub final_chapter_title: String,
    /// Milliseconds; only meaningful for ordering.
    pub last_read_timestamp: i64,
}

/// A committed position as emitted by the session, before it is time-stamped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub chapter_index: usize,
    pub page_index: usize,
    pub total_chapters: usize,
    pub total_pages_in_chapter: usize,
    pub last_chapter_title: String,
    pub final_chapter_title: String,
}

impl ProgressSnapshot {
    pub fn stamp(self, last_read_timestamp: i64) -> ReadingProgress {
        ReadingProgress {
            chapter_index: self.chapter_index,
            page_index: self.page_index,
            total_chapters: self.total_chapters,
            total_pages_in_chapter: self.total_pages_in_chapter,
            last_chapter_title: self.last_chapter_title,
            final_chapter_title: self.final_chapter_title,
            last_read_timestamp,
        }
    }
}

/// Where to resume a book, taken from its stored progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePoint {
    pub chapter_index: usize,
    pub page_index: usize,
}

impl From<&ReadingProgress> for ResumePoint {
    fn from(progress: &ReadingProgress) -> Self {
        Self {
            chapter_index: progress.chapter_index,
            page_index: progress.page_index,
        }
    }
}

/// Library list row. A lazily refreshed projection of [`ReadingProgress`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LibrarySummary {
    pub book_id: String,
    pub title: String,
    pub author: Option<String>,
    pub format: BookFormat,
    pub chapter_index: usize,
    pub total_chapters: usize,
    pub last_read_timestamp: i64,
    pub last_chapter_title: String,
    pub final_chapter_title: String,
}

impl LibrarySummary {
    /// Pull the reading position from `progress`. The timestamp never moves backward.
    pub fn refresh_from(&mut self, progress: &ReadingProgress) {
        self.chapter_index = progress.chapter_index;
        self.total_chapters = progress.total_chapters;
        self.last_chapter_title = progress.last_chapter_title.clone();
        self.final_chapter_title = progress.final_chapter_title.clone();
        self.last_read_timestamp = self.last_read_timestamp.max(progress.last_read_timestamp);
    }

    /// Coarse progress in `[0, 1]` by chapter; `0.0` when the book has no chapters yet.
    pub fn fraction(&self) -> f64 {
        if self.total_chapters == 0 {
            return 0.0;
        }
        let done = (self.chapter_index + 1).min(self.total_chapters);
        done as f64 / self.total_chapters as f64
    }
}

/// Most recently read first. Stable, so ties keep insertion order.
pub fn order_by_recency(summaries: &mut [LibrarySummary]) {
    summaries.sort_by(|a, b| b.last_read_timestamp.cmp(&a.last_read_timestamp));
}
