//! Persisted reading state: one progress record per book (source of truth)
//! and the library index (lazily refreshed projection).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use reader_core::{order_by_recency, BookFormat, LibrarySummary, ReadingProgress};
use reader_logging::{reader_debug, reader_warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filename::record_filename;
use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode progress record: {0}")]
    RonEncode(#[from] ron::Error),
    #[error("failed to decode progress record: {0}")]
    RonDecode(#[from] ron::error::SpannedError),
    #[error("library index: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProgressRecord {
    book_id: String,
    chapter_index: usize,
    page_index: usize,
    total_chapters: usize,
    total_pages_in_chapter: usize,
    last_chapter_title: String,
    final_chapter_title: String,
    last_read_timestamp: i64,
}

impl ProgressRecord {
    fn new(book_id: &str, progress: &ReadingProgress) -> Self {
        Self {
            book_id: book_id.to_string(),
            chapter_index: progress.chapter_index,
            page_index: progress.page_index,
            total_chapters: progress.total_chapters,
            total_pages_in_chapter: progress.total_pages_in_chapter,
            last_chapter_title: progress.last_chapter_title.clone(),
            final_chapter_title: progress.final_chapter_title.clone(),
            last_read_timestamp: progress.last_read_timestamp,
        }
    }

    fn into_progress(self) -> ReadingProgress {
        ReadingProgress {
            chapter_index: self.chapter_index,
            page_index: self.page_index,
            total_chapters: self.total_chapters,
            total_pages_in_chapter: self.total_pages_in_chapter,
            last_chapter_title: self.last_chapter_title,
            final_chapter_title: self.final_chapter_title,
            last_read_timestamp: self.last_read_timestamp,
        }
    }
}

/// Per-book RON records under one directory.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    writer: AtomicFileWriter,
}

impl ProgressStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
        }
    }

    pub fn path_for(&self, book_id: &str) -> PathBuf {
        self.writer.dir().join(record_filename(book_id))
    }

    pub fn save(&self, book_id: &str, progress: &ReadingProgress) -> Result<(), StoreError> {
        let record = ProgressRecord::new(book_id, progress);
        let content = ron::ser::to_string_pretty(&record, ron::ser::PrettyConfig::new())?;
        self.writer.write(&record_filename(book_id), &content)?;
        Ok(())
    }

    /// `Ok(None)` when the book has never been read.
    pub fn load(&self, book_id: &str) -> Result<Option<ReadingProgress>, StoreError> {
        let path = self.path_for(book_id);
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let record: ProgressRecord = ron::from_str(&content)?;
        if record.book_id != book_id {
            reader_warn!(
                "Progress record {:?} belongs to {:?}, not {:?}",
                path,
                record.book_id,
                book_id
            );
            return Ok(None);
        }
        Ok(Some(record.into_progress()))
    }

    pub fn remove(&self, book_id: &str) -> Result<(), StoreError> {
        self.writer.remove(&record_filename(book_id))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LibraryRecord {
    book_id: String,
    title: String,
    #[serde(default)]
    author: Option<String>,
    format: String,
    #[serde(default)]
    chapter_index: usize,
    #[serde(default)]
    total_chapters: usize,
    #[serde(default)]
    last_read_timestamp: i64,
    #[serde(default)]
    last_chapter_title: String,
    #[serde(default)]
    final_chapter_title: String,
}

impl From<&LibrarySummary> for LibraryRecord {
    fn from(summary: &LibrarySummary) -> Self {
        Self {
            book_id: summary.book_id.clone(),
            title: summary.title.clone(),
            author: summary.author.clone(),
            format: summary.format.as_str().to_string(),
            chapter_index: summary.chapter_index,
            total_chapters: summary.total_chapters,
            last_read_timestamp: summary.last_read_timestamp,
            last_chapter_title: summary.last_chapter_title.clone(),
            final_chapter_title: summary.final_chapter_title.clone(),
        }
    }
}

impl From<LibraryRecord> for LibrarySummary {
    fn from(record: LibraryRecord) -> Self {
        let format = BookFormat::from_name(&record.format)
            .unwrap_or_else(|| BookFormat::detect(&record.book_id));
        Self {
            book_id: record.book_id,
            title: record.title,
            author: record.author,
            format,
            chapter_index: record.chapter_index,
            total_chapters: record.total_chapters,
            last_read_timestamp: record.last_read_timestamp,
            last_chapter_title: record.last_chapter_title,
            final_chapter_title: record.final_chapter_title,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LibraryFile {
    books: Vec<LibraryRecord>,
}

/// What the library needs to know about a book when it is opened or imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRegistration {
    pub book_id: String,
    pub title: String,
    pub author: Option<String>,
    pub format: BookFormat,
    pub total_chapters: usize,
}

/// Library index kept in insertion order in a single JSON document.
#[derive(Debug)]
pub struct LibraryStore {
    writer: AtomicFileWriter,
    filename: String,
    entries: Mutex<Vec<LibrarySummary>>,
}

impl LibraryStore {
    /// Loads the index at `path`. A missing file is an empty library; a
    /// malformed one is logged and replaced on the next write.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(crate::config::LIBRARY_FILENAME)
            .to_string();
        let entries = match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<LibraryFile>(&content) {
                Ok(file) => file.books.into_iter().map(LibrarySummary::from).collect(),
                Err(err) => {
                    reader_warn!("Failed to parse library index {:?}: {}", path, err);
                    Vec::new()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            writer: AtomicFileWriter::new(dir),
            filename,
            entries: Mutex::new(entries),
        })
    }

    /// Adds the book or refreshes its metadata, and marks it read at `timestamp`.
    pub fn register(&self, book: BookRegistration, timestamp: i64) -> Result<(), StoreError> {
        let mut entries = self.lock();
        match entries.iter_mut().find(|entry| entry.book_id == book.book_id) {
            Some(entry) => {
                entry.title = book.title;
                entry.author = book.author;
                entry.format = book.format;
                entry.total_chapters = book.total_chapters;
                entry.last_read_timestamp = entry.last_read_timestamp.max(timestamp);
            }
            None => entries.push(LibrarySummary {
                book_id: book.book_id,
                title: book.title,
                author: book.author,
                format: book.format,
                total_chapters: book.total_chapters,
                last_read_timestamp: timestamp,
                ..LibrarySummary::default()
            }),
        }
        self.persist(&entries)
    }

    /// Returns whether the book was in the library.
    pub fn remove(&self, book_id: &str) -> Result<bool, StoreError> {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|entry| entry.book_id != book_id);
        if entries.len() == before {
            return Ok(false);
        }
        self.persist(&entries)?;
        Ok(true)
    }

    pub fn get(&self, book_id: &str) -> Option<LibrarySummary> {
        self.lock()
            .iter()
            .find(|entry| entry.book_id == book_id)
            .cloned()
    }

    /// Newest timestamp in the index, if any.
    pub fn latest_timestamp(&self) -> Option<i64> {
        self.lock().iter().map(|entry| entry.last_read_timestamp).max()
    }

    /// Pulls every entry up to date from its progress record, persists the
    /// index if anything moved, and returns it most recently read first.
    pub fn summaries(&self, progress: &ProgressStore) -> Result<Vec<LibrarySummary>, StoreError> {
        let mut entries = self.lock();
        let mut changed = false;
        for entry in entries.iter_mut() {
            match progress.load(&entry.book_id) {
                Ok(Some(record)) => {
                    let before = entry.clone();
                    entry.refresh_from(&record);
                    changed |= *entry != before;
                }
                Ok(None) => {}
                Err(err) => {
                    reader_warn!("Skipping progress of {:?}: {}", entry.book_id, err);
                }
            }
        }
        if changed {
            reader_debug!("Library index refreshed from progress records");
            self.persist(&entries)?;
        }
        let mut ordered = entries.to_vec();
        order_by_recency(&mut ordered);
        Ok(ordered)
    }

    fn persist(&self, entries: &[LibrarySummary]) -> Result<(), StoreError> {
        let file = LibraryFile {
            books: entries.iter().map(LibraryRecord::from).collect(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        self.writer.write(&self.filename, &content)?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LibrarySummary>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
