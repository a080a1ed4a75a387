//! Host-facing API: the engine owning persistent state, and per-book
//! reading sessions driving the core state machine.

use std::sync::Arc;

use reader_core::{
    title_from_book_id, update, BookFormat, Effect, JumpError, LibrarySummary, Msg, Notice,
    ReaderState, ReaderViewModel, ReadingProgress, ResumePoint, SessionPhase, TocEntry, TocNode,
    TurnError,
};
use reader_logging::{reader_debug, reader_error, reader_info, reader_warn};
use thiserror::Error;
use tokio::runtime::Handle;

use crate::config::{EngineConfig, MonotonicStamper};
use crate::flat_text::partition_flat_text;
use crate::loader::{ChapterLoader, ChapterSource, LoaderEvent};
use crate::source::ContainerProvider;
use crate::store::{BookRegistration, LibraryStore, ProgressStore, StoreError};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open {book_id}: {reason}")]
    BookLoadFailed { book_id: String, reason: String },
}

impl LoadError {
    fn failed(book_id: &str, reason: impl ToString) -> Self {
        Self::BookLoadFailed {
            book_id: book_id.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A scanned book, ready for a session.
struct OpenedBook {
    registration: BookRegistration,
    toc: Option<Vec<TocNode>>,
    source: ChapterSource,
}

/// Entry point for hosts. Owns the stores and the container collaborator.
pub struct ReaderEngine {
    config: EngineConfig,
    provider: Arc<dyn ContainerProvider>,
    progress: ProgressStore,
    library: Arc<LibraryStore>,
    stamper: Arc<MonotonicStamper>,
}

impl ReaderEngine {
    pub fn new(
        config: EngineConfig,
        provider: Arc<dyn ContainerProvider>,
    ) -> Result<Self, StoreError> {
        let progress = ProgressStore::new(config.progress_dir());
        let library = LibraryStore::open(&config.library_path())?;
        let stamper = MonotonicStamper::new(Arc::clone(&config.clock));
        if let Some(latest) = library.latest_timestamp() {
            stamper.raise_floor(latest);
        }
        Ok(Self {
            config,
            provider,
            progress,
            library: Arc::new(library),
            stamper: Arc::new(stamper),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Opens `book_id`, registers it in the library, and resolves once the
    /// resume chapter (or the first one) is displayed.
    pub async fn load_book(&self, book_id: &str) -> Result<ReadingSessionHandle, LoadError> {
        let opened = self.scan(book_id).await?;
        let resume = match self.progress.load(book_id) {
            Ok(progress) => progress.as_ref().map(ResumePoint::from),
            Err(err) => {
                reader_warn!("Ignoring unreadable progress of {book_id}: {err}");
                None
            }
        };
        let chapter_count = opened.source.chapter_count();
        let runtime = Handle::try_current().map_err(|err| LoadError::failed(book_id, err))?;

        let mut session = ReadingSessionHandle {
            book_id: book_id.to_string(),
            state: ReaderState::new(self.config.effective_capacity(self.config.page_capacity)),
            loader: ChapterLoader::new(runtime, Arc::new(opened.source)),
            progress: self.progress.clone(),
            stamper: Arc::clone(&self.stamper),
            min_capacity: self.config.min_page_capacity,
            notices: Vec::new(),
        };
        session.dispatch(Msg::BookOpened {
            chapter_count,
            toc: opened.toc,
            resume,
        });
        session.settle().await;

        match session.state.phase() {
            SessionPhase::LoadFailed => {
                let reason = session
                    .state
                    .failure()
                    .unwrap_or("unknown failure")
                    .to_string();
                reader_warn!("Book {book_id} failed to load: {reason}");
                Err(LoadError::failed(book_id, reason))
            }
            _ => {
                self.register(opened.registration);
                reader_info!(
                    "Opened {book_id} at chapter {} page {}",
                    session.state.chapter_index(),
                    session.state.page_index()
                );
                Ok(session)
            }
        }
    }

    /// Scans the book once and adds it to the library without opening a session.
    pub async fn import_book(&self, book_id: &str) -> Result<LibrarySummary, LoadError> {
        let opened = self.scan(book_id).await?;
        if opened.source.chapter_count() == 0 {
            return Err(LoadError::failed(book_id, "book has no chapters"));
        }
        self.register(opened.registration);
        self.library
            .get(book_id)
            .ok_or_else(|| LoadError::failed(book_id, "library index could not be updated"))
    }

    /// Drops the book from the library together with its progress record.
    pub fn remove_book(&self, book_id: &str) -> Result<bool, StoreError> {
        let removed = self.library.remove(book_id)?;
        self.progress.remove(book_id)?;
        reader_info!("Removed {book_id} from library (was present: {removed})");
        Ok(removed)
    }

    /// Stored position; a default record for books never read.
    pub fn progress_of(&self, book_id: &str) -> ReadingProgress {
        match self.progress.load(book_id) {
            Ok(progress) => progress.unwrap_or_default(),
            Err(err) => {
                reader_warn!("Failed to read progress of {book_id}: {err}");
                ReadingProgress::default()
            }
        }
    }

    /// Library rows, most recently read first, refreshed from progress records.
    pub fn library_summaries(&self) -> Result<Vec<LibrarySummary>, StoreError> {
        self.library.summaries(&self.progress)
    }

    async fn scan(&self, book_id: &str) -> Result<OpenedBook, LoadError> {
        let format = BookFormat::detect(book_id);
        let provider = Arc::clone(&self.provider);
        let config = self.config.clone();
        let id = book_id.to_string();
        tokio::task::spawn_blocking(move || scan_blocking(provider, &config, &id, format))
            .await
            .map_err(|err| LoadError::failed(book_id, err))?
    }

    fn register(&self, registration: BookRegistration) {
        let book_id = registration.book_id.clone();
        if let Err(err) = self.library.register(registration, self.stamper.stamp()) {
            reader_error!("Failed to update library entry of {book_id}: {err}");
        }
    }
}

fn scan_blocking(
    provider: Arc<dyn ContainerProvider>,
    config: &EngineConfig,
    book_id: &str,
    format: BookFormat,
) -> Result<OpenedBook, LoadError> {
    match format {
        BookFormat::FlatText => {
            let stream = provider
                .open_byte_stream(book_id)
                .map_err(|err| LoadError::failed(book_id, err))?;
            let partitioned = partition_flat_text(stream, config.flat_text_settings())
                .map_err(|err| LoadError::failed(book_id, err))?;
            Ok(OpenedBook {
                registration: BookRegistration {
                    book_id: book_id.to_string(),
                    title: title_from_book_id(book_id),
                    author: None,
                    format,
                    total_chapters: partitioned.chapters.len(),
                },
                toc: None,
                source: ChapterSource::Flat {
                    chapters: partitioned.chapters,
                },
            })
        }
        BookFormat::Structured => {
            let manifest = provider
                .open_container(book_id)
                .map_err(|err| LoadError::failed(book_id, err))?;
            let title = manifest
                .title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| title_from_book_id(book_id));
            reader_debug!(
                "Container {book_id} has {} chapters",
                manifest.chapters.len()
            );
            Ok(OpenedBook {
                registration: BookRegistration {
                    book_id: book_id.to_string(),
                    title,
                    author: manifest.author.filter(|author| !author.trim().is_empty()),
                    format,
                    total_chapters: manifest.chapters.len(),
                },
                toc: manifest.toc,
                source: ChapterSource::Structured {
                    provider,
                    book_id: book_id.to_string(),
                    chapters: manifest.chapters,
                    settings: config.extract_settings(),
                },
            })
        }
    }
}

/// One open book. All reading state lives here; drop or [`close`] it to end
/// the session.
///
/// [`close`]: ReadingSessionHandle::close
pub struct ReadingSessionHandle {
    book_id: String,
    state: ReaderState,
    loader: ChapterLoader,
    progress: ProgressStore,
    stamper: Arc<MonotonicStamper>,
    min_capacity: usize,
    notices: Vec<Notice>,
}

impl ReadingSessionHandle {
    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn current_page_text(&self) -> &str {
        self.state.current_page_text()
    }

    pub fn next_page(&mut self) -> Result<(), TurnError> {
        self.pump();
        refusal(&self.dispatch(Msg::NextPage))
    }

    pub fn previous_page(&mut self) -> Result<(), TurnError> {
        self.pump();
        refusal(&self.dispatch(Msg::PreviousPage))
    }

    /// Starts loading `index`. Rejected without any state change when out of
    /// range or when the session is not active.
    pub fn goto_chapter(&mut self, index: i64) -> Result<(), JumpError> {
        self.pump();
        let effects = self.dispatch(Msg::GotoChapter(index));
        match effects.iter().find_map(|effect| match effect {
            Effect::Notice(Notice::OutOfRange(err)) => Some(JumpError::OutOfRange(*err)),
            Effect::Notice(Notice::Refused(reason)) => Some(JumpError::Refused(*reason)),
            _ => None,
        }) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn toc_entries(&self) -> &[TocEntry] {
        self.state.toc()
    }

    /// Re-paginates for a new viewport; the page index is clamped, not reset.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.dispatch(Msg::CapacityChanged(capacity.max(self.min_capacity)));
    }

    /// Applies every extraction result that has already arrived.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.loader.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Waits until no chapter load is pending.
    pub async fn settle(&mut self) {
        while self.state.pending().is_some() {
            match self.loader.recv().await {
                Some(event) => self.apply(event),
                None => break,
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state.pending().is_some()
    }

    pub fn view(&self) -> ReaderViewModel {
        self.state.view()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    /// Drains non-fatal notices raised since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn close(&mut self) {
        self.dispatch(Msg::Close);
    }

    fn apply(&mut self, event: LoaderEvent) {
        let pending = self.state.pending().map(|p| p.request_id);
        if pending != Some(event.request_id) {
            reader_debug!(
                "Discarding stale chapter {} (request {})",
                event.chapter_index,
                event.request_id
            );
        }
        self.dispatch(Msg::ChapterLoaded {
            request_id: event.request_id,
            chapter_index: event.chapter_index,
            text: event.chapter.text,
            status: event.chapter.status,
        });
    }

    fn dispatch(&mut self, msg: Msg) -> Vec<Effect> {
        let state = std::mem::take(&mut self.state);
        let (next, effects) = update(state, msg);
        self.state = next;
        for effect in &effects {
            self.run(effect);
        }
        effects
    }

    fn run(&mut self, effect: &Effect) {
        match effect {
            Effect::ExtractChapter {
                request_id,
                chapter_index,
            } => self.loader.request(*request_id, *chapter_index),
            Effect::CommitProgress(snapshot) => {
                let progress = snapshot.clone().stamp(self.stamper.stamp());
                if let Err(err) = self.progress.save(&self.book_id, &progress) {
                    reader_error!("Failed to save progress of {}: {err}", self.book_id);
                }
            }
            Effect::CancelExtraction => self.loader.cancel(),
            Effect::Notice(notice) => {
                reader_debug!("Notice for {}: {notice}", self.book_id);
                self.notices.push(*notice);
            }
        }
    }
}

fn refusal(effects: &[Effect]) -> Result<(), TurnError> {
    match effects.iter().find_map(|effect| match effect {
        Effect::Notice(Notice::Refused(reason)) => Some(*reason),
        _ => None,
    }) {
        Some(reason) => Err(reason),
        None => Ok(()),
    }
}
