use std::sync::Arc;

use reader_core::RequestId;
use reader_logging::{reader_debug, reader_warn};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::extract::{extract_chapter_text, ChapterText, ExtractError, ExtractSettings};
use crate::source::{ChapterResource, ContainerProvider};

/// Where a session's chapters come from once the book is open.
pub(crate) enum ChapterSource {
    Structured {
        provider: Arc<dyn ContainerProvider>,
        book_id: String,
        chapters: Vec<ChapterResource>,
        settings: ExtractSettings,
    },
    /// Virtual chapters already partitioned from a flat text file.
    Flat { chapters: Vec<String> },
}

impl ChapterSource {
    pub(crate) fn chapter_count(&self) -> usize {
        match self {
            Self::Structured { chapters, .. } => chapters.len(),
            Self::Flat { chapters } => chapters.len(),
        }
    }

    /// Blocking; runs on the blocking pool.
    fn extract(&self, chapter_index: usize) -> ChapterText {
        match self {
            Self::Structured {
                provider,
                book_id,
                chapters,
                settings,
            } => match chapters.get(chapter_index) {
                Some(resource) => extract_chapter_text(
                    provider.read_resource(book_id, resource),
                    resource.declared_encoding.as_deref(),
                    *settings,
                ),
                None => missing(chapter_index),
            },
            Self::Flat { chapters } => match chapters.get(chapter_index) {
                Some(text) => ChapterText::complete(text.clone()),
                None => missing(chapter_index),
            },
        }
    }
}

fn missing(chapter_index: usize) -> ChapterText {
    ChapterText::placeholder(&ExtractError::ContentUnavailable(format!(
        "no chapter {chapter_index}"
    )))
}

#[derive(Debug)]
pub(crate) struct LoaderEvent {
    pub request_id: RequestId,
    pub chapter_index: usize,
    pub chapter: ChapterText,
}

type Request = Option<(RequestId, usize)>;

/// Runs chapter extraction off the caller's thread and hands results back
/// over a channel. A single worker extracts one chapter at a time; a request
/// made while it is busy replaces any request still waiting, so replaced
/// chapters are never read. Results are tagged and choosing which one applies
/// is up to the session.
pub(crate) struct ChapterLoader {
    cancel: CancellationToken,
    request_tx: watch::Sender<Request>,
    event_rx: mpsc::UnboundedReceiver<LoaderEvent>,
}

impl ChapterLoader {
    pub(crate) fn new(runtime: Handle, source: Arc<ChapterSource>) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (request_tx, request_rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        runtime.spawn(run_worker(source, request_rx, cancel.clone(), event_tx));
        Self {
            cancel,
            request_tx,
            event_rx,
        }
    }

    pub(crate) fn request(&self, request_id: RequestId, chapter_index: usize) {
        reader_debug!("Queueing chapter {chapter_index} (request {request_id})");
        self.request_tx.send_replace(Some((request_id, chapter_index)));
    }

    /// The running extraction stops reporting and nothing queued starts.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    pub(crate) fn try_recv(&mut self) -> Option<LoaderEvent> {
        self.event_rx.try_recv().ok()
    }

    pub(crate) async fn recv(&mut self) -> Option<LoaderEvent> {
        self.event_rx.recv().await
    }
}

impl Drop for ChapterLoader {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_worker(
    source: Arc<ChapterSource>,
    mut requests: watch::Receiver<Request>,
    token: CancellationToken,
    event_tx: mpsc::UnboundedSender<LoaderEvent>,
) {
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            changed = requests.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
        let Some((request_id, chapter_index)) = *requests.borrow_and_update() else {
            continue;
        };
        reader_debug!("Extracting chapter {chapter_index} (request {request_id})");

        let job_source = Arc::clone(&source);
        let job = tokio::task::spawn_blocking(move || job_source.extract(chapter_index));
        let chapter = tokio::select! {
            biased;
            _ = token.cancelled() => {
                reader_debug!("Extraction of chapter {chapter_index} cancelled");
                return;
            }
            joined = job => match joined {
                Ok(chapter) => chapter,
                Err(err) => {
                    reader_warn!("Extraction of chapter {chapter_index} aborted: {err}");
                    ChapterText::placeholder(&ExtractError::ContentUnavailable(err.to_string()))
                }
            },
        };
        if token.is_cancelled() {
            return;
        }
        if event_tx
            .send(LoaderEvent {
                request_id,
                chapter_index,
                chapter,
            })
            .is_err()
        {
            return;
        }
    }
}
