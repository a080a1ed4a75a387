#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, Once};

use reader_core::TocNode;
use reader_engine::{
    ByteStream, ChapterResource, ContainerManifest, ContainerProvider, EngineConfig, SourceError,
};
use tempfile::TempDir;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(reader_logging::initialize_for_tests);
}

/// Small pages and a deterministic clock so sessions are easy to reason about.
pub fn test_config(temp: &TempDir) -> EngineConfig {
    let ticks = Arc::new(AtomicI64::new(1_000));
    let mut config = EngineConfig::default_with_data_dir(temp.path().to_path_buf());
    config.page_capacity = 5;
    config.min_page_capacity = 2;
    config.virtual_chapter_chars = 10;
    config.clock = Arc::new(move || ticks.fetch_add(10, Ordering::SeqCst));
    config
}

enum MemoryBook {
    Structured {
        title: Option<String>,
        author: Option<String>,
        /// `None` marks a resource the container cannot read.
        chapters: Vec<Option<Vec<u8>>>,
        toc: Option<Vec<TocNode>>,
    },
    Flat(Vec<u8>),
}

/// In-memory container collaborator. Reads of a chapter can be held back
/// with a gate until the test releases it.
#[derive(Default)]
pub struct MemoryProvider {
    books: Mutex<HashMap<String, MemoryBook>>,
    closed_gates: Mutex<HashSet<(String, usize)>>,
    gate_opened: Condvar,
    started: Mutex<Vec<(String, usize)>>,
    reads: Mutex<Vec<(String, usize)>>,
    active_reads: AtomicUsize,
    max_active_reads: AtomicUsize,
}

impl MemoryProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Adds a structured book whose chapters wrap `texts` in paragraphs.
    pub fn add_book(&self, book_id: &str, texts: &[&str]) {
        let chapters = texts
            .iter()
            .map(|text| Some(format!("<html><body><p>{text}</p></body></html>").into_bytes()))
            .collect();
        self.insert(
            book_id,
            MemoryBook::Structured {
                title: Some(format!("Title of {book_id}")),
                author: Some("Test Author".to_string()),
                chapters,
                toc: None,
            },
        );
    }

    pub fn add_raw_book(
        &self,
        book_id: &str,
        chapters: Vec<Option<Vec<u8>>>,
        toc: Option<Vec<TocNode>>,
    ) {
        self.insert(
            book_id,
            MemoryBook::Structured {
                title: None,
                author: None,
                chapters,
                toc,
            },
        );
    }

    pub fn add_text(&self, book_id: &str, bytes: &[u8]) {
        self.insert(book_id, MemoryBook::Flat(bytes.to_vec()));
    }

    pub fn close_gate(&self, book_id: &str, chapter_index: usize) {
        self.closed_gates
            .lock()
            .unwrap()
            .insert((book_id.to_string(), chapter_index));
    }

    pub fn open_gate(&self, book_id: &str, chapter_index: usize) {
        self.closed_gates
            .lock()
            .unwrap()
            .remove(&(book_id.to_string(), chapter_index));
        self.gate_opened.notify_all();
    }

    /// Chapter reads that have completed, in completion order.
    pub fn reads(&self, book_id: &str) -> Vec<usize> {
        Self::chapters_of(&self.reads, book_id)
    }

    /// Chapter reads that have begun, including those held at a gate.
    pub fn started(&self, book_id: &str) -> Vec<usize> {
        Self::chapters_of(&self.started, book_id)
    }

    /// Highest number of reads that were running at the same time.
    pub fn max_concurrent_reads(&self) -> usize {
        self.max_active_reads.load(Ordering::SeqCst)
    }

    fn chapters_of(log: &Mutex<Vec<(String, usize)>>, book_id: &str) -> Vec<usize> {
        log.lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == book_id)
            .map(|(_, index)| *index)
            .collect()
    }

    fn insert(&self, book_id: &str, book: MemoryBook) {
        self.books.lock().unwrap().insert(book_id.to_string(), book);
    }

    fn wait_for_gate(&self, book_id: &str, chapter_index: usize) {
        let key = (book_id.to_string(), chapter_index);
        let mut gates = self.closed_gates.lock().unwrap();
        while gates.contains(&key) {
            gates = self.gate_opened.wait(gates).unwrap();
        }
    }
}

impl ContainerProvider for MemoryProvider {
    fn open_container(&self, book_id: &str) -> Result<ContainerManifest, SourceError> {
        let books = self.books.lock().unwrap();
        match books.get(book_id) {
            Some(MemoryBook::Structured {
                title,
                author,
                chapters,
                toc,
            }) => Ok(ContainerManifest {
                title: title.clone(),
                author: author.clone(),
                chapters: (0..chapters.len())
                    .map(|index| ChapterResource {
                        id: index.to_string(),
                        href: format!("OEBPS/chapter{index}.xhtml"),
                        declared_encoding: None,
                    })
                    .collect(),
                toc: toc.clone(),
            }),
            Some(MemoryBook::Flat(_)) => Err(SourceError::Unsupported(book_id.to_string())),
            None => Err(SourceError::NotFound(book_id.to_string())),
        }
    }

    fn read_resource(
        &self,
        book_id: &str,
        resource: &ChapterResource,
    ) -> Result<Vec<u8>, SourceError> {
        let index: usize = resource
            .id
            .parse()
            .map_err(|_| SourceError::Malformed(resource.id.clone()))?;
        self.started
            .lock()
            .unwrap()
            .push((book_id.to_string(), index));
        let active = self.active_reads.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_reads.fetch_max(active, Ordering::SeqCst);
        self.wait_for_gate(book_id, index);

        let result = match self.books.lock().unwrap().get(book_id) {
            Some(MemoryBook::Structured { chapters, .. }) => match chapters.get(index) {
                Some(Some(bytes)) => Ok(bytes.clone()),
                _ => Err(SourceError::Malformed(resource.href.clone())),
            },
            _ => Err(SourceError::NotFound(book_id.to_string())),
        };
        self.reads
            .lock()
            .unwrap()
            .push((book_id.to_string(), index));
        self.active_reads.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn open_byte_stream(&self, book_id: &str) -> Result<ByteStream, SourceError> {
        match self.books.lock().unwrap().get(book_id) {
            Some(MemoryBook::Flat(bytes)) => Ok(Box::new(Cursor::new(bytes.clone()))),
            Some(MemoryBook::Structured { .. }) => {
                Err(SourceError::Unsupported(book_id.to_string()))
            }
            None => Err(SourceError::NotFound(book_id.to_string())),
        }
    }
}
