mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{init_logging, test_config, MemoryProvider};
use pretty_assertions::assert_eq;
use reader_core::{
    BookFormat, ChapterStatus, JumpError, Notice, OutOfRange, SessionPhase, TocNode, TurnError,
};
use reader_engine::{LoadError, ReaderEngine, ReadingSessionHandle, UNAVAILABLE_PLACEHOLDER};
use tempfile::TempDir;

const SEQ_BOOK: &str = "/books/seq.epub";
const SEQ_CHAPTERS: [&str; 3] = ["aaaa.bbbb.cc", "dddd", "eeee.ffff"];

fn engine(temp: &TempDir, provider: &Arc<MemoryProvider>) -> ReaderEngine {
    ReaderEngine::new(test_config(temp), provider.clone()).unwrap()
}

fn position(session: &ReadingSessionHandle) -> (usize, usize) {
    let view = session.view();
    (view.chapter_index, view.page_index)
}

/// Pumps until at least one extraction result has been applied.
async fn pump_until_applied(session: &mut ReadingSessionHandle) {
    for _ in 0..200 {
        if session.pump() > 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no extraction result arrived");
}

async fn wait_for_read(provider: &MemoryProvider, book_id: &str, chapter_index: usize) {
    for _ in 0..200 {
        if provider.reads(book_id).contains(&chapter_index) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("chapter {chapter_index} was never read");
}

async fn wait_for_start(provider: &MemoryProvider, book_id: &str, chapter_index: usize) {
    for _ in 0..200 {
        if provider.started(book_id).contains(&chapter_index) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("reading chapter {chapter_index} never started");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sequential_reading_visits_every_page_in_order() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let provider = MemoryProvider::new();
    provider.add_book(SEQ_BOOK, &SEQ_CHAPTERS);
    let engine = engine(&temp, &provider);

    let mut session = engine.load_book(SEQ_BOOK).await.unwrap();
    assert_eq!(session.phase(), SessionPhase::Ready);
    assert_eq!(session.current_page_text(), "aaaa.");

    let mut visited = Vec::new();
    let mut stamps = Vec::new();
    loop {
        let stored = engine.progress_of(SEQ_BOOK);
        assert_eq!(
            (stored.chapter_index, stored.page_index),
            position(&session)
        );
        visited.push(position(&session));
        stamps.push(stored.last_read_timestamp);

        match session.next_page() {
            Ok(()) => session.settle().await,
            Err(reason) => {
                assert_eq!(reason, TurnError::AtEnd);
                break;
            }
        }
    }

    assert_eq!(
        visited,
        vec![(0, 0), (0, 1), (0, 2), (1, 0), (2, 0), (2, 1)]
    );
    assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]), "{stamps:?}");
    assert_eq!(session.current_page_text(), "ffff");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn previous_page_at_start_is_refused() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let provider = MemoryProvider::new();
    provider.add_book(SEQ_BOOK, &SEQ_CHAPTERS);
    let engine = engine(&temp, &provider);

    let mut session = engine.load_book(SEQ_BOOK).await.unwrap();
    assert_eq!(session.previous_page(), Err(TurnError::AtStart));
    assert_eq!(position(&session), (0, 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn out_of_range_jump_changes_nothing() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let provider = MemoryProvider::new();
    provider.add_book(SEQ_BOOK, &SEQ_CHAPTERS);
    let engine = engine(&temp, &provider);

    let mut session = engine.load_book(SEQ_BOOK).await.unwrap();
    session.next_page().unwrap();
    let before = engine.progress_of(SEQ_BOOK);

    for requested in [-1, 3, 99] {
        assert_eq!(
            session.goto_chapter(requested),
            Err(JumpError::OutOfRange(OutOfRange {
                requested,
                chapter_count: 3
            }))
        );
        assert_eq!(position(&session), (0, 1));
        assert!(!session.is_loading());
        assert_eq!(session.phase(), SessionPhase::Ready);
    }
    assert_eq!(engine.progress_of(SEQ_BOOK), before);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn jump_lands_on_first_page_of_target() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let provider = MemoryProvider::new();
    provider.add_book(SEQ_BOOK, &SEQ_CHAPTERS);
    let engine = engine(&temp, &provider);

    let mut session = engine.load_book(SEQ_BOOK).await.unwrap();
    session.next_page().unwrap();
    session.goto_chapter(2).unwrap();
    session.settle().await;

    assert_eq!(position(&session), (2, 0));
    assert_eq!(session.current_page_text(), "eeee.");
    assert_eq!(session.view().chapter_title, "Chapter 3");
    assert_eq!(engine.progress_of(SEQ_BOOK).last_chapter_title, "Chapter 3");
    assert_eq!(engine.progress_of(SEQ_BOOK).final_chapter_title, "Chapter 3");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn latest_jump_wins_when_earlier_result_arrives_first() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let provider = MemoryProvider::new();
    provider.add_book("gated.epub", &["zero.", "one.", "two.", "three", "four.", "five."]);
    let engine = engine(&temp, &provider);
    let mut session = engine.load_book("gated.epub").await.unwrap();

    provider.close_gate("gated.epub", 2);
    provider.close_gate("gated.epub", 5);
    session.goto_chapter(2).unwrap();
    wait_for_start(&provider, "gated.epub", 2).await;
    session.goto_chapter(5).unwrap();
    assert_eq!(session.phase(), SessionPhase::Navigating);

    provider.open_gate("gated.epub", 2);
    pump_until_applied(&mut session).await;
    assert_eq!(session.phase(), SessionPhase::Navigating);
    assert_eq!(position(&session), (0, 0));
    assert_eq!(session.view().pending_chapter, Some(5));
    assert_eq!(engine.progress_of("gated.epub").chapter_index, 0);

    provider.open_gate("gated.epub", 5);
    session.settle().await;
    assert_eq!(session.phase(), SessionPhase::Ready);
    assert_eq!(position(&session), (5, 0));
    assert_eq!(session.current_page_text(), "five.");
    assert_eq!(engine.progress_of("gated.epub").chapter_index, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn replaced_jump_is_never_read() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let provider = MemoryProvider::new();
    provider.add_book("gated.epub", &["zero.", "one.", "two.", "three", "four.", "five."]);
    let engine = engine(&temp, &provider);
    let mut session = engine.load_book("gated.epub").await.unwrap();

    provider.close_gate("gated.epub", 1);
    session.goto_chapter(1).unwrap();
    wait_for_start(&provider, "gated.epub", 1).await;
    session.goto_chapter(2).unwrap();
    session.goto_chapter(3).unwrap();
    assert_eq!(session.view().pending_chapter, Some(3));

    provider.open_gate("gated.epub", 1);
    session.settle().await;
    assert_eq!(position(&session), (3, 0));
    assert_eq!(session.current_page_text(), "three");
    assert_eq!(provider.started("gated.epub"), vec![0, 1, 3]);
    assert_eq!(provider.reads("gated.epub"), vec![0, 1, 3]);
    assert_eq!(provider.max_concurrent_reads(), 1);
    assert_eq!(engine.progress_of("gated.epub").chapter_index, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn page_turns_wait_for_pending_chapter() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let provider = MemoryProvider::new();
    provider.add_book(SEQ_BOOK, &SEQ_CHAPTERS);
    let engine = engine(&temp, &provider);
    let mut session = engine.load_book(SEQ_BOOK).await.unwrap();

    provider.close_gate(SEQ_BOOK, 1);
    session.goto_chapter(1).unwrap();
    assert!(session.is_loading());
    assert_eq!(session.next_page(), Err(TurnError::ChapterLoading));
    assert_eq!(session.previous_page(), Err(TurnError::ChapterLoading));

    provider.open_gate(SEQ_BOOK, 1);
    session.settle().await;
    assert_eq!(position(&session), (1, 0));
    assert_eq!(session.current_page_text(), "dddd");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reopening_resumes_at_stored_position() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let provider = MemoryProvider::new();
    provider.add_book(SEQ_BOOK, &SEQ_CHAPTERS);

    {
        let engine = engine(&temp, &provider);
        let mut session = engine.load_book(SEQ_BOOK).await.unwrap();
        session.next_page().unwrap();
        session.next_page().unwrap();
        assert_eq!(session.current_page_text(), "cc");
        session.close();
    }

    let engine = engine(&temp, &provider);
    let session = engine.load_book(SEQ_BOOK).await.unwrap();
    assert_eq!(position(&session), (0, 2));
    assert_eq!(session.current_page_text(), "cc");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stored_page_beyond_new_pagination_is_clamped() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let provider = MemoryProvider::new();
    provider.add_book(SEQ_BOOK, &SEQ_CHAPTERS);

    {
        let engine = engine(&temp, &provider);
        let mut session = engine.load_book(SEQ_BOOK).await.unwrap();
        session.next_page().unwrap();
        session.next_page().unwrap();
    }

    let mut config = test_config(&temp);
    config.page_capacity = 100;
    let engine = ReaderEngine::new(config, provider.clone()).unwrap();
    let session = engine.load_book(SEQ_BOOK).await.unwrap();
    assert_eq!(position(&session), (0, 0));
    assert_eq!(session.current_page_text(), "aaaa.bbbb.cc");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn capacity_change_clamps_page_and_respects_floor() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let provider = MemoryProvider::new();
    provider.add_book(SEQ_BOOK, &SEQ_CHAPTERS);
    let engine = engine(&temp, &provider);
    let mut session = engine.load_book(SEQ_BOOK).await.unwrap();
    session.next_page().unwrap();
    session.next_page().unwrap();

    session.set_capacity(100);
    assert_eq!(position(&session), (0, 0));
    assert_eq!(session.view().page_count, 1);
    assert_eq!(session.current_page_text(), "aaaa.bbbb.cc");
    assert_eq!(engine.progress_of(SEQ_BOOK).total_pages_in_chapter, 1);

    // Below the configured floor of 2.
    session.set_capacity(1);
    let view = session.view();
    assert_eq!(view.page_index, 0);
    assert_eq!(view.page_count, 5);
    assert_eq!(session.current_page_text(), "aa");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn flat_text_book_is_split_into_virtual_chapters() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let provider = MemoryProvider::new();
    provider.add_text("/books/notes.txt", b"first one.\nsecond one\nthird one.\n");
    let engine = engine(&temp, &provider);

    let mut session = engine.load_book("/books/notes.txt").await.unwrap();
    let view = session.view();
    assert_eq!(view.chapter_count, 3);
    assert_eq!(view.chapter_title, "Chapter 1");
    assert_eq!(session.current_page_text(), "first");

    session.goto_chapter(2).unwrap();
    session.settle().await;
    assert_eq!(session.current_page_text(), "third");

    let rows = engine.library_summaries().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "notes");
    assert_eq!(rows[0].format, BookFormat::FlatText);
    assert_eq!(rows[0].author, None);
    assert_eq!(rows[0].total_chapters, 3);
    assert_eq!(rows[0].chapter_index, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn book_without_chapters_fails_and_is_not_listed() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let provider = MemoryProvider::new();
    provider.add_raw_book("empty.epub", Vec::new(), None);
    provider.add_text("blank.txt", b"");
    let engine = engine(&temp, &provider);

    for book_id in ["empty.epub", "blank.txt"] {
        match engine.load_book(book_id).await {
            Err(LoadError::BookLoadFailed { reason, .. }) => {
                assert_eq!(reason, "book has no chapters");
            }
            Ok(_) => panic!("{book_id} should not open"),
        }
    }
    assert!(engine.import_book("empty.epub").await.is_err());
    assert!(engine.library_summaries().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_book_fails_to_load() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let provider = MemoryProvider::new();
    let engine = engine(&temp, &provider);

    let Err(LoadError::BookLoadFailed { book_id, reason }) =
        engine.load_book("nowhere.epub").await
    else {
        panic!("missing book opened");
    };
    assert_eq!(book_id, "nowhere.epub");
    assert!(reason.contains("not found"), "{reason}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn broken_chapters_show_placeholders_and_reading_continues() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let provider = MemoryProvider::new();
    let toc = vec![
        TocNode::new("Opening", Some(0)),
        TocNode::new("Part Two", None).with_children(vec![
            TocNode::new("Lost", Some(1)),
            TocNode::new("Huge", Some(2)),
        ]),
    ];
    provider.add_raw_book(
        "broken.epub",
        vec![
            Some(b"<p>fine.</p>".to_vec()),
            None,
            Some(vec![b'x'; 4096]),
        ],
        Some(toc),
    );
    let mut config = test_config(&temp);
    config.max_resource_bytes = 1024;
    let engine = ReaderEngine::new(config, provider.clone()).unwrap();

    let mut session = engine.load_book("broken.epub").await.unwrap();
    let titles: Vec<_> = session
        .toc_entries()
        .iter()
        .map(|entry| (entry.title.as_str(), entry.target_chapter_index))
        .collect();
    assert_eq!(titles, vec![("Opening", 0), ("Lost", 1), ("Huge", 2)]);
    assert!(session.take_notices().is_empty());

    session.next_page().unwrap();
    session.settle().await;
    let view = session.view();
    assert_eq!(view.chapter_index, 1);
    assert_eq!(view.chapter_title, "Lost");
    assert_eq!(view.chapter_status, ChapterStatus::Unavailable);
    assert!(UNAVAILABLE_PLACEHOLDER.starts_with(session.current_page_text()));
    assert_eq!(
        session.take_notices(),
        vec![Notice::ChapterUnavailable { chapter_index: 1 }]
    );

    session.goto_chapter(2).unwrap();
    session.settle().await;
    assert_eq!(session.view().chapter_status, ChapterStatus::TooLarge);
    assert_eq!(
        session.take_notices(),
        vec![Notice::ChapterTooLarge { chapter_index: 2 }]
    );
    assert_eq!(engine.progress_of("broken.epub").chapter_index, 2);
    assert_eq!(engine.progress_of("broken.epub").final_chapter_title, "Huge");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn closed_session_refuses_and_cancels_pending_load() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let provider = MemoryProvider::new();
    provider.add_book(SEQ_BOOK, &SEQ_CHAPTERS);
    let engine = engine(&temp, &provider);
    let mut session = engine.load_book(SEQ_BOOK).await.unwrap();

    provider.close_gate(SEQ_BOOK, 2);
    session.goto_chapter(2).unwrap();
    wait_for_start(&provider, SEQ_BOOK, 2).await;
    session.close();
    assert_eq!(session.phase(), SessionPhase::Closed);
    assert!(!session.is_loading());
    assert_eq!(session.next_page(), Err(TurnError::Inactive));
    assert_eq!(session.take_notices().last(), Some(&Notice::Refused(TurnError::Inactive)));
    assert_eq!(
        session.goto_chapter(1),
        Err(JumpError::Refused(TurnError::Inactive))
    );
    assert_eq!(session.phase(), SessionPhase::Closed);
    assert!(!session.is_loading());

    provider.open_gate(SEQ_BOOK, 2);
    wait_for_read(&provider, SEQ_BOOK, 2).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(session.pump(), 0);
    assert_eq!(engine.progress_of(SEQ_BOOK).chapter_index, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn import_and_remove_books() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let provider = MemoryProvider::new();
    provider.add_book("a.epub", &SEQ_CHAPTERS);
    let engine = engine(&temp, &provider);

    let summary = engine.import_book("a.epub").await.unwrap();
    assert_eq!(summary.title, "Title of a.epub");
    assert_eq!(summary.author.as_deref(), Some("Test Author"));
    assert_eq!(summary.format, BookFormat::Structured);
    assert_eq!(summary.total_chapters, 3);
    assert_eq!(summary.chapter_index, 0);
    assert_eq!(engine.library_summaries().unwrap().len(), 1);

    let mut session = engine.load_book("a.epub").await.unwrap();
    session.next_page().unwrap();
    assert_eq!(engine.progress_of("a.epub").page_index, 1);
    drop(session);

    assert!(engine.remove_book("a.epub").unwrap());
    assert!(!engine.remove_book("a.epub").unwrap());
    assert!(engine.library_summaries().unwrap().is_empty());
    assert_eq!(engine.progress_of("a.epub").page_index, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn library_lists_most_recently_read_first() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let provider = MemoryProvider::new();
    for book_id in ["a.epub", "b.epub", "c.epub"] {
        provider.add_book(book_id, &SEQ_CHAPTERS);
    }
    let engine = engine(&temp, &provider);

    for book_id in ["a.epub", "b.epub", "c.epub"] {
        engine.import_book(book_id).await.unwrap();
    }
    let ids = |engine: &ReaderEngine| -> Vec<String> {
        engine
            .library_summaries()
            .unwrap()
            .into_iter()
            .map(|row| row.book_id)
            .collect()
    };
    assert_eq!(ids(&engine), vec!["c.epub", "b.epub", "a.epub"]);

    let mut session = engine.load_book("a.epub").await.unwrap();
    session.goto_chapter(1).unwrap();
    session.settle().await;
    assert_eq!(ids(&engine), vec!["a.epub", "c.epub", "b.epub"]);

    let rows = engine.library_summaries().unwrap();
    assert_eq!(rows[0].chapter_index, 1);
    assert_eq!(rows[0].last_chapter_title, "Chapter 2");
    assert_eq!(
        rows[0].last_read_timestamp,
        engine.progress_of("a.epub").last_read_timestamp
    );
}
