use crate::state::{Landing, SessionPhase};
use crate::toc::{jump, resolve_toc};
use crate::{ChapterStatus, Effect, Msg, Notice, ReaderState, TurnError};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: ReaderState, msg: Msg) -> (ReaderState, Vec<Effect>) {
    let effects = match msg {
        Msg::BookOpened {
            chapter_count,
            toc,
            resume,
        } => {
            if state.phase() != SessionPhase::Unloaded {
                return (state, Vec::new());
            }
            if chapter_count == 0 {
                state.fail("book has no chapters".to_string());
                return (state, Vec::new());
            }
            state.open(chapter_count, resolve_toc(toc.as_deref(), chapter_count));
            state.set_phase(SessionPhase::Loading);
            let (chapter_index, landing) = match resume {
                Some(point) if point.chapter_index < chapter_count => {
                    (point.chapter_index, Landing::Page(point.page_index))
                }
                _ => (0, Landing::FirstPage),
            };
            let request_id = state.begin_load(chapter_index, landing);
            vec![Effect::ExtractChapter {
                request_id,
                chapter_index,
            }]
        }
        Msg::BookFailed { reason } => match state.phase() {
            SessionPhase::Unloaded | SessionPhase::Loading => {
                state.fail(reason);
                Vec::new()
            }
            _ => Vec::new(),
        },
        Msg::ChapterLoaded {
            request_id,
            chapter_index,
            text,
            status,
        } => {
            // Anything but the latest request is stale and dropped unseen.
            if !state.is_pending(request_id, chapter_index) {
                return (state, Vec::new());
            }
            let Some(pending) = state.take_pending() else {
                return (state, Vec::new());
            };
            state.install_chapter(chapter_index, text, status, pending.landing);
            state.set_phase(SessionPhase::Ready);
            let mut effects = vec![Effect::CommitProgress(state.snapshot())];
            match status {
                ChapterStatus::Complete => {}
                ChapterStatus::Unavailable => {
                    effects.push(Effect::Notice(Notice::ChapterUnavailable { chapter_index }));
                }
                ChapterStatus::TooLarge => {
                    effects.push(Effect::Notice(Notice::ChapterTooLarge { chapter_index }));
                }
            }
            effects
        }
        Msg::NextPage => turn(&mut state, Direction::Forward),
        Msg::PreviousPage => turn(&mut state, Direction::Backward),
        Msg::GotoChapter(target) => match state.phase() {
            SessionPhase::Ready | SessionPhase::Navigating | SessionPhase::Loading => {
                match jump(target, state.chapter_count()) {
                    Ok(chapter_index) => {
                        let request_id = state.begin_load(chapter_index, Landing::FirstPage);
                        if state.phase() == SessionPhase::Ready {
                            state.set_phase(SessionPhase::Navigating);
                        }
                        vec![Effect::ExtractChapter {
                            request_id,
                            chapter_index,
                        }]
                    }
                    Err(err) => vec![Effect::Notice(Notice::OutOfRange(err))],
                }
            }
            _ => vec![Effect::Notice(Notice::Refused(TurnError::Inactive))],
        },
        Msg::CapacityChanged(capacity) => {
            if !state.set_capacity(capacity) {
                return (state, Vec::new());
            }
            if state.phase() == SessionPhase::Ready && state.has_chapter() {
                vec![Effect::CommitProgress(state.snapshot())]
            } else {
                Vec::new()
            }
        }
        Msg::Close => {
            if state.phase() == SessionPhase::Closed {
                return (state, Vec::new());
            }
            state.set_phase(SessionPhase::Closed);
            if state.take_pending().is_some() {
                vec![Effect::CancelExtraction]
            } else {
                Vec::new()
            }
        }
    };

    (state, effects)
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

fn turn(state: &mut ReaderState, direction: Direction) -> Vec<Effect> {
    match state.phase() {
        SessionPhase::Ready => {}
        SessionPhase::Loading | SessionPhase::Navigating => {
            return vec![Effect::Notice(Notice::Refused(TurnError::ChapterLoading))];
        }
        _ => return vec![Effect::Notice(Notice::Refused(TurnError::Inactive))],
    }

    let page_index = state.page_index();
    let chapter_index = state.chapter_index();
    let (next_page, next_chapter, boundary) = match direction {
        Direction::Forward => (
            (page_index + 1 < state.page_count()).then_some(page_index + 1),
            (chapter_index + 1 < state.chapter_count()).then_some(chapter_index + 1),
            TurnError::AtEnd,
        ),
        Direction::Backward => (
            page_index.checked_sub(1),
            chapter_index.checked_sub(1),
            TurnError::AtStart,
        ),
    };

    if let Some(page) = next_page {
        state.set_page_index(page);
        return vec![Effect::CommitProgress(state.snapshot())];
    }
    match next_chapter {
        Some(chapter_index) => {
            let request_id = state.begin_load(chapter_index, Landing::FirstPage);
            state.set_phase(SessionPhase::Navigating);
            vec![Effect::ExtractChapter {
                request_id,
                chapter_index,
            }]
        }
        None => vec![Effect::Notice(Notice::Refused(boundary))],
    }
}
