//! Reader core: pure reading-session state machine, pagination and navigation.
mod book;
mod effect;
mod msg;
pub mod pagination;
mod progress;
mod state;
pub mod toc;
mod update;
mod view_model;

pub use book::{title_from_book_id, BookFormat};
pub use effect::{Effect, JumpError, Notice, TurnError};
pub use msg::Msg;
pub use pagination::{paginate, Page};
pub use progress::{
    order_by_recency, LibrarySummary, ProgressSnapshot, ReadingProgress, ResumePoint,
};
pub use state::{ChapterStatus, Landing, PendingLoad, ReaderState, RequestId, SessionPhase};
pub use toc::{resolve_toc, OutOfRange, TocEntry, TocNode};
pub use update::update;
pub use view_model::ReaderViewModel;
