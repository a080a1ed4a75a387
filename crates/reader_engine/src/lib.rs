//! Reader engine: decoding, extraction, persistence and session orchestration.
mod config;
mod decode;
mod encoding;
mod extract;
mod filename;
mod flat_text;
mod loader;
mod persist;
mod session;
mod source;
mod store;

pub use config::{
    Clock, ConfigError, EngineConfig, MonotonicStamper, DEFAULT_DATA_DIR, LIBRARY_FILENAME,
    LOG_FILENAME, PROGRESS_DIRNAME,
};
pub use decode::{decode_bytes, DecodeError, StreamDecoder};
pub use encoding::{detect, TextEncoding};
pub use extract::{
    extract_chapter_text, plain_text, strip_markup, ChapterText, ExtractError, ExtractSettings,
    TOO_LARGE_PLACEHOLDER, UNAVAILABLE_PLACEHOLDER,
};
pub use filename::record_filename;
pub use flat_text::{partition_flat_text, FlatTextSettings, VirtualChapters};
pub use persist::{ensure_data_dir, AtomicFileWriter, PersistError};
pub use session::{LoadError, ReaderEngine, ReadingSessionHandle};
pub use source::{ByteStream, ChapterResource, ContainerManifest, ContainerProvider, SourceError};
pub use store::{BookRegistration, LibraryStore, ProgressStore, StoreError};
