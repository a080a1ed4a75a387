//! Seam to the container collaborator: archive parsing and file access live
//! in the host, the engine only consumes the shapes below.

use std::io::{self, Read};

use reader_core::TocNode;
use thiserror::Error;

/// Ordered chapter list and metadata of a structured container.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContainerManifest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub chapters: Vec<ChapterResource>,
    /// TOC nodes with targets resolved to indices into `chapters`.
    pub toc: Option<Vec<TocNode>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterResource {
    /// Collaborator-specific key passed back to [`ContainerProvider::read_resource`].
    pub id: String,
    pub href: String,
    /// Charset the container declares for this resource, if any.
    pub declared_encoding: Option<String>,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("book not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("unsupported container: {0}")]
    Unsupported(String),
    #[error("malformed container: {0}")]
    Malformed(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl SourceError {
    /// Classifies an io error against `book_id`.
    pub fn from_io(book_id: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(book_id.to_string()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(book_id.to_string()),
            _ => Self::Io(err),
        }
    }
}

/// Byte stream of a flat-text book.
pub type ByteStream = Box<dyn Read + Send>;

/// Host-provided access to book files. Calls block; the engine runs them off
/// the interactive path.
pub trait ContainerProvider: Send + Sync {
    fn open_container(&self, book_id: &str) -> Result<ContainerManifest, SourceError>;

    fn read_resource(&self, book_id: &str, resource: &ChapterResource)
        -> Result<Vec<u8>, SourceError>;

    fn open_byte_stream(&self, book_id: &str) -> Result<ByteStream, SourceError>;
}
