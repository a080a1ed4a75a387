//! Container collaborator over the local file system: plain `.txt` files are
//! streamed as-is, EPUB archives are read through the `epub` crate.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use epub::doc::{EpubDoc, NavPoint};
use reader_core::TocNode;
use reader_engine::{ByteStream, ChapterResource, ContainerManifest, ContainerProvider, SourceError};
use reader_logging::reader_debug;

type Archive = EpubDoc<BufReader<File>>;

struct OpenArchive {
    book_id: String,
    doc: Archive,
}

/// Keeps the most recently used archive open; chapters of one book are read
/// one after another.
#[derive(Default)]
pub struct LocalFiles {
    archive: Mutex<Option<OpenArchive>>,
}

impl LocalFiles {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_archive<T>(
        &self,
        book_id: &str,
        f: impl FnOnce(&mut Archive) -> Result<T, SourceError>,
    ) -> Result<T, SourceError> {
        let mut slot = self.archive.lock().unwrap_or_else(PoisonError::into_inner);
        let cached = matches!(slot.as_ref(), Some(open) if open.book_id == book_id);
        if !cached {
            *slot = Some(OpenArchive {
                book_id: book_id.to_string(),
                doc: open_archive(book_id)?,
            });
        }
        match slot.as_mut() {
            Some(open) => f(&mut open.doc),
            None => Err(SourceError::Malformed(book_id.to_string())),
        }
    }
}

fn open_archive(book_id: &str) -> Result<Archive, SourceError> {
    let path = Path::new(book_id);
    fs::metadata(path).map_err(|err| SourceError::from_io(book_id, err))?;
    reader_debug!("Opening archive {book_id}");
    EpubDoc::new(path).map_err(|err| SourceError::Malformed(format!("{book_id}: {err}")))
}

fn manifest_of(doc: &Archive) -> ContainerManifest {
    let chapters: Vec<ChapterResource> = doc
        .spine
        .iter()
        .map(|item| ChapterResource {
            id: item.idref.clone(),
            href: doc
                .resources
                .get(&item.idref)
                .map(|resource| resource.path.to_string_lossy().into_owned())
                .unwrap_or_default(),
            declared_encoding: None,
        })
        .collect();

    let by_href: HashMap<&str, usize> = chapters
        .iter()
        .enumerate()
        .filter(|(_, chapter)| !chapter.href.is_empty())
        .map(|(index, chapter)| (chapter.href.as_str(), index))
        .collect();
    let toc: Vec<TocNode> = doc
        .toc
        .iter()
        .map(|point| toc_node(point, &by_href))
        .collect();

    ContainerManifest {
        title: doc.mdata("title").map(|item| item.value.clone()),
        author: doc.mdata("creator").map(|item| item.value.clone()),
        chapters,
        toc: (!toc.is_empty()).then_some(toc),
    }
}

fn toc_node(point: &NavPoint, by_href: &HashMap<&str, usize>) -> TocNode {
    let content = point.content.to_string_lossy();
    let href = content.split('#').next().unwrap_or_default();
    TocNode::new(point.label.clone(), by_href.get(href).copied()).with_children(
        point
            .children
            .iter()
            .map(|child| toc_node(child, by_href))
            .collect(),
    )
}

impl ContainerProvider for LocalFiles {
    fn open_container(&self, book_id: &str) -> Result<ContainerManifest, SourceError> {
        self.with_archive(book_id, |doc| Ok(manifest_of(doc)))
    }

    fn read_resource(
        &self,
        book_id: &str,
        resource: &ChapterResource,
    ) -> Result<Vec<u8>, SourceError> {
        self.with_archive(book_id, |doc| {
            doc.get_resource(&resource.id)
                .map(|(bytes, _mime)| bytes)
                .ok_or_else(|| SourceError::Malformed(format!("{book_id}: {}", resource.href)))
        })
    }

    fn open_byte_stream(&self, book_id: &str) -> Result<ByteStream, SourceError> {
        let file = File::open(book_id).map_err(|err| SourceError::from_io(book_id, err))?;
        Ok(Box::new(BufReader::new(file)))
    }
}
