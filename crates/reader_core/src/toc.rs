use std::fmt;

/// A node of the table-of-contents tree as supplied by a container.
///
/// `target` is the chapter index the node points at, if the container could
/// resolve it to an entry of the chapter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocNode {
    pub title: String,
    pub target: Option<usize>,
    pub children: Vec<TocNode>,
}

impl TocNode {
    pub fn new(title: impl Into<String>, target: Option<usize>) -> Self {
        Self {
            title: title.into(),
            target,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<TocNode>) -> Self {
        self.children = children;
        self
    }
}

/// A flattened table-of-contents entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub title: String,
    pub target_chapter_index: usize,
}

/// Rejected chapter jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfRange {
    pub requested: i64,
    pub chapter_count: usize,
}

impl fmt::Display for OutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chapter {} is out of range (book has {} chapters)",
            self.requested, self.chapter_count
        )
    }
}

/// Flatten a container TOC tree (pre-order) into entries.
///
/// Nodes whose target is missing or outside `[0, chapter_count)` are skipped,
/// their children are still visited. If nothing usable remains, one entry per
/// chapter is synthesized.
pub fn resolve_toc(container_toc: Option<&[TocNode]>, chapter_count: usize) -> Vec<TocEntry> {
    let mut entries = Vec::new();
    if let Some(nodes) = container_toc {
        flatten_into(nodes, chapter_count, &mut entries);
    }
    if entries.is_empty() {
        return synthesize_toc(chapter_count);
    }
    entries
}

fn flatten_into(nodes: &[TocNode], chapter_count: usize, out: &mut Vec<TocEntry>) {
    for node in nodes {
        match node.target {
            Some(target) if target < chapter_count => out.push(TocEntry {
                title: node.title.trim().to_string(),
                target_chapter_index: target,
            }),
            _ => {}
        }
        flatten_into(&node.children, chapter_count, out);
    }
}

/// One `"Chapter {n}"` entry per chapter, `n` counting from 1.
pub fn synthesize_toc(chapter_count: usize) -> Vec<TocEntry> {
    (0..chapter_count)
        .map(|index| TocEntry {
            title: fallback_title(index),
            target_chapter_index: index,
        })
        .collect()
}

/// Validate a jump target against `[0, chapter_count)`.
pub fn jump(target: i64, chapter_count: usize) -> Result<usize, OutOfRange> {
    usize::try_from(target)
        .ok()
        .filter(|&index| index < chapter_count)
        .ok_or(OutOfRange {
            requested: target,
            chapter_count,
        })
}

/// Title describing `chapter_index`: the entry targeting it, else the closest
/// entry before it, else the synthesized fallback.
pub fn chapter_title(entries: &[TocEntry], chapter_index: usize) -> String {
    if let Some(exact) = entries
        .iter()
        .find(|entry| entry.target_chapter_index == chapter_index)
    {
        return exact.title.clone();
    }
    entries
        .iter()
        .filter(|entry| entry.target_chapter_index < chapter_index)
        .max_by_key(|entry| entry.target_chapter_index)
        .map(|entry| entry.title.clone())
        .unwrap_or_else(|| fallback_title(chapter_index))
}

fn fallback_title(index: usize) -> String {
    format!("Chapter {}", index + 1)
}
