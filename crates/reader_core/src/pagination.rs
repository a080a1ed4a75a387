//! Boundary-aware page splitting.
//!
//! A chapter's plain text is cut into pages of at most `capacity` characters.
//! When the hard cut would land mid-sentence, the cut moves back to just after
//! the nearest `'.'` or `'\n'` so that pages tend to end on a boundary.

/// A page of a chapter, as a half-open byte range into the chapter text.
///
/// Offsets always fall on `char` boundaries, so `&text[page.start..page.end]`
/// never panics for the text the page was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Page {
    pub start: usize,
    pub end: usize,
}

impl Page {
    pub fn text<'a>(&self, chapter_text: &'a str) -> &'a str {
        &chapter_text[self.start..self.end]
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Split `text` into pages of roughly `capacity` characters.
///
/// Pages are exhaustive and non-overlapping: concatenating them in order
/// reproduces `text`. Empty text yields exactly one empty page. A capacity of
/// zero is treated as one.
pub fn paginate(text: &str, capacity: usize) -> Vec<Page> {
    if text.is_empty() {
        return vec![Page::default()];
    }
    let capacity = capacity.max(1);

    // Byte offset of every char, plus the end of the text, so page arithmetic
    // can be done in characters and mapped back to byte offsets.
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(idx, _)| idx)
        .chain(std::iter::once(text.len()))
        .collect();
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let mut pages = Vec::with_capacity(len / capacity + 1);
    let mut start = 0usize;
    while start < len {
        let mut end = (start + capacity).min(len);
        if end < len {
            if let Some(boundary) = last_boundary(&chars, start, end) {
                end = boundary + 1;
            }
        }
        pages.push(Page {
            start: offsets[start],
            end: offsets[end],
        });
        start = end;
    }
    pages
}

/// Nearest sentence or line boundary in `(start, end]`, scanning backward.
fn last_boundary(chars: &[char], start: usize, end: usize) -> Option<usize> {
    (start + 1..=end)
        .rev()
        .find(|&idx| matches!(chars[idx], '.' | '\n'))
}

/// Page index to land on after re-pagination, clamped to the new page count.
pub fn clamp_page_index(page_index: usize, page_count: usize) -> usize {
    page_index.min(page_count.saturating_sub(1))
}
