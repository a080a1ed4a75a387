use std::path::Path;

use sha2::{Digest, Sha256};

/// Deterministic, filesystem-safe progress record name for a book:
/// `{sanitized_stem}--{short_hash(book_id)}.ron`.
pub fn record_filename(book_id: &str) -> String {
    let stem = Path::new(book_id)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("book");
    let sanitized = sanitize_stem(stem);
    let hash = short_hash(book_id);
    format!("{sanitized}--{hash}.ron")
}

fn sanitize_stem(input: &str) -> String {
    let mut compacted = String::with_capacity(input.len());
    let mut prev_underscore = false;
    for c in input.chars() {
        let c = if is_forbidden(c) { '_' } else { c };
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        compacted.push(c);
    }
    let mut name = compacted.trim_matches(&['_', ' ', '.'][..]).to_string();
    if name.is_empty() {
        name = "book".to_string();
    }
    if name.chars().count() > 60 {
        name = name.chars().take(60).collect();
    }
    if is_reserved_windows_name(&name) {
        name.push('_');
    }
    name
}

fn is_forbidden(c: char) -> bool {
    matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}')
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().take(6).fold(String::with_capacity(12), |mut hex, byte| {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
        hex
    })
}
