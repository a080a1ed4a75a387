//! Byte-sample encoding classification.

use std::fmt;

use encoding_rs::{Encoding, GBK, UTF_16BE, UTF_16LE, UTF_8};

/// Encodings the detector can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
    Gbk,
}

impl TextEncoding {
    /// The `encoding_rs` codec, if it has one. UTF-32 is decoded by hand.
    pub fn codec(self) -> Option<&'static Encoding> {
        match self {
            Self::Utf8 => Some(UTF_8),
            Self::Utf16Le => Some(UTF_16LE),
            Self::Utf16Be => Some(UTF_16BE),
            Self::Gbk => Some(GBK),
            Self::Utf32Le | Self::Utf32Be => None,
        }
    }

    /// Maps a declared charset label (`"utf-8"`, `"gb2312"`, `"UTF-32LE"`, ...).
    pub fn from_label(label: &str) -> Option<Self> {
        let trimmed = label.trim();
        if trimmed.eq_ignore_ascii_case("utf-32le") || trimmed.eq_ignore_ascii_case("utf-32") {
            return Some(Self::Utf32Le);
        }
        if trimmed.eq_ignore_ascii_case("utf-32be") {
            return Some(Self::Utf32Be);
        }
        let encoding = Encoding::for_label(trimmed.as_bytes())?;
        if encoding == UTF_8 {
            Some(Self::Utf8)
        } else if encoding == UTF_16LE {
            Some(Self::Utf16Le)
        } else if encoding == UTF_16BE {
            Some(Self::Utf16Be)
        } else if encoding == GBK || encoding == encoding_rs::GB18030 {
            Some(Self::Gbk)
        } else {
            None
        }
    }

    /// Length of the byte-order mark for this encoding at the start of `bytes`, if present.
    pub fn bom_len(self, bytes: &[u8]) -> usize {
        let bom: &[u8] = match self {
            Self::Utf8 => &[0xEF, 0xBB, 0xBF],
            Self::Utf16Le => &[0xFF, 0xFE],
            Self::Utf16Be => &[0xFE, 0xFF],
            Self::Utf32Le => &[0xFF, 0xFE, 0x00, 0x00],
            Self::Utf32Be => &[0x00, 0x00, 0xFE, 0xFF],
            Self::Gbk => &[],
        };
        if !bom.is_empty() && bytes.starts_with(bom) {
            return bom.len();
        }
        // Pseudo-BOMs recognised by `detect`.
        match self {
            Self::Utf32Le if bytes.starts_with(&[0xFF, 0x00, 0x00, 0x00]) => 4,
            Self::Utf32Be if bytes.starts_with(&[0x00, 0x00, 0x00, 0xFF]) => 4,
            _ => 0,
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Utf8 => "UTF-8",
            Self::Utf16Le => "UTF-16LE",
            Self::Utf16Be => "UTF-16BE",
            Self::Utf32Le => "UTF-32LE",
            Self::Utf32Be => "UTF-32BE",
            Self::Gbk => "GBK",
        };
        f.write_str(name)
    }
}

const MAX_GBK_INVALID_RATIO: f64 = 0.30;

/// BOM signatures, most specific first. The 4-byte UTF-32 marks share a
/// leading byte with the UTF-16 ones and must be tried before them.
const SIGNATURES: &[(&[u8], TextEncoding)] = &[
    (&[0xEF, 0xBB, 0xBF], TextEncoding::Utf8),
    // Truncated UTF-32 marks, read by byte order: a leading FF is little-endian.
    // Deliberate; do not swap them to match other readers' tables.
    (&[0xFF, 0x00, 0x00, 0x00], TextEncoding::Utf32Le),
    (&[0x00, 0x00, 0x00, 0xFF], TextEncoding::Utf32Be),
    (&[0x00, 0x00, 0xFE, 0xFF], TextEncoding::Utf32Be),
    (&[0xFF, 0xFE, 0x00, 0x00], TextEncoding::Utf32Le),
    (&[0xFF, 0xFE], TextEncoding::Utf16Le),
    (&[0xFE, 0xFF], TextEncoding::Utf16Be),
];

/// Classify a leading byte sample. First match wins: BOM, UTF-8 grammar,
/// GBK plausibility, then UTF-8 as the lossy default.
pub fn detect(sample: &[u8]) -> TextEncoding {
    if let Some(&(_, encoding)) = SIGNATURES.iter().find(|(bom, _)| sample.starts_with(bom)) {
        return encoding;
    }
    if sample.is_empty() || is_valid_utf8_sample(sample) {
        return TextEncoding::Utf8;
    }
    if is_plausible_gbk(sample) {
        return TextEncoding::Gbk;
    }
    TextEncoding::Utf8
}

/// Lead-byte grammar check. A multi-byte sequence cut off by the end of the
/// sample is accepted, since the sample is an arbitrary prefix of the stream.
fn is_valid_utf8_sample(sample: &[u8]) -> bool {
    let mut idx = 0;
    while idx < sample.len() {
        let lead = sample[idx];
        let width = match lead {
            b if b & 0x80 == 0x00 => 1,
            b if b & 0xE0 == 0xC0 => 2,
            b if b & 0xF0 == 0xE0 => 3,
            b if b & 0xF8 == 0xF0 => 4,
            _ => return false,
        };
        // Deliberately lenient at the end of the sample: a sequence cut off
        // by the sample boundary still counts as UTF-8.
        let end = (idx + width).min(sample.len());
        if !sample[idx + 1..end].iter().all(|b| b & 0xC0 == 0x80) {
            return false;
        }
        idx += width;
    }
    true
}

fn is_plausible_gbk(sample: &[u8]) -> bool {
    let (decoded, _) = GBK.decode_without_bom_handling(sample);
    let mut total = 0usize;
    let mut invalid = 0usize;
    for c in decoded.chars() {
        total += 1;
        if c == char::REPLACEMENT_CHARACTER || (c < ' ' && !matches!(c, '\n' | '\r' | '\t')) {
            invalid += 1;
        }
    }
    total > 0 && (invalid as f64 / total as f64) < MAX_GBK_INVALID_RATIO
}
