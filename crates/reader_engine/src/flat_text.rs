//! Splits a plain text stream into size-bounded virtual chapters.

use std::io::{self, Read};

use reader_logging::{reader_debug, reader_info};

use crate::decode::StreamDecoder;
use crate::encoding::{detect, TextEncoding};
use crate::extract::ExtractError;

const READ_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatTextSettings {
    pub sample_window: usize,
    /// A virtual chapter is closed after the line that takes it past this many chars.
    pub virtual_chapter_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualChapters {
    pub encoding: TextEncoding,
    pub chapters: Vec<String>,
}

/// Reads the whole stream once. The encoding is detected from the leading
/// sample and used for the rest of the stream. Every line ends with `'\n'`
/// in the output, whatever terminator it had in the input.
pub fn partition_flat_text<R: Read>(
    mut stream: R,
    settings: FlatTextSettings,
) -> Result<VirtualChapters, ExtractError> {
    let mut sample = Vec::with_capacity(settings.sample_window);
    (&mut stream)
        .take(settings.sample_window as u64)
        .read_to_end(&mut sample)
        .map_err(unreadable)?;
    let encoding = detect(&sample);
    reader_debug!("Flat text encoding detected as {encoding}");

    let mut decoder = StreamDecoder::new(encoding);
    let mut partitioner = Partitioner::new(settings.virtual_chapter_chars);
    let mut decoded = String::new();

    decoder.decode_chunk(&sample, false, &mut decoded)?;
    partitioner.feed(&decoded);

    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let read = match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(unreadable(err)),
        };
        decoded.clear();
        decoder.decode_chunk(&buf[..read], false, &mut decoded)?;
        partitioner.feed(&decoded);
    }
    decoded.clear();
    decoder.decode_chunk(&[], true, &mut decoded)?;
    partitioner.feed(&decoded);

    let chapters = partitioner.finish();
    reader_info!(
        "Partitioned flat text into {} virtual chapters ({encoding})",
        chapters.len()
    );
    Ok(VirtualChapters { encoding, chapters })
}

fn unreadable(err: io::Error) -> ExtractError {
    ExtractError::ContentUnavailable(err.to_string())
}

/// Line-oriented fold over decoded text.
struct Partitioner {
    threshold: usize,
    chapters: Vec<String>,
    current: String,
    current_chars: usize,
    line: String,
    line_chars: usize,
    after_cr: bool,
}

impl Partitioner {
    fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            chapters: Vec::new(),
            current: String::new(),
            current_chars: 0,
            line: String::new(),
            line_chars: 0,
            after_cr: false,
        }
    }

    fn feed(&mut self, text: &str) {
        for c in text.chars() {
            if std::mem::take(&mut self.after_cr) && c == '\n' {
                continue;
            }
            match c {
                '\n' => self.end_line(),
                '\r' => {
                    self.end_line();
                    self.after_cr = true;
                }
                _ => {
                    self.line.push(c);
                    self.line_chars += 1;
                    if self.line_chars > self.threshold {
                        // A single line longer than a chapter is cut where it stands.
                        self.current.push_str(&self.line);
                        self.current_chars += self.line_chars;
                        self.line.clear();
                        self.line_chars = 0;
                        self.flush();
                    }
                }
            }
        }
    }

    fn end_line(&mut self) {
        self.current.push_str(&self.line);
        self.current.push('\n');
        self.current_chars += self.line_chars + 1;
        self.line.clear();
        self.line_chars = 0;
        if self.current_chars > self.threshold {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.chapters.push(std::mem::take(&mut self.current));
        }
        self.current_chars = 0;
    }

    fn finish(mut self) -> Vec<String> {
        if !self.line.is_empty() {
            self.end_line();
        }
        self.flush();
        self.chapters
    }
}
