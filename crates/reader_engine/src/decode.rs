use encoding_rs::{CoderResult, Decoder};

use crate::encoding::TextEncoding;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("cannot allocate {requested} bytes for decoded {encoding} text")]
    Allocation {
        encoding: TextEncoding,
        requested: usize,
    },
}

/// Incremental decoder for one encoding. Malformed input becomes U+FFFD;
/// a leading BOM of the chosen encoding is dropped.
pub struct StreamDecoder {
    encoding: TextEncoding,
    inner: Inner,
}

enum Inner {
    Codec(Decoder),
    Utf32 {
        big_endian: bool,
        pending: Vec<u8>,
        bom_checked: bool,
    },
}

impl StreamDecoder {
    pub fn new(encoding: TextEncoding) -> Self {
        let inner = match encoding.codec() {
            Some(codec) => Inner::Codec(codec.new_decoder_with_bom_removal()),
            None => Inner::Utf32 {
                big_endian: encoding == TextEncoding::Utf32Be,
                pending: Vec::with_capacity(4),
                bom_checked: false,
            },
        };
        Self { encoding, inner }
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Appends the decoded form of `bytes` to `out`. `last` flushes any
    /// incomplete trailing sequence as a replacement character.
    pub fn decode_chunk(
        &mut self,
        bytes: &[u8],
        last: bool,
        out: &mut String,
    ) -> Result<(), DecodeError> {
        let encoding = self.encoding;
        match &mut self.inner {
            Inner::Codec(decoder) => {
                let needed = decoder
                    .max_utf8_buffer_length(bytes.len())
                    .unwrap_or(usize::MAX);
                reserve(out, needed, encoding)?;
                let mut consumed = 0;
                loop {
                    let (result, read, _) =
                        decoder.decode_to_string(&bytes[consumed..], out, last);
                    consumed += read;
                    match result {
                        CoderResult::InputEmpty => break,
                        CoderResult::OutputFull => {
                            let more = decoder
                                .max_utf8_buffer_length(bytes.len() - consumed)
                                .unwrap_or(usize::MAX)
                                .max(4);
                            reserve(out, more, encoding)?;
                        }
                    }
                }
                Ok(())
            }
            Inner::Utf32 {
                big_endian,
                pending,
                bom_checked,
            } => {
                pending.extend_from_slice(bytes);
                if !*bom_checked {
                    if pending.len() < 4 && !last {
                        return Ok(());
                    }
                    let skip = encoding.bom_len(&pending[..]);
                    pending.drain(..skip);
                    *bom_checked = true;
                }
                let whole = pending.len() / 4 * 4;
                reserve(out, whole, encoding)?;
                for unit in pending[..whole].chunks_exact(4) {
                    let word = [unit[0], unit[1], unit[2], unit[3]];
                    let scalar = if *big_endian {
                        u32::from_be_bytes(word)
                    } else {
                        u32::from_le_bytes(word)
                    };
                    out.push(char::from_u32(scalar).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
                pending.drain(..whole);
                if last && !pending.is_empty() {
                    pending.clear();
                    out.push(char::REPLACEMENT_CHARACTER);
                }
                Ok(())
            }
        }
    }
}

fn reserve(out: &mut String, additional: usize, encoding: TextEncoding) -> Result<(), DecodeError> {
    out.try_reserve(additional)
        .map_err(|_| DecodeError::Allocation {
            encoding,
            requested: additional,
        })
}

/// Decodes a complete resource in one go.
pub fn decode_bytes(bytes: &[u8], encoding: TextEncoding) -> Result<String, DecodeError> {
    let mut out = String::new();
    StreamDecoder::new(encoding).decode_chunk(bytes, true, &mut out)?;
    Ok(out)
}
