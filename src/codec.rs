//! Text codecs for request decoding and response encoding.
//!
//! Labels follow the WHATWG Encoding Standard (`utf-8`, `latin1`,
//! `windows-1252`, `shift_jis`, ...). `encoding_rs` has no UTF-16 encoders,
//! so UTF-16LE/BE responses are produced here; the `utf-16` label means
//! little-endian, written without a BOM.

use encoding_rs::{Decoder, DecoderResult, Encoding, UTF_16BE, UTF_16LE};

use crate::error::{ConfigError, DecodeError};

/// 按标签查找编码
pub fn lookup(label: &str) -> Result<&'static Encoding, ConfigError> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| ConfigError::UnknownEncoding(label.to_string()))
}

/// 查找可用于输出的编码；`replacement` 没有编码器，拒绝
pub fn lookup_output(label: &str) -> Result<&'static Encoding, ConfigError> {
    let encoding = lookup(label)?;
    if encoding == UTF_16LE || encoding == UTF_16BE || encoding.output_encoding() == encoding {
        return Ok(encoding);
    }
    Err(ConfigError::UnsupportedOutputEncoding(encoding.name()))
}

/// 将响应文本编码为字节；存在无法映射的字符时返回 None
pub fn encode(encoding: &'static Encoding, text: &str) -> Option<Vec<u8>> {
    if encoding == UTF_16LE {
        return Some(text.encode_utf16().flat_map(u16::to_le_bytes).collect());
    }
    if encoding == UTF_16BE {
        return Some(text.encode_utf16().flat_map(u16::to_be_bytes).collect());
    }
    // 其余编码的 output_encoding 已在 lookup_output 中确认是自身
    let (bytes, _, had_unmappable) = encoding.encode(text);
    if had_unmappable {
        return None;
    }
    Some(bytes.into_owned())
}

/// Streaming decoder for one connection.
///
/// Keeps state between calls, so a multi-byte sequence split across two reads
/// is decoded once its last byte arrives. Malformed input is an error, never
/// a replacement character.
pub struct TextDecoder {
    encoding: &'static Encoding,
    decoder: Decoder,
    consumed: usize,
}

impl TextDecoder {
    pub fn new(encoding: &'static Encoding) -> Self {
        Self {
            encoding,
            decoder: encoding.new_decoder_without_bom_handling(),
            consumed: 0,
        }
    }

    /// 解码新到达的字节，`last` 表示输入流已经结束
    pub fn decode(&mut self, src: &[u8], last: bool) -> Result<String, DecodeError> {
        let mut out = String::with_capacity(self.capacity_for(src.len()));
        let mut pos = 0;

        loop {
            let (result, read) =
                self.decoder
                    .decode_to_string_without_replacement(&src[pos..], &mut out, last);
            pos += read;

            match result {
                DecoderResult::InputEmpty => break,
                DecoderResult::OutputFull => {
                    let extra = self.capacity_for(src.len() - pos);
                    out.reserve(extra);
                }
                DecoderResult::Malformed(bad, after) => {
                    let offset = (self.consumed + pos)
                        .saturating_sub(bad as usize)
                        .saturating_sub(after as usize);
                    return Err(DecodeError {
                        encoding: self.encoding.name(),
                        offset,
                    });
                }
            }
        }

        self.consumed += pos;
        Ok(out)
    }

    fn capacity_for(&self, len: usize) -> usize {
        self.decoder
            .max_utf8_buffer_length_without_replacement(len)
            .unwrap_or(len)
            .max(16)
    }
}
