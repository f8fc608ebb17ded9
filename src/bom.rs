//! Byte order marks and input decoding
//!
//! Byte input is sniffed for a UTF-32, UTF-16 or UTF-8 byte order mark (UTF-32 first,
//! since the UTF-32LE mark starts with the UTF-16LE one). The mark is stripped and the
//! rest is decoded with the matching encoding. Without a mark the input is UTF-8 unless
//! the XML declaration names another ASCII-compatible encoding.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};

use crate::error::{BindError, BindResult};

/// Unicode byte order mark as it appears in decoded text
pub const BOM_CHAR: char = '\u{FEFF}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bom {
    Utf8,
    Utf16Be,
    Utf16Le,
    Utf32Be,
    Utf32Le,
}

impl Bom {
    pub fn byte_len(&self) -> usize {
        match self {
            Bom::Utf8 => 3,
            Bom::Utf16Be | Bom::Utf16Le => 2,
            Bom::Utf32Be | Bom::Utf32Le => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Bom::Utf8 => "UTF-8",
            Bom::Utf16Be => "UTF-16BE",
            Bom::Utf16Le => "UTF-16LE",
            Bom::Utf32Be => "UTF-32BE",
            Bom::Utf32Le => "UTF-32LE",
        }
    }
}

/// Detect a leading byte order mark
pub fn detect(bytes: &[u8]) -> Option<Bom> {
    match bytes {
        [0x00, 0x00, 0xFE, 0xFF, ..] => Some(Bom::Utf32Be),
        [0xFF, 0xFE, 0x00, 0x00, ..] => Some(Bom::Utf32Le),
        _ => match Encoding::for_bom(bytes) {
            Some((encoding, _)) if encoding == UTF_8 => Some(Bom::Utf8),
            Some((encoding, _)) if encoding == UTF_16BE => Some(Bom::Utf16Be),
            Some((encoding, _)) if encoding == UTF_16LE => Some(Bom::Utf16Le),
            _ => None,
        },
    }
}

/// Strip a leading U+FEFF from already decoded text
pub fn strip_text(text: &str) -> &str {
    text.strip_prefix(BOM_CHAR).unwrap_or(text)
}

/// Decode raw XML bytes into text, honoring and removing any byte order mark
pub fn decode_bytes(bytes: &[u8]) -> BindResult<Cow<'_, str>> {
    if let Some(bom) = detect(bytes) {
        let body = &bytes[bom.byte_len()..];
        return match bom {
            Bom::Utf8 => decode_with(UTF_8, body),
            Bom::Utf16Be => decode_with(UTF_16BE, body),
            Bom::Utf16Le => decode_with(UTF_16LE, body),
            Bom::Utf32Be => decode_utf32(body, u32::from_be_bytes, bom),
            Bom::Utf32Le => decode_utf32(body, u32::from_le_bytes, bom),
        };
    }

    // UTF-16 without a mark still starts with "<?"
    match bytes {
        [0x3C, 0x00, 0x3F, 0x00, ..] => return decode_with(UTF_16LE, bytes),
        [0x00, 0x3C, 0x00, 0x3F, ..] => return decode_with(UTF_16BE, bytes),
        _ => {}
    }

    let encoding = declared_encoding(bytes)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .filter(|encoding| encoding.is_ascii_compatible())
        .unwrap_or(UTF_8);
    decode_with(encoding, bytes)
}

fn decode_with<'a>(encoding: &'static Encoding, bytes: &'a [u8]) -> BindResult<Cow<'a, str>> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or_else(|| BindError::Encoding {
            encoding: encoding.name().to_string(),
            details: "input contains malformed byte sequences".to_string(),
        })
}

fn decode_utf32(
    bytes: &[u8],
    to_u32: fn([u8; 4]) -> u32,
    bom: Bom,
) -> BindResult<Cow<'static, str>> {
    let encoding_error = |details: String| BindError::Encoding {
        encoding: bom.name().to_string(),
        details,
    };

    let chunks = bytes.chunks_exact(4);
    if !chunks.remainder().is_empty() {
        return Err(encoding_error(format!(
            "input length {} is not a multiple of 4",
            bytes.len()
        )));
    }

    let mut text = String::with_capacity(bytes.len() / 4);
    for (index, chunk) in chunks.enumerate() {
        let code = to_u32([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let c = char::from_u32(code).ok_or_else(|| {
            encoding_error(format!("invalid code point {:#x} at offset {}", code, index * 4))
        })?;
        text.push(c);
    }
    Ok(Cow::Owned(text))
}

/// The `encoding` pseudo-attribute of an ASCII XML declaration
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    if !bytes.starts_with(b"<?xml") {
        return None;
    }
    let end = bytes.windows(2).position(|w| w == b"?>")?;
    let declaration = std::str::from_utf8(&bytes[..end]).ok()?;
    let rest = &declaration[declaration.find("encoding")? + "encoding".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    let close = value.find(quote)?;
    Some(value[..close].to_string())
}
