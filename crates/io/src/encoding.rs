// Text decoding with an ordered list of candidate encodings

use std::fmt;
use std::str::FromStr;

use encoding_rs::{MACINTOSH, UTF_8, WINDOWS_1252};

/// Encodings tried, in order, when reading delimited text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    /// UTF-8 with an optional byte order mark.
    Utf8Sig,
    Utf8,
    /// Windows-1252, strict: the five bytes it leaves undefined are rejected.
    Windows1252,
    /// ISO-8859-1. Every byte maps to a code point, so this never fails.
    Latin1,
    MacRoman,
}

/// Bytes with no assigned character in Windows-1252.
const CP1252_UNDEFINED: [u8; 5] = [0x81, 0x8D, 0x8F, 0x90, 0x9D];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

impl TextEncoding {
    /// Default candidate order.
    pub const DEFAULT_CANDIDATES: [TextEncoding; 5] = [
        TextEncoding::Utf8Sig,
        TextEncoding::Utf8,
        TextEncoding::Windows1252,
        TextEncoding::Latin1,
        TextEncoding::MacRoman,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8Sig => "utf-8-sig",
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Windows1252 => "cp1252",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::MacRoman => "mac-roman",
        }
    }

    /// Decode the whole buffer, or `None` if it is not valid in this encoding.
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8Sig => {
                let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                decode_utf8(body)
            }
            TextEncoding::Utf8 => decode_utf8(bytes),
            TextEncoding::Windows1252 => {
                if bytes.iter().any(|b| CP1252_UNDEFINED.contains(b)) {
                    return None;
                }
                WINDOWS_1252
                    .decode_without_bom_handling_and_without_replacement(bytes)
                    .map(|s| s.into_owned())
            }
            TextEncoding::Latin1 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
            TextEncoding::MacRoman => MACINTOSH
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|s| s.into_owned()),
        }
    }

    /// Like [`decode`](Self::decode), but a UTF-8 sequence cut off at the
    /// end of `sample` is dropped instead of failing. Used on a fixed-size
    /// prefix of a file.
    pub fn decode_sample(self, sample: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8Sig | TextEncoding::Utf8 => {
                let body = match self {
                    TextEncoding::Utf8Sig => sample.strip_prefix(UTF8_BOM).unwrap_or(sample),
                    _ => sample,
                };
                match std::str::from_utf8(body) {
                    Ok(s) => Some(s.to_string()),
                    // error_len() is None only for an incomplete trailing sequence
                    Err(e) if e.error_len().is_none() => {
                        decode_utf8(&body[..e.valid_up_to()])
                    }
                    Err(_) => None,
                }
            }
            _ => self.decode(sample),
        }
    }
}

fn decode_utf8(bytes: &[u8]) -> Option<String> {
    UTF_8
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|s| s.into_owned())
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8-sig" | "utf8-sig" => Ok(TextEncoding::Utf8Sig),
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "cp1252" | "windows-1252" => Ok(TextEncoding::Windows1252),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(TextEncoding::Latin1),
            "mac-roman" | "macroman" | "macintosh" => Ok(TextEncoding::MacRoman),
            other => Err(format!("unknown encoding '{other}'")),
        }
    }
}

/// Decode with the first candidate that accepts the bytes.
///
/// Returns the text and the encoding used, or the labels tried on failure.
pub fn decode_with_candidates(
    bytes: &[u8],
    candidates: &[TextEncoding],
) -> Result<(String, TextEncoding), Vec<&'static str>> {
    for &enc in candidates {
        if let Some(text) = enc.decode(bytes) {
            return Ok((text, enc));
        }
    }
    Err(candidates.iter().map(|e| e.label()).collect())
}
