use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{resolve, stream_bytes};

/// Ranges larger than this are truncated; no real font maps more than a plane.
const MAX_RANGE_LEN: u32 = 0x1_0000;

static BFCHAR_SECTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)beginbfchar(.*?)endbfchar").unwrap());
static BFRANGE_SECTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)beginbfrange(.*?)endbfrange").unwrap());
static BFCHAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]*)>").unwrap());
static BFRANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*(?:<([0-9A-Fa-f]*)>|\[([^\]]*)\])").unwrap()
});
static HEX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([0-9A-Fa-f]*)>").unwrap());

/// A parsed `ToUnicode` CMap.
#[derive(Debug, Default)]
pub struct ToUnicode {
    map: HashMap<u32, String>,
    code_len: usize,
}

impl ToUnicode {
    pub fn parse(cmap: &str) -> Self {
        let mut out = ToUnicode {
            map: HashMap::new(),
            code_len: 0,
        };

        for section in BFCHAR_SECTION_RE.captures_iter(cmap) {
            for c in BFCHAR_RE.captures_iter(&section[1]) {
                out.note_code_len(&c[1]);
                if let Some(code) = parse_code(&c[1]) {
                    out.map.insert(code, utf16_hex(&c[2]));
                }
            }
        }

        for section in BFRANGE_SECTION_RE.captures_iter(cmap) {
            for c in BFRANGE_RE.captures_iter(&section[1]) {
                out.note_code_len(&c[1]);
                let (Some(lo), Some(hi)) = (parse_code(&c[1]), parse_code(&c[2])) else {
                    continue;
                };
                let hi = hi.min(lo.saturating_add(MAX_RANGE_LEN));
                if let Some(dst) = c.get(3) {
                    let base = hex_bytes(dst.as_str());
                    for (offset, code) in (lo..=hi).enumerate() {
                        out.map.insert(code, utf16_bytes(&increment(&base, offset as u32)));
                    }
                } else if let Some(list) = c.get(4) {
                    for (code, dst) in (lo..=hi).zip(HEX_RE.captures_iter(list.as_str())) {
                        out.map.insert(code, utf16_hex(&dst[1]));
                    }
                }
            }
        }

        if out.code_len == 0 {
            out.code_len = 1;
        }
        out
    }

    fn note_code_len(&mut self, hex: &str) {
        if self.code_len == 0 {
            self.code_len = hex.len().div_ceil(2).clamp(1, 4);
        }
    }

    pub fn code_len(&self) -> usize {
        self.code_len
    }

    pub fn get(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// How to turn the bytes of a shown string into text for one font resource: its `ToUnicode`
/// CMap when it has one, Latin-1 otherwise.
#[derive(Debug, Default)]
pub struct FontDecoder {
    to_unicode: Option<ToUnicode>,
    /// Composite (`Type0`) fonts use multi-byte codes that mean nothing without a CMap.
    composite: bool,
}

impl FontDecoder {
    pub fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let composite = matches!(font.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Type0");
        let to_unicode = font
            .get(b"ToUnicode")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_stream().ok())
            .map(stream_bytes)
            .map(|bytes| ToUnicode::parse(&String::from_utf8_lossy(&bytes)))
            .filter(|cmap| !cmap.is_empty());
        FontDecoder {
            to_unicode,
            composite,
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        let Some(cmap) = &self.to_unicode else {
            if self.composite {
                return String::new();
            }
            return bytes.iter().map(|&b| char::from(b)).collect();
        };

        let width = cmap.code_len();
        let mut out = String::new();
        for chunk in bytes.chunks(width) {
            let code = chunk.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
            match cmap.get(code) {
                Some(s) => out.push_str(s),
                None if width == 1 && !self.composite => out.push(char::from(chunk[0])),
                None => {}
            }
        }
        out
    }
}

fn parse_code(hex: &str) -> Option<u32> {
    if hex.is_empty() || hex.len() > 8 {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

fn hex_bytes(hex: &str) -> Vec<u8> {
    let digits: Vec<u8> = hex
        .bytes()
        .filter_map(|b| (b as char).to_digit(16).map(|d| d as u8))
        .collect();
    digits
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => (hi << 4) | lo,
            [hi] => hi << 4,
            _ => 0,
        })
        .collect()
}

fn utf16_hex(hex: &str) -> String {
    utf16_bytes(&hex_bytes(hex))
}

fn utf16_bytes(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [only] => u16::from(*only),
            _ => 0,
        })
        .collect();
    String::from_utf16_lossy(&units)
}

/// Add `offset` to the last byte-pair of a big-endian destination code.
fn increment(base: &[u8], offset: u32) -> Vec<u8> {
    let mut out = base.to_vec();
    if out.len() < 2 {
        out.resize(2, 0);
        out.rotate_right(2 - base.len().min(2));
    }
    let n = out.len();
    let last = u32::from(u16::from_be_bytes([out[n - 2], out[n - 1]])) + offset;
    let [hi, lo] = ((last & 0xFFFF) as u16).to_be_bytes();
    out[n - 2] = hi;
    out[n - 1] = lo;
    out
}
