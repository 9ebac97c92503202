//! Content type resolution.
//!
//! Types are looked up by file extension first. Files without a known
//! extension are identified from their leading bytes using the signature
//! table of the WHATWG MIME Sniffing Standard.

use mime_guess::mime;

/// Maximum number of leading bytes inspected when sniffing.
pub(crate) const SNIFF_LEN: usize = 512;

/// Fallback for content that looks binary.
const OCTET_STREAM: &str = "application/octet-stream";

/// Look up a content type from the extension of `name`.
///
/// Text types carry an explicit UTF-8 charset. Returns `None` when the name has
/// no extension or the extension is unknown.
pub(crate) fn type_by_extension(name: &str) -> Option<String> {
    let base = name.rsplit('/').next().unwrap_or(name);
    if !base.contains('.') {
        return None;
    }
    let guess = mime_guess::from_path(base).first()?;
    if guess.type_() == mime::TEXT && guess.get_param(mime::CHARSET).is_none() {
        Some(format!("{guess}; charset=utf-8"))
    } else {
        Some(guess.to_string())
    }
}

enum Signature {
    /// HTML tag prefix, matched case-insensitively after leading whitespace
    /// and followed by a space or `>`.
    Html(&'static [u8]),
    /// Exact prefix, optionally after leading whitespace.
    Exact {
        pattern: &'static [u8],
        skip_ws: bool,
        content_type: &'static str,
    },
    /// Prefix compared under a byte mask.
    Masked {
        mask: &'static [u8],
        pattern: &'static [u8],
        content_type: &'static str,
    },
    Mp4,
    Text,
}

const fn exact(pattern: &'static [u8], content_type: &'static str) -> Signature {
    Signature::Exact {
        pattern,
        skip_ws: false,
        content_type,
    }
}

const fn masked(
    mask: &'static [u8],
    pattern: &'static [u8],
    content_type: &'static str,
) -> Signature {
    Signature::Masked {
        mask,
        pattern,
        content_type,
    }
}

const HTML: &str = "text/html; charset=utf-8";

/// Signatures in priority order.
const SIGNATURES: &[Signature] = &[
    Signature::Html(b"<!DOCTYPE HTML"),
    Signature::Html(b"<HTML"),
    Signature::Html(b"<HEAD"),
    Signature::Html(b"<SCRIPT"),
    Signature::Html(b"<IFRAME"),
    Signature::Html(b"<H1"),
    Signature::Html(b"<DIV"),
    Signature::Html(b"<FONT"),
    Signature::Html(b"<TABLE"),
    Signature::Html(b"<A"),
    Signature::Html(b"<STYLE"),
    Signature::Html(b"<TITLE"),
    Signature::Html(b"<B"),
    Signature::Html(b"<BODY"),
    Signature::Html(b"<BR"),
    Signature::Html(b"<P"),
    Signature::Html(b"<!--"),
    Signature::Exact {
        pattern: b"<?xml",
        skip_ws: true,
        content_type: "text/xml; charset=utf-8",
    },
    exact(b"%PDF-", "application/pdf"),
    exact(b"%!PS-Adobe-", "application/postscript"),
    // Byte order marks
    masked(b"\xFF\xFF\x00\x00", b"\xFE\xFF\x00\x00", "text/plain; charset=utf-16be"),
    masked(b"\xFF\xFF\x00\x00", b"\xFF\xFE\x00\x00", "text/plain; charset=utf-16le"),
    masked(b"\xFF\xFF\xFF\x00", b"\xEF\xBB\xBF\x00", "text/plain; charset=utf-8"),
    // Images
    exact(b"\x00\x00\x01\x00", "image/x-icon"),
    exact(b"\x00\x00\x02\x00", "image/x-icon"),
    exact(b"BM", "image/bmp"),
    exact(b"GIF87a", "image/gif"),
    exact(b"GIF89a", "image/gif"),
    masked(
        b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF\xFF\xFF",
        b"RIFF\x00\x00\x00\x00WEBPVP",
        "image/webp",
    ),
    exact(b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    exact(b"\xFF\xD8\xFF", "image/jpeg"),
    // Audio and video
    masked(
        b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        b"FORM\x00\x00\x00\x00AIFF",
        "audio/aiff",
    ),
    masked(b"\xFF\xFF\xFF", b"ID3", "audio/mpeg"),
    masked(b"\xFF\xFF\xFF\xFF\xFF", b"OggS\x00", "application/ogg"),
    masked(
        b"\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFF",
        b"MThd\x00\x00\x00\x06",
        "audio/midi",
    ),
    masked(
        b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        b"RIFF\x00\x00\x00\x00AVI ",
        "video/avi",
    ),
    masked(
        b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        b"RIFF\x00\x00\x00\x00WAVE",
        "audio/wave",
    ),
    Signature::Mp4,
    exact(b"\x1A\x45\xDF\xA3", "video/webm"),
    // Fonts
    exact(b"wOFF", "font/woff"),
    exact(b"wOF2", "font/woff2"),
    exact(b"OTTO", "font/otf"),
    exact(b"\x00\x01\x00\x00", "font/ttf"),
    exact(b"ttcf", "font/collection"),
    // Archives
    exact(b"\x1F\x8B\x08", "application/x-gzip"),
    exact(b"PK\x03\x04", "application/zip"),
    exact(b"Rar!\x1A\x07\x00", "application/x-rar-compressed"),
    exact(b"Rar!\x1A\x07\x01\x00", "application/x-rar-compressed"),
    exact(b"\x00\x61\x73\x6D", "application/wasm"),
    Signature::Text,
];

fn is_ws(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

fn is_tt(b: u8) -> bool {
    b == b' ' || b == b'>'
}

fn skip_ws(data: &[u8]) -> &[u8] {
    let start = data.iter().position(|b| !is_ws(*b)).unwrap_or(data.len());
    &data[start..]
}

impl Signature {
    fn matches(&self, data: &[u8]) -> Option<&'static str> {
        match self {
            Self::Html(tag) => {
                let data = skip_ws(data);
                if data.len() < tag.len() + 1 {
                    return None;
                }
                let prefix_matches = data
                    .iter()
                    .zip(tag.iter())
                    .all(|(d, t)| d.to_ascii_uppercase() == *t);
                (prefix_matches && is_tt(data[tag.len()])).then_some(HTML)
            }
            Self::Exact {
                pattern,
                skip_ws: ws,
                content_type,
            } => {
                let data = if *ws { skip_ws(data) } else { data };
                data.starts_with(pattern).then_some(*content_type)
            }
            Self::Masked {
                mask,
                pattern,
                content_type,
            } => {
                if data.len() < pattern.len() {
                    return None;
                }
                let matches = data
                    .iter()
                    .zip(mask.iter().zip(pattern.iter()))
                    .all(|(d, (m, p))| d & m == *p);
                matches.then_some(*content_type)
            }
            Self::Mp4 => is_mp4(data).then_some("video/mp4"),
            Self::Text => data
                .iter()
                .all(|b| !is_binary(*b))
                .then_some("text/plain; charset=utf-8"),
        }
    }
}

/// Check for an ISO base media file with an `mp4` brand.
fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if data.len() < box_size || box_size % 4 != 0 {
        return false;
    }
    if &data[4..8] != b"ftyp" {
        return false;
    }
    // Skip the minor version at offset 12
    (8..box_size)
        .step_by(4)
        .filter(|&st| st != 12)
        .any(|st| &data[st..st + 3] == b"mp4")
}

fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

/// Identify content from its leading bytes.
///
/// At most [`SNIFF_LEN`] bytes are considered. Always returns a valid type,
/// falling back to `application/octet-stream`.
pub(crate) fn detect_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];
    SIGNATURES
        .iter()
        .find_map(|sig| sig.matches(data))
        .unwrap_or(OCTET_STREAM)
}
