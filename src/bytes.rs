//! Conversions between text chunks, raw byte token ids, and printable token renderings.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::model::TokenId;

/// Number of single-byte tokens occupying ids `[0, 256)`.
pub const BYTE_VOCAB_SIZE: usize = 256;

/// Converts a chunk into its UTF-8 byte ids, each in `[0, 256)`.
#[must_use]
pub fn text_to_ids(chunk: &str) -> Vec<TokenId> {
    chunk.bytes().map(TokenId::from).collect()
}

/// Returns the base vocabulary: entry `id` is the single byte `id`.
#[must_use]
pub fn base_vocab() -> Vec<Vec<u8>> {
    (0u8..=u8::MAX).map(|b| vec![b]).collect()
}

fn control_chars() -> &'static Regex {
    static CONTROL: OnceLock<Regex> = OnceLock::new();
    CONTROL.get_or_init(|| Regex::new(r"\p{C}").expect("control character class compiles"))
}

/// Renders token bytes for human inspection.
///
/// Invalid UTF-8 is replaced with U+FFFD and every code point in the Unicode "Other" categories
/// (control, format, unassigned, private use) is escaped as `\uXXXX`. The rendering is lossy.
#[must_use]
pub fn render_token(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    control_chars()
        .replace_all(&text, |caps: &Captures<'_>| {
            caps[0]
                .chars()
                .map(|ch| format!("\\u{:04x}", u32::from(ch)))
                .collect::<String>()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_to_ids_uses_utf8_bytes() {
        assert_eq!(text_to_ids("ab"), vec![97, 98]);
        assert_eq!(text_to_ids("é"), vec![0xC3, 0xA9]);
        assert!(text_to_ids("").is_empty());
    }

    #[test]
    fn base_vocab_maps_each_id_to_its_byte() {
        let vocab = base_vocab();
        assert_eq!(vocab.len(), BYTE_VOCAB_SIZE);
        assert_eq!(vocab[0], vec![0]);
        assert_eq!(vocab[255], vec![255]);
    }

    #[test]
    fn render_token_escapes_control_characters() {
        assert_eq!(render_token(b"a\nb"), "a\\u000ab");
        assert_eq!(render_token(b"\t"), "\\u0009");
        assert_eq!(render_token("\u{feff}x".as_bytes()), "\\ufeffx");
        assert_eq!(render_token("hé".as_bytes()), "hé");
    }

    #[test]
    fn render_token_replaces_partial_utf8() {
        assert_eq!(render_token(&[0xC3]), "\u{fffd}");
    }
}
