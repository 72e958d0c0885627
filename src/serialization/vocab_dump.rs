//! Human-readable vocabulary listing. Rendering is lossy, so the dump is never read back.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::bytes::{render_token, BYTE_VOCAB_SIZE};
use crate::error::{BpeError, Result};
use crate::model::BpeModel;

/// File extension of vocabulary dumps.
pub const VOCAB_EXTENSION: &str = "vocab";

/// Returns the dump path for a save prefix by appending `.vocab`, so `tok` maps to `tok.vocab`
/// and `tok.bpe` to `tok.bpe.vocab`.
#[must_use]
pub fn vocab_path<P: AsRef<Path>>(prefix: P) -> PathBuf {
    let mut path = OsString::from(prefix.as_ref().as_os_str());
    path.push(".");
    path.push(VOCAB_EXTENSION);
    PathBuf::from(path)
}

/// Writes one line per id: `[left][right] -> [merged] id` for merges, `[token] id` otherwise.
pub fn write_vocab<W: Write>(model: &BpeModel, writer: &mut W) -> io::Result<()> {
    let merges = model.merges();
    for (id, token) in model.token_bytes().iter().enumerate() {
        let rendered = render_token(token);
        let merge = id
            .checked_sub(BYTE_VOCAB_SIZE)
            .and_then(|index| merges.get(index));
        match merge {
            Some(&(left, right)) => {
                let left = render_token(&model.token_bytes()[left as usize]);
                let right = render_token(&model.token_bytes()[right as usize]);
                writeln!(writer, "[{left}][{right}] -> [{rendered}] {id}")?;
            }
            None => writeln!(writer, "[{rendered}] {id}")?,
        }
    }
    writer.flush()
}

/// Writes the vocabulary dump to `path`.
pub fn save_vocab<P: AsRef<Path>>(model: &BpeModel, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|err| BpeError::io(err, Some(path.to_path_buf())))?;
    let mut writer = BufWriter::new(file);
    write_vocab(model, &mut writer).map_err(|err| BpeError::io(err, Some(path.to_path_buf())))?;
    debug!(
        "wrote {} vocabulary entries to {}",
        model.vocab_size(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Segmenter;

    #[test]
    fn vocab_path_appends_extension_to_prefix() {
        assert_eq!(vocab_path("tok"), PathBuf::from("tok.vocab"));
        assert_eq!(vocab_path("out/tok.bpe"), PathBuf::from("out/tok.bpe.vocab"));
    }

    #[test]
    fn dump_renders_leaves_merges_and_specials() {
        let mut model = BpeModel::from_merges(Segmenter::default(), vec![(104, 105), (10, 10)])
            .unwrap();
        model.register_special_tokens(["<|end|>"]).unwrap();
        let mut buffer = Vec::new();
        write_vocab(&model, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 259);
        assert_eq!(lines[0], "[\\u0000] 0");
        assert_eq!(lines[97], "[a] 97");
        assert_eq!(lines[256], "[h][i] -> [hi] 256");
        assert_eq!(lines[257], "[\\u000a][\\u000a] -> [\\u000a\\u000a] 257");
        assert_eq!(lines[258], "[<|end|>] 258");
    }

    #[test]
    fn partial_utf8_bytes_render_as_replacement_character() {
        let model = BpeModel::from_merges(Segmenter::default(), Vec::new()).unwrap();
        let mut buffer = Vec::new();
        write_vocab(&model, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().nth(200), Some("[\u{fffd}] 200"));
    }
}
