//! Minimal text model format.
//!
//! ```text
//! <segmentation pattern>
//! <special token literals, space separated, possibly empty>
//! <left id> <right id>        # merge producing id 256
//! <left id> <right id>        # merge producing id 257
//! ...
//! ```
//!
//! Merge ids are implicit: the n-th merge line always yields `256 + n - 1`. Special tokens are
//! re-registered after the last merge in the order they are listed.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;
use rustc_hash::FxHashSet;

use crate::bytes::BYTE_VOCAB_SIZE;
use crate::error::{BpeError, Result};
use crate::model::{BpeModel, Pair, TokenId};
use crate::segment::Segmenter;

/// File extension of reloadable model files.
pub const MODEL_EXTENSION: &str = "bpe";

/// Returns `prefix` with the `.bpe` extension appended unless it already ends with it.
#[must_use]
pub fn model_path<P: AsRef<Path>>(prefix: P) -> PathBuf {
    let prefix = prefix.as_ref();
    if has_model_extension(prefix) {
        return prefix.to_path_buf();
    }
    let mut path = OsString::from(prefix.as_os_str());
    path.push(".");
    path.push(MODEL_EXTENSION);
    PathBuf::from(path)
}

fn has_model_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == MODEL_EXTENSION)
}

fn ensure_single_line_pattern(model: &BpeModel) -> Result<()> {
    if model.pattern().contains(|ch: char| ch == '\n' || ch == '\r') {
        return Err(BpeError::InvalidConfig(
            "pattern with line breaks cannot be stored in a model file".into(),
        ));
    }
    Ok(())
}

fn write_lines<W: Write>(model: &BpeModel, writer: &mut W) -> io::Result<()> {
    writeln!(writer, "{}", model.pattern())?;
    writeln!(writer, "{}", model.special_tokens().literals().join(" "))?;
    for &(left, right) in model.merges() {
        writeln!(writer, "{left} {right}")?;
    }
    writer.flush()
}

/// Writes the model file contents to `writer`.
pub fn write_model<W: Write>(model: &BpeModel, writer: &mut W) -> Result<()> {
    ensure_single_line_pattern(model)?;
    write_lines(model, writer).map_err(|err| BpeError::io(err, None))
}

/// Writes the model file to `path`.
pub fn save_model<P: AsRef<Path>>(model: &BpeModel, path: P) -> Result<()> {
    let path = path.as_ref();
    ensure_single_line_pattern(model)?;
    let file = File::create(path).map_err(|err| BpeError::io(err, Some(path.to_path_buf())))?;
    let mut writer = BufWriter::new(file);
    write_lines(model, &mut writer).map_err(|err| BpeError::io(err, Some(path.to_path_buf())))?;
    debug!(
        "wrote model with {} merges to {}",
        model.merges().len(),
        path.display()
    );
    Ok(())
}

/// Loads a model file; the path must carry the `.bpe` extension.
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<BpeModel> {
    let path = path.as_ref();
    if !has_model_extension(path) {
        return Err(BpeError::InvalidConfig(format!(
            "model files must use the .{MODEL_EXTENSION} extension: {}",
            path.display()
        )));
    }
    let contents =
        fs::read_to_string(path).map_err(|err| BpeError::io(err, Some(path.to_path_buf())))?;
    let model = parse_model(&contents)?;
    debug!(
        "loaded model with {} merges and {} special tokens from {}",
        model.merges().len(),
        model.special_tokens().len(),
        path.display()
    );
    Ok(model)
}

/// Parses model file contents. Any malformed or truncated input fails as a whole.
pub fn parse_model(contents: &str) -> Result<BpeModel> {
    let mut lines = contents.lines();
    let pattern = lines
        .next()
        .ok_or_else(|| BpeError::parse(1, "missing pattern line"))?;
    let segmenter = Segmenter::new(pattern)
        .map_err(|err| BpeError::parse(1, format!("invalid pattern: {err}")))?;
    let specials: Vec<&str> = lines
        .next()
        .ok_or_else(|| BpeError::parse(2, "missing special token line"))?
        .split_whitespace()
        .collect();

    let mut merges: Vec<Pair> = Vec::new();
    let mut seen: FxHashSet<Pair> = FxHashSet::default();
    for (offset, line) in lines.enumerate() {
        let line_no = offset + 3;
        let pair = parse_merge(line, line_no, BYTE_VOCAB_SIZE + merges.len())?;
        if !seen.insert(pair) {
            return Err(BpeError::parse(
                line_no,
                format!("pair ({}, {}) is merged more than once", pair.0, pair.1),
            ));
        }
        merges.push(pair);
    }

    let mut model = BpeModel::from_merges(segmenter, merges)?;
    model
        .register_special_tokens(specials)
        .map_err(|err| BpeError::parse(2, err.to_string()))?;
    Ok(model)
}

fn parse_merge(line: &str, line_no: usize, known: usize) -> Result<Pair> {
    let mut fields = line.split_whitespace();
    let (Some(left), Some(right), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(BpeError::parse(
            line_no,
            format!("expected two token ids, found {line:?}"),
        ));
    };
    let parse_id = |field: &str| -> Result<TokenId> {
        let id = field
            .parse::<TokenId>()
            .map_err(|err| BpeError::parse(line_no, format!("invalid token id `{field}`: {err}")))?;
        if id as usize >= known {
            return Err(BpeError::parse(
                line_no,
                format!("token id {id} is not defined before this merge"),
            ));
        }
        Ok(id)
    };
    Ok((parse_id(left)?, parse_id(right)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::DEFAULT_PATTERN;
    use tempfile::tempdir;

    fn sample_model() -> BpeModel {
        let mut model =
            BpeModel::from_merges(Segmenter::default(), vec![(97, 97), (256, 98)]).unwrap();
        model
            .register_special_tokens(["<|end|>", "<|pad|>"])
            .unwrap();
        model
    }

    #[test]
    fn model_path_appends_extension_once() {
        assert_eq!(model_path("out/tok"), PathBuf::from("out/tok.bpe"));
        assert_eq!(model_path("out/tok.bpe"), PathBuf::from("out/tok.bpe"));
        assert_eq!(model_path("tok.v2"), PathBuf::from("tok.v2.bpe"));
    }

    #[test]
    fn write_model_emits_header_then_merges() {
        let mut buffer = Vec::new();
        write_model(&sample_model(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let expected = format!("{DEFAULT_PATTERN}\n<|end|> <|pad|>\n97 97\n256 98\n");
        assert_eq!(text, expected);
    }

    #[test]
    fn save_then_load_restores_model() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bpe");
        let model = sample_model();
        save_model(&model, &path).unwrap();
        let loaded = load_model(&path).unwrap();
        assert_eq!(loaded.pattern(), model.pattern());
        assert_eq!(loaded.merges(), model.merges());
        assert_eq!(loaded.token_bytes(), model.token_bytes());
        assert_eq!(loaded.special_tokens().id("<|pad|>"), Some(259));
    }

    #[test]
    fn header_only_file_yields_byte_level_model() {
        let model = parse_model("\\p{L}+\n\n").unwrap();
        assert_eq!(model.pattern(), "\\p{L}+");
        assert!(model.merges().is_empty());
        assert!(model.special_tokens().is_empty());
        assert_eq!(model.vocab_size(), 256);
    }

    #[test]
    fn truncated_headers_are_rejected() {
        assert!(matches!(parse_model(""), Err(BpeError::Parse { line: 1, .. })));
        assert!(matches!(
            parse_model("\\p{L}+"),
            Err(BpeError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn malformed_merge_lines_are_rejected() {
        for (contents, line) in [
            ("x\n\n97 x\n", 3),
            ("x\n\n97 97\n98\n", 4),
            ("x\n\n97 97 97\n", 3),
            ("x\n\n97 257\n", 3),
            ("x\n\n97 97\n97 97\n", 4),
            ("x\n\n\n", 3),
        ] {
            match parse_model(contents) {
                Err(BpeError::Parse { line: found, .. }) => assert_eq!(found, line, "{contents:?}"),
                other => panic!("expected parse error for {contents:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn duplicate_special_tokens_in_file_are_rejected() {
        assert!(matches!(
            parse_model("x\n<|a|> <|a|>\n"),
            Err(BpeError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn load_requires_model_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.txt");
        fs::write(&path, "x\n\n").unwrap();
        assert!(matches!(load_model(&path), Err(BpeError::InvalidConfig(_))));
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.bpe");
        match load_model(&path) {
            Err(BpeError::Io { path: Some(found), .. }) => assert_eq!(found, path),
            other => panic!("expected io error, got {other:?}"),
        }
    }
}
