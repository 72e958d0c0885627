//! Facilities for discovering local text files and loading them as one training corpus.
//!
//! Fetching corpora from remote services and cleaning their text are the caller's concern; this
//! module only reads UTF-8 files that are already prepared.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::error::{BpeError, Result};

/// Discovers files rooted at the provided input paths according to the corpus configuration.
///
/// Directories are traversed recursively by default; set [`CorpusConfig::recursive`] to `false`
/// to limit discovery to the first level. Files found under a directory are sorted so the
/// resulting corpus does not depend on directory iteration order.
pub fn collect_paths<P: AsRef<Path>>(inputs: &[P], cfg: &CorpusConfig) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let path = input.as_ref();
        if !path.exists() {
            return Err(BpeError::InvalidConfig(format!(
                "input path {path:?} does not exist"
            )));
        }
        if path.is_dir() {
            let depth = if cfg.recursive { usize::MAX } else { 1 };
            let mut found = Vec::new();
            for entry in WalkDir::new(path)
                .max_depth(depth)
                .follow_links(cfg.follow_symlinks)
            {
                let entry = entry.map_err(|err| {
                    let path = err.path().map(Path::to_path_buf);
                    let source = err
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory traversal loop"));
                    BpeError::io(source, path)
                })?;
                if entry.file_type().is_file() {
                    found.push(entry.into_path());
                }
            }
            found.sort();
            files.extend(found);
        } else {
            files.push(path.to_path_buf());
        }
    }
    if files.is_empty() {
        return Err(BpeError::InvalidConfig(
            "no input files were found".into(),
        ));
    }
    Ok(files)
}

/// Reads every discovered file as UTF-8 and joins the documents with [`CorpusConfig::separator`].
pub fn load_text_corpus<P: AsRef<Path>>(inputs: &[P], cfg: &CorpusConfig) -> Result<String> {
    let paths = collect_paths(inputs, cfg)?;
    let mut corpus = String::new();
    for (index, path) in paths.iter().enumerate() {
        let text = fs::read_to_string(path).map_err(|err| BpeError::io(err, Some(path.clone())))?;
        if index > 0 {
            corpus.push_str(&cfg.separator);
        }
        corpus.push_str(&text);
    }
    debug!(
        "loaded {} documents totalling {} bytes",
        paths.len(),
        corpus.len()
    );
    Ok(corpus)
}
