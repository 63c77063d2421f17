// ============================================================
// Layer 4 — Text File Loaders
// ============================================================
// Reads the three plain-text inputs the pipelines consume:
//
//   vocabulary file  → one token per line, line order = id
//   corpus file      → lines trimmed and glued together into
//                      one long character stream
//   sentence file    → one sentence per line (clusterer input)
//
// All reads go through fs::read_to_string, so each file is
// opened, fully consumed and closed before we return — on the
// error path too.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (Reading a File)

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};

use crate::data::preprocessor::Preprocessor;
use crate::domain::traits::LineSource;
use crate::domain::vocabulary::Vocabulary;

/// Reads a UTF-8 text file line by line.
/// Implements the LineSource trait from Layer 3.
pub struct LineFileLoader {
    path: PathBuf,
}

impl LineFileLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LineSource for LineFileLoader {
    fn load_lines(&self) -> Result<Vec<String>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read '{}'", self.path.display()))?;

        // str::lines() strips both "\n" and "\r\n" terminators,
        // but keeps every other character — vocabulary tokens
        // may legitimately be a single space.
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        tracing::debug!("Read {} lines from '{}'", lines.len(), self.path.display());
        Ok(lines)
    }
}

/// Load a vocabulary file: one token per line, id = line number.
pub fn load_vocabulary(path: impl AsRef<Path>) -> Result<Vocabulary> {
    let path  = path.as_ref();
    let lines = LineFileLoader::new(path).load_lines()?;
    let vocab = Vocabulary::from_tokens(lines)
        .with_context(|| format!("Invalid vocabulary file '{}'", path.display()))?;
    tracing::info!("Vocabulary loaded: {} tokens from '{}'", vocab.len(), path.display());
    Ok(vocab)
}

/// Write a vocabulary back out in the same one-token-per-line format.
pub fn save_vocabulary(vocab: &Vocabulary, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create '{}'", parent.display()))?;
    }

    let mut body = vocab.tokens().join("\n");
    body.push('\n');
    fs::write(path, body)
        .with_context(|| format!("Cannot write vocabulary to '{}'", path.display()))?;
    Ok(())
}

/// Load a training corpus as a single flattened string.
/// Every line is cleaned and trimmed, then concatenated with
/// no separator — line breaks carry no meaning for the model.
pub fn load_corpus(source: &dyn LineSource) -> Result<String> {
    let lines  = source.load_lines()?;
    let corpus = Preprocessor::new().flatten(&lines);
    tracing::info!("Corpus loaded: {} characters", corpus.chars().count());
    Ok(corpus)
}

/// Load clusterer input: one cleaned sentence per non-blank line.
pub fn load_sentences(source: &dyn LineSource) -> Result<Vec<String>> {
    let prep = Preprocessor::new();
    let sentences: Vec<String> = source
        .load_lines()?
        .iter()
        .map(|line| prep.clean_line(line))
        .filter(|line| !line.is_empty())
        .collect();
    tracing::info!("Loaded {} sentences", sentences.len());
    Ok(sentences)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_vocabulary_round_trip_through_file() {
        let dir   = tempdir().unwrap();
        let path  = dir.path().join("vocab").join("vocab.txt");
        let vocab = Vocabulary::fit_corpus("hello world");

        save_vocabulary(&vocab, &path).unwrap();
        let loaded = load_vocabulary(&path).unwrap();

        assert_eq!(loaded.tokens(), vocab.tokens());
        // the space character survives as its own line
        assert!(loaded.id(" ").is_some());
    }

    #[test]
    fn test_corpus_ignores_line_breaks() {
        let dir  = tempdir().unwrap();
        let path = dir.path().join("corpus.txt");
        fs::write(&path, "  abc \r\ndef\n\n  gh\n").unwrap();

        let corpus = load_corpus(&LineFileLoader::new(&path)).unwrap();
        assert_eq!(corpus, "abcdefgh");
    }

    #[test]
    fn test_sentences_skip_blank_lines() {
        let dir  = tempdir().unwrap();
        let path = dir.path().join("titles.txt");
        fs::write(&path, "first title\n\n   \n second title \n").unwrap();

        let sentences = load_sentences(&LineFileLoader::new(&path)).unwrap();
        assert_eq!(sentences, vec!["first title", "second title"]);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = LineFileLoader::new("/definitely/not/here.txt")
            .load_lines()
            .unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.txt"));
    }
}
