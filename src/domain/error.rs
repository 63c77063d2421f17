// ============================================================
// Layer 3 — Domain Errors
// ============================================================
// The failure kinds both pipelines report to their callers.
//
// Application code wraps these in anyhow::Error with extra
// context (which file, which command), so the enum only has
// to say WHAT went wrong, not where.
//
// Reference: Rust Book §9 (Error Handling)
//            thiserror crate documentation

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmError {
    /// A token the pipeline cannot work without is absent
    /// from the vocabulary (e.g. the unknown-token entry).
    #[error("vocabulary has no entry for required token {0:?}")]
    MissingVocabularyEntry(String),

    /// The same token appears on two lines of the vocabulary file,
    /// which would break the "line order = id" contract.
    #[error("vocabulary token {token:?} repeated on line {line}")]
    DuplicateVocabularyEntry { token: String, line: usize },

    /// Nothing to condition on: the input window would be empty.
    #[error("input window is empty; need at least two characters to score")]
    EmptyInputWindow,

    /// A model, tokenizer or embedding artifact could not be read.
    #[error("failed to load artifact '{path}': {reason}")]
    ArtifactLoadFailure { path: PathBuf, reason: String },

    #[error("corpus has {len} characters but window {window} needs at least {}", .window + 1)]
    CorpusTooShort { len: usize, window: usize },

    #[error("invalid hyperparameter: {0}")]
    InvalidHyperparameter(String),

    #[error("no sentences left to cluster")]
    NoSentences,
}

impl LmError {
    pub fn artifact(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ArtifactLoadFailure {
            path:   path.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corpus_too_short_message_names_requirement() {
        let err = LmError::CorpusTooShort { len: 3, window: 10 };
        assert_eq!(
            err.to_string(),
            "corpus has 3 characters but window 10 needs at least 11"
        );
    }

    #[test]
    fn test_artifact_helper_keeps_path() {
        let err = LmError::artifact("model/encoder.mpk", "not found");
        match err {
            LmError::ArtifactLoadFailure { path, reason } => {
                assert_eq!(path, PathBuf::from("model/encoder.mpk"));
                assert_eq!(reason, "not found");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
