// ============================================================
// Layer 2 — BuildVocabUseCase
// ============================================================
// Derives a vocab.txt from a corpus when no pretrained
// vocabulary is at hand:
//
//   line 0: [PAD]
//   line 1: [UNK]
//   then every distinct corpus character, first-seen order

use anyhow::Result;

use crate::data::loader::{load_corpus, save_vocabulary, LineFileLoader};
use crate::domain::vocabulary::Vocabulary;

pub struct BuildVocabUseCase {
    corpus_path: String,
    vocab_path:  String,
}

impl BuildVocabUseCase {
    pub fn new(corpus_path: impl Into<String>, vocab_path: impl Into<String>) -> Self {
        Self { corpus_path: corpus_path.into(), vocab_path: vocab_path.into() }
    }

    /// Returns the vocabulary that was written.
    pub fn execute(&self) -> Result<Vocabulary> {
        let corpus = load_corpus(&LineFileLoader::new(&self.corpus_path))?;
        let vocab  = Vocabulary::fit_corpus(&corpus);
        save_vocabulary(&vocab, &self.vocab_path)?;
        tracing::info!("Wrote {} tokens to '{}'", vocab.len(), self.vocab_path);
        Ok(vocab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::load_vocabulary;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_written_vocabulary_reloads() {
        let dir    = tempdir().unwrap();
        let corpus = dir.path().join("corpus.txt");
        let vocab  = dir.path().join("out/vocab.txt");
        fs::write(&corpus, "李慕站在\n山路上，李慕\n").unwrap();

        let built = BuildVocabUseCase::new(
            corpus.to_string_lossy(),
            vocab.to_string_lossy(),
        )
        .execute()
        .unwrap();

        let loaded = load_vocabulary(&vocab).unwrap();
        assert_eq!(loaded.tokens(), built.tokens());
        assert_eq!(&loaded.tokens()[..4], &["[PAD]", "[UNK]", "李", "慕"]);
        assert_eq!(loaded.len(), 2 + 8);
    }
}
