// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Builds, saves and loads the character tokenizer.
//
// The tokenizer is a HuggingFace `tokenizers` WordLevel model
// whose vocabulary is exactly our Vocabulary, with a
// pre-tokenizer that isolates every single character:
//
//   "李慕站" → pre-tokenize → ["李", "慕", "站"] → ids
//
// so one character always maps to one id, and the id of a
// token is its line in vocab.txt.
//
// The JSON is written by hand (same layout Tokenizer::from_file
// expects) instead of going through a trainer, because the
// vocabulary is fixed up front.
//
// The tokenizer is built ONCE per process and handed around as
// a `CharTokenizer` value — nothing reloads it per call.
//
// Reference: tokenizers crate documentation

use anyhow::{anyhow, Context, Result};
use std::{fs, path::{Path, PathBuf}, str::FromStr, sync::Arc};
use tokenizers::Tokenizer;

use crate::domain::error::LmError;
use crate::domain::vocabulary::Vocabulary;

const TOKENIZER_FILE: &str = "tokenizer.json";

// ─── CharTokenizer ────────────────────────────────────────────────────────────
/// Explicitly passed tokenizer handle: the compiled HF tokenizer
/// plus the vocabulary it was built from. Cheap to clone.
#[derive(Clone, Debug)]
pub struct CharTokenizer {
    inner: Arc<Tokenizer>,
    vocab: Arc<Vocabulary>,
}

impl CharTokenizer {
    /// Compile a tokenizer in memory from a vocabulary.
    pub fn from_vocabulary(vocab: Vocabulary) -> Result<Self> {
        let json  = tokenizer_json(&vocab);
        let inner = Tokenizer::from_str(&serde_json::to_string(&json)?)
            .map_err(|e| anyhow!("Cannot build tokenizer: {e}"))?;
        Ok(Self { inner: Arc::new(inner), vocab: Arc::new(vocab) })
    }

    /// Wrap a loaded HF tokenizer, recovering the vocabulary
    /// from its id table. Ids must be dense from 0.
    fn from_tokenizer(inner: Tokenizer) -> Result<Self> {
        let mut entries: Vec<(String, u32)> = inner.get_vocab(false).into_iter().collect();
        entries.sort_by_key(|(_, id)| *id);

        if let Some((pos, (token, id))) = entries
            .iter()
            .enumerate()
            .find(|(pos, (_, id))| *id as usize != *pos)
        {
            return Err(anyhow!(
                "tokenizer ids are not dense: token {token:?} has id {id}, expected {pos}"
            ));
        }

        let vocab = Vocabulary::from_tokens(entries.into_iter().map(|(t, _)| t))?;
        Ok(Self { inner: Arc::new(inner), vocab: Arc::new(vocab) })
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    /// One id per character, line breaks included.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let enc = self
            .inner
            .encode(text, false)
            .map_err(|e| anyhow!("Tokenisation error: {e}"))?;
        let ids = enc.get_ids();

        let chars = text.chars().count();
        if ids.len() != chars {
            return Err(anyhow!(
                "Tokeniser produced {} ids for {chars} characters",
                ids.len()
            ));
        }
        Ok(ids.to_vec())
    }

    /// The text of a single token. WordPiece continuation
    /// markers (`##`) from BERT vocabularies are stripped.
    pub fn decode(&self, id: u32) -> String {
        match self.vocab.token(id) {
            Some(token) => token
                .strip_prefix("##")
                .filter(|rest| !rest.is_empty())
                .unwrap_or(token)
                .to_string(),
            None => self.vocab.unk_token().to_string(),
        }
    }

    fn save(&self, path: &Path) -> Result<()> {
        self.inner
            .save(path, true)
            .map_err(|e| anyhow!("Cannot write tokenizer to '{}': {e}", path.display()))
    }
}

/// WordLevel model over the vocabulary, one split per character.
fn tokenizer_json(vocab: &Vocabulary) -> serde_json::Value {
    let ids: serde_json::Map<String, serde_json::Value> = vocab
        .tokens()
        .iter()
        .enumerate()
        .map(|(id, token)| (token.clone(), serde_json::json!(id)))
        .collect();

    serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": {
            "type": "Split",
            "pattern": { "Regex": "[\\s\\S]" },
            "behavior": "Isolated",
            "invert": false
        },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": ids,
            "unk_token": vocab.unk_token()
        }
    })
}

// ─── TokenizerStore ───────────────────────────────────────────────────────────
pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    /// Build a tokenizer from the vocabulary and persist it so
    /// later `generate` / `perplexity` runs use identical ids.
    pub fn build_and_save(&self, vocab: Vocabulary) -> Result<CharTokenizer> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let tokenizer = CharTokenizer::from_vocabulary(vocab)?;
        tokenizer.save(&self.path())?;

        tracing::info!(
            "Tokenizer built with {} tokens, saved to '{}'",
            tokenizer.vocab_size(),
            self.path().display()
        );
        Ok(tokenizer)
    }

    /// Load the tokenizer written by a previous training run.
    pub fn load(&self) -> Result<CharTokenizer> {
        let path  = self.path();
        let inner = Tokenizer::from_file(&path).map_err(|e| LmError::artifact(&path, e))?;
        CharTokenizer::from_tokenizer(inner)
            .with_context(|| format!("Invalid tokenizer '{}'", path.display()))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn vocab() -> Vocabulary {
        Vocabulary::from_tokens(["[PAD]", "[UNK]", "李", "慕", "a", "##b", " "]).unwrap()
    }

    #[test]
    fn test_one_id_per_character() {
        let tok = CharTokenizer::from_vocabulary(vocab()).unwrap();
        let ids = tok.encode("李慕a 李").unwrap();
        assert_eq!(ids, vec![2, 3, 4, 6, 2]);
    }

    #[test]
    fn test_line_breaks_are_characters_too() {
        let tok = CharTokenizer::from_vocabulary(vocab()).unwrap();
        assert_eq!(tok.encode("a\n\n\na").unwrap(), vec![4, 1, 1, 1, 4]);
        assert_eq!(tok.encode("a\r\n").unwrap().len(), 3);
        assert_eq!(
            tok.encode("李\n慕").unwrap(),
            tok.vocab().encode_chars("李\n慕")
        );
    }

    #[test]
    fn test_unknown_characters_map_to_unk() {
        let tok = CharTokenizer::from_vocabulary(vocab()).unwrap();
        let ids = tok.encode("李x慕").unwrap();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_encoding_agrees_with_vocabulary_lookup() {
        let v   = vocab();
        let tok = CharTokenizer::from_vocabulary(v.clone()).unwrap();
        let text = "a李zz 慕";
        assert_eq!(tok.encode(text).unwrap(), v.encode_chars(text));
    }

    #[test]
    fn test_decode_strips_wordpiece_marker() {
        let tok = CharTokenizer::from_vocabulary(vocab()).unwrap();
        assert_eq!(tok.decode(5), "b");
        assert_eq!(tok.decode(2), "李");
        assert_eq!(tok.decode(999), "[UNK]");
    }

    #[test]
    fn test_save_and_load_preserves_ids() {
        let dir   = tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());

        let built  = store.build_and_save(vocab()).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded.vocab().tokens(), built.vocab().tokens());
        assert_eq!(loaded.encode("慕李").unwrap(), vec![3, 2]);
    }

    #[test]
    fn test_missing_tokenizer_is_artifact_failure() {
        let dir = tempdir().unwrap();
        let err = TokenizerStore::new(dir.path()).load().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LmError>(),
            Some(LmError::ArtifactLoadFailure { .. })
        ));
    }
}
