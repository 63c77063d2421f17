// ============================================================
// Layer 3 — Vocabulary Domain Type
// ============================================================
// Maps token strings to dense integer ids and back.
//
// The id of a token is its position in the token list, so a
// vocabulary file with one token per line gives:
//   line 0 → id 0, line 1 → id 1, ...
//
// Every vocabulary must carry an unknown-token entry. Characters
// that are not in the vocabulary resolve to it instead of
// failing, which is what makes perplexity over arbitrary text
// possible.
//
// Reference: Rust Book §8 (Hash Maps)

use std::collections::HashMap;

use crate::domain::error::LmError;

/// Accepted spellings of the unknown token, in lookup order.
/// BERT vocabularies use `[UNK]`; hand-written ones often `<UNK>`.
pub const UNKNOWN_TOKENS: [&str; 2] = ["[UNK]", "<UNK>"];

/// Padding token written first by `fit_corpus`.
pub const PAD_TOKEN: &str = "[PAD]";

#[derive(Debug, Clone)]
pub struct Vocabulary {
    tokens: Vec<String>,
    ids:    HashMap<String, u32>,
    unk_id: u32,
}

impl Vocabulary {
    /// Build a vocabulary from tokens in id order.
    ///
    /// Fails on a repeated token or when no unknown-token
    /// entry is present.
    pub fn from_tokens<I, S>(tokens: I) -> Result<Self, LmError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let mut ids = HashMap::with_capacity(tokens.len());

        for (line, token) in tokens.iter().enumerate() {
            if ids.insert(token.clone(), line as u32).is_some() {
                return Err(LmError::DuplicateVocabularyEntry {
                    token: token.clone(),
                    line,
                });
            }
        }

        let unk_id = UNKNOWN_TOKENS
            .iter()
            .find_map(|unk| ids.get(*unk).copied())
            .ok_or_else(|| LmError::MissingVocabularyEntry(UNKNOWN_TOKENS[0].to_string()))?;

        Ok(Self { tokens, ids, unk_id })
    }

    /// Derive a character vocabulary from a corpus:
    /// `[PAD]`, `[UNK]`, then every distinct character in the
    /// order it first appears.
    pub fn fit_corpus(corpus: &str) -> Self {
        let mut tokens = vec![PAD_TOKEN.to_string(), UNKNOWN_TOKENS[0].to_string()];
        let mut ids: HashMap<String, u32> = tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i as u32))
            .collect();

        for ch in corpus.chars().filter(|c| *c != '\n' && *c != '\r') {
            let token = ch.to_string();
            if !ids.contains_key(&token) {
                ids.insert(token.clone(), tokens.len() as u32);
                tokens.push(token);
            }
        }

        Self { tokens, ids, unk_id: 1 }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn id(&self, token: &str) -> Option<u32> {
        self.ids.get(token).copied()
    }

    /// Look up a token, falling back to the unknown-token id.
    pub fn id_or_unk(&self, token: &str) -> u32 {
        self.id(token).unwrap_or(self.unk_id)
    }

    pub fn char_id(&self, ch: char) -> u32 {
        let mut buf = [0u8; 4];
        self.id_or_unk(ch.encode_utf8(&mut buf))
    }

    /// One id per character of `text`; unknown characters map to `[UNK]`.
    pub fn encode_chars(&self, text: &str) -> Vec<u32> {
        text.chars().map(|ch| self.char_id(ch)).collect()
    }

    pub fn token(&self, id: u32) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    pub fn unk_id(&self) -> u32 {
        self.unk_id
    }

    pub fn unk_token(&self) -> &str {
        &self.tokens[self.unk_id as usize]
    }
}
