// ============================================================
// Layer 4 — Word Embedding Table
// ============================================================
// A read-only lookup from word → dense vector, loaded from the
// word2vec text format:
//
//   <word_count> <dim>          ← optional header line
//   <word> <v1> <v2> ... <vdim>
//   ...
//
// Files without the header (GloVe style) load too: the first
// line is simply treated as a data row.
//
// Sentence vectors are the arithmetic mean of the word vectors.
// Words missing from the table add a zero vector but still
// count in the denominator, so OOV-heavy sentences shrink
// toward the origin. That is a lossy approximation, kept on
// purpose to match how the clusters were originally ranked.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::error::LmError;

#[derive(Debug, Clone)]
pub struct WordEmbeddings {
    dim:            usize,
    index:          HashMap<String, usize>,
    values:         Vec<f32>,
    max_word_chars: usize,
}

impl WordEmbeddings {
    /// An empty table of the given dimension.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            index:          HashMap::new(),
            values:         Vec::new(),
            max_word_chars: 0,
        }
    }

    /// Add (or overwrite) one word vector.
    pub fn insert(&mut self, word: impl Into<String>, vector: &[f32]) -> Result<(), LmError> {
        if vector.len() != self.dim {
            return Err(LmError::InvalidHyperparameter(format!(
                "embedding has {} values, table dimension is {}",
                vector.len(),
                self.dim
            )));
        }

        let word = word.into();
        self.max_word_chars = self.max_word_chars.max(word.chars().count());
        match self.index.get(&word) {
            Some(&row) => {
                self.values[row * self.dim..(row + 1) * self.dim].copy_from_slice(vector);
            }
            None => {
                self.index.insert(word, self.index.len());
                self.values.extend_from_slice(vector);
            }
        }
        Ok(())
    }

    pub fn load_word2vec_text(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| LmError::artifact(path, e))
            .with_context(|| "Cannot open word-embedding table")?;
        let table = Self::parse_word2vec_text(&text)
            .map_err(|reason| LmError::artifact(path, reason))?;

        tracing::info!(
            "Word embeddings loaded: {} words × {} dims from '{}'",
            table.len(),
            table.dim(),
            path.display()
        );
        Ok(table)
    }

    /// Parse the word2vec text format. Returns a human-readable
    /// reason on malformed input.
    pub fn parse_word2vec_text(text: &str) -> Result<Self, String> {
        let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()).peekable();

        // A header is exactly two integers: "<count> <dim>"
        let mut declared_dim = None;
        if let Some((_, first)) = lines.peek() {
            let fields: Vec<&str> = first.split_whitespace().collect();
            if fields.len() == 2 {
                if let (Ok(_count), Ok(dim)) = (fields[0].parse::<usize>(), fields[1].parse::<usize>()) {
                    declared_dim = Some(dim);
                    lines.next();
                }
            }
        }

        let mut table: Option<Self> = declared_dim.map(Self::new);

        for (line_no, line) in lines {
            let mut fields = line.split_whitespace();
            let word = match fields.next() {
                Some(w) => w,
                None => continue,
            };
            let vector = fields
                .map(str::parse::<f32>)
                .collect::<Result<Vec<f32>, _>>()
                .map_err(|e| format!("line {}: {e}", line_no + 1))?;

            let table = table.get_or_insert_with(|| Self::new(vector.len()));
            table
                .insert(word, &vector)
                .map_err(|e| format!("line {}: {e}", line_no + 1))?;
        }

        match table {
            Some(t) if t.dim > 0 && !t.is_empty() => Ok(t),
            _ => Err("embedding table is empty".to_string()),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.index.contains_key(word)
    }

    /// Length in characters of the longest word in the table.
    pub fn max_word_chars(&self) -> usize {
        self.max_word_chars
    }

    pub fn vector(&self, word: &str) -> Option<&[f32]> {
        self.index
            .get(word)
            .map(|&row| &self.values[row * self.dim..(row + 1) * self.dim])
    }

    /// Mean of the word vectors; OOV words count as zeros.
    /// Returns None for an empty word list instead of dividing by zero.
    pub fn sentence_vector<S: AsRef<str>>(&self, words: &[S]) -> Option<Vec<f32>> {
        if words.is_empty() {
            return None;
        }

        let mut sum = vec![0.0f32; self.dim];
        for word in words {
            if let Some(v) = self.vector(word.as_ref()) {
                for (acc, x) in sum.iter_mut().zip(v) {
                    *acc += x;
                }
            }
        }

        let n = words.len() as f32;
        Some(sum.into_iter().map(|x| x / n).collect())
    }
}
