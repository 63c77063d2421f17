// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between the application layer and the concrete
// data sources / text processors it drives.
//
// The use cases only see these traits, so a test can hand in
// an in-memory source or a trivial segmenter without touching
// the filesystem or an embedding table.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

// ─── LineSource ───────────────────────────────────────────────────────────────
/// Anything that yields text one line at a time.
///
/// Implementations:
///   - LineFileLoader → reads a UTF-8 file from disk
pub trait LineSource {
    /// Read every line, with trailing line terminators removed.
    fn load_lines(&self) -> Result<Vec<String>>;
}

// ─── Segmenter ────────────────────────────────────────────────────────────────
/// Splits a raw sentence into words.
///
/// Implementations:
///   - JiebaSegmenter      → jieba-rs, HMM on, optional user dictionary
///   - DictionarySegmenter → forward maximum matching against
///                           the word-embedding vocabulary
pub trait Segmenter {
    fn segment(&self, sentence: &str) -> Vec<String>;
}
