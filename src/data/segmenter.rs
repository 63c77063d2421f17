// ============================================================
// Layer 4 — Sentence Segmenter
// ============================================================
// Splits sentences into words for the embedding clusterer.
//
// Chinese titles have no spaces between words, so whitespace
// splitting alone is not enough. Two segmenters:
//
//   JiebaSegmenter      — jieba's prefix dictionary + HMM for
//                         unseen words (the default)
//   DictionarySegmenter — forward maximum matching against the
//                         embedding table's own vocabulary
//
// Forward maximum matching, step by step:
//
//   dictionary: {今天, 天气, 很好}
//   input:      今天天气很好
//   step 1: longest known prefix at 0 → 今天
//   step 2: longest known prefix at 2 → 天气
//   step 3: longest known prefix at 4 → 很好
//   result:  [今天, 天气, 很好]
//
// Segmenting against the same table that later supplies the
// vectors maximises the number of in-vocabulary words, which
// helps when the table was not trained on jieba's segmentation.
//
// Fallbacks when nothing in the dictionary matches:
//   - a run of ASCII letters/digits stays one word ("GPU", "2024")
//   - any other character becomes a single-character word
//
// Whitespace always separates words.

use std::{
    collections::BTreeSet,
    fs::File,
    io::BufReader,
    path::Path,
};

use anyhow::Result;
use jieba_rs::Jieba;
use serde::{Deserialize, Serialize};

use crate::data::embeddings::WordEmbeddings;
use crate::domain::{error::LmError, traits::Segmenter};

/// Which segmenter the clusterer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SegmenterKind {
    #[default]
    Jieba,
    Dictionary,
}

// ─── JiebaSegmenter ───────────────────────────────────────────────────────────
pub struct JiebaSegmenter {
    jieba: Jieba,
}

impl JiebaSegmenter {
    /// jieba's bundled dictionary, HMM on for unseen words.
    pub fn new() -> Self {
        Self { jieba: Jieba::new() }
    }

    /// Add a jieba-format user dictionary (`word [freq] [tag]` per line).
    pub fn with_user_dict(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| LmError::artifact(path, e))?;
        self.jieba
            .load_dict(&mut BufReader::new(file))
            .map_err(|e| LmError::artifact(path, e))?;
        tracing::info!("Loaded jieba user dictionary '{}'", path.display());
        Ok(self)
    }
}

impl Default for JiebaSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter for JiebaSegmenter {
    /// Whitespace pieces jieba emits are dropped.
    fn segment(&self, sentence: &str) -> Vec<String> {
        self.jieba
            .cut(sentence, true)
            .into_iter()
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect()
    }
}

// ─── DictionarySegmenter ──────────────────────────────────────────────────────

/// Longest dictionary word we ever try to match, in characters.
const MAX_MATCH_CHARS: usize = 8;

pub struct DictionarySegmenter<'a> {
    dictionary: &'a WordEmbeddings,
    max_chars:  usize,
}

impl<'a> DictionarySegmenter<'a> {
    pub fn new(dictionary: &'a WordEmbeddings) -> Self {
        let max_chars = dictionary.max_word_chars().clamp(1, MAX_MATCH_CHARS);
        Self { dictionary, max_chars }
    }

    fn segment_chunk(&self, chunk: &str, out: &mut Vec<String>) {
        let chars: Vec<char> = chunk.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            let longest = self.max_chars.min(chars.len() - i);
            let matched = (2..=longest).rev().find_map(|len| {
                let candidate: String = chars[i..i + len].iter().collect();
                self.dictionary.contains(&candidate).then_some((candidate, len))
            });

            if let Some((word, len)) = matched {
                out.push(word);
                i += len;
                continue;
            }

            if chars[i].is_ascii_alphanumeric() {
                let run = chars[i..]
                    .iter()
                    .take_while(|c| c.is_ascii_alphanumeric())
                    .count();
                out.push(chars[i..i + run].iter().collect());
                i += run;
            } else {
                out.push(chars[i].to_string());
                i += 1;
            }
        }
    }
}

impl Segmenter for DictionarySegmenter<'_> {
    fn segment(&self, sentence: &str) -> Vec<String> {
        let mut words = Vec::new();
        for chunk in sentence.split_whitespace() {
            self.segment_chunk(chunk, &mut words);
        }
        words
    }
}

/// Segment every sentence and collapse exact duplicates.
///
/// Each entry is the sentence's words joined by single spaces.
/// Set semantics: input order is not preserved (entries come
/// back sorted, which keeps runs reproducible).
pub fn segment_unique<S: AsRef<str>>(sentences: &[S], segmenter: &dyn Segmenter) -> BTreeSet<String> {
    sentences
        .iter()
        .map(|s| segmenter.segment(s.as_ref()).join(" "))
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary() -> WordEmbeddings {
        WordEmbeddings::parse_word2vec_text(
            "4 1\n今天 1\n天气 2\n很好 3\n天气预报 4\n",
        )
        .unwrap()
    }

    #[test]
    fn test_forward_maximum_matching() {
        let dict = dictionary();
        let seg  = DictionarySegmenter::new(&dict);
        assert_eq!(seg.segment("今天天气很好"), vec!["今天", "天气", "很好"]);
    }

    #[test]
    fn test_prefers_longest_match() {
        let dict = dictionary();
        let seg  = DictionarySegmenter::new(&dict);
        assert_eq!(seg.segment("天气预报"), vec!["天气预报"]);
    }

    #[test]
    fn test_unknown_characters_fall_back() {
        let dict = dictionary();
        let seg  = DictionarySegmenter::new(&dict);
        assert_eq!(seg.segment("今天GPU2024降价"), vec!["今天", "GPU2024", "降", "价"]);
    }

    #[test]
    fn test_whitespace_separates_words() {
        let dict = dictionary();
        let seg  = DictionarySegmenter::new(&dict);
        assert_eq!(seg.segment("  hello  world "), vec!["hello", "world"]);
        assert!(seg.segment("   ").is_empty());
    }

    #[test]
    fn test_jieba_segments_known_words() {
        let seg = JiebaSegmenter::new();
        assert_eq!(seg.segment("我来到北京清华大学"), vec!["我", "来到", "北京", "清华大学"]);
        assert_eq!(seg.segment("我们中出了一个叛徒"), vec!["我们", "中出", "了", "一个", "叛徒"]);
    }

    #[test]
    fn test_jieba_drops_whitespace_pieces() {
        let seg = JiebaSegmenter::new();
        let words = seg.segment("  北京 清华大学  ");
        assert_eq!(words, vec!["北京", "清华大学"]);
        assert!(seg.segment("   ").is_empty());
    }

    #[test]
    fn test_jieba_user_dictionary() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("user.dict");
        std::fs::write(&path, "李慕站 50000\n").unwrap();

        let seg = JiebaSegmenter::new().with_user_dict(&path).unwrap();
        assert_eq!(seg.segment("李慕站"), vec!["李慕站"]);

        let err = JiebaSegmenter::new().with_user_dict(dir.path().join("absent")).err().unwrap();
        assert!(matches!(err.downcast_ref::<LmError>(), Some(LmError::ArtifactLoadFailure { .. })));
    }

    #[test]
    fn test_jieba_dedup_matches_segmentation() {
        let seg = JiebaSegmenter::new();
        let unique = segment_unique(&["北京清华大学", "北京 清华大学", "北京清华大学"], &seg);
        assert_eq!(unique.into_iter().collect::<Vec<_>>(), vec!["北京 清华大学"]);
    }

    #[test]
    fn test_segment_unique_collapses_duplicates() {
        let dict = dictionary();
        let seg  = DictionarySegmenter::new(&dict);
        let unique = segment_unique(&["今天天气", "今天 天气", "很好", "今天天气"], &seg);

        assert_eq!(unique.len(), 2);
        assert!(unique.contains("今天 天气"));
        assert!(unique.contains("很好"));
    }
}
