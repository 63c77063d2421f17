// ============================================================
// Layer 5 — Sentence Perplexity
// ============================================================
// Scores how "expected" a sentence is under the model:
//
//   for i in 1..len(s):
//     context = up to W characters before s[i]
//     p_i     = model probability of s[i] after context
//   score = 2 ^ ( -Σ log10(p_i) / len(s) )
//
// Lower is better. Two quirks are kept for comparability with
// scores produced by earlier runs:
//   - the logs are base 10 while the exponent base is 2
//   - the denominator is len(s), although only len(s) - 1
//     characters are predicted
// Both only rescale the score monotonically, so rankings of
// sentences are unaffected.

use anyhow::Result;

use crate::domain::error::LmError;
use crate::infra::tokenizer_store::CharTokenizer;
use crate::ml::generator::NextTokenDistribution;

/// Probabilities are clamped here before the log so a
/// zero-probability character yields a large finite score.
const MIN_PROB: f64 = 1e-12;

pub fn sentence_perplexity<P>(
    predictor:   &P,
    tokenizer:   &CharTokenizer,
    sentence:    &str,
    window_size: usize,
) -> Result<f64>
where
    P: NextTokenDistribution + ?Sized,
{
    let ids = tokenizer.encode(sentence)?;
    if ids.len() < 2 {
        return Err(LmError::EmptyInputWindow.into());
    }

    let mut log_sum = 0.0f64;
    for i in 1..ids.len() {
        let start = i.saturating_sub(window_size);
        let probs = predictor.next_token_probs(&ids[start..i])?;
        let p = probs.get(ids[i] as usize).copied().unwrap_or(0.0) as f64;
        log_sum += p.max(MIN_PROB).log10();
    }

    let score = 2f64.powf(-log_sum / ids.len() as f64);
    tracing::debug!("perplexity {score:.4} for {} chars", ids.len());
    Ok(score)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vocabulary::Vocabulary;

    struct Uniform(usize);

    impl NextTokenDistribution for Uniform {
        fn next_token_probs(&self, _context: &[u32]) -> Result<Vec<f32>> {
            Ok(vec![1.0 / self.0 as f32; self.0])
        }
    }

    /// Records the context length of every call.
    struct Recording(std::cell::RefCell<Vec<usize>>);

    impl NextTokenDistribution for Recording {
        fn next_token_probs(&self, context: &[u32]) -> Result<Vec<f32>> {
            self.0.borrow_mut().push(context.len());
            Ok(vec![0.25; 4])
        }
    }

    fn tokenizer() -> CharTokenizer {
        CharTokenizer::from_vocabulary(Vocabulary::from_tokens(["[UNK]", "a", "b", "c"]).unwrap())
            .unwrap()
    }

    #[test]
    fn test_uniform_model_score() {
        // 3 predictions at p = 1/4 over a 4-char sentence:
        // 2 ^ (-(3 · log10(0.25)) / 4)
        let score = sentence_perplexity(&Uniform(4), &tokenizer(), "abca", 10).unwrap();
        let expected = 2f64.powf(-(3.0 * 0.25f64.log10()) / 4.0);
        assert!((score - expected).abs() < 1e-6);
    }

    #[test]
    fn test_context_is_capped_at_window() {
        let rec = Recording(Default::default());
        sentence_perplexity(&rec, &tokenizer(), "abcabc", 2).unwrap();
        assert_eq!(*rec.0.borrow(), vec![1, 2, 2, 2, 2]);
    }

    #[test]
    fn test_short_sentences_are_rejected() {
        for s in ["", "a"] {
            let err = sentence_perplexity(&Uniform(4), &tokenizer(), s, 10).unwrap_err();
            assert!(matches!(err.downcast_ref::<LmError>(), Some(LmError::EmptyInputWindow)));
        }
    }

    #[test]
    fn test_unknown_characters_still_score() {
        let score = sentence_perplexity(&Uniform(4), &tokenizer(), "a?b", 10).unwrap();
        assert!(score.is_finite() && score > 1.0);
    }
}
