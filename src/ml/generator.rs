// ============================================================
// Layer 5 — Autoregressive Generation
// ============================================================
// Extends a prompt one character at a time:
//
//   text = prompt
//   loop:
//     context = last W characters of text → ids
//     probs   = model distribution after the context
//     id      = Greedy (p = 0.9) or Categorical (p = 0.1)
//     stop if the token is a newline
//     text   += token
//   while text (prompt included) is within the cap
//
// The cap bounds the whole text, so the step that first pushes
// it past `max_chars` is the last one: a 13-character prompt with
// a cap of 30 ends at 31 characters. A prompt already over the
// cap comes back unchanged.
//
// The predictor sits behind a trait so decoding can be tested
// against fixed distributions without a model.

use anyhow::{anyhow, Result};
use burn::prelude::*;
use rand::{distributions::WeightedIndex, prelude::Distribution, Rng};

use crate::infra::tokenizer_store::CharTokenizer;
use crate::ml::model::{AttentionMode, CharLanguageModel};

/// Chance of taking the arg-max instead of sampling.
pub const GREEDY_PROBABILITY: f64 = 0.9;

/// Anything that can score the next character of a context.
pub trait NextTokenDistribution {
    fn next_token_probs(&self, context: &[u32]) -> Result<Vec<f32>>;
}

/// A model bound to the device and attention mode it decodes with.
pub struct ModelPredictor<'a, B: Backend> {
    model:     &'a CharLanguageModel<B>,
    device:    &'a B::Device,
    attention: AttentionMode,
}

impl<'a, B: Backend> ModelPredictor<'a, B> {
    pub fn new(model: &'a CharLanguageModel<B>, device: &'a B::Device, attention: AttentionMode) -> Self {
        Self { model, device, attention }
    }
}

impl<B: Backend> NextTokenDistribution for ModelPredictor<'_, B> {
    fn next_token_probs(&self, context: &[u32]) -> Result<Vec<f32>> {
        self.model.next_token_probs(context, self.attention, self.device)
    }
}

// ─── Sampling ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingChoice {
    Greedy,
    Categorical,
}

impl SamplingChoice {
    /// One weighted coin flip per generated character.
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen_bool(GREEDY_PROBABILITY) {
            Self::Greedy
        } else {
            Self::Categorical
        }
    }

    pub fn pick<R: Rng + ?Sized>(self, probs: &[f32], rng: &mut R) -> Result<usize> {
        match self {
            Self::Greedy => argmax(probs).ok_or_else(|| anyhow!("empty distribution")),
            Self::Categorical => {
                let dist = WeightedIndex::new(probs.iter().map(|p| p.max(0.0)))
                    .map_err(|e| anyhow!("cannot sample from distribution: {e}"))?;
                Ok(dist.sample(rng))
            }
        }
    }
}

pub fn sample_next<R: Rng + ?Sized>(probs: &[f32], rng: &mut R) -> Result<usize> {
    SamplingChoice::draw(rng).pick(probs, rng)
}

/// Index of the largest probability; the first one wins ties.
pub fn argmax(probs: &[f32]) -> Option<usize> {
    probs
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &p)| match best {
            Some((_, bp)) if bp >= p => best,
            _ => Some((i, p)),
        })
        .map(|(i, _)| i)
}

// ─── Decoding loop ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Characters of context fed to the model per step.
    pub window_size: usize,
    /// Keep generating while the text has at most this many characters.
    pub max_chars:   usize,
}

pub fn generate<P, R>(
    predictor: &P,
    tokenizer: &CharTokenizer,
    prompt:    &str,
    cfg:       &GenerationConfig,
    rng:       &mut R,
) -> Result<String>
where
    P: NextTokenDistribution + ?Sized,
    R: Rng + ?Sized,
{
    if prompt.is_empty() {
        return Ok(String::new());
    }

    let mut text: Vec<char> = prompt.chars().collect();
    let limit = text.len().max(cfg.max_chars + 1);

    // Tokens that decode to nothing still use up a step, so the
    // loop ends even when the text stops growing.
    for _ in 0..=cfg.max_chars {
        if text.len() > cfg.max_chars {
            break;
        }
        let start   = text.len().saturating_sub(cfg.window_size);
        let context: String = text[start..].iter().collect();
        let ids = tokenizer.encode(&context)?;

        let probs = predictor.next_token_probs(&ids)?;
        let id    = sample_next(&probs, rng)?;
        let token = tokenizer.decode(id as u32);
        if token == "\n" {
            break;
        }
        text.extend(token.chars());
    }

    // multi-character tokens can overshoot
    text.truncate(limit);
    Ok(text.into_iter().collect())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vocabulary::Vocabulary;
    use rand::{rngs::StdRng, SeedableRng};

    /// Always predicts the same token with certainty.
    struct Fixed(Vec<f32>);

    impl NextTokenDistribution for Fixed {
        fn next_token_probs(&self, _context: &[u32]) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    fn tokenizer() -> CharTokenizer {
        CharTokenizer::from_vocabulary(
            Vocabulary::from_tokens(["[PAD]", "[UNK]", "a", "b", "\n"]).unwrap(),
        )
        .unwrap()
    }

    fn cfg(max_chars: usize) -> GenerationConfig {
        GenerationConfig { window_size: 3, max_chars }
    }

    #[test]
    fn test_greedy_frequency() {
        let mut rng = StdRng::seed_from_u64(7);
        let trials = 5000;
        let greedy = (0..trials)
            .filter(|_| SamplingChoice::draw(&mut rng) == SamplingChoice::Greedy)
            .count();
        let freq = greedy as f64 / trials as f64;
        assert!((freq - 0.9).abs() < 0.05, "greedy frequency {freq}");
    }

    #[test]
    fn test_greedy_pick_is_argmax() {
        let mut rng = StdRng::seed_from_u64(0);
        let probs = [0.1, 0.6, 0.3];
        assert_eq!(SamplingChoice::Greedy.pick(&probs, &mut rng).unwrap(), 1);
        assert_eq!(argmax(&[0.5, 0.5]), Some(0));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_categorical_pick_follows_weights() {
        let mut rng = StdRng::seed_from_u64(3);
        let probs = [0.0, 1.0, 0.0];
        for _ in 0..50 {
            assert_eq!(SamplingChoice::Categorical.pick(&probs, &mut rng).unwrap(), 1);
        }
        assert!(SamplingChoice::Categorical.pick(&[0.0, 0.0], &mut rng).is_err());
    }

    #[test]
    fn test_generation_stops_at_cap() {
        let mut rng = StdRng::seed_from_u64(1);
        let out = generate(&Fixed(vec![0.0, 0.0, 0.0, 1.0, 0.0]), &tokenizer(), "ab", &cfg(5), &mut rng)
            .unwrap();
        assert_eq!(out, "abbbbb");
    }

    #[test]
    fn test_cap_counts_the_prompt() {
        let mut rng = StdRng::seed_from_u64(1);
        let prompt = "ab".repeat(6) + "a";
        assert_eq!(prompt.chars().count(), 13);

        let out = generate(&Fixed(vec![0.0, 0.0, 0.0, 1.0, 0.0]), &tokenizer(), &prompt, &cfg(30), &mut rng)
            .unwrap();
        assert_eq!(out.chars().count(), 31);
        assert!(out.starts_with(&prompt));
        assert!(out[13..].chars().all(|c| c == 'b'));
    }

    #[test]
    fn test_prompt_over_cap_is_returned_unchanged() {
        let mut rng = StdRng::seed_from_u64(1);
        let out = generate(&Fixed(vec![0.0, 0.0, 0.0, 1.0, 0.0]), &tokenizer(), "abababab", &cfg(5), &mut rng)
            .unwrap();
        assert_eq!(out, "abababab");
    }

    #[test]
    fn test_generation_stops_on_newline() {
        let mut rng = StdRng::seed_from_u64(1);
        let out = generate(&Fixed(vec![0.0, 0.0, 0.0, 0.0, 1.0]), &tokenizer(), "ab", &cfg(30), &mut rng)
            .unwrap();
        assert_eq!(out, "ab");
    }

    #[test]
    fn test_empty_prompt_returns_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        let out = generate(&Fixed(vec![0.0, 0.0, 1.0, 0.0, 0.0]), &tokenizer(), "", &cfg(30), &mut rng)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_multi_char_tokens_respect_cap() {
        let tok = CharTokenizer::from_vocabulary(
            Vocabulary::from_tokens(["[UNK]", "x", "long"]).unwrap(),
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let out = generate(&Fixed(vec![0.0, 0.0, 1.0]), &tok, "x", &cfg(6), &mut rng).unwrap();
        assert_eq!(out, "xlonglo");
    }
}
