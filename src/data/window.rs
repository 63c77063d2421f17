// ============================================================
// Layer 4 — Training Window Sampler
// ============================================================
// Turns the encoded corpus into next-character training pairs.
//
// Each sample is a random slice of the corpus:
//
//   corpus ids:  t0 t1 t2 t3 t4 t5 t6 ...
//   start = 2, window = 3
//   input:             t2 t3 t4
//   target:               t3 t4 t5
//
// The target is the input shifted left by one, so position k of
// the target is "the character that follows position k of the
// input". Training on every position at once (with a causal
// mask) gives W supervised predictions per window.
//
// Windows are drawn fresh for every batch and never stored.

use rand::Rng;

use crate::domain::error::LmError;

/// One (input, target) pair of equal length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingWindow {
    pub input:  Vec<u32>,
    pub target: Vec<u32>,
}

#[derive(Debug)]
pub struct WindowSampler {
    ids:    Vec<u32>,
    window: usize,
}

impl WindowSampler {
    /// Needs at least `window + 1` ids so the shifted target fits.
    pub fn new(ids: Vec<u32>, window: usize) -> Result<Self, LmError> {
        if window == 0 {
            return Err(LmError::InvalidHyperparameter(
                "window_size must be at least 1".to_string(),
            ));
        }
        if ids.len() < window + 1 {
            return Err(LmError::CorpusTooShort { len: ids.len(), window });
        }
        Ok(Self { ids, window })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn corpus_len(&self) -> usize {
        self.ids.len()
    }

    /// Largest valid start index (inclusive).
    fn max_start(&self) -> usize {
        self.ids.len() - 1 - self.window
    }

    /// The window starting at `start`. Caller guarantees
    /// `start <= corpus_len - 1 - window`.
    pub fn window_at(&self, start: usize) -> TrainingWindow {
        let end = start + self.window;
        TrainingWindow {
            input:  self.ids[start..end].to_vec(),
            target: self.ids[start + 1..end + 1].to_vec(),
        }
    }

    /// Draw one window with a uniformly random start.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> TrainingWindow {
        let start = rng.gen_range(0..=self.max_start());
        self.window_at(start)
    }

    pub fn sample_many<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<TrainingWindow> {
        (0..count).map(|_| self.sample(rng)).collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_target_is_input_shifted_by_one() {
        let ids: Vec<u32> = (0..50).map(|i| (i * 7 % 13) as u32).collect();
        let sampler = WindowSampler::new(ids.clone(), 6).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        for w in sampler.sample_many(500, &mut rng) {
            assert_eq!(w.input.len(), 6);
            assert_eq!(w.target.len(), 6);
            assert_eq!(&w.input[1..], &w.target[..5]);
        }
    }

    #[test]
    fn test_windows_stay_inside_corpus() {
        // corpus of exactly window + 1 has a single valid start
        let sampler = WindowSampler::new(vec![1, 2, 3, 4], 3).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..20 {
            let w = sampler.sample(&mut rng);
            assert_eq!(w.input, vec![1, 2, 3]);
            assert_eq!(w.target, vec![2, 3, 4]);
        }
    }

    #[test]
    fn test_last_start_reaches_corpus_end() {
        let sampler = WindowSampler::new((0..10).collect(), 3).unwrap();
        let w = sampler.window_at(6);
        assert_eq!(w.target, vec![7, 8, 9]);
    }

    #[test]
    fn test_short_corpus_is_rejected() {
        let err = WindowSampler::new(vec![1, 2, 3], 3).unwrap_err();
        assert!(matches!(err, LmError::CorpusTooShort { len: 3, window: 3 }));
    }

    #[test]
    fn test_zero_window_is_rejected() {
        assert!(WindowSampler::new(vec![1, 2, 3], 0).is_err());
    }
}
