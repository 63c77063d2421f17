// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the language-model training pipeline in order:
//
//   Step 1: Load the vocabulary          (Layer 4 - data)
//   Step 2: Load and flatten the corpus  (Layer 4 - data)
//   Step 3: Build the char tokenizer     (Layer 6 - infra)
//   Step 4: Encode corpus, make sampler  (Layer 4 - data)
//   Step 5: Save config for inference    (Layer 6 - infra)
//   Step 6: Run the training loop        (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    loader::{load_corpus, load_vocabulary, LineFileLoader},
    window::WindowSampler,
};
use crate::domain::error::LmError;
use crate::infra::{
    checkpoint::{checkpoint_stem, CheckpointManager},
    metrics::MetricsLogger,
    tokenizer_store::{CharTokenizer, TokenizerStore},
};
use crate::ml::generator::GenerationConfig;
use crate::ml::model::{AttentionMode, CharLmConfig};
use crate::ml::trainer::run_training;

pub const DEFAULT_PROMPTS: [&str; 2] = [
    "让他在半年之前，就不能做出",
    "李慕站在山路上，深深的呼吸",
];

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run. Saved as JSON next to
// the checkpoint so `generate` and `perplexity` can rebuild the
// exact same model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub corpus_path:        String,
    pub vocab_path:         String,
    pub model_dir:          String,
    /// Optional CompactRecorder record for the encoder alone.
    pub pretrained_encoder: Option<String>,
    pub epochs:             usize,
    pub batch_size:         usize,
    pub samples_per_epoch:  usize,
    pub char_dim:           usize,
    pub window_size:        usize,
    pub lr:                 f64,
    pub num_heads:          usize,
    pub num_layers:         usize,
    pub d_ff:               usize,
    pub dropout:            f64,
    pub max_text_chars: usize,
    pub prompts:            Vec<String>,
    /// Attention used when decoding; training is always causal.
    pub attention:          AttentionMode,
    pub save:               bool,
    pub seed:               Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            corpus_path:        "corpus.txt".to_string(),
            vocab_path:         "vocab.txt".to_string(),
            model_dir:          "model".to_string(),
            pretrained_encoder: None,
            epochs:             20,
            batch_size:         500,
            samples_per_epoch:  50_000,
            char_dim:           768,
            window_size:        10,
            lr:                 1e-4,
            num_heads:          12,
            num_layers:         12,
            d_ff:               3072,
            dropout:            0.1,
            max_text_chars: 30,
            prompts:            DEFAULT_PROMPTS.iter().map(|p| p.to_string()).collect(),
            attention:          AttentionMode::Causal,
            save:               true,
            seed:               None,
        }
    }
}

impl TrainConfig {
    /// Fail fast on settings the model or sampler cannot use.
    pub fn validate(&self) -> Result<(), LmError> {
        let bad = |msg: String| Err(LmError::InvalidHyperparameter(msg));
        if self.batch_size == 0 {
            return bad("batch_size must be > 0".into());
        }
        if self.window_size == 0 {
            return bad("window_size must be > 0".into());
        }
        if self.num_heads == 0 || self.char_dim % self.num_heads != 0 {
            return bad(format!(
                "char_dim ({}) must be divisible by num_heads ({})",
                self.char_dim, self.num_heads
            ));
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return bad(format!("lr must be positive, got {}", self.lr));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return bad(format!("dropout must be in [0, 1), got {}", self.dropout));
        }
        Ok(())
    }

    /// Batches per epoch: samples / batch, at least one.
    pub fn batches_per_epoch(&self) -> usize {
        (self.samples_per_epoch / self.batch_size.max(1)).max(1)
    }

    pub fn model_config(&self, vocab_size: usize) -> CharLmConfig {
        CharLmConfig::new(
            vocab_size,
            self.window_size,
            self.char_dim,
            self.num_heads,
            self.num_layers,
            self.d_ff,
        )
        .with_dropout(self.dropout)
    }

    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            window_size: self.window_size,
            max_chars:   self.max_text_chars,
        }
    }

    pub fn checkpoint(&self) -> CheckpointManager {
        CheckpointManager::new(&self.model_dir, checkpoint_stem(&self.corpus_path))
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Step 1: Vocabulary ───────────────────────────────────────────────
        let vocab = load_vocabulary(&cfg.vocab_path)?;

        // ── Step 2: Corpus ───────────────────────────────────────────────────
        tracing::info!("Loading corpus from '{}'", cfg.corpus_path);
        let corpus = load_corpus(&LineFileLoader::new(&cfg.corpus_path))?;
        tracing::info!("Corpus has {} characters", corpus.chars().count());

        // ── Step 3: Tokenizer (built once, passed explicitly) ────────────────
        let tokenizer = if cfg.save {
            TokenizerStore::new(&cfg.model_dir).build_and_save(vocab)?
        } else {
            CharTokenizer::from_vocabulary(vocab)?
        };

        // ── Step 4: Encode and sample windows ───────────────────────────────
        let ids = tokenizer.encode(&corpus)?;
        let unknown = ids.iter().filter(|&&id| id == tokenizer.vocab().unk_id()).count();
        if unknown > 0 {
            tracing::warn!("{unknown} corpus characters are not in the vocabulary");
        }
        let sampler = WindowSampler::new(ids, cfg.window_size)
            .with_context(|| format!("Cannot train on '{}'", cfg.corpus_path))?;
        tracing::info!(
            "Sampling windows of {} from {} ids, {} batches per epoch",
            sampler.window(),
            sampler.corpus_len(),
            cfg.batches_per_epoch()
        );

        // ── Step 5: Persist config, open metrics ─────────────────────────────
        let ckpt = cfg.checkpoint();
        let metrics = if cfg.save {
            ckpt.save_config(cfg)?;
            let logger = MetricsLogger::new(ckpt.dir())?;
            tracing::info!("Epoch metrics go to '{}'", logger.csv_path().display());
            Some(logger)
        } else {
            None
        };

        // ── Step 6: Train ─────────────────────────────────────────────────────
        run_training(cfg, &tokenizer, &sampler, &ckpt, metrics.as_ref())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_hyperparameters() {
        let cfg = TrainConfig::default();
        assert_eq!(cfg.epochs, 20);
        assert_eq!(cfg.batch_size, 500);
        assert_eq!(cfg.samples_per_epoch, 50_000);
        assert_eq!(cfg.char_dim, 768);
        assert_eq!(cfg.window_size, 10);
        assert_eq!(cfg.max_text_chars, 30);
        assert_eq!(cfg.prompts.len(), 2);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_batches_per_epoch() {
        let cfg = TrainConfig::default();
        assert_eq!(cfg.batches_per_epoch(), 100);

        let small = TrainConfig { samples_per_epoch: 10, batch_size: 32, ..TrainConfig::default() };
        assert_eq!(small.batches_per_epoch(), 1);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let heads = TrainConfig { char_dim: 100, num_heads: 12, ..TrainConfig::default() };
        assert!(matches!(heads.validate(), Err(LmError::InvalidHyperparameter(_))));

        let window = TrainConfig { window_size: 0, ..TrainConfig::default() };
        assert!(window.validate().is_err());

        let lr = TrainConfig { lr: 0.0, ..TrainConfig::default() };
        assert!(lr.validate().is_err());
    }

    #[test]
    fn test_checkpoint_is_named_after_corpus() {
        let cfg = TrainConfig {
            corpus_path: "data/novel.txt".into(),
            model_dir:   "out".into(),
            ..TrainConfig::default()
        };
        assert_eq!(cfg.checkpoint().dir(), std::path::Path::new("out"));
    }
}
