// ============================================================
// Layer 2 — Inference Use Case
// ============================================================
// Reloads a finished training run and uses it:
//
//   <model_dir>/<name>.json     → TrainConfig (architecture)
//   <model_dir>/tokenizer.json  → CharTokenizer
//   <model_dir>/<name>.mpk      → weights
//
// then continues prompts (`generate`), scores sentences
// (`perplexity`) or writes the encoder out on its own
// (`export_encoder`) for another run to start from. Everything is loaded once up front;
// each call reuses the same model and tokenizer.

use anyhow::{Context, Result};
use burn::prelude::*;
use std::path::{Path, PathBuf};

use crate::application::train_use_case::TrainConfig;
use crate::infra::{
    checkpoint::{save_encoder, CheckpointManager},
    tokenizer_store::{CharTokenizer, TokenizerStore},
};
use crate::ml::generator::{generate, ModelPredictor};
use crate::ml::model::{AttentionMode, CharLanguageModel};
use crate::ml::perplexity::sentence_perplexity;
use crate::ml::trainer::make_rng;

pub struct InferenceUseCase<B: Backend> {
    config:    TrainConfig,
    tokenizer: CharTokenizer,
    model:     CharLanguageModel<B>,
    device:    B::Device,
    attention: AttentionMode,
}

impl<B: Backend> InferenceUseCase<B> {
    pub fn load(model_dir: &str, name: &str, device: B::Device) -> Result<Self> {
        let ckpt = CheckpointManager::new(model_dir, name);
        let config = ckpt
            .load_config()
            .with_context(|| format!("No training run named '{name}' in '{model_dir}'"))?;

        let tokenizer = TokenizerStore::new(model_dir).load()?;

        // Dropout is irrelevant at inference; build with it off.
        let model_cfg = config.model_config(tokenizer.vocab_size()).with_dropout(0.0);
        let model = ckpt.load_model(model_cfg.init::<B>(&device), &device)?;
        tracing::info!("Model '{name}' loaded from '{model_dir}'");

        let attention = config.attention;
        Ok(Self { config, tokenizer, model, device, attention })
    }

    /// Override the decoding attention stored with the run.
    pub fn with_attention(mut self, attention: AttentionMode) -> Self {
        self.attention = attention;
        self
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    fn predictor(&self) -> ModelPredictor<'_, B> {
        ModelPredictor::new(&self.model, &self.device, self.attention)
    }

    pub fn generate(&self, prompts: &[String], seed: Option<u64>) -> Result<Vec<String>> {
        let mut rng   = make_rng(seed);
        let gen_cfg   = self.config.generation_config();
        let predictor = self.predictor();
        prompts
            .iter()
            .map(|p| generate(&predictor, &self.tokenizer, p, &gen_cfg, &mut rng))
            .collect()
    }

    pub fn perplexity(&self, sentence: &str) -> Result<f64> {
        sentence_perplexity(&self.predictor(), &self.tokenizer, sentence, self.config.window_size)
    }

    /// Write the trained encoder as a `--pretrained-encoder` record.
    pub fn export_encoder(&self, out: impl AsRef<Path>) -> Result<PathBuf> {
        save_encoder(&self.model.encoder, out)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::LmError;
    use crate::domain::vocabulary::Vocabulary;
    use crate::ml::trainer::build_model;
    use burn::backend::NdArray;
    use tempfile::tempdir;

    type TestBackend = NdArray<f32>;

    /// Writes an untrained run the way TrainUseCase would.
    fn write_run(dir: &std::path::Path) -> TrainConfig {
        let cfg = TrainConfig {
            corpus_path: "data/story.txt".into(),
            model_dir:   dir.to_string_lossy().into_owned(),
            char_dim:    8,
            num_heads:   2,
            num_layers:  1,
            d_ff:        16,
            window_size: 4,
            max_text_chars: 5,
            ..TrainConfig::default()
        };
        let tokenizer = TokenizerStore::new(dir)
            .build_and_save(Vocabulary::fit_corpus("李慕站在山路上"))
            .unwrap();

        let device = Default::default();
        let model  = cfg.model_config(tokenizer.vocab_size()).init::<TestBackend>(&device);
        let ckpt   = cfg.checkpoint();
        ckpt.save_config(&cfg).unwrap();
        ckpt.save_model(&model).unwrap();
        cfg
    }

    #[test]
    fn test_load_and_generate() {
        let dir = tempdir().unwrap();
        write_run(dir.path());

        let session = InferenceUseCase::<TestBackend>::load(
            &dir.path().to_string_lossy(), "story", Default::default(),
        )
        .unwrap();
        assert_eq!(session.config().window_size, 4);

        let out = session
            .generate(&["李慕".to_string(), String::new()], Some(1))
            .unwrap();
        assert!(out[0].starts_with("李慕"));
        assert!(out[0].chars().count() <= 2 + 5);
        assert_eq!(out[1], "");
    }

    #[test]
    fn test_perplexity_of_loaded_model() {
        let dir = tempdir().unwrap();
        write_run(dir.path());

        let session = InferenceUseCase::<TestBackend>::load(
            &dir.path().to_string_lossy(), "story", Default::default(),
        )
        .unwrap()
        .with_attention(AttentionMode::Full);

        let score = session.perplexity("山路上").unwrap();
        assert!(score.is_finite() && score > 0.0);

        let err = session.perplexity("山").unwrap_err();
        assert!(matches!(err.downcast_ref::<LmError>(), Some(LmError::EmptyInputWindow)));
    }

    #[test]
    fn test_unknown_run_name_fails() {
        let dir = tempdir().unwrap();
        write_run(dir.path());
        assert!(InferenceUseCase::<TestBackend>::load(
            &dir.path().to_string_lossy(), "other", Default::default(),
        )
        .is_err());
    }

    #[test]
    fn test_exported_encoder_starts_a_new_run() {
        let dir = tempdir().unwrap();
        let cfg = write_run(dir.path());

        let session = InferenceUseCase::<TestBackend>::load(
            &dir.path().to_string_lossy(), "story", Default::default(),
        )
        .unwrap();
        let file = session.export_encoder(dir.path().join("encoder")).unwrap();
        assert!(file.exists());

        let next = TrainConfig { pretrained_encoder: Some(file.to_string_lossy().into_owned()), ..cfg };
        let vocab_size = session.tokenizer.vocab_size();
        assert!(build_model::<TestBackend>(&next, vocab_size, &Default::default()).is_ok());

        let other_window = TrainConfig { window_size: 9, ..next };
        assert!(build_model::<TestBackend>(&other_window, vocab_size, &Default::default()).is_err());
    }
}
