// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// What gets saved at the end of a training run:
//   1. <stem>.mpk      — all learned parameters
//   2. <stem>.json     — the TrainConfig of the run
//   3. tokenizer.json  — written by the TokenizerStore
//
// <stem> is the corpus file name without its extension, so
// training on data/corpus.txt produces model/corpus.mpk. The
// recorder appends the extension itself; paths handed to it
// never carry one.
//
// The config is needed to rebuild the exact architecture
// (char_dim, layers, window) before the weights can be loaded
// back into it. Burn does not compare shapes when it loads a
// record, so every load here compares the parameter shapes
// before and after and reports a mismatch as an artifact error.
//
// Pretrained encoders come in two forms:
//   - a CompactRecorder record of a TextEncoder (`export-encoder`)
//   - a BERT `.safetensors` file                (infra::bert_import)
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};
use burn::{
    module::{ModuleVisitor, ParamId},
    prelude::*,
    record::{CompactRecorder, FileRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::domain::error::LmError;
use crate::infra::bert_import::import_bert_encoder;
use crate::ml::model::{CharLanguageModel, TextEncoder};

/// Extension CompactRecorder gives its files (`mpk`).
pub fn record_extension<B: Backend>() -> &'static str {
    <CompactRecorder as FileRecorder<B>>::file_extension()
}

/// Checkpoint name for a corpus path: its file stem.
pub fn checkpoint_stem(corpus_path: impl AsRef<Path>) -> String {
    corpus_path
        .as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "model".to_string())
}

pub struct CheckpointManager {
    dir:  PathBuf,
    stem: String,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self { dir: dir.into(), stem: stem.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path without extension, as the recorder wants it.
    fn model_path(&self) -> PathBuf {
        self.dir.join(&self.stem)
    }

    /// The record file as it appears on disk.
    pub fn model_file<B: Backend>(&self) -> PathBuf {
        self.model_path().with_extension(record_extension::<B>())
    }

    fn config_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.stem))
    }

    pub fn save_model<B: Backend>(&self, model: &CharLanguageModel<B>) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let path = self.model_path();
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        tracing::info!("Checkpoint saved to '{}'", self.model_file::<B>().display());
        Ok(())
    }

    /// Load saved weights into a freshly initialised model of the
    /// same architecture.
    pub fn load_model<B: Backend>(
        &self,
        model:  CharLanguageModel<B>,
        device: &B::Device,
    ) -> Result<CharLanguageModel<B>> {
        let file = self.model_file::<B>();
        let record: <CharLanguageModel<B> as Module<B>>::Record = CompactRecorder::new()
            .load(self.model_path(), device)
            .map_err(|e| LmError::artifact(&file, e))
            .with_context(|| "Cannot load checkpoint. Have you trained the model first?")?;

        let layers = (model.encoder.layers.len(), record.encoder.layers.len());
        Ok(load_checked(model, record, layers, &file)?)
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let path = self.config_path();
        fs::write(&path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.config_path();
        let json = fs::read_to_string(&path).map_err(|e| LmError::artifact(&path, e))?;
        serde_json::from_str(&json)
            .map_err(|e| LmError::artifact(&path, e))
            .map_err(Into::into)
    }
}

/// Write the encoder alone, so another run can start from it.
/// Returns the file actually written.
pub fn save_encoder<B: Backend>(encoder: &TextEncoder<B>, path: impl AsRef<Path>) -> Result<PathBuf> {
    let stem = recorder_stem::<B>(path.as_ref());
    if let Some(parent) = stem.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create '{}'", parent.display()))?;
    }

    CompactRecorder::new()
        .record(encoder.clone().into_record(), stem.clone())
        .with_context(|| format!("Failed to save encoder to '{}'", stem.display()))?;

    let file = stem.with_extension(record_extension::<B>());
    tracing::info!("Encoder saved to '{}'", file.display());
    Ok(file)
}

/// Load pretrained weights into the encoder sub-module. Loaded
/// once, by path: `.safetensors` files are read as BERT
/// checkpoints, anything else as a CompactRecorder record.
pub fn load_pretrained_encoder<B: Backend>(
    path:    impl AsRef<Path>,
    encoder: TextEncoder<B>,
    device:  &B::Device,
) -> Result<TextEncoder<B>> {
    let path = path.as_ref();
    if path.extension().is_some_and(|ext| ext == "safetensors") {
        let encoder = import_bert_encoder(path, encoder, device)?;
        tracing::info!("BERT encoder imported from '{}'", path.display());
        return Ok(encoder);
    }

    let stem = recorder_stem::<B>(path);
    let file = stem.with_extension(record_extension::<B>());
    if !file.exists() {
        return Err(LmError::artifact(&file, "file not found").into());
    }

    let record: <TextEncoder<B> as Module<B>>::Record = CompactRecorder::new()
        .load(stem, device)
        .map_err(|e| LmError::artifact(&file, e))?;

    let layers  = (encoder.layers.len(), record.layers.len());
    let encoder = load_checked(encoder, record, layers, &file)?;
    tracing::info!("Pretrained encoder loaded from '{}'", file.display());
    Ok(encoder)
}

/// The recorder sets its own extension, so a path given as
/// `encoder.mpk` is reduced to `encoder` first.
fn recorder_stem<B: Backend>(path: &Path) -> PathBuf {
    let suffix = format!(".{}", record_extension::<B>());
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(&suffix) {
        Some(stem) if !stem.is_empty() => path.with_file_name(stem),
        _ => path.to_path_buf(),
    }
}

// ─── Shape checks ─────────────────────────────────────────────────────────────

/// Collects the shape of every float parameter, in visiting order.
struct ParamShapes(Vec<Vec<usize>>);

impl<B: Backend> ModuleVisitor<B> for ParamShapes {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.0.push(tensor.dims().to_vec());
    }
}

pub(crate) fn param_shapes<B: Backend, M: Module<B>>(module: &M) -> Vec<Vec<usize>> {
    let mut shapes = ParamShapes(Vec::new());
    module.visit(&mut shapes);
    shapes.0
}

/// Load `record` into `module`, refusing records built for a
/// different architecture. `layers` is (module, record) block
/// count; Burn panics on a mismatch there, so it is checked first.
fn load_checked<B: Backend, M: Module<B>>(
    module: M,
    record: M::Record,
    layers: (usize, usize),
    file:   &Path,
) -> Result<M, LmError> {
    if layers.0 != layers.1 {
        return Err(LmError::artifact(
            file,
            format!("record has {} encoder layers, model has {}", layers.1, layers.0),
        ));
    }

    let expected = param_shapes::<B, _>(&module);
    let loaded   = module.load_record(record);
    let found    = param_shapes::<B, _>(&loaded);

    match expected.iter().zip(&found).position(|(e, f)| e != f) {
        Some(i) => Err(LmError::artifact(
            file,
            format!("parameter {i} has shape {:?}, model expects {:?}", found[i], expected[i]),
        )),
        None if expected.len() != found.len() => Err(LmError::artifact(
            file,
            format!("record has {} parameters, model has {}", found.len(), expected.len()),
        )),
        None => Ok(loaded),
    }
}
