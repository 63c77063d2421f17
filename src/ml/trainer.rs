// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Next-character training with Adam:
//
//   per epoch:
//     per batch (samples_per_epoch / batch_size of them):
//       windows → WindowBatcher → forward_loss (causal) →
//       backward → Adam step
//     model.valid() → generate from every prompt
//     report mean loss + samples, append metrics row
//
// Backends:
//   - training runs on TrainBackend (Autodiff<Wgpu>)
//   - model.valid() drops to the inner backend (Wgpu), which
//     also disables dropout for the generated samples
//
// The loop itself is generic over any AutodiffBackend so the
// tests can run it on NdArray.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    data::dataloader::batcher::Batcher,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::WindowBatcher, window::WindowSampler};
use crate::infra::{
    checkpoint::{load_pretrained_encoder, CheckpointManager},
    metrics::{EpochMetrics, MetricsLogger},
    tokenizer_store::CharTokenizer,
};
use crate::ml::generator::{generate, ModelPredictor};
use crate::ml::model::CharLanguageModel;

pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;
pub type InferBackend = burn::backend::Wgpu;

/// Seeded when a seed is given, entropy otherwise.
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None       => StdRng::from_entropy(),
    }
}

/// What one finished epoch produced.
#[derive(Debug, Clone)]
pub struct EpochReport {
    pub epoch:     usize,
    pub mean_loss: f64,
    /// (prompt, continuation) pairs
    pub samples:   Vec<(String, String)>,
}

pub fn run_training(
    cfg:       &TrainConfig,
    tokenizer: &CharTokenizer,
    sampler:   &WindowSampler,
    ckpt:      &CheckpointManager,
    metrics:   Option<&MetricsLogger>,
) -> Result<()> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);

    let mut rng = make_rng(cfg.seed);
    let model   = build_model::<TrainBackend>(cfg, tokenizer.vocab_size(), &device)?;

    let mut final_loss = None;
    let model = train_loop(cfg, model, tokenizer, sampler, &device, &mut rng, |report| {
        for (_, text) in &report.samples {
            println!("{text}");
        }
        println!("Epoch {:>3}/{} | train_loss={:.6}", report.epoch, cfg.epochs, report.mean_loss);

        final_loss = Some(report.mean_loss);
        if let Some(logger) = metrics {
            logger.log(&EpochMetrics::new(report.epoch, report.mean_loss))?;
        }
        Ok(())
    })?;

    if cfg.save {
        ckpt.save_model(&model)?;
    } else {
        tracing::info!("Checkpoint saving disabled");
    }
    if let Some(loss) = final_loss {
        tracing::info!("Training complete, final epoch loss {loss:.4}");
    }
    Ok(())
}

/// Fresh model; the encoder is replaced by a pretrained record
/// when one is configured.
pub fn build_model<B: Backend>(
    cfg:        &TrainConfig,
    vocab_size: usize,
    device:     &B::Device,
) -> Result<CharLanguageModel<B>> {
    let mut model = cfg.model_config(vocab_size).init::<B>(device);

    match &cfg.pretrained_encoder {
        Some(path) => {
            model.encoder = load_pretrained_encoder(path, model.encoder, device)?;
        }
        None => tracing::warn!("No pretrained encoder given, starting from random weights"),
    }

    tracing::info!(
        "Model ready: {} layers, char_dim={}, vocab={}",
        cfg.num_layers, cfg.char_dim, vocab_size
    );
    Ok(model)
}

pub fn train_loop<B, R, F>(
    cfg:       &TrainConfig,
    mut model: CharLanguageModel<B>,
    tokenizer: &CharTokenizer,
    sampler:   &WindowSampler,
    device:    &B::Device,
    rng:       &mut R,
    mut on_epoch: F,
) -> Result<CharLanguageModel<B>>
where
    B: AutodiffBackend,
    R: Rng,
    F: FnMut(&EpochReport) -> Result<()>,
{
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let mut optim = AdamConfig::new()
        .with_epsilon(1e-8)
        .init::<B, CharLanguageModel<B>>();

    let batcher = WindowBatcher::<B>::new(device.clone());
    let batches = cfg.batches_per_epoch();
    let gen_cfg = cfg.generation_config();

    for epoch in 1..=cfg.epochs {
        let mut loss_sum = 0.0f64;

        for _ in 0..batches {
            let batch = batcher.batch(sampler.sample_many(cfg.batch_size, rng));
            let loss  = model.forward_loss(batch.inputs, batch.targets);
            loss_sum += loss.clone().into_scalar().elem::<f64>();

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(cfg.lr, model, grads);
        }

        let valid     = model.valid();
        let predictor = ModelPredictor::new(&valid, device, cfg.attention);
        let samples = cfg
            .prompts
            .iter()
            .map(|prompt| {
                generate(&predictor, tokenizer, prompt, &gen_cfg, rng).map(|text| (prompt.clone(), text))
            })
            .collect::<Result<Vec<_>>>()?;

        let report = EpochReport { epoch, mean_loss: loss_sum / batches as f64, samples };
        tracing::debug!("epoch {} done, mean loss {:.4}", report.epoch, report.mean_loss);
        on_epoch(&report)?;
    }

    Ok(model)
}
