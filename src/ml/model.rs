// ============================================================
// Layer 5 — Character Language Model
// ============================================================
// A transformer encoder plus a linear projection onto the
// character vocabulary:
//
//   ids [batch, W]
//     → token + position embedding        [batch, W, d_model]
//     → embedding LayerNorm
//     → N × EncoderBlock (causal mask)    [batch, W, d_model]
//     → classify (Linear)                 [batch, W, vocab]
//
// The encoder has the BERT layout (post-norm blocks, GELU
// feed-forward, LayerNorm on the embeddings) so BERT weights can
// be imported into it; see infra::bert_import.
//
// Position t of the output predicts the character at t + 1.
// The causal mask stops position t from attending to anything
// after it, otherwise the model would simply copy the answer
// from the next input position.
//
// Burn's MultiHeadAttention masks where the Bool mask is TRUE,
// so the lower-triangular "may attend" matrix is inverted
// before it is handed over.
//
// Reference: Vaswani et al. (2017), Burn Book §3 (Modules)

use anyhow::{anyhow, Result};
use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::softmax,
};

/// Whether decoding-time forward passes use the causal mask.
///
/// Training always uses `Causal`. `Full` lets every position see
/// the whole window, which is how models trained with an
/// unmasked inference path behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum AttentionMode {
    #[default]
    Causal,
    Full,
}

/// BERT's LayerNorm epsilon.
const LAYER_NORM_EPS: f64 = 1e-12;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct CharLmConfig {
    pub vocab_size: usize,
    /// Longest window the position embedding can address.
    pub max_window: usize,
    pub d_model:    usize,
    pub num_heads:  usize,
    pub num_layers: usize,
    pub d_ff:       usize,
    #[config(default = 0.1)]
    pub dropout:    f64,
}

impl CharLmConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CharLanguageModel<B> {
        CharLanguageModel {
            encoder:  self.init_encoder(device),
            classify: LinearConfig::new(self.d_model, self.vocab_size).init(device),
        }
    }

    pub fn init_encoder<B: Backend>(&self, device: &B::Device) -> TextEncoder<B> {
        let layers = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        TextEncoder {
            token_embedding:    EmbeddingConfig::new(self.vocab_size, self.d_model).init(device),
            position_embedding: EmbeddingConfig::new(self.max_window, self.d_model).init(device),
            embedding_norm: self.layer_norm(device),
            layers,
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        EncoderBlock {
            self_attn: MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
                .with_dropout(self.dropout)
                .init(device),
            ffn_linear1: LinearConfig::new(self.d_model, self.d_ff).init(device),
            ffn_linear2: LinearConfig::new(self.d_ff, self.d_model).init(device),
            norm1:   self.layer_norm(device),
            norm2:   self.layer_norm(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }

    fn layer_norm<B: Backend>(&self, device: &B::Device) -> LayerNorm<B> {
        LayerNormConfig::new(self.d_model).with_epsilon(LAYER_NORM_EPS).init(device)
    }
}

// ─── Masks ────────────────────────────────────────────────────────────────────

/// Lower-triangular `[w, w]` matrix: 1.0 where row t may attend
/// to column s (s ≤ t), 0.0 elsewhere.
pub fn causal_mask<B: Backend>(window: usize, device: &B::Device) -> Tensor<B, 2> {
    Tensor::from_data(TensorData::new(causal_values(window), [window, window]), device)
}

/// The causal mask repeated over the batch, in the form Burn's
/// attention expects (`true` = blocked).
fn blocked_positions<B: Backend>(batch: usize, window: usize, device: &B::Device) -> Tensor<B, 3, Bool> {
    let one = causal_mask::<B>(window, device).unsqueeze::<3>();
    Tensor::cat(vec![one; batch], 0).equal_elem(0.0)
}

fn causal_values(window: usize) -> Vec<f32> {
    (0..window)
        .flat_map(|row| (0..window).map(move |col| if col <= row { 1.0 } else { 0.0 }))
        .collect()
}

// ─── Encoder ──────────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 3>, mask: Option<Tensor<B, 3, Bool>>) -> Tensor<B, 3> {
        let mut input = MhaInput::self_attn(x.clone());
        if let Some(mask) = mask {
            input = input.mask_attn(mask);
        }
        let attn_output = self.self_attn.forward(input).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(
            burn::tensor::activation::gelu(self.ffn_linear1.forward(x.clone()))
        );
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

/// The contextual encoder. Kept as its own module so a
/// pretrained record can be loaded into it alone.
#[derive(Module, Debug)]
pub struct TextEncoder<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub embedding_norm:     LayerNorm<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub dropout:            Dropout,
}

impl<B: Backend> TextEncoder<B> {
    /// input_ids: [batch, W] → hidden states [batch, W, d_model]
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>, attention: AttentionMode) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        let device  = input_ids.device();
        let tok_emb = self.token_embedding.forward(input_ids);

        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        let mask = match attention {
            AttentionMode::Causal => Some(blocked_positions::<B>(batch_size, seq_len, &device)),
            AttentionMode::Full   => None,
        };

        let mut x = self.dropout.forward(self.embedding_norm.forward(tok_emb + pos_emb));
        for layer in &self.layers {
            x = layer.forward(x, mask.clone());
        }
        x
    }
}

// ─── Language model ───────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct CharLanguageModel<B: Backend> {
    pub encoder:  TextEncoder<B>,
    pub classify: Linear<B>,
}

impl<B: Backend> CharLanguageModel<B> {
    /// input_ids: [batch, W] → logits [batch, W, vocab]
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>, attention: AttentionMode) -> Tensor<B, 3> {
        self.classify.forward(self.encoder.forward(input_ids, attention))
    }

    /// Causal forward pass plus cross-entropy against the shifted
    /// targets, flattened over batch × position.
    pub fn forward_loss(&self, inputs: Tensor<B, 2, Int>, targets: Tensor<B, 2, Int>) -> Tensor<B, 1> {
        let logits = self.forward(inputs, AttentionMode::Causal);
        language_model_loss(logits, targets)
    }

    /// Probability of every vocabulary entry for the character
    /// following `context`, read off the last position.
    pub fn next_token_probs(
        &self,
        context:   &[u32],
        attention: AttentionMode,
        device:    &B::Device,
    ) -> Result<Vec<f32>> {
        if context.is_empty() {
            return Err(anyhow!("cannot predict from an empty context"));
        }
        let len = context.len();
        let ids: Vec<i32> = context.iter().map(|&id| id as i32).collect();
        let input = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), device).reshape([1, len]);

        let logits = self.forward(input, attention);
        let [_, _, vocab] = logits.dims();
        let last = logits.slice([0..1, len - 1..len, 0..vocab]).reshape([vocab]);

        softmax(last, 0)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("cannot read probabilities: {e:?}"))
    }
}

/// Cross-entropy over logits `[batch, W, vocab]` and targets `[batch, W]`.
pub fn language_model_loss<B: Backend>(logits: Tensor<B, 3>, targets: Tensor<B, 2, Int>) -> Tensor<B, 1> {
    let [batch, window, vocab] = logits.dims();
    let device = logits.device();
    CrossEntropyLossConfig::new()
        .init(&device)
        .forward(logits.reshape([batch * window, vocab]), targets.reshape([batch * window]))
}
