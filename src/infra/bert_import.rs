// ============================================================
// Layer 6 — BERT Weight Import
// ============================================================
// Copies the weights of a HuggingFace BERT checkpoint
// (`model.safetensors`, e.g. bert-base-chinese) into a
// TextEncoder, so training can start from a pretrained encoder
// instead of random weights.
//
// Name mapping (an optional leading `bert.` is ignored):
//
//   embeddings.word_embeddings            → token_embedding
//   embeddings.position_embeddings[..W]   → position_embedding
//     (+ token_type_embeddings[0], every input is segment 0)
//   embeddings.LayerNorm                  → embedding_norm
//   encoder.layer.N.attention.self.query  → layers[N].self_attn.query
//   encoder.layer.N.attention.self.key    → layers[N].self_attn.key
//   encoder.layer.N.attention.self.value  → layers[N].self_attn.value
//   encoder.layer.N.attention.output.dense      → self_attn.output
//   encoder.layer.N.attention.output.LayerNorm  → norm1
//   encoder.layer.N.intermediate.dense    → ffn_linear1
//   encoder.layer.N.output.dense          → ffn_linear2
//   encoder.layer.N.output.LayerNorm      → norm2
//
// PyTorch stores Linear weights as [out, in]; Burn wants
// [in, out], so they are transposed on the way in. Only the
// first W rows of the position table are kept. Every other
// shape must match the encoder exactly, and the vocabulary must
// be the one the checkpoint was trained with (same row count).
// Only F32 checkpoints are read.

use std::{fs, path::Path};

use anyhow::Result;
use burn::{
    module::Param,
    nn::{LayerNorm, Linear},
    prelude::*,
};
use safetensors::{Dtype, SafeTensors};

use crate::domain::error::LmError;
use crate::ml::model::TextEncoder;

/// Read `path` and overwrite every parameter of `encoder` with
/// the matching BERT tensor.
pub fn import_bert_encoder<B: Backend>(
    path:    &Path,
    encoder: TextEncoder<B>,
    device:  &B::Device,
) -> Result<TextEncoder<B>> {
    let bytes = fs::read(path).map_err(|e| LmError::artifact(path, e))?;
    let tensors = SafeTensors::deserialize(&bytes).map_err(|e| LmError::artifact(path, e))?;

    let weights = BertWeights::new(path, &tensors);
    let encoder = weights.load_into(encoder, device)?;

    tracing::info!(
        "Imported {} BERT layers from '{}'",
        encoder.layers.len(),
        path.display()
    );
    Ok(encoder)
}

struct BertWeights<'a> {
    path:    &'a Path,
    tensors: &'a SafeTensors<'a>,
    prefix:  &'static str,
}

impl<'a> BertWeights<'a> {
    fn new(path: &'a Path, tensors: &'a SafeTensors<'a>) -> Self {
        let prefix = if tensors.names().iter().any(|n| n.starts_with("bert.")) {
            "bert."
        } else {
            ""
        };
        Self { path, tensors, prefix }
    }

    fn load_into<B: Backend>(&self, mut enc: TextEncoder<B>, device: &B::Device) -> Result<TextEncoder<B>, LmError> {
        let [vocab, d_model] = enc.token_embedding.weight.dims();
        let [window, _]      = enc.position_embedding.weight.dims();

        let tokens = self.tensor::<B, 2>("embeddings.word_embeddings.weight", [vocab, d_model], device)?;
        enc.token_embedding.weight = Param::from_tensor(tokens);

        let positions = self.position_rows::<B>(window, d_model, device)?;
        enc.position_embedding.weight = Param::from_tensor(positions);

        enc.embedding_norm = self.layer_norm("embeddings.LayerNorm", enc.embedding_norm, device)?;

        let mut layers = Vec::with_capacity(enc.layers.len());
        for (n, mut block) in std::mem::take(&mut enc.layers).into_iter().enumerate() {
            let at = |name: &str| format!("encoder.layer.{n}.{name}");

            block.self_attn.query  = self.linear(&at("attention.self.query"), block.self_attn.query, device)?;
            block.self_attn.key    = self.linear(&at("attention.self.key"), block.self_attn.key, device)?;
            block.self_attn.value  = self.linear(&at("attention.self.value"), block.self_attn.value, device)?;
            block.self_attn.output = self.linear(&at("attention.output.dense"), block.self_attn.output, device)?;
            block.norm1       = self.layer_norm(&at("attention.output.LayerNorm"), block.norm1, device)?;
            block.ffn_linear1 = self.linear(&at("intermediate.dense"), block.ffn_linear1, device)?;
            block.ffn_linear2 = self.linear(&at("output.dense"), block.ffn_linear2, device)?;
            block.norm2       = self.layer_norm(&at("output.LayerNorm"), block.norm2, device)?;
            layers.push(block);
        }
        enc.layers = layers;
        Ok(enc)
    }

    /// First `window` position rows, with segment 0 folded in.
    fn position_rows<B: Backend>(&self, window: usize, d_model: usize, device: &B::Device) -> Result<Tensor<B, 2>, LmError> {
        let name = "embeddings.position_embeddings.weight";
        let (values, shape) = self.read(name)?;
        if shape.len() != 2 || shape[0] < window || shape[1] != d_model {
            return Err(self.mismatch(name, &shape, &[window, d_model]));
        }
        let table = Tensor::<B, 2>::from_data(TensorData::new(values, [shape[0], shape[1]]), device);
        let rows  = table.slice([0..window, 0..d_model]);

        match self.read("embeddings.token_type_embeddings.weight") {
            Ok((types, ts)) if ts.len() == 2 && ts[0] > 0 && ts[1] == d_model => {
                let segment = Tensor::<B, 1>::from_data(TensorData::new(types[..d_model].to_vec(), [d_model]), device);
                Ok(rows + segment.unsqueeze::<2>())
            }
            _ => Ok(rows),
        }
    }

    fn linear<B: Backend>(&self, name: &str, mut linear: Linear<B>, device: &B::Device) -> Result<Linear<B>, LmError> {
        let [d_in, d_out] = linear.weight.dims();
        let weight = self.tensor::<B, 2>(&format!("{name}.weight"), [d_out, d_in], device)?;
        linear.weight = Param::from_tensor(weight.transpose());

        if linear.bias.is_some() {
            let bias = self.tensor::<B, 1>(&format!("{name}.bias"), [d_out], device)?;
            linear.bias = Some(Param::from_tensor(bias));
        }
        Ok(linear)
    }

    /// Older checkpoints name the LayerNorm parameters gamma/beta.
    fn layer_norm<B: Backend>(&self, name: &str, mut norm: LayerNorm<B>, device: &B::Device) -> Result<LayerNorm<B>, LmError> {
        let [d_model] = norm.gamma.dims();
        let pick = |new: &str, old: &str| {
            let current = format!("{name}.{new}");
            if self.contains(&current) { current } else { format!("{name}.{old}") }
        };

        norm.gamma = Param::from_tensor(self.tensor::<B, 1>(&pick("weight", "gamma"), [d_model], device)?);
        norm.beta  = Param::from_tensor(self.tensor::<B, 1>(&pick("bias", "beta"), [d_model], device)?);
        Ok(norm)
    }

    fn contains(&self, name: &str) -> bool {
        self.tensors.tensor(&format!("{}{name}", self.prefix)).is_ok()
    }

    fn tensor<B: Backend, const D: usize>(
        &self,
        name:   &str,
        shape:  [usize; D],
        device: &B::Device,
    ) -> Result<Tensor<B, D>, LmError> {
        let (values, found) = self.read(name)?;
        if found != shape {
            return Err(self.mismatch(name, &found, &shape));
        }
        Ok(Tensor::from_data(TensorData::new(values, shape), device))
    }

    fn read(&self, name: &str) -> Result<(Vec<f32>, Vec<usize>), LmError> {
        let full = format!("{}{name}", self.prefix);
        let view = self
            .tensors
            .tensor(&full)
            .map_err(|e| LmError::artifact(self.path, format!("tensor '{full}': {e}")))?;

        if view.dtype() != Dtype::F32 {
            return Err(LmError::artifact(
                self.path,
                format!("tensor '{full}' is {:?}, only F32 is supported", view.dtype()),
            ));
        }
        let values = view
            .data()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok((values, view.shape().to_vec()))
    }

    fn mismatch(&self, name: &str, found: &[usize], expected: &[usize]) -> LmError {
        LmError::artifact(
            self.path,
            format!("tensor '{}{name}' has shape {found:?}, encoder expects {expected:?}", self.prefix),
        )
    }
}
