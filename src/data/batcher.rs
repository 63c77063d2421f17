// ============================================================
// Layer 4 — Window Batcher
// ============================================================
// Implements Burn's Batcher trait to stack TrainingWindows into
// tensors the model can consume.
//
// How batching works here:
//   Input:  Vec of N TrainingWindows, each of length W
//   Output: WindowBatch with two Int tensors of shape [N, W]
//
//   All ids are flattened row by row, then reshaped:
//   [w1_t1, ..., w1_tW, w2_t1, ..., wN_tW] → [N, W]
//
// Every window coming out of the WindowSampler has the same
// length, so no padding is ever needed.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::window::TrainingWindow;

/// A batch of windows ready for the forward pass.
#[derive(Debug, Clone)]
pub struct WindowBatch<B: Backend> {
    /// Input ids — shape: [batch_size, window]
    pub inputs: Tensor<B, 2, Int>,

    /// Shifted target ids — shape: [batch_size, window]
    pub targets: Tensor<B, 2, Int>,
}

#[derive(Clone, Debug)]
pub struct WindowBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> WindowBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    fn stack(&self, rows: Vec<&[u32]>) -> Tensor<B, 2, Int> {
        let batch_size = rows.len();
        let width      = rows.first().map_or(0, |r| r.len());

        // Burn Int tensors are built from i32 here, matching the
        // element type the wgpu backend uses.
        let flat: Vec<i32> = rows
            .iter()
            .flat_map(|row| row.iter().map(|&id| id as i32))
            .collect();

        Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
            .reshape([batch_size, width])
    }
}

impl<B: Backend> Batcher<TrainingWindow, WindowBatch<B>> for WindowBatcher<B> {
    fn batch(&self, items: Vec<TrainingWindow>) -> WindowBatch<B> {
        let inputs  = self.stack(items.iter().map(|w| w.input.as_slice()).collect());
        let targets = self.stack(items.iter().map(|w| w.target.as_slice()).collect());
        WindowBatch { inputs, targets }
    }
}
