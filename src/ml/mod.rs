// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn model code and the numeric algorithms:
//
//   model.rs      — transformer encoder + vocabulary projection,
//                   causal mask, cross-entropy loss
//
//   trainer.rs    — Adam training loop over random windows,
//                   per-epoch sample generation
//
//   generator.rs  — autoregressive decoding with the
//                   greedy / categorical sampling choice
//
//   perplexity.rs — per-sentence perplexity score
//
//   kmeans.rs     — k-means++ clustering and cluster ranking
//                   (plain Rust, no tensors needed)
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need

/// Character language model architecture
pub mod model;

/// Training loop
pub mod trainer;

/// Text generation and sampling
pub mod generator;

/// Sentence perplexity
pub mod perplexity;

/// K-means clustering
pub mod kmeans;
