// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between raw text files and the numbers the two
// pipelines compute on.
//
// Pipeline A (language model):
//
//   vocab.txt / corpus.txt
//       │
//       ▼
//   loader          → reads files, flattens the corpus
//       │
//       ▼
//   preprocessor    → strips invisible / control characters
//       │
//       ▼
//   CharTokenizer   → characters to ids        (Layer 6)
//       │
//       ▼
//   WindowSampler   → random (input, shifted target) windows
//       │
//       ▼
//   WindowBatcher   → stacks windows into [batch, window] tensors
//
// Pipeline B (clusterer):
//
//   titles.txt ─► loader ─► JiebaSegmenter ─► segment_unique
//                                                    │
//   model.w2v ─► WordEmbeddings ─► sentence_vector ◄─┘
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Vocabulary, corpus and sentence file readers
pub mod loader;

/// Line cleaning and corpus flattening
pub mod preprocessor;

/// Random next-character training windows
pub mod window;

/// Implements Burn's Batcher trait for training windows
pub mod batcher;

/// Word2vec text-format embedding table and sentence vectors
pub mod embeddings;

/// Word segmentation (jieba or dictionary max-match) and deduplication
pub mod segmenter;
