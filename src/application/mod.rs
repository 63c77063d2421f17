// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Each use case wires the lower layers together for one CLI
// command. No ML math and no printing here: the ml layer
// computes, the cli layer presents.
//
// Reference: Clean Architecture pattern

/// Derive vocab.txt from a corpus
pub mod vocab_use_case;

/// Language-model training workflow
pub mod train_use_case;

/// Generation and perplexity from a saved run
pub mod inference_use_case;

/// Sentence clustering workflow
pub mod cluster_use_case;
