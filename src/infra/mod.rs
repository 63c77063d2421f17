// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Persistence shared by the training and inference paths:
//
//   checkpoint.rs      — model records (CompactRecorder), the
//                        run's TrainConfig as JSON, encoder
//                        export and pretrained encoder loading
//
//   bert_import.rs     — copies HuggingFace BERT safetensors
//                        weights into the encoder
//
//   tokenizer_store.rs — builds the character tokenizer from the
//                        vocabulary, saves it next to the
//                        checkpoint and loads it back, so ids
//                        never drift between train and generate
//
//   metrics.rs         — per-epoch loss CSV
//
// Reference: Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// BERT safetensors → TextEncoder weights
pub mod bert_import;

/// Character tokenizer build, save and load
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;
