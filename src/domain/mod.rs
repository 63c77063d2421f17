// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that describe what the two
// pipelines work with:
//
//   vocabulary.rs — token ↔ id mapping with an unknown-token
//                   fallback (Pipeline A)
//   cluster.rs    — ranked k-means clusters (Pipeline B)
//   error.rs      — the failure kinds reported to callers
//   traits.rs     — seams the application layer programs against
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only structs, enums and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

pub mod cluster;
pub mod error;
pub mod traits;
pub mod vocabulary;
