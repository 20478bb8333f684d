// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem on behalf of training:
//
//   checkpoint.rs      — model_<step>/ directories with weights,
//                        tokenizer and configs; warm starts
//                        from --init_from_ckpt
//
//   pretrained.rs      — reads a pretrained backbone directory
//                        (tokenizer.json, config.json, optional
//                        model_state.mpk)
//
//   tokenizer_store.rs — tokenizer.json persistence
//
//   metrics.rs         — per-step training metrics as CSV
//
// Reference: Burn Book §5 (Records and Checkpointing)

/// Step checkpoints and warm starts
pub mod checkpoint;

/// Pretrained backbone directories
pub mod pretrained;

/// Tokenizer loading and saving
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;
