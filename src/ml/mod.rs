// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model, loss and optimisation code lives here.
//
//   backbone.rs      — BERT-style transformer encoder with pooler
//   cross_encoder.rs — backbone + classification head over a text pair
//   dual_encoder.rs  — query/title towers scored by dot product,
//                      in-batch and cross-batch negatives
//   schedule.rs      — warmup + linear / polynomial decay
//   grads.rs         — global-norm clipping, weight-decay partition
//   distributed.rs   — Collective trait for data-parallel workers
//   trainer.rs       — the shared step loop, logging, checkpoints
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Devlin et al. (2019) BERT
//            Karpukhin et al. (2020) Dense Passage Retrieval

pub mod backbone;

pub mod cross_encoder;

pub mod dual_encoder;

pub mod schedule;

pub mod grads;

pub mod distributed;

/// Shared training loop
pub mod trainer;
