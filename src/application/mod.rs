// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// One use case per training driver. Each one turns a validated
// config into a run: load the pretrained backbone and the TSV
// data, build the model, pick the backend and hand everything
// to the shared trainer.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Pair classifier training
pub mod train_cross_encoder;

/// Two-tower retriever training
pub mod train_dual_encoder;

/// Steps both use cases share
mod setup;

/// Where the model is trained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// ndarray backend
    Cpu,
    /// wgpu backend, default adapter
    Gpu,
}

/// What a finished run reports back to the caller.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub global_step:      usize,
    pub avg_loss:         f64,
    pub accuracy:         f64,
    pub final_checkpoint: Option<PathBuf>,
}
