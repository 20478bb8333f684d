// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves model weights with Burn's DefaultRecorder (named
// MessagePack, full precision) under one directory per
// global step:
//
//   <save_dir>/
//     model_100/
//       model_state.mpk     ← all learned parameters
//       tokenizer.json      ← vocabulary used for training
//       model_config.json   ← architecture needed to rebuild the model
//       train_config.json   ← the run's hyperparameters
//     model_200/
//     ...
//
// Loading is type-safe: a record whose parameter tree does not
// match the model fails instead of loading silently.

use anyhow::{Context, Result};
use burn::{prelude::*, record::DefaultRecorder};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tokenizers::Tokenizer;

use crate::infra::tokenizer_store::TokenizerStore;

/// Record file stem; the recorder adds the `.mpk` extension.
pub const MODEL_STATE: &str = "model_state";
pub const MODEL_STATE_FILE: &str = "model_state.mpk";
pub const MODEL_CONFIG_FILE: &str = "model_config.json";
pub const TRAIN_CONFIG_FILE: &str = "train_config.json";

pub struct CheckpointManager {
    dir:               PathBuf,
    tokenizer:         Tokenizer,
    model_config_json: String,
    train_config_json: String,
}

impl CheckpointManager {
    /// The configs are serialized once here and copied into every checkpoint.
    pub fn new(
        dir:          impl Into<PathBuf>,
        tokenizer:    Tokenizer,
        model_config: &impl Serialize,
        train_config: &impl Serialize,
    ) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create save dir '{}'", dir.display()))?;

        Ok(Self {
            dir,
            tokenizer,
            model_config_json: serde_json::to_string_pretty(model_config)?,
            train_config_json: serde_json::to_string_pretty(train_config)?,
        })
    }

    pub fn step_dir(&self, global_step: usize) -> PathBuf {
        self.dir.join(format!("model_{global_step}"))
    }

    /// Write a complete checkpoint for `global_step` and return its directory.
    pub fn save<B: Backend, M: Module<B>>(&self, model: &M, global_step: usize) -> Result<PathBuf> {
        let dir = self.step_dir(global_step);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;

        let state = dir.join(MODEL_STATE);
        model
            .clone()
            .save_file(state.clone(), &DefaultRecorder::new())
            .with_context(|| format!("Failed to save checkpoint to '{}'", state.display()))?;

        TokenizerStore::new(&dir).save(&self.tokenizer)?;

        for (name, json) in [
            (MODEL_CONFIG_FILE, &self.model_config_json),
            (TRAIN_CONFIG_FILE, &self.train_config_json),
        ] {
            let path = dir.join(name);
            fs::write(&path, json)
                .with_context(|| format!("Cannot write '{}'", path.display()))?;
        }

        tracing::debug!("Saved checkpoint: step {}", global_step);
        Ok(dir)
    }
}

/// Load a record file into `model`. `path` may name the `.mpk` file,
/// the record path without extension, or a checkpoint directory.
pub fn load_model_state<B: Backend, M: Module<B>>(model: M, path: &Path, device: &B::Device) -> Result<M> {
    let file = resolve_state_file(path)
        .with_context(|| format!("No model state found at '{}'", path.display()))?;

    model
        .load_file(file.clone(), &DefaultRecorder::new(), device)
        .with_context(|| {
            format!(
                "Cannot load model state '{}'. Does it match the model architecture?",
                file.display()
            )
        })
}

/// Warm-start from `--init_from_ckpt`. A path that does not exist is
/// logged and skipped, leaving `model` unchanged.
pub fn init_from_checkpoint<B: Backend, M: Module<B>>(
    model:  M,
    path:   Option<&Path>,
    device: &B::Device,
) -> Result<M> {
    let Some(path) = path else {
        return Ok(model);
    };

    if resolve_state_file(path).is_none() {
        tracing::warn!("init_from_ckpt '{}' not found; starting from the initial weights", path.display());
        return Ok(model);
    }

    let model = load_model_state(model, path, device)?;
    tracing::info!("Loaded parameters from '{}'", path.display());
    Ok(model)
}

fn resolve_state_file(path: &Path) -> Option<PathBuf> {
    let candidates = [
        path.to_path_buf(),
        path.with_extension("mpk"),
        path.join(MODEL_STATE_FILE),
    ];
    candidates.into_iter().find(|p| p.is_file())
}
