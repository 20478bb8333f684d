// ============================================================
// Layer 6 — Pretrained Directory
// ============================================================
// A pretrained backbone is a directory laid out like a
// HuggingFace checkpoint converted to Burn:
//
//   <pretrained_dir>/
//     tokenizer.json    ← required
//     config.json       ← required, BERT field names
//     model_state.mpk   ← optional backbone weights
//
// Without model_state.mpk the backbone starts from random
// weights, which is only useful for smoke runs.

use anyhow::{anyhow, ensure, Result};
use burn::prelude::*;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

use crate::infra::checkpoint::{load_model_state, MODEL_STATE_FILE};
use crate::infra::tokenizer_store::TokenizerStore;
use crate::ml::backbone::{Backbone, BackboneConfig};

pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone)]
pub struct PretrainedDir {
    root: PathBuf,
}

impl PretrainedDir {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        ensure!(root.is_dir(), "pretrained dir '{}' does not exist", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tokenizer(&self) -> Result<Tokenizer> {
        TokenizerStore::new(&self.root).load()
    }

    pub fn config(&self) -> Result<BackboneConfig> {
        let path = self.root.join(CONFIG_FILE);
        BackboneConfig::load(&path)
            .map_err(|e| anyhow!("Cannot read backbone config '{}': {e}", path.display()))
    }

    pub fn has_weights(&self) -> bool {
        self.root.join(MODEL_STATE_FILE).is_file()
    }

    /// Build the backbone described by `config` and load the directory's
    /// weights into it when present.
    pub fn backbone<B: Backend>(&self, config: &BackboneConfig, device: &B::Device) -> Result<Backbone<B>> {
        let backbone = config.init::<B>(device);
        if !self.has_weights() {
            tracing::warn!(
                "No {} in '{}'; the backbone starts from random weights",
                MODEL_STATE_FILE,
                self.root.display()
            );
            return Ok(backbone);
        }

        let backbone = load_model_state(backbone, &self.root.join(MODEL_STATE_FILE), device)?;
        tracing::info!("Loaded pretrained backbone from '{}'", self.root.display());
        Ok(backbone)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::checkpoint::MODEL_STATE;
    use crate::test_support::{float_values, tiny_backbone_config, write_pretrained_dir, TestBackend};
    use burn::record::DefaultRecorder;

    #[test]
    fn test_reads_config_and_tokenizer() {
        let tmp = tempfile::tempdir().unwrap();
        write_pretrained_dir(tmp.path());

        let dir = PretrainedDir::open(tmp.path()).unwrap();
        assert_eq!(dir.config().unwrap().hidden_size, tiny_backbone_config().hidden_size);
        assert!(dir.tokenizer().unwrap().token_to_id("[CLS]").is_some());
        assert!(!dir.has_weights());
    }

    #[test]
    fn test_loads_backbone_weights_when_present() {
        let tmp = tempfile::tempdir().unwrap();
        write_pretrained_dir(tmp.path());

        let device = Default::default();
        let cfg    = tiny_backbone_config();
        let source = cfg.init::<TestBackend>(&device);
        let expected = float_values(source.pooler.weight.val());
        source
            .save_file(tmp.path().join(MODEL_STATE), &DefaultRecorder::new())
            .unwrap();

        let dir = PretrainedDir::open(tmp.path()).unwrap();
        assert!(dir.has_weights());
        let loaded = dir.backbone::<TestBackend>(&cfg, &device).unwrap();
        assert_eq!(float_values(loaded.pooler.weight.val()), expected);
    }

    #[test]
    fn test_missing_dir_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(PretrainedDir::open(tmp.path().join("absent")).is_err());
    }

    #[test]
    fn test_hf_config_extra_fields_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"{"architectures":["BertModel"],"model_type":"bert","vocab_size":30,
                "hidden_size":16,"num_hidden_layers":2,"num_attention_heads":4,
                "intermediate_size":32,"max_position_embeddings":128,"type_vocab_size":2,
                "hidden_dropout_prob":0.1,"attention_probs_dropout_prob":0.1,
                "layer_norm_eps":1e-12,"pad_token_id":0,"hidden_act":"gelu"}"#,
        )
        .unwrap();

        let cfg = PretrainedDir::open(tmp.path()).unwrap().config().unwrap();
        assert_eq!(cfg.vocab_size, 30);
        assert_eq!(cfg.num_hidden_layers, 2);
    }
}
