// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Reads and writes `tokenizer.json` (HuggingFace tokenizers
// format) in a directory. The same file is read from the
// pretrained directory and copied into every checkpoint, so a
// checkpoint always carries the vocabulary it was trained with.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use tokenizers::Tokenizer;

pub const TOKENIZER_FILE: &str = "tokenizer.json";

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.path();
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow!("Cannot load tokenizer from '{}': {e}", path.display()))
    }

    /// Write `tokenizer` as pretty-printed JSON, creating the directory.
    pub fn save(&self, tokenizer: &Tokenizer) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let path = self.path();
        tokenizer
            .save(&path, true)
            .map_err(|e| anyhow!("Cannot write tokenizer to '{}': {e}", path.display()))?;
        tracing::debug!("Saved tokenizer to '{}'", path.display());
        Ok(path)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::toy_tokenizer;

    #[test]
    fn test_save_then_load_keeps_vocabulary() {
        let dir   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path().join("nested"));
        assert!(!store.path().is_file());

        let tokenizer = toy_tokenizer();
        store.save(&tokenizer).unwrap();
        assert!(store.path().is_file());

        let loaded = store.load().unwrap();
        assert_eq!(loaded.get_vocab_size(true), tokenizer.get_vocab_size(true));
        assert_eq!(loaded.token_to_id("rust"), tokenizer.token_to_id("rust"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TokenizerStore::new(dir.path()).load().unwrap_err();
        assert!(err.to_string().contains("tokenizer.json"));
    }
}
