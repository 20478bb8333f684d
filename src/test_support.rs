// Shared fixtures for unit tests: a tiny word-level tokenizer in
// HuggingFace JSON format, a tiny backbone config and a pretrained
// directory layout matching what the use cases expect.

use std::path::Path;

use burn::prelude::*;
use tokenizers::Tokenizer;

use crate::ml::backbone::BackboneConfig;

pub type TestBackend = burn::backend::NdArray;
pub type TestAutodiffBackend = burn::backend::Autodiff<TestBackend>;

pub const PAD_ID: u32 = 0;
pub const CLS_ID: u32 = 2;
pub const SEP_ID: u32 = 3;

const WORDS: &[&str] = &[
    "what", "is", "rust", "a", "language", "the", "iron", "oxide", "fast",
    "memory", "safe", "systems", "programming", "red", "metal", "query",
    "title", "good", "bad", "search", "engine", "ranking", "model",
];

/// Tokenizer JSON with [PAD]=0 [UNK]=1 [CLS]=2 [SEP]=3 [MASK]=4 and a
/// BERT post-processor, so pairs come out as [CLS] a [SEP] b [SEP].
pub fn toy_tokenizer_json() -> String {
    let mut vocab = serde_json::json!({
        "[PAD]":  0,
        "[UNK]":  1,
        "[CLS]":  2,
        "[SEP]":  3,
        "[MASK]": 4,
    });
    for (i, w) in WORDS.iter().enumerate() {
        vocab[*w] = serde_json::json!(5 + i);
    }

    let special = |id: u32, content: &str| {
        serde_json::json!({
            "id": id, "content": content, "single_word": false, "lstrip": false,
            "rstrip": false, "normalized": false, "special": true
        })
    };

    serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [
            special(0, "[PAD]"), special(1, "[UNK]"), special(2, "[CLS]"),
            special(3, "[SEP]"), special(4, "[MASK]")
        ],
        "normalizer": {
            "type": "BertNormalizer",
            "clean_text": true,
            "handle_chinese_chars": true,
            "strip_accents": null,
            "lowercase": true
        },
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": {
            "type": "BertProcessing",
            "sep": ["[SEP]", SEP_ID],
            "cls": ["[CLS]", CLS_ID]
        },
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": "[UNK]"
        }
    })
    .to_string()
}

pub fn toy_tokenizer() -> Tokenizer {
    Tokenizer::from_bytes(toy_tokenizer_json().as_bytes()).unwrap()
}

pub fn toy_vocab_size() -> usize {
    5 + WORDS.len()
}

/// One layer, hidden size 8: small enough that a full training run
/// finishes in well under a second on the ndarray backend.
pub fn tiny_backbone_config() -> BackboneConfig {
    BackboneConfig::new(toy_vocab_size())
        .with_hidden_size(8)
        .with_num_hidden_layers(1)
        .with_num_attention_heads(2)
        .with_intermediate_size(16)
        .with_max_position_embeddings(64)
        .with_hidden_dropout_prob(0.0)
        .with_attention_probs_dropout_prob(0.0)
}

/// Write `tokenizer.json` and `config.json` into `dir`.
pub fn write_pretrained_dir(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("tokenizer.json"), toy_tokenizer_json()).unwrap();
    tiny_backbone_config().save(dir.join("config.json")).unwrap();
}

pub fn int_values<B: Backend, const D: usize>(t: Tensor<B, D, Int>) -> Vec<i64> {
    t.into_data().iter::<i64>().collect()
}

pub fn float_values<B: Backend, const D: usize>(t: Tensor<B, D>) -> Vec<f32> {
    t.into_data().iter::<f32>().collect()
}
