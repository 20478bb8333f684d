// ============================================================
// Layer 4 — Text Encoder
// ============================================================
// Thin adapter over a pretrained HuggingFace tokenizer.
//
// The tokenizer's own post-processor inserts the special tokens
// and segment ids, e.g. for a BERT/ERNIE vocabulary:
//
//   single: [CLS] text [SEP]              type ids 0 … 0
//   pair:   [CLS] a [SEP] b [SEP]         type ids 0 … 0 1 … 1
//
// This is the only contract with the pretrained weights, so the
// encoder never re-implements tokenisation; it only configures
// right-side longest-first truncation and turns padding off
// (padding is done per batch by the batcher).

use anyhow::{anyhow, bail, Result};
use tokenizers::{
    Tokenizer, TruncationDirection, TruncationParams, TruncationStrategy,
};

/// Token ids and segment ids of one encoded input, always the same length.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncodedText {
    pub input_ids:      Vec<u32>,
    pub token_type_ids: Vec<u32>,
}

#[derive(Clone)]
pub struct TextEncoder {
    tokenizer:   Tokenizer,
    max_seq_len: usize,
}

impl TextEncoder {
    /// Clone `tokenizer` and configure it to truncate to `max_seq_len`
    /// tokens, special tokens included.
    pub fn new(tokenizer: &Tokenizer, max_seq_len: usize) -> Result<Self> {
        if max_seq_len == 0 {
            bail!("max sequence length must be at least 1");
        }

        let mut tokenizer = tokenizer.clone();
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_seq_len,
                strategy:   TruncationStrategy::LongestFirst,
                direction:  TruncationDirection::Right,
                stride:     0,
            }))
            .map_err(|e| anyhow!("cannot configure truncation: {e}"))?;
        tokenizer.with_padding(None);

        Ok(Self { tokenizer, max_seq_len })
    }

    /// Encode a single text, or a text pair when `pair` is given.
    pub fn encode(&self, text: &str, pair: Option<&str>) -> Result<EncodedText> {
        let encoding = match pair {
            Some(second) => self.tokenizer.encode((text, second), true),
            None         => self.tokenizer.encode(text, true),
        }
        .map_err(|e| anyhow!("tokenisation failed: {e}"))?;

        let mut input_ids      = encoding.get_ids().to_vec();
        let mut token_type_ids = encoding.get_type_ids().to_vec();

        // A post-processor that adds more tokens than it announces could
        // still overshoot; the length bound is enforced regardless.
        input_ids.truncate(self.max_seq_len);
        token_type_ids.truncate(self.max_seq_len);

        Ok(EncodedText { input_ids, token_type_ids })
    }

    pub fn encode_pair(&self, text_a: &str, text_b: &str) -> Result<EncodedText> {
        self.encode(text_a, Some(text_b))
    }

    pub fn encode_single(&self, text: &str) -> Result<EncodedText> {
        self.encode(text, None)
    }
}

/// Id used to pad token sequences: the tokenizer's padding id if it has
/// one configured, else the `[PAD]` token, else 0.
pub fn pad_token_id(tokenizer: &Tokenizer) -> u32 {
    tokenizer
        .get_padding()
        .map(|p| p.pad_id)
        .or_else(|| tokenizer.token_to_id("[PAD]"))
        .unwrap_or(0)
}

/// Segment id used to pad token-type sequences.
pub fn pad_token_type_id(tokenizer: &Tokenizer) -> u32 {
    tokenizer.get_padding().map(|p| p.pad_type_id).unwrap_or(0)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{toy_tokenizer, CLS_ID, PAD_ID, SEP_ID};

    #[test]
    fn test_pair_layout_and_segments() {
        let enc = TextEncoder::new(&toy_tokenizer(), 32).unwrap();
        let out = enc.encode_pair("what is rust", "a language").unwrap();

        // [CLS] what is rust [SEP] a language [SEP]
        assert_eq!(out.input_ids.len(), 8);
        assert_eq!(out.input_ids[0], CLS_ID);
        assert_eq!(out.input_ids[4], SEP_ID);
        assert_eq!(*out.input_ids.last().unwrap(), SEP_ID);
        assert_eq!(out.token_type_ids, vec![0, 0, 0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn test_single_text_has_one_segment() {
        let enc = TextEncoder::new(&toy_tokenizer(), 32).unwrap();
        let out = enc.encode_single("rust is fast").unwrap();
        assert_eq!(out.input_ids.len(), 5);
        assert!(out.token_type_ids.iter().all(|&t| t == 0));
    }

    #[test]
    fn test_output_never_exceeds_max_len() {
        let long = "rust is a fast memory safe systems programming language ".repeat(10);
        for max_len in [5, 7, 16, 33] {
            let enc = TextEncoder::new(&toy_tokenizer(), max_len).unwrap();

            let single = enc.encode_single(&long).unwrap();
            assert!(single.input_ids.len() <= max_len);
            assert_eq!(single.input_ids.len(), single.token_type_ids.len());

            let pair = enc.encode_pair(&long, &long).unwrap();
            assert!(pair.input_ids.len() <= max_len);
            assert_eq!(pair.input_ids.len(), pair.token_type_ids.len());
        }
    }

    #[test]
    fn test_truncation_keeps_closing_separator() {
        let enc = TextEncoder::new(&toy_tokenizer(), 6).unwrap();
        let out = enc.encode_single("rust is a fast memory safe systems language").unwrap();
        assert_eq!(out.input_ids.len(), 6);
        assert_eq!(*out.input_ids.last().unwrap(), SEP_ID);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let enc = TextEncoder::new(&toy_tokenizer(), 16).unwrap();
        let a = enc.encode_pair("iron oxide", "red metal").unwrap();
        let b = enc.encode_pair("iron oxide", "red metal").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_max_len_is_rejected() {
        assert!(TextEncoder::new(&toy_tokenizer(), 0).is_err());
    }

    #[test]
    fn test_pad_ids_from_vocabulary() {
        let tok = toy_tokenizer();
        assert_eq!(pad_token_id(&tok), PAD_ID);
        assert_eq!(pad_token_type_id(&tok), 0);
    }
}
