// ============================================================
// Layer 4 — Encoded Dataset
// ============================================================
// Tokenises every example up front and serves the encoded items
// to burn's DataLoader. Each worker keeps only its own shard:
// index i goes to worker i % world_size, after the index space is
// wrapped around to a multiple of world_size so every shard yields
// the same number of batches per epoch.
//
// Reference: Burn Book §4 (Dataset)

use anyhow::{Context, Result};
use burn::data::dataset::Dataset;

use crate::data::encoder::{EncodedText, TextEncoder};
use crate::domain::example::{PairExample, TripletExample};

/// One classifier example after tokenisation: [CLS] a [SEP] b [SEP] + label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPair {
    pub text:  EncodedText,
    pub label: u8,
}

/// One retriever example after tokenisation; each text encoded on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTriplet {
    pub query:     EncodedText,
    pub pos_title: EncodedText,
    pub neg_title: EncodedText,
}

/// Fails on the first example the tokenizer rejects, naming its index.
pub fn encode_pairs(encoder: &TextEncoder, examples: &[PairExample]) -> Result<Vec<EncodedPair>> {
    examples
        .iter()
        .enumerate()
        .map(|(i, ex)| {
            let text = encoder
                .encode_pair(&ex.text_a, &ex.text_b)
                .with_context(|| format!("cannot encode example {}", i + 1))?;
            Ok(EncodedPair { text, label: ex.label })
        })
        .collect()
}

/// Queries and titles have separate length limits, hence two encoders.
pub fn encode_triplets(
    query_encoder: &TextEncoder,
    title_encoder: &TextEncoder,
    examples:      &[TripletExample],
) -> Result<Vec<EncodedTriplet>> {
    examples
        .iter()
        .enumerate()
        .map(|(i, ex)| {
            let ctx = || format!("cannot encode example {}", i + 1);
            Ok(EncodedTriplet {
                query:     query_encoder.encode_single(&ex.query).with_context(ctx)?,
                pos_title: title_encoder.encode_single(&ex.pos_title).with_context(ctx)?,
                neg_title: title_encoder.encode_single(&ex.neg_title).with_context(ctx)?,
            })
        })
        .collect()
}

/// In-memory dataset of encoded examples.
pub struct ExampleDataset<T> {
    items: Vec<T>,
}

impl<T: Clone> ExampleDataset<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Keep the items worker `rank` of `world_size` is responsible for.
    ///
    /// The index space is first padded by wrapping around to a multiple
    /// of `world_size`, so every worker sees the same number of items
    /// (and therefore the same number of batches per epoch), then worker
    /// `rank` takes every index `i` with `i % world_size == rank`.
    pub fn shard(self, rank: usize, world_size: usize) -> Self {
        let n = self.items.len();
        if world_size <= 1 || n == 0 {
            return self;
        }

        let total = n.div_ceil(world_size) * world_size;
        let items = (rank..total)
            .step_by(world_size)
            .map(|i| self.items[i % n].clone())
            .collect();
        Self { items }
    }
}

impl<T: Clone + Send + Sync> Dataset<T> for ExampleDataset<T> {
    fn get(&self, index: usize) -> Option<T> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
