// ============================================================
// Layer 4 — Batchers
// ============================================================
// Implements Burn's Batcher trait to stack encoded examples
// into rectangular Int tensors.
//
// Encoded sequences have different lengths, so each field is
// padded on its own to the longest sequence *in this batch*:
//
//   [CLS] a b [SEP]            →  101  7  9 102   0   0
//   [CLS] a b c d [SEP]        →  101  7  9  11  12 102
//
// Token ids are padded with the vocabulary's [PAD] id, segment
// ids with the pad type id (0 for BERT/ERNIE vocabularies).
// Labels are scalars and are stacked without padding. Example
// order inside a batch is preserved.
//
// Reference: Burn Book §4 (Batcher)

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::dataset::{EncodedPair, EncodedTriplet};
use crate::data::encoder::EncodedText;

/// Flatten `seqs` row-major after right-padding each row with `pad`
/// to the longest row. Returns the flat buffer and the padded width.
pub fn pad_sequences(seqs: &[&[u32]], pad: u32) -> (Vec<i32>, usize) {
    let max_len = seqs.iter().map(|s| s.len()).max().unwrap_or(0);

    let mut flat = Vec::with_capacity(seqs.len() * max_len);
    for seq in seqs {
        flat.extend(seq.iter().map(|&t| t as i32));
        flat.extend(std::iter::repeat(pad as i32).take(max_len - seq.len()));
    }
    (flat, max_len)
}

fn padded_tensor<B: Backend>(seqs: &[&[u32]], pad: u32, device: &B::Device) -> Tensor<B, 2, Int> {
    let (flat, max_len) = pad_sequences(seqs, pad);
    Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device).reshape([seqs.len(), max_len])
}

/// Pad values shared by both batchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadIds {
    pub token:      u32,
    pub token_type: u32,
}

// ─── Cross-encoder batches ────────────────────────────────────────────────────

/// A batch of text pairs. Shapes: ids [batch, seq_len], labels [batch].
#[derive(Debug, Clone)]
pub struct PairBatch<B: Backend> {
    pub input_ids:      Tensor<B, 2, Int>,
    pub token_type_ids: Tensor<B, 2, Int>,
    pub labels:         Tensor<B, 1, Int>,
}

#[derive(Clone, Debug)]
pub struct PairBatcher<B: Backend> {
    device: B::Device,
    pad:    PadIds,
}

impl<B: Backend> PairBatcher<B> {
    pub fn new(device: B::Device, pad: PadIds) -> Self {
        Self { device, pad }
    }
}

impl<B: Backend> Batcher<EncodedPair, PairBatch<B>> for PairBatcher<B> {
    fn batch(&self, items: Vec<EncodedPair>) -> PairBatch<B> {
        let ids:   Vec<&[u32]> = items.iter().map(|p| p.text.input_ids.as_slice()).collect();
        let types: Vec<&[u32]> = items.iter().map(|p| p.text.token_type_ids.as_slice()).collect();
        let labels: Vec<i32>   = items.iter().map(|p| p.label as i32).collect();

        PairBatch {
            input_ids:      padded_tensor(&ids, self.pad.token, &self.device),
            token_type_ids: padded_tensor(&types, self.pad.token_type, &self.device),
            labels:         Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device),
        }
    }
}

// ─── Dual-encoder batches ─────────────────────────────────────────────────────

/// A batch of (query, positive title, negative title) triples.
/// Each of the three texts has its own padded width.
#[derive(Debug, Clone)]
pub struct TripletBatch<B: Backend> {
    pub query_input_ids:          Tensor<B, 2, Int>,
    pub query_token_type_ids:     Tensor<B, 2, Int>,
    pub pos_title_input_ids:      Tensor<B, 2, Int>,
    pub pos_title_token_type_ids: Tensor<B, 2, Int>,
    pub neg_title_input_ids:      Tensor<B, 2, Int>,
    pub neg_title_token_type_ids: Tensor<B, 2, Int>,
}

#[derive(Clone, Debug)]
pub struct TripletBatcher<B: Backend> {
    device: B::Device,
    pad:    PadIds,
}

impl<B: Backend> TripletBatcher<B> {
    pub fn new(device: B::Device, pad: PadIds) -> Self {
        Self { device, pad }
    }

    fn field(
        &self,
        items: &[EncodedTriplet],
        pick:  fn(&EncodedTriplet) -> &EncodedText,
    ) -> (Tensor<B, 2, Int>, Tensor<B, 2, Int>) {
        let ids:   Vec<&[u32]> = items.iter().map(|t| pick(t).input_ids.as_slice()).collect();
        let types: Vec<&[u32]> = items.iter().map(|t| pick(t).token_type_ids.as_slice()).collect();
        (
            padded_tensor(&ids, self.pad.token, &self.device),
            padded_tensor(&types, self.pad.token_type, &self.device),
        )
    }
}

impl<B: Backend> Batcher<EncodedTriplet, TripletBatch<B>> for TripletBatcher<B> {
    fn batch(&self, items: Vec<EncodedTriplet>) -> TripletBatch<B> {
        let (query_input_ids, query_token_type_ids)         = self.field(&items, |t| &t.query);
        let (pos_title_input_ids, pos_title_token_type_ids) = self.field(&items, |t| &t.pos_title);
        let (neg_title_input_ids, neg_title_token_type_ids) = self.field(&items, |t| &t.neg_title);

        TripletBatch {
            query_input_ids,
            query_token_type_ids,
            pos_title_input_ids,
            pos_title_token_type_ids,
            neg_title_input_ids,
            neg_title_token_type_ids,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{int_values, TestBackend};

    const PAD: PadIds = PadIds { token: 0, token_type: 0 };

    fn text(ids: &[u32], types: &[u32]) -> EncodedText {
        EncodedText { input_ids: ids.to_vec(), token_type_ids: types.to_vec() }
    }

    #[test]
    fn test_pad_sequences_right_pads_to_longest() {
        let (flat, width) = pad_sequences(&[&[1, 2], &[3, 4, 5], &[6]], 9);
        assert_eq!(width, 3);
        assert_eq!(flat, vec![1, 2, 9, 3, 4, 5, 6, 9, 9]);
    }

    #[test]
    fn test_pad_sequences_empty_batch() {
        let (flat, width) = pad_sequences(&[], 0);
        assert_eq!(width, 0);
        assert!(flat.is_empty());
    }

    #[test]
    fn test_pair_batch_is_rectangular_with_one_label_per_example() {
        let items = vec![
            EncodedPair { text: text(&[2, 7, 3], &[0, 0, 0]), label: 1 },
            EncodedPair { text: text(&[2, 7, 8, 3, 9, 3], &[0, 0, 0, 0, 1, 1]), label: 0 },
            EncodedPair { text: text(&[2, 3], &[0, 0]), label: 1 },
        ];
        let batch: PairBatch<TestBackend> = PairBatcher::new(Default::default(), PAD).batch(items);

        assert_eq!(batch.input_ids.dims(), [3, 6]);
        assert_eq!(batch.token_type_ids.dims(), [3, 6]);
        assert_eq!(batch.labels.dims(), [3]);

        assert_eq!(int_values(batch.labels), vec![1, 0, 1]);
        let ids = int_values(batch.input_ids);
        assert_eq!(&ids[0..6], &[2, 7, 3, 0, 0, 0]);
        assert_eq!(&ids[6..12], &[2, 7, 8, 3, 9, 3]);
        assert_eq!(&ids[12..18], &[2, 3, 0, 0, 0, 0]);
        let types = int_values(batch.token_type_ids);
        assert_eq!(&types[6..12], &[0, 0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_pair_batch_uses_configured_pad_id() {
        let items = vec![
            EncodedPair { text: text(&[2, 3], &[0, 0]), label: 0 },
            EncodedPair { text: text(&[2, 5, 3], &[0, 0, 0]), label: 0 },
        ];
        let pad = PadIds { token: 42, token_type: 7 };
        let batch: PairBatch<TestBackend> = PairBatcher::new(Default::default(), pad).batch(items);
        assert_eq!(int_values(batch.input_ids), vec![2, 3, 42, 2, 5, 3]);
        assert_eq!(int_values(batch.token_type_ids), vec![0, 0, 7, 0, 0, 0]);
    }

    #[test]
    fn test_triplet_fields_are_padded_independently() {
        let items = vec![
            EncodedTriplet {
                query:     text(&[2, 5, 3], &[0; 3]),
                pos_title: text(&[2, 6, 7, 8, 3], &[0; 5]),
                neg_title: text(&[2, 9, 3], &[0; 3]),
            },
            EncodedTriplet {
                query:     text(&[2, 3], &[0; 2]),
                pos_title: text(&[2, 6, 3], &[0; 3]),
                neg_title: text(&[2, 9, 10, 11, 12, 13, 3], &[0; 7]),
            },
        ];
        let batch: TripletBatch<TestBackend> =
            TripletBatcher::new(Default::default(), PAD).batch(items);

        assert_eq!(batch.query_input_ids.dims(), [2, 3]);
        assert_eq!(batch.query_token_type_ids.dims(), [2, 3]);
        assert_eq!(batch.pos_title_input_ids.dims(), [2, 5]);
        assert_eq!(batch.neg_title_input_ids.dims(), [2, 7]);
        assert_eq!(batch.neg_title_token_type_ids.dims(), [2, 7]);

        // order preserved: the second query is the short one
        assert_eq!(int_values(batch.query_input_ids), vec![2, 5, 3, 2, 3, 0]);
    }
}
