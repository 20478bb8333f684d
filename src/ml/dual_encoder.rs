// ============================================================
// Layer 5 — Dual-Encoder Model
// ============================================================
// Two-tower retriever trained with in-batch negatives.
//
//   query ─ query tower ─┐
//                        ├─ q · tᵀ ─ softmax cross-entropy
//   pos   ─┐             │
//   neg   ─┴ title tower ┘
//
// Each row of the score matrix holds one query against every title in
// the batch: its own positive, the other queries' positives and all
// the hard negatives. With cross-batch negatives the title block is
// gathered from every worker, so each query also scores against the
// titles of its peers.

use anyhow::{ensure, Result};
use burn::{
    nn::{loss::CrossEntropyLossConfig, Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::TripletBatch;
use crate::ml::backbone::{Backbone, BackboneConfig};
use crate::ml::distributed::Collective;
use crate::ml::trainer::{StepOutput, Trainable};

/// Saved as `model_config.json` in every checkpoint, so a checkpoint
/// records whether its towers are shared and how wide its embeddings are.
#[derive(Config, Debug)]
pub struct DualEncoderConfig {
    pub backbone: BackboneConfig,
    /// Independent title tower; titles go through the query tower when unset.
    pub title_backbone: Option<BackboneConfig>,
    /// Project pooled embeddings down to this width.
    pub output_emb_size: Option<usize>,
    pub dropout: Option<f64>,
    #[config(default = false)]
    pub use_cross_batch: bool,
}

impl DualEncoderConfig {
    /// Scores are dot products, so both towers must emit the same width.
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title_backbone {
            ensure!(
                title.hidden_size == self.backbone.hidden_size,
                "query and title towers must have the same hidden size ({} vs {})",
                self.backbone.hidden_size,
                title.hidden_size,
            );
        }
        if let Some(size) = self.output_emb_size {
            ensure!(size > 0, "output_emb_size must be positive");
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> DualEncoder<B> {
        let title = self.title_backbone.as_ref().map(|cfg| cfg.init(device));
        self.init_with_backbones(self.backbone.init(device), title, device)
    }

    pub fn init_with_backbones<B: Backend>(
        &self,
        query_backbone: Backbone<B>,
        title_backbone: Option<Backbone<B>>,
        device:         &B::Device,
    ) -> DualEncoder<B> {
        let hidden  = self.backbone.hidden_size;
        let dropout = self.dropout.unwrap_or(self.backbone.hidden_dropout_prob);

        DualEncoder {
            query_backbone,
            title_backbone,
            emb_reduce: self
                .output_emb_size
                .map(|size| LinearConfig::new(hidden, size).init(device)),
            dropout: DropoutConfig::new(dropout).init(),
            use_cross_batch: self.use_cross_batch,
        }
    }
}

/// Query and title towers plus the optional projection. With
/// `title_backbone` unset both sides run through `query_backbone`
/// and share its gradients.
#[derive(Module, Debug)]
pub struct DualEncoder<B: Backend> {
    pub query_backbone:  Backbone<B>,
    pub title_backbone:  Option<Backbone<B>>,
    pub emb_reduce:      Option<Linear<B>>,
    pub dropout:         Dropout,
    pub use_cross_batch: bool,
}

impl<B: Backend> DualEncoder<B> {
    fn pool(&self, backbone: &Backbone<B>, ids: Tensor<B, 2, Int>, types: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let mut emb = backbone.forward(ids, types).pooled_output;
        if let Some(linear) = &self.emb_reduce {
            emb = linear.forward(emb);
        }
        self.dropout.forward(emb)
    }

    /// [batch, seq_len] → [batch, emb]
    pub fn query_embedding(&self, ids: Tensor<B, 2, Int>, types: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        self.pool(&self.query_backbone, ids, types)
    }

    pub fn title_embedding(&self, ids: Tensor<B, 2, Int>, types: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let tower = self.title_backbone.as_ref().unwrap_or(&self.query_backbone);
        self.pool(tower, ids, types)
    }
}

/// Similarity logits of every query against every title, and the column
/// of each query's positive title.
///
/// Locally the titles are `[pos; neg]`, giving logits `[B, 2B]` and
/// labels `0..B`. With `use_cross_batch` the title block is gathered from
/// all workers in rank order, giving `[B, 2B·world]`, and the labels move
/// to this worker's block: `2B·rank + i`.
pub fn contrastive_scores<B: Backend, C: Collective>(
    query:           Tensor<B, 2>,
    pos_title:       Tensor<B, 2>,
    neg_title:       Tensor<B, 2>,
    use_cross_batch: bool,
    group:           &C,
) -> Result<(Tensor<B, 2>, Tensor<B, 1, Int>)> {
    let batch_size = query.dims()[0];
    let device     = query.device();

    let titles = Tensor::cat(vec![pos_title, neg_title], 0);
    let (titles, offset) = if use_cross_batch {
        (group.all_gather(titles)?, 2 * batch_size * group.rank())
    } else {
        (titles, 0)
    };

    let logits = query.matmul(titles.transpose());
    let labels = Tensor::<B, 1, Int>::arange(offset as i64..(offset + batch_size) as i64, &device);
    Ok((logits, labels))
}

impl<B: AutodiffBackend> Trainable<B, TripletBatch<B>> for DualEncoder<B> {
    fn forward_step<C: Collective>(&self, batch: TripletBatch<B>, group: &C) -> Result<StepOutput<B>> {
        let query = self.query_embedding(batch.query_input_ids, batch.query_token_type_ids);
        let pos   = self.title_embedding(batch.pos_title_input_ids, batch.pos_title_token_type_ids);
        let neg   = self.title_embedding(batch.neg_title_input_ids, batch.neg_title_token_type_ids);

        let (logits, labels) = contrastive_scores(query, pos, neg, self.use_cross_batch, group)?;
        let loss = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), labels.clone());
        Ok(StepOutput::new(loss, &logits, labels))
    }
}
