// ============================================================
// Layer 5 — Cross-Encoder Model
// ============================================================
// Pairwise relevance classifier.
//
//   [CLS] text_a [SEP] text_b [SEP] ─ Backbone ─ pooled ─ dropout ─ Linear ─ logits [batch, num_classes]
//
// Trained with softmax cross-entropy against the 0/1 label.

use anyhow::Result;
use burn::{
    nn::{loss::CrossEntropyLossConfig, Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::PairBatch;
use crate::ml::backbone::{Backbone, BackboneConfig};
use crate::ml::distributed::Collective;
use crate::ml::trainer::{StepOutput, Trainable};

/// Backbone shape plus the classification head.
#[derive(Config, Debug)]
pub struct CrossEncoderConfig {
    pub backbone: BackboneConfig,
    #[config(default = 2)]
    pub num_classes: usize,
    /// Classifier dropout; the backbone's hidden dropout when unset.
    pub dropout: Option<f64>,
}

impl CrossEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CrossEncoder<B> {
        self.init_with_backbone(self.backbone.init(device), device)
    }

    /// Attach a fresh classification head to an existing (usually
    /// pretrained) backbone.
    pub fn init_with_backbone<B: Backend>(
        &self,
        backbone: Backbone<B>,
        device:   &B::Device,
    ) -> CrossEncoder<B> {
        let dropout = self.dropout.unwrap_or(self.backbone.hidden_dropout_prob);
        CrossEncoder {
            backbone,
            dropout:    DropoutConfig::new(dropout).init(),
            classifier: LinearConfig::new(self.backbone.hidden_size, self.num_classes).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct CrossEncoder<B: Backend> {
    pub backbone:   Backbone<B>,
    pub dropout:    Dropout,
    pub classifier: Linear<B>,
}

impl<B: Backend> CrossEncoder<B> {
    /// input_ids, token_type_ids: [batch, seq_len] → logits: [batch, num_classes]
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        token_type_ids: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let pooled = self.backbone.forward(input_ids, token_type_ids).pooled_output;
        self.classifier.forward(self.dropout.forward(pooled))
    }

    pub fn forward_loss(&self, batch: PairBatch<B>) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let logits = self.forward(batch.input_ids, batch.token_type_ids);
        let loss = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), batch.labels);
        (loss, logits)
    }
}

impl<B: AutodiffBackend> Trainable<B, PairBatch<B>> for CrossEncoder<B> {
    fn forward_step<C: Collective>(&self, batch: PairBatch<B>, _group: &C) -> Result<StepOutput<B>> {
        let labels = batch.labels.clone();
        let (loss, logits) = self.forward_loss(batch);
        Ok(StepOutput::new(loss, &logits, labels))
    }
}
