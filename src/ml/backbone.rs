// ============================================================
// Layer 5 — Transformer Backbone
// ============================================================
// BERT/ERNIE-style transformer encoder shared by both ranking models.
//
//   input_ids ─┐
//   positions ─┼─ embeddings ─ LayerNorm ─ dropout ─ N × EncoderLayer ─┬─ sequence_output
//   type_ids  ─┘                                                       └─ [CLS] ─ dense ─ tanh ─ pooled_output
//
// Field names of BackboneConfig follow the HuggingFace `config.json`
// of BERT-family checkpoints so a pretrained directory's config loads
// as-is.

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig, Embedding, EmbeddingConfig, LayerNorm, LayerNormConfig, Linear,
        LinearConfig,
    },
    prelude::*,
    tensor::activation::{gelu, tanh},
};

/// Defaults are those of a BERT-base checkpoint; any field present in
/// `config.json` overrides them.
#[derive(Config, Debug)]
pub struct BackboneConfig {
    pub vocab_size: usize,
    #[config(default = 768)]
    pub hidden_size: usize,
    #[config(default = 12)]
    pub num_hidden_layers: usize,
    #[config(default = 12)]
    pub num_attention_heads: usize,
    #[config(default = 3072)]
    pub intermediate_size: usize,
    #[config(default = 512)]
    pub max_position_embeddings: usize,
    #[config(default = 2)]
    pub type_vocab_size: usize,
    #[config(default = 0.1)]
    pub hidden_dropout_prob: f64,
    #[config(default = 0.1)]
    pub attention_probs_dropout_prob: f64,
    #[config(default = 1e-12)]
    pub layer_norm_eps: f64,
    #[config(default = 0)]
    pub pad_token_id: usize,
}

impl BackboneConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Backbone<B> {
        let layers = (0..self.num_hidden_layers)
            .map(|_| self.init_layer(device))
            .collect();

        Backbone {
            word_embeddings:       EmbeddingConfig::new(self.vocab_size, self.hidden_size).init(device),
            position_embeddings:   EmbeddingConfig::new(self.max_position_embeddings, self.hidden_size).init(device),
            token_type_embeddings: EmbeddingConfig::new(self.type_vocab_size, self.hidden_size).init(device),
            embedding_norm:        self.layer_norm(device),
            layers,
            pooler:                LinearConfig::new(self.hidden_size, self.hidden_size).init(device),
            dropout:               DropoutConfig::new(self.hidden_dropout_prob).init(),
            hidden_size:           self.hidden_size,
            pad_token_id:          self.pad_token_id,
        }
    }

    fn layer_norm<B: Backend>(&self, device: &B::Device) -> LayerNorm<B> {
        LayerNormConfig::new(self.hidden_size)
            .with_epsilon(self.layer_norm_eps)
            .init(device)
    }

    fn init_layer<B: Backend>(&self, device: &B::Device) -> EncoderLayer<B> {
        EncoderLayer {
            self_attn: MultiHeadAttentionConfig::new(self.hidden_size, self.num_attention_heads)
                .with_dropout(self.attention_probs_dropout_prob)
                .init(device),
            ffn_in:    LinearConfig::new(self.hidden_size, self.intermediate_size).init(device),
            ffn_out:   LinearConfig::new(self.intermediate_size, self.hidden_size).init(device),
            attn_norm: self.layer_norm(device),
            ffn_norm:  self.layer_norm(device),
            dropout:   DropoutConfig::new(self.hidden_dropout_prob).init(),
        }
    }
}

/// Post-norm transformer layer (the BERT arrangement).
#[derive(Module, Debug)]
pub struct EncoderLayer<B: Backend> {
    pub self_attn: MultiHeadAttention<B>,
    pub ffn_in:    Linear<B>,
    pub ffn_out:   Linear<B>,
    pub attn_norm: LayerNorm<B>,
    pub ffn_norm:  LayerNorm<B>,
    pub dropout:   Dropout,
}

impl<B: Backend> EncoderLayer<B> {
    /// `pad_mask` is true at padding positions, which attention ignores.
    pub fn forward(&self, x: Tensor<B, 3>, pad_mask: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn = self
            .self_attn
            .forward(MhaInput::self_attn(x.clone()).mask_pad(pad_mask))
            .context;
        let x = self.attn_norm.forward(x + self.dropout.forward(attn));

        let ffn = self.ffn_out.forward(gelu(self.ffn_in.forward(x.clone())));
        self.ffn_norm.forward(x + self.dropout.forward(ffn))
    }
}

#[derive(Module, Debug)]
pub struct Backbone<B: Backend> {
    pub word_embeddings:       Embedding<B>,
    pub position_embeddings:   Embedding<B>,
    pub token_type_embeddings: Embedding<B>,
    pub embedding_norm:        LayerNorm<B>,
    pub layers:                Vec<EncoderLayer<B>>,
    pub pooler:                Linear<B>,
    pub dropout:               Dropout,
    pub hidden_size:           usize,
    pub pad_token_id:          usize,
}

pub struct BackboneOutput<B: Backend> {
    /// [batch, seq_len, hidden]
    pub sequence_output: Tensor<B, 3>,
    /// [batch, hidden]: tanh(dense(first token))
    pub pooled_output:   Tensor<B, 2>,
}

impl<B: Backend> Backbone<B> {
    /// input_ids, token_type_ids: [batch, seq_len]
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        token_type_ids: Tensor<B, 2, Int>,
    ) -> BackboneOutput<B> {
        let [batch_size, seq_len] = input_ids.dims();
        let device = input_ids.device();

        let pad_mask = input_ids.clone().equal_elem(self.pad_token_id as i64);

        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);

        let embeddings = self.word_embeddings.forward(input_ids)
            + self.position_embeddings.forward(positions)
            + self.token_type_embeddings.forward(token_type_ids);
        let mut x = self.dropout.forward(self.embedding_norm.forward(embeddings));

        for layer in &self.layers {
            x = layer.forward(x, pad_mask.clone());
        }

        let first = x
            .clone()
            .slice([0..batch_size, 0..1, 0..self.hidden_size])
            .reshape([batch_size, self.hidden_size]);
        let pooled_output = tanh(self.pooler.forward(first));

        BackboneOutput { sequence_output: x, pooled_output }
    }
}
