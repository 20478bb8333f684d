// ============================================================
// Layer 2 — Cross-Encoder Training
// ============================================================
// Fine-tunes a pretrained backbone as a pairwise relevance
// classifier:
//
//   Step 1: Validate the config               (this layer)
//   Step 2: Read the pretrained directory     (Layer 6 - infra)
//   Step 3: Read and encode the TSV pairs     (Layer 4 - data)
//   Step 4: Build the model, warm start       (Layer 5 / 6)
//   Step 5: Train with poly-decay schedule    (Layer 5 - ml)
//
// The file order is kept (no shuffling), gradients are clipped
// to a global norm of 1.0 and checkpoints go to
// <save_dir>/model_<step>/.

use anyhow::{ensure, Context, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    data::dataloader::DataLoaderBuilder,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::application::{setup, DeviceKind, TrainReport};
use crate::data::{
    batcher::{PadIds, PairBatcher},
    dataset::{encode_pairs, ExampleDataset},
    encoder::{pad_token_id, pad_token_type_id, TextEncoder},
    reader::load_examples,
};
use crate::domain::example::PairExample;
use crate::infra::{checkpoint::init_from_checkpoint, pretrained::PretrainedDir};
use crate::ml::{
    cross_encoder::CrossEncoderConfig,
    distributed::{Collective, LocalGroup},
    schedule::{warmup_steps_for, PolyDecayWithWarmup},
    trainer::TrainerSettings,
};

/// Gradient global-norm bound for the classifier.
const MAX_GRAD_NORM: f64 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossEncoderTrainConfig {
    pub train_set:         PathBuf,
    pub save_dir:          PathBuf,
    pub pretrained_dir:    PathBuf,
    pub max_seq_length:    usize,
    pub batch_size:        usize,
    pub learning_rate:     f64,
    pub weight_decay:      f64,
    pub epochs:            usize,
    pub warmup_proportion: f64,
    pub save_steps:        usize,
    pub logging_steps:     usize,
    pub init_from_ckpt:    Option<PathBuf>,
    pub seed:              u64,
    pub device:            DeviceKind,
    pub use_amp:           bool,
    pub scale_loss:        f64,
}

impl Default for CrossEncoderTrainConfig {
    fn default() -> Self {
        Self {
            train_set:         PathBuf::new(),
            save_dir:          PathBuf::from("./checkpoint"),
            pretrained_dir:    PathBuf::from("./pretrained"),
            max_seq_length:    128,
            batch_size:        32,
            learning_rate:     5e-5,
            weight_decay:      0.0,
            epochs:            3,
            warmup_proportion: 0.0,
            save_steps:        100,
            logging_steps:     10,
            init_from_ckpt:    None,
            seed:              1000,
            device:            DeviceKind::Gpu,
            use_amp:           false,
            scale_loss:        32768.0,
        }
    }
}

impl CrossEncoderTrainConfig {
    pub fn validate(&self) -> Result<()> {
        setup::validate_common(&setup::CommonArgs {
            batch_size:        self.batch_size,
            epochs:            self.epochs,
            learning_rate:     self.learning_rate,
            warmup_proportion: self.warmup_proportion,
            logging_steps:     self.logging_steps,
            save_steps:        self.save_steps,
        })?;
        ensure!(self.max_seq_length >= 3, "max_seq_length must leave room for [CLS] and two [SEP]");
        Ok(())
    }
}

/// Optimizer steps the schedule spans: epochs · examples / batch / workers,
/// with integer division at every step.
pub fn schedule_steps(epochs: usize, examples: usize, batch_size: usize, world_size: usize) -> usize {
    epochs * examples / batch_size / world_size
}

pub struct CrossEncoderUseCase {
    config: CrossEncoderTrainConfig,
}

impl CrossEncoderUseCase {
    pub fn new(config: CrossEncoderTrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainReport> {
        self.config.validate()?;
        match self.config.device {
            DeviceKind::Cpu => self.train::<Autodiff<NdArray>>(NdArrayDevice::Cpu),
            DeviceKind::Gpu => self.train::<Autodiff<Wgpu>>(WgpuDevice::default()),
        }
    }

    fn train<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainReport> {
        let cfg   = &self.config;
        let group = LocalGroup::from_env()?;
        B::seed(cfg.seed);
        setup::warn_if_amp(cfg.use_amp, cfg.scale_loss);
        tracing::info!("Device: {:?} | workers: {}", device, group.world_size());

        // ── Pretrained backbone ──────────────────────────────────────────────
        let pretrained = PretrainedDir::open(&cfg.pretrained_dir)?;
        let tokenizer  = pretrained.tokenizer()?;
        let backbone_config =
            setup::backbone_config(&pretrained, &tokenizer, cfg.max_seq_length, "max_seq_length")?;
        setup::check_pair_segments(&backbone_config, &pretrained)?;

        // ── Data ─────────────────────────────────────────────────────────────
        let examples: Vec<PairExample> = load_examples(&cfg.train_set)
            .with_context(|| format!("Cannot read train_set '{}'", cfg.train_set.display()))?;
        ensure!(!examples.is_empty(), "train_set '{}' has no examples", cfg.train_set.display());
        tracing::info!("Loaded {} examples from '{}'", examples.len(), cfg.train_set.display());

        let encoder = TextEncoder::new(&tokenizer, cfg.max_seq_length)?;
        let dataset = ExampleDataset::new(encode_pairs(&encoder, &examples)?)
            .shard(group.rank(), group.world_size());
        tracing::info!("Worker {} trains on {} examples", group.rank(), dataset.item_count());

        let total_steps =
            schedule_steps(cfg.epochs, examples.len(), cfg.batch_size, group.world_size()).max(1);
        let schedule = PolyDecayWithWarmup::new(
            cfg.learning_rate,
            total_steps,
            warmup_steps_for(total_steps, cfg.warmup_proportion),
        );
        tracing::info!(
            "Schedule: {} steps, {} warmup, lr={}",
            total_steps, schedule.warmup_steps, cfg.learning_rate
        );

        let pad = PadIds { token: pad_token_id(&tokenizer), token_type: pad_token_type_id(&tokenizer) };
        let loader = DataLoaderBuilder::new(PairBatcher::<B>::new(device.clone(), pad))
            .batch_size(cfg.batch_size)
            .num_workers(1)
            .build(dataset);

        // ── Model ────────────────────────────────────────────────────────────
        let model_config = CrossEncoderConfig::new(backbone_config);
        let backbone     = pretrained.backbone::<B>(&model_config.backbone, &device)?;
        let model        = model_config.init_with_backbone(backbone, &device);
        let model        = init_from_checkpoint(model, cfg.init_from_ckpt.as_deref(), &device)?;

        // ── Train ────────────────────────────────────────────────────────────
        let settings = TrainerSettings {
            epochs:        cfg.epochs,
            logging_steps: cfg.logging_steps,
            save_steps:    cfg.save_steps,
            weight_decay:  cfg.weight_decay,
            max_grad_norm: Some(MAX_GRAD_NORM),
        };
        setup::run_trainer::<B, _, _, _, _>(
            settings, schedule, &group, &cfg.save_dir, &tokenizer,
            &model_config, cfg, model, loader,
        )
    }
}
