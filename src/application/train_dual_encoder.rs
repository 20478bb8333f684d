// ============================================================
// Layer 2 — Dual-Encoder Training
// ============================================================
// Fine-tunes a query tower and a title tower (shared unless
// --title_pretrained_dir is given) with in-batch negatives:
//
//   Step 1: Validate the config                  (this layer)
//   Step 2: Read the pretrained directories      (Layer 6 - infra)
//   Step 3: Read and encode the TSV triplets     (Layer 4 - data)
//   Step 4: Build the model, warm start          (Layer 5 / 6)
//   Step 5: Train with linear-decay schedule     (Layer 5 - ml)
//
// Data is reshuffled every epoch; queries and titles are
// truncated to their own maximum lengths.

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
    batcher::{PadIds, TripletBatcher},
    dataset::{encode_triplets, ExampleDataset},
    encoder::{pad_token_id, pad_token_type_id, TextEncoder},
    reader::load_examples,
};
use crate::domain::example::TripletExample;
use crate::infra::{checkpoint::init_from_checkpoint, pretrained::PretrainedDir};
use crate::ml::{
    distributed::{Collective, LocalGroup},
    dual_encoder::DualEncoderConfig,
    schedule::LinearDecayWithWarmup,
    trainer::TrainerSettings,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DualEncoderTrainConfig {
    pub train_set_file:        PathBuf,
    pub save_dir:              PathBuf,
    pub pretrained_dir:        PathBuf,
    pub title_pretrained_dir:  Option<PathBuf>,
    pub query_max_seq_length:  usize,
    pub title_max_seq_length:  usize,
    pub output_emb_size:       Option<usize>,
    pub batch_size:            usize,
    pub learning_rate:         f64,
    pub weight_decay:          f64,
    pub epochs:                usize,
    pub warmup_proportion:     f64,
    pub save_steps:            usize,
    pub logging_steps:         usize,
    pub init_from_ckpt:        Option<PathBuf>,
    pub seed:                  u64,
    pub device:                DeviceKind,
    pub use_amp:               bool,
    pub scale_loss:            f64,
    pub use_cross_batch:       bool,
}

impl Default for DualEncoderTrainConfig {
    fn default() -> Self {
        Self {
            train_set_file:       PathBuf::new(),
            save_dir:             PathBuf::from("./checkpoint"),
            pretrained_dir:       PathBuf::from("./pretrained"),
            title_pretrained_dir: None,
            query_max_seq_length: 32,
            title_max_seq_length: 128,
            output_emb_size:      None,
            batch_size:           32,
            learning_rate:        3e-5,
            weight_decay:         0.0,
            epochs:               10,
            warmup_proportion:    0.0,
            save_steps:           10000,
            logging_steps:        10,
            init_from_ckpt:       None,
            seed:                 1000,
            device:               DeviceKind::Gpu,
            use_amp:              false,
            scale_loss:           32768.0,
            use_cross_batch:      false,
        }
    }
}

impl DualEncoderTrainConfig {
    pub fn validate(&self) -> Result<()> {
        setup::validate_common(&setup::CommonArgs {
            batch_size:        self.batch_size,
            epochs:            self.epochs,
            learning_rate:     self.learning_rate,
            warmup_proportion: self.warmup_proportion,
            logging_steps:     self.logging_steps,
            save_steps:        self.save_steps,
        })?;
        ensure!(self.query_max_seq_length >= 2, "query_max_seq_length must leave room for [CLS] and [SEP]");
        ensure!(self.title_max_seq_length >= 2, "title_max_seq_length must leave room for [CLS] and [SEP]");
        Ok(())
    }
}

/// Optimizer steps in the whole run: batches per epoch (the last one
/// may be partial) times epochs.
pub fn schedule_steps(shard_len: usize, batch_size: usize, epochs: usize) -> usize {
    shard_len.div_ceil(batch_size) * epochs
}

pub struct DualEncoderUseCase {
    config: DualEncoderTrainConfig,
}

impl DualEncoderUseCase {
    pub fn new(config: DualEncoderTrainConfig) -> Self {
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

        // ── Pretrained towers ────────────────────────────────────────────────
        let pretrained   = PretrainedDir::open(&cfg.pretrained_dir)?;
        let tokenizer    = pretrained.tokenizer()?;
        let query_config = setup::backbone_config(
            &pretrained, &tokenizer, cfg.query_max_seq_length, "query_max_seq_length",
        )?;

        let title_pretrained = cfg
            .title_pretrained_dir
            .as_ref()
            .map(PretrainedDir::open)
            .transpose()?;
        let title_config = match &title_pretrained {
            Some(dir) => setup::backbone_config(dir, &tokenizer, cfg.title_max_seq_length, "title_max_seq_length")?,
            None      => setup::backbone_config(&pretrained, &tokenizer, cfg.title_max_seq_length, "title_max_seq_length")?,
        };

        let model_config = DualEncoderConfig::new(query_config)
            .with_title_backbone(title_pretrained.as_ref().map(|_| title_config))
            .with_output_emb_size(cfg.output_emb_size)
            .with_use_cross_batch(cfg.use_cross_batch);
        model_config.validate()?;

        // ── Data ─────────────────────────────────────────────────────────────
        let examples: Vec<TripletExample> = load_examples(&cfg.train_set_file)
            .with_context(|| format!("Cannot read train_set_file '{}'", cfg.train_set_file.display()))?;
        ensure!(!examples.is_empty(), "train_set_file '{}' has no examples", cfg.train_set_file.display());
        tracing::info!("Loaded {} examples from '{}'", examples.len(), cfg.train_set_file.display());

        let query_encoder = TextEncoder::new(&tokenizer, cfg.query_max_seq_length)?;
        let title_encoder = TextEncoder::new(&tokenizer, cfg.title_max_seq_length)?;
        let dataset = ExampleDataset::new(encode_triplets(&query_encoder, &title_encoder, &examples)?)
            .shard(group.rank(), group.world_size());
        tracing::info!("Worker {} trains on {} examples", group.rank(), dataset.item_count());

        let total_steps = schedule_steps(dataset.item_count(), cfg.batch_size, cfg.epochs);
        let schedule    = LinearDecayWithWarmup::new(cfg.learning_rate, total_steps, cfg.warmup_proportion);
        tracing::info!(
            "Schedule: {} steps, {} warmup, lr={}",
            total_steps, schedule.warmup_steps, cfg.learning_rate
        );

        let pad = PadIds { token: pad_token_id(&tokenizer), token_type: pad_token_type_id(&tokenizer) };
        let loader = DataLoaderBuilder::new(TripletBatcher::<B>::new(device.clone(), pad))
            .batch_size(cfg.batch_size)
            .shuffle(cfg.seed)
            .num_workers(1)
            .build(dataset);

        // ── Model ────────────────────────────────────────────────────────────
        let query_backbone = pretrained.backbone::<B>(&model_config.backbone, &device)?;
        let title_backbone = match (&title_pretrained, &model_config.title_backbone) {
            (Some(dir), Some(title_cfg)) => Some(dir.backbone::<B>(title_cfg, &device)?),
            _ => None,
        };
        let model = model_config.init_with_backbones(query_backbone, title_backbone, &device);
        let model = init_from_checkpoint(model, cfg.init_from_ckpt.as_deref(), &device)?;

        // ── Train ────────────────────────────────────────────────────────────
        let settings = TrainerSettings {
            epochs:        cfg.epochs,
            logging_steps: cfg.logging_steps,
            save_steps:    cfg.save_steps,
            weight_decay:  cfg.weight_decay,
            max_grad_norm: None,
        };
        setup::run_trainer::<B, _, _, _, _>(
            settings, schedule, &group, &cfg.save_dir, &tokenizer,
            &model_config, cfg, model, loader,
        )
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_pretrained_dir;
    use burn::config::Config;
    use std::path::Path;

    const TRAIN_TSV: &str = "\
what is rust\ta systems programming language\tred iron oxide
fast search engine\tranking model\tred metal
good query\tgood title\tbad title
memory safe\tsafe systems programming\tthe iron
what is a model\tranking model\tmetal oxide
";

    fn config(root: &Path) -> DualEncoderTrainConfig {
        let pretrained = root.join("pretrained");
        write_pretrained_dir(&pretrained);
        let train_set_file = root.join("triplets.tsv");
        std::fs::write(&train_set_file, TRAIN_TSV).unwrap();

        DualEncoderTrainConfig {
            train_set_file,
            save_dir:             root.join("out"),
            pretrained_dir:       pretrained,
            query_max_seq_length: 8,
            title_max_seq_length: 12,
            batch_size:           2,
            learning_rate:        1e-3,
            epochs:               2,
            logging_steps:        2,
            device:               DeviceKind::Cpu,
            ..Default::default()
        }
    }

    #[test]
    fn test_schedule_steps_count_partial_batches() {
        assert_eq!(schedule_steps(5, 2, 2), 6);
        assert_eq!(schedule_steps(4, 2, 3), 6);
        assert_eq!(schedule_steps(1, 32, 10), 10);
    }

    #[test]
    fn test_smoke_run_saves_only_final_checkpoint() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        let out = cfg.save_dir.clone();

        // 5 triplets at batch size 2 over 2 epochs: 6 steps, save_steps 10000
        let report = DualEncoderUseCase::new(cfg).execute().unwrap();
        assert_eq!(report.global_step, 6);
        assert!(report.avg_loss.is_finite());

        let entries: Vec<String> = std::fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("model_"))
            .collect();
        assert_eq!(entries, vec!["model_6".to_string()]);
        assert!(out.join("model_6").join("model_state.mpk").is_file());
        assert!(out.join("model_6").join("model_config.json").is_file());
    }

    #[test]
    fn test_separate_title_tower_with_projection() {
        let tmp = tempfile::tempdir().unwrap();
        let title_dir = tmp.path().join("title");
        write_pretrained_dir(&title_dir);

        let cfg = DualEncoderTrainConfig {
            title_pretrained_dir: Some(title_dir),
            output_emb_size:      Some(4),
            use_cross_batch:      true,
            epochs:               1,
            ..config(tmp.path())
        };
        let report = DualEncoderUseCase::new(cfg).execute().unwrap();
        assert_eq!(report.global_step, 3);

        let saved = DualEncoderConfig::load(
            report.final_checkpoint.unwrap().join("model_config.json"),
        )
        .unwrap();
        assert!(saved.title_backbone.is_some());
        assert_eq!(saved.output_emb_size, Some(4));
        assert!(saved.use_cross_batch);
    }

    #[test]
    fn test_wrong_field_count_fails_the_run() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        std::fs::write(&cfg.train_set_file, "only\ttwo\n").unwrap();

        let err = DualEncoderUseCase::new(cfg).execute().unwrap_err();
        assert!(format!("{err:#}").contains("expected 3 tab-separated fields"));
    }
}
