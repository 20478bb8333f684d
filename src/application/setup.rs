// ============================================================
// Layer 2 — Shared Run Setup
// ============================================================
// Run setup shared by both training use cases: argument checks,
// the pretrained directory, and which worker writes files.

use anyhow::{ensure, Result};
use burn::{data::dataloader::DataLoader, tensor::backend::AutodiffBackend};
use std::{path::Path, sync::Arc};
use tokenizers::Tokenizer;

use crate::application::TrainReport;
use crate::data::encoder::pad_token_id;
use crate::infra::{
    checkpoint::CheckpointManager, metrics::MetricsLogger, pretrained::PretrainedDir,
};
use crate::ml::{
    backbone::BackboneConfig,
    distributed::Collective,
    schedule::LearningRateSchedule,
    trainer::{Trainable, Trainer, TrainerSettings},
};

/// Hyperparameters every driver validates the same way.
pub(crate) struct CommonArgs {
    pub batch_size:        usize,
    pub epochs:            usize,
    pub learning_rate:     f64,
    pub warmup_proportion: f64,
    pub logging_steps:     usize,
    pub save_steps:        usize,
}

pub(crate) fn validate_common(args: &CommonArgs) -> Result<()> {
    ensure!(args.batch_size > 0, "batch_size must be at least 1");
    ensure!(args.epochs > 0, "epochs must be at least 1");
    ensure!(
        args.learning_rate.is_finite() && args.learning_rate > 0.0,
        "learning_rate must be positive, got {}",
        args.learning_rate
    );
    ensure!(
        (0.0..=1.0).contains(&args.warmup_proportion),
        "warmup_proportion must be within [0, 1], got {}",
        args.warmup_proportion
    );
    ensure!(args.logging_steps > 0, "logging_steps must be at least 1");
    ensure!(args.save_steps > 0, "save_steps must be at least 1");
    Ok(())
}

pub(crate) fn warn_if_amp(use_amp: bool, scale_loss: f64) {
    if use_amp {
        tracing::warn!(
            "use_amp requested (scale_loss={}), but the selected backend trains in f32; \
             continuing without mixed precision",
            scale_loss
        );
    }
}

/// Read a backbone config and fit it to the tokenizer and the longest
/// sequence the run will feed it.
pub(crate) fn backbone_config(
    pretrained:  &PretrainedDir,
    tokenizer:   &Tokenizer,
    max_seq_len: usize,
    flag:        &str,
) -> Result<BackboneConfig> {
    let mut config = pretrained.config()?;

    ensure!(
        max_seq_len <= config.max_position_embeddings,
        "{flag}={max_seq_len} exceeds max_position_embeddings={} of '{}'",
        config.max_position_embeddings,
        pretrained.root().display()
    );

    let vocab = tokenizer.get_vocab_size(true);
    ensure!(
        vocab <= config.vocab_size,
        "tokenizer has {vocab} tokens but the backbone in '{}' only embeds {}",
        pretrained.root().display(),
        config.vocab_size
    );

    // attention masking must agree with the id the batcher pads with
    let pad = pad_token_id(tokenizer) as usize;
    if config.pad_token_id != pad {
        tracing::warn!(
            "config pad_token_id={} differs from the tokenizer's pad id {}; using {}",
            config.pad_token_id, pad, pad
        );
        config.pad_token_id = pad;
    }
    Ok(config)
}

/// Pair inputs tag `text_b` with segment id 1, so the backbone needs
/// at least two token-type embeddings.
pub(crate) fn check_pair_segments(config: &BackboneConfig, pretrained: &PretrainedDir) -> Result<()> {
    ensure!(
        config.type_vocab_size >= 2,
        "text pairs use segment ids 0 and 1, but the backbone in '{}' has type_vocab_size={}",
        pretrained.root().display(),
        config.type_vocab_size
    );
    Ok(())
}

/// Wire checkpoints and metrics (leader only) into a trainer and run it.
#[allow(clippy::too_many_arguments)]
pub(crate) fn run_trainer<B, M, T, S, C>(
    settings:     TrainerSettings,
    schedule:     S,
    group:        &C,
    save_dir:     &Path,
    tokenizer:    &Tokenizer,
    model_config: &impl serde::Serialize,
    train_config: &impl serde::Serialize,
    model:        M,
    loader:       Arc<dyn DataLoader<T>>,
) -> Result<TrainReport>
where
    B: AutodiffBackend,
    M: Trainable<B, T>,
    S: LearningRateSchedule,
    C: Collective,
{
    let checkpoints = if group.is_leader() {
        Some(CheckpointManager::new(save_dir, tokenizer.clone(), model_config, train_config)?)
    } else {
        None
    };

    let mut trainer = Trainer::new(settings, schedule, group);
    if let Some(checkpoints) = &checkpoints {
        trainer = trainer
            .with_checkpoints(checkpoints)
            .with_metrics(MetricsLogger::new(save_dir)?);
    }

    let summary = trainer.fit::<B, M, T>(model, loader)?;
    Ok(TrainReport {
        global_step:      summary.global_step,
        avg_loss:         summary.avg_loss,
        accuracy:         summary.accuracy,
        final_checkpoint: summary.final_checkpoint,
    })
}
