// ============================================================
// Layer 5 — Training Loop
// ============================================================
// One loop drives both ranking models. Each model implements
// Trainable, turning a batch into a loss plus correct/total
// counts; everything else is shared:
//
//   for each batch:
//     lr     = schedule(global_step)
//     loss   = model.forward_step(batch)
//     grads  = backward(loss)              local only
//     grads  = group.all_reduce_grads()    one fused exchange
//     grads  = clip_by_global_norm()       when configured
//     model  = AdamW(decay)    on rank ≥ 2 params
//     model  = AdamW(no decay) on biases and norms
//     global_step += 1
//     leader: log every logging_steps, checkpoint every save_steps
//
// After the last epoch the leader always writes one more
// checkpoint at the final global step.

use std::{path::PathBuf, sync::Arc, time::Instant};

use anyhow::{ensure, Result};
use burn::{
    data::dataloader::DataLoader,
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{activation::softmax, backend::AutodiffBackend},
};

use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{MetricsLogger, StepMetrics};
use crate::ml::distributed::Collective;
use crate::ml::grads::{clip_by_global_norm, split_weight_decay, DecayPartition};
use crate::ml::schedule::LearningRateSchedule;

/// Result of one forward pass over a batch.
pub struct StepOutput<B: Backend> {
    /// Mean loss over the batch, shape [1].
    pub loss:    Tensor<B, 1>,
    pub correct: usize,
    pub total:   usize,
}

impl<B: Backend> StepOutput<B> {
    pub fn new(loss: Tensor<B, 1>, logits: &Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Self {
        let total   = labels.dims()[0];
        let correct = count_correct(logits.clone(), labels);
        Self { loss, correct, total }
    }
}

/// Rows of `logits` whose most probable class equals the label.
pub fn count_correct<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> usize {
    // argmax(1) returns [batch, 1]; flatten before comparing with [batch]
    let predicted = softmax(logits, 1).argmax(1).flatten::<1>(0, 1);
    predicted
        .equal(labels)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>() as usize
}

/// Fraction of the batch predicted correctly.
pub fn step_accuracy(correct: usize, total: usize) -> f64 {
    if total > 0 { correct as f64 / total as f64 } else { 0.0 }
}

/// A model the loop can train on batches of type `T`.
pub trait Trainable<B: AutodiffBackend, T>: AutodiffModule<B> {
    fn forward_step<C: Collective>(&self, batch: T, group: &C) -> Result<StepOutput<B>>;
}

#[derive(Debug, Clone)]
pub struct TrainerSettings {
    pub epochs:        usize,
    pub logging_steps: usize,
    pub save_steps:    usize,
    pub weight_decay:  f64,
    pub max_grad_norm: Option<f64>,
}

pub struct TrainSummary<M> {
    pub model:       M,
    pub global_step: usize,
    pub avg_loss:    f64,
    pub accuracy:    f64,
    /// Directory of the final checkpoint, when this worker wrote one.
    pub final_checkpoint: Option<PathBuf>,
}

#[derive(Default)]
struct RunningStats {
    loss_sum: f64,
    steps:    usize,
    correct:  usize,
    seen:     usize,
}

impl RunningStats {
    fn update(&mut self, loss: f64, correct: usize, total: usize) {
        self.loss_sum += loss;
        self.steps    += 1;
        self.correct  += correct;
        self.seen     += total;
    }

    fn avg_loss(&self) -> f64 {
        if self.steps > 0 { self.loss_sum / self.steps as f64 } else { f64::NAN }
    }

    fn accuracy(&self) -> f64 {
        if self.seen > 0 { self.correct as f64 / self.seen as f64 } else { 0.0 }
    }
}

pub struct Trainer<'a, S, C> {
    settings:    TrainerSettings,
    schedule:    S,
    group:       &'a C,
    checkpoints: Option<&'a CheckpointManager>,
    metrics:     Option<MetricsLogger>,
}

impl<'a, S: LearningRateSchedule, C: Collective> Trainer<'a, S, C> {
    pub fn new(settings: TrainerSettings, schedule: S, group: &'a C) -> Self {
        Self { settings, schedule, group, checkpoints: None, metrics: None }
    }

    pub fn with_checkpoints(mut self, checkpoints: &'a CheckpointManager) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsLogger) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn fit<B, M, T>(&mut self, mut model: M, loader: Arc<dyn DataLoader<T>>) -> Result<TrainSummary<M>>
    where
        B: AutodiffBackend,
        M: Trainable<B, T>,
    {
        ensure!(self.settings.logging_steps > 0, "logging_steps must be at least 1");
        ensure!(self.settings.save_steps > 0, "save_steps must be at least 1");

        // Bias and LayerNorm parameters go through the second optimizer,
        // which has no weight decay.
        let mut decay_optim = AdamWConfig::new()
            .with_weight_decay(self.settings.weight_decay as f32)
            .with_epsilon(1e-8)
            .init::<B, M>();
        let mut plain_optim = AdamWConfig::new()
            .with_weight_decay(0.0)
            .with_epsilon(1e-8)
            .init::<B, M>();

        let leader = self.group.is_leader();
        let mut global_step = 0usize;
        let mut run = RunningStats::default();
        let mut tic = Instant::now();

        for epoch in 1..=self.settings.epochs {
            let mut epoch_stats = RunningStats::default();

            for (batch_idx, batch) in loader.iter().enumerate() {
                let lr  = self.schedule.lr_at(global_step);
                let out = model.forward_step(batch, self.group)?;

                let loss: f64 = out.loss.clone().into_scalar().elem::<f64>();
                ensure!(loss.is_finite(), "loss is {loss} at global step {}", global_step + 1);
                run.update(loss, out.correct, out.total);
                epoch_stats.update(loss, out.correct, out.total);

                let grads = GradientsParams::from_grads(out.loss.backward(), &model);
                let grads = self.group.all_reduce_grads(&model, grads)?;
                let grads = match self.settings.max_grad_norm {
                    Some(max_norm) => clip_by_global_norm::<B, M>(&model, grads, max_norm),
                    None => grads,
                };

                let DecayPartition { decay, no_decay } = split_weight_decay::<B, M>(&model, grads);
                model = decay_optim.step(lr, model, decay);
                model = plain_optim.step(lr, model, no_decay);
                global_step += 1;

                if leader && global_step % self.settings.logging_steps == 0 {
                    let speed = self.settings.logging_steps as f64 / tic.elapsed().as_secs_f64().max(1e-9);
                    let row = StepMetrics {
                        global_step,
                        epoch,
                        batch: batch_idx + 1,
                        loss,
                        avg_loss: run.avg_loss(),
                        accuracy: run.accuracy(),
                        step_accuracy: step_accuracy(out.correct, out.total),
                        lr,
                        speed,
                    };
                    tracing::info!(
                        "global step {}, epoch: {}, batch: {}, loss: {:.5}, avg_loss: {:.5}, accuracy: {:.5}, batch_accuracy: {:.5}, lr: {:.3e}, speed: {:.2} step/s",
                        row.global_step, row.epoch, row.batch, row.loss,
                        row.avg_loss, row.accuracy, row.step_accuracy, row.lr, row.speed,
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.log(&row)?;
                    }
                    tic = Instant::now();
                }

                if leader && global_step % self.settings.save_steps == 0 {
                    if let Some(checkpoints) = self.checkpoints {
                        let dir = checkpoints.save::<B, M>(&model, global_step)?;
                        tracing::info!("Saved checkpoint to '{}'", dir.display());
                    }
                }
            }

            tracing::info!(
                "Epoch {:>3}/{} | steps={} | loss={:.4} | accuracy={:.2}%",
                epoch, self.settings.epochs, epoch_stats.steps,
                epoch_stats.avg_loss(), epoch_stats.accuracy() * 100.0,
            );
        }

        let mut final_checkpoint = None;
        if leader {
            if let Some(checkpoints) = self.checkpoints {
                let dir = checkpoints.save::<B, M>(&model, global_step)?;
                tracing::info!("Saved final checkpoint to '{}'", dir.display());
                final_checkpoint = Some(dir);
            }
        }

        tracing::info!("Training complete after {} steps", global_step);
        Ok(TrainSummary {
            model,
            global_step,
            avg_loss: run.avg_loss(),
            accuracy: run.accuracy(),
            final_checkpoint,
        })
    }
}
