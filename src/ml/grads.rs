// ============================================================
// Layer 5 — Gradient Utilities
// ============================================================
// Gradient bookkeeping between backward and the optimizer step.
//
// Burn hands the optimizer one GradientsParams map keyed by ParamId.
// Two things need to happen to that map before the update:
//
//   1. Global-norm clipping: scale every gradient by
//      max_norm / ‖g‖₂ when the norm over *all* parameters exceeds
//      max_norm (one norm for the whole model, not per tensor).
//   2. Weight-decay partition: biases and LayerNorm scale/shift are
//      exactly the rank-1 parameters of the backbone and heads; they
//      are updated without decay, everything else with decay.
//
// Both walk the module with a ModuleVisitor, which yields every float
// parameter's id together with its rank.

use std::marker::PhantomData;

use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

struct SquaredNorm<'a, B: AutodiffBackend> {
    grads: &'a GradientsParams,
    total: f64,
    _b:    PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            self.total += (grad.clone() * grad).sum().into_scalar().elem::<f64>();
        }
    }
}

struct Scale<'a, B: AutodiffBackend> {
    grads:  &'a mut GradientsParams,
    factor: f64,
    _b:     PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for Scale<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads
                .register::<B::InnerBackend, D>(id, grad.mul_scalar(self.factor));
        }
    }
}

/// L2 norm over every gradient in `grads` that belongs to `module`.
pub fn global_norm<B: AutodiffBackend, M: AutodiffModule<B>>(
    module: &M,
    grads:  &GradientsParams,
) -> f64 {
    let mut visitor = SquaredNorm::<B> { grads, total: 0.0, _b: PhantomData };
    module.visit(&mut visitor);
    visitor.total.sqrt()
}

/// Rescale `grads` so their global norm is at most `max_norm`.
pub fn clip_by_global_norm<B: AutodiffBackend, M: AutodiffModule<B>>(
    module:   &M,
    mut grads: GradientsParams,
    max_norm: f64,
) -> GradientsParams {
    let norm = global_norm::<B, M>(module, &grads);
    if norm > max_norm {
        let mut visitor = Scale::<B> {
            grads:  &mut grads,
            factor: max_norm / (norm + 1e-6),
            _b:     PhantomData,
        };
        module.visit(&mut visitor);
    }
    grads
}

/// Gradients split by whether their parameter receives weight decay.
pub struct DecayPartition {
    pub decay:    GradientsParams,
    pub no_decay: GradientsParams,
}

struct DecaySplitter<'a, B: AutodiffBackend> {
    source:    &'a mut GradientsParams,
    partition: DecayPartition,
    _b:        PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for DecaySplitter<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        let Some(grad) = self.source.remove::<B::InnerBackend, D>(id) else {
            return;
        };
        let target = if D == 1 {
            &mut self.partition.no_decay
        } else {
            &mut self.partition.decay
        };
        target.register::<B::InnerBackend, D>(id, grad);
    }
}

pub fn split_weight_decay<B: AutodiffBackend, M: AutodiffModule<B>>(
    module:    &M,
    mut grads: GradientsParams,
) -> DecayPartition {
    let mut visitor = DecaySplitter::<B> {
        source:    &mut grads,
        partition: DecayPartition {
            decay:    GradientsParams::new(),
            no_decay: GradientsParams::new(),
        },
        _b: PhantomData,
    };
    module.visit(&mut visitor);
    visitor.partition
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestAutodiffBackend;
    use burn::nn::{LayerNorm, LayerNormConfig, Linear, LinearConfig};

    type B = TestAutodiffBackend;

    #[derive(Module, Debug)]
    struct Tiny<B: Backend> {
        linear: Linear<B>,
        norm:   LayerNorm<B>,
    }

    fn tiny() -> Tiny<B> {
        let device = Default::default();
        Tiny {
            linear: LinearConfig::new(3, 2).init(&device),
            norm:   LayerNormConfig::new(2).init(&device),
        }
    }

    fn grads_of(model: &Tiny<B>, scale: f32) -> GradientsParams {
        let x = Tensor::<B, 2>::from_floats([[1.0, -2.0, 3.0], [0.5, 0.5, 0.5]], &Default::default());
        let y = model.norm.forward(model.linear.forward(x));
        let w = Tensor::<B, 2>::from_floats([[1.0, 3.0], [-2.0, 0.5]], &Default::default());
        let loss = (y * w).sum().mul_scalar(scale);
        GradientsParams::from_grads(loss.backward(), model)
    }

    #[test]
    fn test_rank_one_params_skip_weight_decay() {
        let model = tiny();
        let grads = grads_of(&model, 1.0);
        // linear weight + bias, norm gamma + beta
        assert_eq!(grads.len(), 4);

        let split = split_weight_decay::<B, _>(&model, grads);
        assert_eq!(split.decay.len(), 1);
        assert_eq!(split.no_decay.len(), 3);
    }

    #[test]
    fn test_clip_scales_down_to_max_norm() {
        let model = tiny();
        let grads = grads_of(&model, 100.0);
        let before = global_norm::<B, _>(&model, &grads);
        assert!(before > 1.0);

        let clipped = clip_by_global_norm::<B, _>(&model, grads, 1.0);
        let after   = global_norm::<B, _>(&model, &clipped);
        assert!((after - 1.0).abs() < 1e-3, "norm after clipping: {after}");
        assert_eq!(clipped.len(), 4);
    }

    #[test]
    fn test_clip_leaves_small_gradients_alone() {
        let model = tiny();
        let grads = grads_of(&model, 1e-4);
        let before = global_norm::<B, _>(&model, &grads);

        let clipped = clip_by_global_norm::<B, _>(&model, grads, 1.0);
        let after   = global_norm::<B, _>(&model, &clipped);
        assert!((after - before).abs() < 1e-9);
    }
}
