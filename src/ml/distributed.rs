// ============================================================
// Layer 5 — Worker Group
// ============================================================
// Worker-group abstraction for data-parallel training.
//
// Each worker owns a full model replica and its own shard of the
// data. The training loop talks to its peers only through the
// Collective trait:
//
//   all_gather        — concatenate a local [n, d] block from every
//                       worker in rank order (cross-batch negatives)
//   all_reduce_grads  — one fused gradient exchange per step, issued
//                       after backward and before the optimizer step
//
// Backward never synchronises on its own; gradients stay local until
// all_reduce_grads is called.
//
// The transport behind a multi-process group is not part of this
// crate. LocalGroup is the single-worker group: rank 0 of 1, where
// both collectives are identities.

use anyhow::{bail, Context, Result};
use burn::{
    module::AutodiffModule,
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

pub trait Collective {
    fn rank(&self) -> usize;

    fn world_size(&self) -> usize;

    /// The worker that writes checkpoints and metrics.
    fn is_leader(&self) -> bool {
        self.rank() == 0
    }

    /// Concatenate every worker's `local` along dim 0, in rank order.
    /// Blocks received from peers carry no gradient.
    fn all_gather<B: Backend>(&self, local: Tensor<B, 2>) -> Result<Tensor<B, 2>>;

    /// Average `grads` over all workers in a single fused exchange.
    fn all_reduce_grads<B: AutodiffBackend, M: AutodiffModule<B>>(
        &self,
        module: &M,
        grads:  GradientsParams,
    ) -> Result<GradientsParams>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalGroup;

impl LocalGroup {
    /// Read `WORLD_SIZE` / `RANK` from the environment.
    pub fn from_env() -> Result<Self> {
        let (rank, world_size) = parse_world(
            std::env::var("RANK").ok().as_deref(),
            std::env::var("WORLD_SIZE").ok().as_deref(),
        )?;

        if world_size > 1 {
            bail!(
                "WORLD_SIZE={world_size} (rank {rank}) requested, but no collective \
                 transport is available in this build; run a single worker"
            );
        }
        Ok(Self)
    }
}

impl Collective for LocalGroup {
    fn rank(&self) -> usize {
        0
    }

    fn world_size(&self) -> usize {
        1
    }

    fn all_gather<B: Backend>(&self, local: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
        Ok(local)
    }

    fn all_reduce_grads<B: AutodiffBackend, M: AutodiffModule<B>>(
        &self,
        _module: &M,
        grads:   GradientsParams,
    ) -> Result<GradientsParams> {
        Ok(grads)
    }
}

/// Parse rank and world size, defaulting to a single worker.
pub fn parse_world(rank: Option<&str>, world_size: Option<&str>) -> Result<(usize, usize)> {
    let rank = rank
        .map(|r| r.trim().parse::<usize>().context("RANK must be a non-negative integer"))
        .transpose()?
        .unwrap_or(0);
    let world_size = world_size
        .map(|w| w.trim().parse::<usize>().context("WORLD_SIZE must be a positive integer"))
        .transpose()?
        .unwrap_or(1);

    if world_size == 0 {
        bail!("WORLD_SIZE must be at least 1");
    }
    if rank >= world_size {
        bail!("RANK {rank} is out of range for WORLD_SIZE {world_size}");
    }
    Ok((rank, world_size))
}
