/// Batch launchers: run init / forward / backward on every batch element.
///
/// Elements are fully independent. Each rayon task gets its own disjoint
/// slices from `MixBuffers::split_mut`; the weights and their row norms are
/// shared read-only. Completion order between elements is unspecified, and
/// results do not depend on it: the sweep inside one element is sequential.

use rayon::prelude::*;
use crate::backward::{mix_backward, BackwardStatus};
use crate::buffers::MixBuffers;
use crate::config::MixDims;
use crate::error::{check_len, MixError};
use crate::forward::{mix_forward, Termination};
use crate::init::mix_init;

/// Initialize embeddings and sweep orders for the whole batch.
///
/// `perm`: one permutation of 0..n-1 shared by every element. `z` and
/// `is_input` must be filled and the free rows of `v` pre-seeded with
/// non-zero random vectors. W must be re-derived (`compute_w`) afterwards.
pub fn mix_init_launcher(buf: &mut MixBuffers, perm: &[u32]) -> Result<(), MixError> {
    buf.validate()?;
    let MixDims { b, n, k, .. } = buf.dims;
    check_len("perm", perm.len(), n - 1)?;
    if let Some(&bad) = perm.iter().find(|&&p| p as usize >= n - 1) {
        return Err(MixError::InvalidConfig(format!("perm entry {bad} out of range for n={n}")));
    }

    let (_, views) = buf.split_mut();
    views.into_par_iter().for_each(|inst| {
        mix_init(perm, k, inst.is_input, inst.index, inst.z, inst.v);
    });
    log::debug!("mix_init: b={b} n={n} k={k}");
    Ok(())
}

/// Forward solve for the whole batch. Fills v, w, z, gnrm and niter.
pub fn mix_forward_launcher(buf: &mut MixBuffers, max_iter: usize, eps: f32) -> Result<(), MixError> {
    buf.validate()?;
    let MixDims { b, m, k, .. } = buf.dims;

    let (shared, views) = buf.split_mut();
    let converged: usize = views
        .into_par_iter()
        .map(|inst| {
            let term = mix_forward(
                max_iter, eps, m, k, inst.index, inst.niter, shared.s, shared.snrms,
                inst.z, inst.v, inst.w, inst.gnrm, inst.cache,
            );
            (term == Termination::Converged) as usize
        })
        .sum();

    if log::log_enabled!(log::Level::Debug) {
        let max = buf.niter.iter().copied().max().unwrap_or(0);
        let mean = buf.niter.iter().sum::<usize>() as f32 / b as f32;
        log::debug!("mix_forward: b={b} converged={converged} mean_iter={mean:.1} max_iter_seen={max}");
    }
    Ok(())
}

/// Backward for the whole batch. Consumes niter, z, v, w, gnrm and the
/// incoming gradient in dz; writes dz (input gradients) and ds.
///
/// u, phi and ds must be zeroed beforehand (`reset_adjoint`). Returns the
/// per-element status; degenerate elements have zero gradients.
pub fn mix_backward_launcher(buf: &mut MixBuffers, prox_lam: f32) -> Result<Vec<BackwardStatus>, MixError> {
    buf.validate()?;
    let MixDims { b, m, k, .. } = buf.dims;

    let (shared, views) = buf.split_mut();
    let statuses: Vec<BackwardStatus> = views
        .into_par_iter()
        .map(|inst| {
            mix_backward(
                prox_lam, m, k, inst.is_input, inst.index, *inst.niter, shared.s, shared.snrms,
                inst.ds, inst.z, inst.dz, inst.v, inst.u, inst.w, inst.phi, inst.gnrm, inst.cache,
            )
        })
        .collect();

    let degenerate = statuses.iter().filter(|s| !s.is_valid()).count();
    log::debug!("mix_backward: b={b} degenerate={degenerate}");
    Ok(statuses)
}
