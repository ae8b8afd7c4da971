/// Forward pass: sweep to a fixed point, then decode relaxed truth values.
///
/// The tolerance is relative: after the first sweep it is rescaled by that
/// sweep's movement, and from the second sweep on the loop stops as soon as
/// a sweep moves less than the rescaled tolerance. Hitting `max_iter` is not
/// an error; the sweep count is recorded and replayed by backward.
///
/// Decoding: v_true = e0, so cos(angle to truth) = v_i[0] and
///   z_i = 1 - acos(v_i[0]) / pi   in [0, 1].

use std::f32::consts::PI;
use crate::kernel::{mix_kernel, SweepMode, SweepState};
use crate::tensor::saturate_f32;

/// How the sweep loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    Converged,
    Exhausted,
}

/// Decode a unit vector's first coordinate into a relaxed truth value.
#[inline]
pub fn decode_f32(v0: f32) -> f32 {
    // Re-clamp into [-1, 1] against rounding drift before acos.
    let x = saturate_f32((v0 + 1.0) / 2.0) * 2.0 - 1.0;
    saturate_f32(1.0 - x.acos() / PI)
}

/// Forward solve for one instance. Returns the sweep count written to
/// `niter` and how the loop ended.
///
/// `index`, `z`, `gnrm`: [n]. `v`: [n, k]. `w`: [k, m] = V^T S on entry.
/// `s`: [n, m]. `snrms`: [n]. `cache`: [k].
#[allow(clippy::too_many_arguments)]
pub fn mix_forward(
    max_iter: usize,
    eps: f32,
    m: usize,
    k: usize,
    index: &[u32],
    niter: &mut usize,
    s: &[f32],
    snrms: &[f32],
    z: &mut [f32],
    v: &mut [f32],
    w: &mut [f32],
    gnrm: &mut [f32],
    cache: &mut [f32],
) -> Termination {
    let mut eps = eps;
    let mut iter = 0;
    let mut termination = Termination::Exhausted;
    let mut state = SweepState { v, w };
    let mut mode = SweepMode::Forward { gnrm };
    while iter < max_iter {
        let delta = mix_kernel(&mut mode, m, k, index, s, snrms, &mut state, cache);
        if iter > 0 && delta < eps {
            termination = Termination::Converged;
            break;
        }
        if iter == 0 {
            eps *= delta;
        }
        iter += 1;
    }
    *niter = iter;

    let v = &*state.v;
    for &id in index.iter().take_while(|&&id| id != 0) {
        let i = id as usize;
        z[i] = decode_f32(v[i * k]);
    }
    termination
}
