/// Backward pass: implicit-function gradients of the forward fixed point.
///
/// Steps, per instance:
///   1. dz_i <- dz_i / (pi sin(pi z_i)) on visited variables (decode chain rule).
///   2. Replay `niter` adjoint sweeps to approximately solve
///        P (S S^T + D_gnrm - D_snrms) P U = -dz P e0
///      for U, accumulating Phi = U^T S alongside.
///   3. dS = U W + V Phi.
///   4. dz on input variables via the input encoding
///        v_i = (-cos(pi z_i), sign(v_i[1]) sin(pi z_i), 0, ...)
///      plus the incoming dz_i (inputs are echoed unchanged in z).
///
/// Degenerate instances (non-finite rescaled dz, vanishing forward gradient
/// norm, or non-finite U) get an all-zero dz and an untouched dS. This is the
/// intended fallback for fixed points where the decode derivative blows up,
/// not an error.
///
/// Caller contract: `u`, `phi` zero on entry, `ds` zero or holding a running sum.

use std::f32::consts::PI;
use crate::kernel::{mix_kernel, SweepMode, SweepState};
use crate::tensor::{axpy_f32, dot_f32, zero_f32};

/// Floor on the forward gradient norm below which the adjoint is ill-posed.
pub const GNRM_FLOOR: f64 = 1e-24;

/// Outcome of one instance's backward pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackwardStatus {
    /// Gradients written.
    Valid,
    /// Decode derivative or forward gradient norm degenerate; dz zeroed.
    DegenerateScale,
    /// Adjoint solve produced non-finite values; dz zeroed.
    NonFiniteAdjoint,
}

impl BackwardStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, BackwardStatus::Valid)
    }
}

/// Backward for one instance.
///
/// `is_input`, `index`, `z`, `dz`, `gnrm`: [n]. `v`, `u`: [n, k].
/// `w`, `phi`: [k, m]. `s`, `ds`: [n, m]. `snrms`: [n]. `cache`: [k].
#[allow(clippy::too_many_arguments)]
pub fn mix_backward(
    prox_lam: f32,
    m: usize,
    k: usize,
    is_input: &[bool],
    index: &[u32],
    niter: usize,
    s: &[f32],
    snrms: &[f32],
    ds: &mut [f32],
    z: &[f32],
    dz: &mut [f32],
    v: &[f32],
    u: &mut [f32],
    w: &[f32],
    phi: &mut [f32],
    gnrm: &[f32],
    cache: &mut [f32],
) -> BackwardStatus {
    let n = is_input.len();
    debug_assert_eq!(ds.len(), n * m);
    debug_assert_eq!(u.len(), n * k);

    let mut degenerate = false;
    for &id in index.iter().take_while(|&&id| id != 0) {
        let i = id as usize;
        // sin(pi z) == sin(pi (1 - z)); folding onto [0, 1/2] keeps z = 1
        // from rounding to a tiny nonzero sine.
        let dzi = dz[i] / PI / (z[i].min(1.0 - z[i]) * PI).sin();
        if !dzi.is_finite() || (gnrm[i] as f64) < GNRM_FLOOR {
            degenerate = true;
        }
        dz[i] = dzi;
    }
    if degenerate {
        zero_f32(dz);
        return BackwardStatus::DegenerateScale;
    }

    {
        let mut mode = SweepMode::Adjoint { prox_lam, dz: &*dz, v_fixed: v, gnrm };
        let mut state = SweepState { v: &mut *u, w: &mut *phi };
        for _ in 0..niter {
            mix_kernel(&mut mode, m, k, index, s, snrms, &mut state, cache);
        }
    }

    if u.iter().any(|x| !x.is_finite()) {
        zero_f32(dz);
        return BackwardStatus::NonFiniteAdjoint;
    }

    // dS = U W + V Phi
    for (i, ds_i) in ds.chunks_exact_mut(m).enumerate() {
        for kk in 0..k {
            let row = kk * m..(kk + 1) * m;
            axpy_f32(ds_i, u[i * k + kk], &w[row.clone()]);
            axpy_f32(ds_i, v[i * k + kk], &phi[row]);
        }
    }

    // Input gradients through the e0/e1 encoding; free variables get 0.
    for i in 1..n {
        if !is_input[i] {
            dz[i] = 0.0;
            continue;
        }
        let s_i = &s[i * m..(i + 1) * m];
        let val0 = dot_f32(s_i, &phi[0..m]);
        let val1 = dot_f32(s_i, &phi[m..2 * m]);
        let (sin_z, cos_z) = (z[i] * PI).sin_cos();
        let sign = 1.0f32.copysign(v[i * k + 1]);
        // d v_i / d z_i = pi (sin(pi z_i), sign cos(pi z_i), 0, ...); the
        // incoming dz_i passes straight through since z_i is echoed.
        dz[i] += val0 * sin_z * PI + val1 * sign * cos_z * PI;
    }
    BackwardStatus::Valid
}
