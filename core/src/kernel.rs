/// Coordinate-update kernel shared by the forward and adjoint passes.
///
/// One call is one sweep over the visitation index (until the 0 sentinel).
/// For each visited variable i:
///
///   g   = W^T s_i - ||s_i||^2 v_i                     (local gradient, [k])
///
///   Forward:  v_i <- -g / ||g||
///   Adjoint:  u_i <- -P_i (g + dz_i e0) / (gnrm_i + lambda)
///             with P_i = I - v_i v_i^T at the forward fixed point
///
///   W  += (v_i_new - v_i_old) s_i^T                   (rank-1 per dimension)
///
/// In adjoint mode the iterate is (U, Phi) instead of (V, W); the update
/// equations are otherwise identical, so both passes run through this single
/// routine. The sweep is strictly sequential: every step reads the
/// accumulator left by the previous one.

use crate::tensor::{axpy_f32, dot_f32, norm_f32, scale_inplace_f32};

/// The iterate a sweep updates: embeddings plus their accumulator.
///
/// Forward: (V [n, k], W [k, m]). Adjoint: (U [n, k], Phi [k, m]).
pub struct SweepState<'a> {
    pub v: &'a mut [f32],
    pub w: &'a mut [f32],
}

/// What a sweep solves for.
pub enum SweepMode<'a> {
    /// Minimize the relaxed objective. Records the per-variable gradient
    /// norm into `gnrm` for the adjoint pass.
    Forward { gnrm: &'a mut [f32] },
    /// Solve the implicit-function linear system around the forward
    /// solution `v_fixed` using the recorded curvature `gnrm`.
    Adjoint {
        prox_lam: f32,
        dz: &'a [f32],
        v_fixed: &'a [f32],
        gnrm: &'a [f32],
    },
}

/// Run one sweep. Returns the total movement sum_i gnrm_i * ||dv_i||^2 in
/// forward mode and 0 in adjoint mode.
///
/// `s`: [n, m] weights. `snrms`: [n] squared row norms. `g`: [k] scratch.
#[allow(clippy::too_many_arguments)]
pub fn mix_kernel(
    mode: &mut SweepMode<'_>,
    m: usize,
    k: usize,
    index: &[u32],
    s: &[f32],
    snrms: &[f32],
    state: &mut SweepState<'_>,
    g: &mut [f32],
) -> f32 {
    debug_assert_eq!(g.len(), k);
    debug_assert_eq!(state.w.len(), k * m);

    let mut delta = 0.0f32;
    for &id in index.iter().take_while(|&&id| id != 0) {
        let i = id as usize;
        let s_i = &s[i * m..(i + 1) * m];
        let rows = i * k..(i + 1) * k;

        for kk in 0..k {
            g[kk] = dot_f32(s_i, &state.w[kk * m..(kk + 1) * m]);
        }
        axpy_f32(g, -snrms[i], &state.v[rows.clone()]);

        let gnrm_i = match mode {
            SweepMode::Forward { .. } => {
                let nrm = norm_f32(g);
                scale_inplace_f32(g, -1.0);
                nrm
            }
            SweepMode::Adjoint { prox_lam, dz, v_fixed, gnrm } => {
                let vp = &v_fixed[rows.clone()];
                let c = dot_f32(vp, g) + dz[i] * vp[0];
                scale_inplace_f32(g, -1.0);
                axpy_f32(g, c, vp);
                g[0] -= dz[i];
                gnrm[i] + *prox_lam
            }
        };
        scale_inplace_f32(g, 1.0 / gnrm_i);

        // v_i <- new direction, g <- (new - old)
        let v_i = &mut state.v[rows];
        for (gk, vk) in g.iter_mut().zip(v_i.iter_mut()) {
            let t = *gk;
            *gk -= *vk;
            *vk = t;
        }
        for kk in 0..k {
            axpy_f32(&mut state.w[kk * m..(kk + 1) * m], g[kk], s_i);
        }

        if let SweepMode::Forward { gnrm } = mode {
            delta += gnrm_i * dot_f32(g, g);
            gnrm[i] = gnrm_i;
        }
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::mix_init;
    use crate::tensor::SimpleRng;

    struct Fixture {
        n: usize,
        m: usize,
        k: usize,
        s: Vec<f32>,
        snrms: Vec<f32>,
        index: Vec<u32>,
        v: Vec<f32>,
        w: Vec<f32>,
    }

    fn accumulator(v: &[f32], s: &[f32], n: usize, m: usize, k: usize) -> Vec<f32> {
        let mut w = vec![0.0f32; k * m];
        for i in 0..n {
            for kk in 0..k {
                axpy_f32(&mut w[kk * m..(kk + 1) * m], v[i * k + kk], &s[i * m..(i + 1) * m]);
            }
        }
        w
    }

    fn fixture(seed: u64) -> Fixture {
        let (n, m, k) = (5, 4, 3);
        let mut rng = SimpleRng::new(seed);
        let mut s = vec![0.0f32; n * m];
        rng.fill_normal(&mut s, 0.3);
        let snrms: Vec<f32> = s.chunks_exact(m).map(|r| dot_f32(r, r)).collect();
        let mut v = vec![0.0f32; n * k];
        rng.fill_normal(&mut v, 1.0);
        let is_input = [true, false, true, false, false];
        let z = [1.0f32, 0.0, 0.3, 0.0, 0.0];
        let mut index = vec![0u32; n];
        mix_init(&[3, 0, 1, 2], k, &is_input, &mut index, &z, &mut v);
        let w = accumulator(&v, &s, n, m, k);
        Fixture { n, m, k, s, snrms, index, v, w }
    }

    #[test]
    fn test_forward_sweep_keeps_unit_rows_and_exact_w() {
        let mut f = fixture(11);
        let mut gnrm = vec![0.0f32; f.n];
        let mut g = vec![0.0f32; f.k];
        for _ in 0..5 {
            let mut mode = SweepMode::Forward { gnrm: &mut gnrm };
            let mut state = SweepState { v: &mut f.v, w: &mut f.w };
            let delta = mix_kernel(&mut mode, f.m, f.k, &f.index, &f.s, &f.snrms, &mut state, &mut g);
            assert!(delta.is_finite() && delta >= 0.0);
        }
        for row in f.v.chunks_exact(f.k) {
            assert!((norm_f32(row) - 1.0).abs() < 1e-5, "row norm {}", norm_f32(row));
        }
        let w_ref = accumulator(&f.v, &f.s, f.n, f.m, f.k);
        for (a, b) in f.w.iter().zip(&w_ref) {
            assert!((a - b).abs() < 1e-4, "W drift: {a} vs {b}");
        }
        // gnrm recorded only for visited variables
        assert_eq!(gnrm[0], 0.0);
        assert_eq!(gnrm[2], 0.0);
        assert!(gnrm[1] > 0.0 && gnrm[3] > 0.0 && gnrm[4] > 0.0);
    }

    #[test]
    fn test_forward_update_is_local_minimizer() {
        // After visiting i, v_i is aligned with -g_i: the best unit vector
        // for the local objective <g_i, v_i>.
        let mut f = fixture(5);
        let mut gnrm = vec![0.0f32; f.n];
        let mut g = vec![0.0f32; f.k];
        let single = [1u32, 0];
        let mut mode = SweepMode::Forward { gnrm: &mut gnrm };
        let mut state = SweepState { v: &mut f.v, w: &mut f.w };
        mix_kernel(&mut mode, f.m, f.k, &single, &f.s, &f.snrms, &mut state, &mut g);

        let (m, k) = (f.m, f.k);
        let s1 = &f.s[m..2 * m];
        let mut g1 = vec![0.0f32; k];
        for kk in 0..k {
            g1[kk] = dot_f32(s1, &f.w[kk * m..(kk + 1) * m]);
        }
        axpy_f32(&mut g1, -f.snrms[1], &f.v[k..2 * k]);
        let cos = -dot_f32(&g1, &f.v[k..2 * k]) / norm_f32(&g1);
        assert!((cos - 1.0).abs() < 1e-4, "cos={cos}");
    }

    #[test]
    fn test_adjoint_iterate_stays_tangent() {
        let mut f = fixture(23);
        let mut gnrm = vec![0.0f32; f.n];
        let mut g = vec![0.0f32; f.k];
        for _ in 0..30 {
            let mut mode = SweepMode::Forward { gnrm: &mut gnrm };
            let mut state = SweepState { v: &mut f.v, w: &mut f.w };
            mix_kernel(&mut mode, f.m, f.k, &f.index, &f.s, &f.snrms, &mut state, &mut g);
        }

        let mut u = vec![0.0f32; f.n * f.k];
        let mut phi = vec![0.0f32; f.k * f.m];
        let dz = vec![0.0f32, 0.7, 0.0, -0.4, 0.2];
        for _ in 0..10 {
            let mut mode = SweepMode::Adjoint { prox_lam: 1e-2, dz: &dz, v_fixed: &f.v, gnrm: &gnrm };
            let mut state = SweepState { v: &mut u, w: &mut phi };
            let ret = mix_kernel(&mut mode, f.m, f.k, &f.index, &f.s, &f.snrms, &mut state, &mut g);
            assert_eq!(ret, 0.0);
        }
        for i in 0..f.n {
            let ui = &u[i * f.k..(i + 1) * f.k];
            let vi = &f.v[i * f.k..(i + 1) * f.k];
            assert!(ui.iter().all(|x| x.is_finite()));
            assert!(dot_f32(ui, vi).abs() < 1e-4, "u_{i} not tangent");
        }
        // Unvisited (input) rows stay zero.
        assert!(u[0..f.k].iter().all(|&x| x == 0.0));
        assert!(u[2 * f.k..3 * f.k].iter().all(|&x| x == 0.0));
        let phi_ref = accumulator(&u, &f.s, f.n, f.m, f.k);
        for (a, b) in phi.iter().zip(&phi_ref) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_empty_index_is_noop() {
        let mut f = fixture(2);
        let v0 = f.v.clone();
        let mut gnrm = vec![0.0f32; f.n];
        let mut g = vec![0.0f32; f.k];
        let mut mode = SweepMode::Forward { gnrm: &mut gnrm };
        let mut state = SweepState { v: &mut f.v, w: &mut f.w };
        let delta = mix_kernel(&mut mode, f.m, f.k, &[0, 0, 0, 0, 0], &f.s, &f.snrms, &mut state, &mut g);
        assert_eq!(delta, 0.0);
        assert_eq!(f.v, v0);
    }
}
