//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use satmix_core::config::MixDims;
use satmix_core::buffers::MixBuffers;
use satmix_core::tensor::SimpleRng;

/// Random batch: shared weights, per-element input patterns, shared perm.
///
/// Variable 0 is the truth input (z = 1). Variable i of element bi is an
/// input when (i + bi) % 3 == 0, with z in [0.1, 0.8].
pub fn random_batch(b: usize, n: usize, m: usize, k: usize, seed: u64) -> (MixBuffers, Vec<u32>) {
    let dims = MixDims::new(b, n, m, k).unwrap();
    let mut buf = MixBuffers::new(dims).unwrap();
    let mut rng = SimpleRng::new(seed);
    rng.fill_normal(&mut buf.s, 0.5);
    rng.fill_normal(&mut buf.v, 1.0);
    let mut perm = vec![0u32; n - 1];
    rng.permutation(&mut perm);

    for bi in 0..b {
        buf.is_input[bi * n] = true;
        buf.z[bi * n] = 1.0;
        for i in 1..n {
            if (i + bi) % 3 == 0 {
                buf.is_input[bi * n + i] = true;
                buf.z[bi * n + i] = 0.1 + 0.1 * ((i + bi) % 8) as f32;
            }
        }
    }
    (buf, perm)
}

/// init + snrms + W + forward.
pub fn solve(buf: &mut MixBuffers, perm: &[u32], max_iter: usize, eps: f32) {
    satmix_core::launch::mix_init_launcher(buf, perm).unwrap();
    buf.compute_snrms();
    buf.compute_w();
    satmix_core::launch::mix_forward_launcher(buf, max_iter, eps).unwrap();
}

pub fn row_norm(row: &[f32]) -> f32 {
    row.iter().map(|x| x * x).sum::<f32>().sqrt()
}
