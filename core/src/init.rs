/// Per-instance initialization of the embeddings and the sweep order.
///
/// Input variables are placed on the great circle through e0 and e1:
///   v_i = (-cos(pi z_i), sign(v_i[1]) * sin(pi z_i), 0, ..., 0)
/// so z = 1 maps onto the truth direction e0 and z = 0 onto -e0. The sign of
/// the pre-seeded coordinate 1 is kept as the random orientation.
///
/// Free variables keep their pre-seeded random direction, normalized to unit
/// length. A zero seed row yields NaN (caller contract).
///
/// The sweep order visits free variables only, in `perm` order, and is
/// padded with the sentinel 0 (the truth variable is never updated).

use std::f32::consts::PI;
use crate::tensor::{dot_f32, scale_inplace_f32, zero_f32};

/// Initialize one instance.
///
/// `perm`: permutation of 0..n-1 (ids are offset by one to skip variable 0).
/// `is_input`, `index`, `z`: [n]. `v`: [n, k].
pub fn mix_init(perm: &[u32], k: usize, is_input: &[bool], index: &mut [u32], z: &[f32], v: &mut [f32]) {
    let n = is_input.len();
    debug_assert_eq!(perm.len() + 1, n);
    debug_assert_eq!(index.len(), n);
    debug_assert_eq!(z.len(), n);
    debug_assert_eq!(v.len(), n * k);

    for (i, row) in v.chunks_exact_mut(k).enumerate() {
        if is_input[i] {
            let sign_src = row[1];
            zero_f32(row);
            row[0] = -(z[i] * PI).cos();
            row[1] = (z[i] * PI).sin().copysign(sign_src);
        } else {
            let s = 1.0 / dot_f32(row, row).sqrt();
            scale_inplace_f32(row, s);
        }
    }

    let mut j = 0;
    for &p in perm {
        let i = p as usize + 1;
        if !is_input[i] {
            index[j] = i as u32;
            j += 1;
        }
    }
    index[j..].fill(0);
}
