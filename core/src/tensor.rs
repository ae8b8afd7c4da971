/// Vector primitives for the mixing kernels.
///
/// All operations are free functions on flat f32 slices. Lengths come from
/// the slices themselves; paired slices must have equal length (checked in
/// debug builds only). No allocation, O(len) each.
/// Row-major layout throughout.

/// Scaled accumulate: y[i] += a * x[i].
#[inline]
pub fn axpy_f32(y: &mut [f32], a: f32, x: &[f32]) {
    debug_assert_eq!(y.len(), x.len());
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi += a * xi;
    }
}

/// Inner product: sum_i x[i] * y[i].
#[inline]
pub fn dot_f32(x: &[f32], y: &[f32]) -> f32 {
    debug_assert_eq!(x.len(), y.len());
    let mut sum = 0.0f32;
    for (&xi, &yi) in x.iter().zip(y) {
        sum += xi * yi;
    }
    sum
}

/// In-place scale: x[i] *= a.
#[inline]
pub fn scale_inplace_f32(x: &mut [f32], a: f32) {
    for xi in x.iter_mut() {
        *xi *= a;
    }
}

/// Euclidean norm: sqrt(dot(x, x)).
#[inline]
pub fn norm_f32(x: &[f32]) -> f32 {
    dot_f32(x, x).sqrt()
}

/// Zero-fill.
#[inline]
pub fn zero_f32(x: &mut [f32]) {
    x.fill(0.0);
}

/// Clamp a scalar into [0, 1]. NaN passes through unchanged.
#[inline]
pub fn saturate_f32(x: f32) -> f32 {
    if x < 0.0 {
        0.0
    } else if x > 1.0 {
        1.0
    } else {
        x
    }
}

/// Simple xorshift64 PRNG for deterministic seeding of embeddings,
/// weights and sweep orders. Not crypto-safe.
#[derive(Clone, Debug)]
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        SimpleRng { state: seed.max(1) } // avoid zero state
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Standard normal sample (Box-Muller).
    pub fn normal(&mut self) -> f32 {
        // u1 in (0, 1] so ln(u1) is finite.
        let u1 = ((self.next_u64() >> 11) as f64 + 1.0) / (1u64 << 53) as f64;
        let u2 = (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
        ((-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()) as f32
    }

    /// Fill slice with standard normal samples times `scale`.
    pub fn fill_normal(&mut self, buf: &mut [f32], scale: f32) {
        for v in buf.iter_mut() {
            *v = self.normal() * scale;
        }
    }

    /// Uniform random permutation of 0..len (Fisher-Yates), written into `out`.
    pub fn permutation(&mut self, out: &mut [u32]) {
        for (i, p) in out.iter_mut().enumerate() {
            *p = i as u32;
        }
        for i in (1..out.len()).rev() {
            let j = (self.next_u64() % (i as u64 + 1)) as usize;
            out.swap(i, j);
        }
    }
}
