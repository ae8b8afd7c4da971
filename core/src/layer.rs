/// MAXSAT relaxation layer around the batched mixing solver.
///
/// The kernel sees `N = n + 1 + aux` variables per instance:
///   id 0         truth variable, input with z = 1 (embedded at e0)
///   ids 1..=n    user variables, inputs or free per `is_input`
///   ids n+1..N   auxiliary free variables, z = 0
///
/// Weights S are [N, m]. Forward returns z for the user variables; backward
/// returns dS summed over the batch and dz for the user variables (non-zero
/// only on inputs).

use serde::{Serialize, Deserialize};
use crate::backward::BackwardStatus;
use crate::buffers::MixBuffers;
use crate::config::LayerConfig;
use crate::error::{check_len, MixError};
use crate::launch::{mix_backward_launcher, mix_forward_launcher, mix_init_launcher};
use crate::tensor::{axpy_f32, scale_inplace_f32, SimpleRng};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SatLayer {
    pub cfg: LayerConfig,
    /// Flat [N, m] weights, row-major.
    pub s: Vec<f32>,
}

/// Everything backward needs from a forward call.
pub struct LayerCache {
    pub batch: usize,
    pub buf: MixBuffers,
}

impl LayerCache {
    /// Sweep count per batch element.
    pub fn niter(&self) -> &[usize] {
        &self.buf.niter
    }
}

/// Gradients from one backward call.
pub struct LayerGrads {
    /// [N, m], summed over the batch.
    pub ds: Vec<f32>,
    /// [batch, n]; zero on free variables.
    pub dz: Vec<f32>,
    pub status: Vec<BackwardStatus>,
}

impl SatLayer {
    /// Random weights: standard normal, scaled once here unless the layer
    /// normalizes on every forward.
    pub fn new(cfg: LayerConfig, seed: u64) -> Result<Self, MixError> {
        cfg.validate()?;
        let mut s = vec![0.0f32; cfg.total_vars() * cfg.m];
        let mut rng = SimpleRng::new(seed);
        let scale = if cfg.weight_normalize { 1.0 } else { cfg.weight_scale() };
        rng.fill_normal(&mut s, scale);
        Ok(SatLayer { cfg, s })
    }

    pub fn from_weights(cfg: LayerConfig, s: Vec<f32>) -> Result<Self, MixError> {
        cfg.validate()?;
        check_len("s", s.len(), cfg.total_vars() * cfg.m)?;
        Ok(SatLayer { cfg, s })
    }

    fn weight_factor(&self) -> f32 {
        if self.cfg.weight_normalize { self.cfg.weight_scale() } else { 1.0 }
    }

    /// Solve a batch. `z`, `is_input`: [batch, n]. `seed` drives the random
    /// embeddings and the sweep order, so equal seeds give equal results.
    pub fn forward(
        &self,
        z: &[f32],
        is_input: &[bool],
        batch: usize,
        seed: u64,
    ) -> Result<(Vec<f32>, LayerCache), MixError> {
        let dims = self.cfg.dims(batch)?;
        let n = self.cfg.n;
        let nn = dims.n;
        check_len("s", self.s.len(), nn * dims.m)?;
        check_len("z", z.len(), batch * n)?;
        check_len("is_input", is_input.len(), batch * n)?;

        let mut buf = MixBuffers::new(dims)?;
        buf.s.copy_from_slice(&self.s);
        scale_inplace_f32(&mut buf.s, self.weight_factor());

        for bi in 0..batch {
            let base = bi * nn;
            buf.z[base] = 1.0;
            buf.is_input[base] = true;
            buf.z[base + 1..base + 1 + n].copy_from_slice(&z[bi * n..(bi + 1) * n]);
            buf.is_input[base + 1..base + 1 + n].copy_from_slice(&is_input[bi * n..(bi + 1) * n]);
        }

        let mut rng = SimpleRng::new(seed);
        rng.fill_normal(&mut buf.v, 1.0);
        let mut perm = vec![0u32; nn - 1];
        rng.permutation(&mut perm);

        mix_init_launcher(&mut buf, &perm)?;
        buf.compute_snrms();
        buf.compute_w();
        let solver = self.cfg.solver;
        mix_forward_launcher(&mut buf, solver.max_iter, solver.eps)?;

        let mut z_out = vec![0.0f32; batch * n];
        for bi in 0..batch {
            let base = bi * nn + 1;
            z_out[bi * n..(bi + 1) * n].copy_from_slice(&buf.z[base..base + n]);
        }
        Ok((z_out, LayerCache { batch, buf }))
    }

    /// Gradients of the forward outputs given `dz_out`: [batch, n].
    /// The cache stays valid for further backward calls.
    pub fn backward(&self, cache: &mut LayerCache, dz_out: &[f32]) -> Result<LayerGrads, MixError> {
        let n = self.cfg.n;
        let batch = cache.batch;
        let expected = self.cfg.dims(batch)?;
        if cache.buf.dims != expected {
            return Err(MixError::InvalidConfig(format!(
                "cache dims {:?} do not match layer dims {:?}",
                cache.buf.dims, expected
            )));
        }
        cache.buf.validate()?;
        check_len("s", self.s.len(), expected.n * expected.m)?;
        check_len("dz", dz_out.len(), batch * n)?;
        let buf = &mut cache.buf;
        let nn = buf.dims.n;

        buf.reset_adjoint();
        buf.dz.fill(0.0);
        for bi in 0..batch {
            let base = bi * nn + 1;
            buf.dz[base..base + n].copy_from_slice(&dz_out[bi * n..(bi + 1) * n]);
        }

        let status = mix_backward_launcher(buf, self.cfg.solver.prox_lam)?;

        let mut ds = vec![0.0f32; self.s.len()];
        buf.reduce_ds(&mut ds)?;
        scale_inplace_f32(&mut ds, self.weight_factor());

        let mut dz = vec![0.0f32; batch * n];
        for bi in 0..batch {
            let base = bi * nn + 1;
            dz[bi * n..(bi + 1) * n].copy_from_slice(&buf.dz[base..base + n]);
        }
        Ok(LayerGrads { ds, dz, status })
    }

    /// Plain SGD step on the weights: s -= lr * ds.
    pub fn apply_weight_gradients(&mut self, ds: &[f32], lr: f32) -> Result<(), MixError> {
        check_len("ds", ds.len(), self.s.len())?;
        axpy_f32(&mut self.s, -lr, ds);
        Ok(())
    }

    /// Save config + weights as JSON.
    pub fn save(&self, path: &std::path::Path) -> Result<(), MixError> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load and validate a layer saved with `save`.
    pub fn load(path: &std::path::Path) -> Result<Self, MixError> {
        let json = std::fs::read_to_string(path)?;
        let layer: SatLayer = serde_json::from_str(&json)?;
        SatLayer::from_weights(layer.cfg, layer.s)
    }
}
