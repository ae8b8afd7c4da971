/// Problem dimensions and solver/layer configuration.
///
/// All configs are immutable after construction and serializable so a
/// trained layer can be checkpointed alongside its weights.

use serde::{Serialize, Deserialize};
use crate::error::MixError;

/// Per-call problem descriptor: batch size and the three strides.
///
/// Buffer layouts derived from it (row-major):
///   per-variable:  [b, n]
///   embeddings:    [b, n, k]
///   accumulators:  [b, k, m]
///   weights:       [n, m] (shared across the batch)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixDims {
    pub b: usize,
    pub n: usize,
    pub m: usize,
    pub k: usize,
}

impl MixDims {
    pub fn new(b: usize, n: usize, m: usize, k: usize) -> Result<Self, MixError> {
        let dims = MixDims { b, n, m, k };
        dims.validate()?;
        Ok(dims)
    }

    pub fn validate(&self) -> Result<(), MixError> {
        for (name, value) in [("b", self.b), ("n", self.n), ("m", self.m), ("k", self.k)] {
            if value == 0 {
                return Err(MixError::ZeroDimension { name });
            }
        }
        // The initializer writes into coordinates 0 and 1.
        if self.k < 2 {
            return Err(MixError::InvalidConfig(format!("k must be >= 2, got {}", self.k)));
        }
        Ok(())
    }

    /// Same strides, batch of one.
    pub fn single(&self) -> Self {
        MixDims { b: 1, ..*self }
    }
}

/// Iteration controls for the forward and backward passes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Upper bound on forward sweeps. Backward replays the same count.
    pub max_iter: usize,
    /// Relative forward tolerance; rescaled by the first sweep's movement.
    pub eps: f32,
    /// Proximal term added to the forward gradient norm in the adjoint pass.
    pub prox_lam: f32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            max_iter: 40,
            eps: 1e-4,
            prox_lam: 1e-2,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), MixError> {
        if self.max_iter == 0 {
            return Err(MixError::InvalidConfig("max_iter must be >= 1".into()));
        }
        if !(self.eps.is_finite() && self.eps >= 0.0) {
            return Err(MixError::InvalidConfig(format!("eps must be finite and >= 0, got {}", self.eps)));
        }
        if !(self.prox_lam.is_finite() && self.prox_lam >= 0.0) {
            return Err(MixError::InvalidConfig(format!(
                "prox_lam must be finite and >= 0, got {}",
                self.prox_lam
            )));
        }
        Ok(())
    }
}

/// Layer configuration: user-visible variables, clauses, auxiliaries.
///
/// Internally the layer prepends one truth variable (id 0) and appends
/// `aux` free variables, so the kernel sees `n + 1 + aux` variables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// User-visible variables.
    pub n: usize,
    /// Clauses (weight columns).
    pub m: usize,
    /// Auxiliary free variables.
    pub aux: usize,
    /// Embedding dimension.
    pub k: usize,
    /// Scale weights by sqrt(0.5 / (n + 1 + aux + m)) on every forward
    /// instead of once at init.
    pub weight_normalize: bool,
    pub solver: SolverConfig,
}

impl LayerConfig {
    pub fn new(n: usize, m: usize, aux: usize) -> Self {
        LayerConfig {
            n,
            m,
            aux,
            k: 32,
            weight_normalize: true,
            solver: SolverConfig::default(),
        }
    }

    /// Tiny layer for fast tests.
    pub fn test_config() -> Self {
        LayerConfig {
            n: 4,
            m: 6,
            aux: 1,
            k: 4,
            weight_normalize: true,
            solver: SolverConfig::default(),
        }
    }

    /// Variables seen by the kernel: truth + user + aux.
    pub fn total_vars(&self) -> usize {
        self.n + 1 + self.aux
    }

    /// Weight scale factor sqrt(0.5 / (total_vars + m)).
    pub fn weight_scale(&self) -> f32 {
        (0.5 / (self.total_vars() + self.m) as f32).sqrt()
    }

    pub fn dims(&self, batch: usize) -> Result<MixDims, MixError> {
        MixDims::new(batch, self.total_vars(), self.m, self.k)
    }

    pub fn validate(&self) -> Result<(), MixError> {
        if self.n == 0 {
            return Err(MixError::ZeroDimension { name: "n" });
        }
        MixDims { b: 1, n: self.total_vars(), m: self.m, k: self.k }.validate()?;
        self.solver.validate()
    }
}

/// Save a config to a JSON file.
pub fn save_config(path: &std::path::Path, cfg: &LayerConfig) -> Result<(), MixError> {
    let json = serde_json::to_string_pretty(cfg)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Load a config from a JSON file and validate it.
pub fn load_config(path: &std::path::Path) -> Result<LayerConfig, MixError> {
    let json = std::fs::read_to_string(path)?;
    let cfg: LayerConfig = serde_json::from_str(&json)?;
    if let Err(e) = cfg.validate() {
        log::warn!("rejecting config from {}: {e}", path.display());
        return Err(e);
    }
    Ok(cfg)
}
