//! PyO3 bindings for satmix-core.
//!
//! Thin wrappers over `SatLayer`: flat lists in, flat lists out. No math on
//! the Python side; every solve and gradient runs in Rust.

use std::path::PathBuf;

use pyo3::prelude::*;
use pyo3::exceptions::PyValueError;
use pyo3::types::PyDict;

use satmix_core::config::{LayerConfig as RustLayerConfig, SolverConfig};
use satmix_core::layer::{LayerCache as RustCache, SatLayer as RustLayer};
use satmix_core::MixError;

fn to_py_err(e: MixError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

// ── LayerConfig ──────────────────────────────────────────────────────

#[pyclass(frozen)]
#[derive(Clone)]
struct LayerConfig {
    inner: RustLayerConfig,
}

#[pymethods]
impl LayerConfig {
    #[new]
    #[pyo3(signature = (n, m, aux=0, k=32, weight_normalize=true, max_iter=40, eps=1e-4, prox_lam=1e-2))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        n: usize,
        m: usize,
        aux: usize,
        k: usize,
        weight_normalize: bool,
        max_iter: usize,
        eps: f32,
        prox_lam: f32,
    ) -> PyResult<Self> {
        let inner = RustLayerConfig {
            n,
            m,
            aux,
            k,
            weight_normalize,
            solver: SolverConfig { max_iter, eps, prox_lam },
        };
        inner.validate().map_err(to_py_err)?;
        Ok(LayerConfig { inner })
    }

    #[getter]
    fn n(&self) -> usize { self.inner.n }
    #[getter]
    fn m(&self) -> usize { self.inner.m }
    #[getter]
    fn aux(&self) -> usize { self.inner.aux }
    #[getter]
    fn k(&self) -> usize { self.inner.k }
    #[getter]
    fn weight_normalize(&self) -> bool { self.inner.weight_normalize }
    #[getter]
    fn max_iter(&self) -> usize { self.inner.solver.max_iter }
    #[getter]
    fn eps(&self) -> f32 { self.inner.solver.eps }
    #[getter]
    fn prox_lam(&self) -> f32 { self.inner.solver.prox_lam }

    /// Variables seen by the solver: truth + user + aux.
    fn total_vars(&self) -> usize {
        self.inner.total_vars()
    }
}

// ── MixCache ─────────────────────────────────────────────────────────

/// Forward state needed by `SatLayer.backward`. Reusable across calls.
#[pyclass(unsendable)]
struct MixCache {
    inner: RustCache,
}

#[pymethods]
impl MixCache {
    #[getter]
    fn batch(&self) -> usize {
        self.inner.batch
    }

    /// Forward sweeps run per batch element.
    fn niter(&self) -> Vec<usize> {
        self.inner.niter().to_vec()
    }
}

// ── SatLayer ─────────────────────────────────────────────────────────

#[pyclass]
struct SatLayer {
    inner: RustLayer,
}

#[pymethods]
impl SatLayer {
    #[new]
    #[pyo3(signature = (cfg, seed=0))]
    fn new(cfg: &LayerConfig, seed: u64) -> PyResult<Self> {
        let inner = RustLayer::new(cfg.inner.clone(), seed).map_err(to_py_err)?;
        Ok(SatLayer { inner })
    }

    /// Build a layer from explicit weights: flat [total_vars * m].
    #[staticmethod]
    fn from_weights(cfg: &LayerConfig, weights: Vec<f32>) -> PyResult<Self> {
        let inner = RustLayer::from_weights(cfg.inner.clone(), weights).map_err(to_py_err)?;
        Ok(SatLayer { inner })
    }

    #[getter]
    fn config(&self) -> LayerConfig {
        LayerConfig { inner: self.inner.cfg.clone() }
    }

    /// Flat weights, [total_vars * m] row-major.
    fn weights(&self) -> Vec<f32> {
        self.inner.s.clone()
    }

    /// Solve a batch. `z`, `is_input`: flat [batch * n].
    /// Returns (z_out, cache).
    #[pyo3(signature = (z, is_input, batch, seed=0))]
    fn forward(&self, z: Vec<f32>, is_input: Vec<bool>, batch: usize, seed: u64) -> PyResult<(Vec<f32>, MixCache)> {
        let (z_out, cache) = self.inner.forward(&z, &is_input, batch, seed).map_err(to_py_err)?;
        Ok((z_out, MixCache { inner: cache }))
    }

    /// Gradients given dL/dz_out. Returns a dict with keys
    /// "ds" ([total_vars * m]), "dz" ([batch * n]) and "valid" ([batch]).
    fn backward<'py>(&self, py: Python<'py>, cache: &mut MixCache, dz: Vec<f32>) -> PyResult<Bound<'py, PyDict>> {
        let grads = self.inner.backward(&mut cache.inner, &dz).map_err(to_py_err)?;
        let valid: Vec<bool> = grads.status.iter().map(|s| s.is_valid()).collect();
        let dict = PyDict::new(py);
        dict.set_item("ds", grads.ds)?;
        dict.set_item("dz", grads.dz)?;
        dict.set_item("valid", valid)?;
        Ok(dict)
    }

    /// In-place SGD step: weights -= lr * ds.
    fn apply_weight_gradients(&mut self, ds: Vec<f32>, lr: f32) -> PyResult<()> {
        self.inner.apply_weight_gradients(&ds, lr).map_err(to_py_err)
    }

    fn save(&self, path: PathBuf) -> PyResult<()> {
        self.inner.save(&path)
            .map_err(|e| PyValueError::new_err(format!("save failed: {e}")))
    }

    #[staticmethod]
    fn load(path: PathBuf) -> PyResult<Self> {
        let inner = RustLayer::load(&path)
            .map_err(|e| PyValueError::new_err(format!("load failed: {e}")))?;
        Ok(SatLayer { inner })
    }
}

#[pymodule]
fn satmix(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<LayerConfig>()?;
    m.add_class::<MixCache>()?;
    m.add_class::<SatLayer>()?;
    Ok(())
}
