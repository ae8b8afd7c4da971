/// Finite-difference gradient checking for the layer.
///
/// The scalar being differentiated is L = sum_j dz_out[j] * z_out[j], so the
/// analytic gradients are exactly what `SatLayer::backward(dz_out)` returns.
/// Every forward re-run uses the same seed, hence the same initial
/// embeddings and sweep order.

use crate::error::MixError;
use crate::layer::SatLayer;

/// Problem instance for a gradient check.
pub struct GradProbe<'a> {
    pub z: &'a [f32],
    pub is_input: &'a [bool],
    pub batch: usize,
    pub seed: u64,
    pub dz_out: &'a [f32],
}

fn probe_loss(layer: &SatLayer, probe: &GradProbe<'_>, z: &[f32]) -> Result<f64, MixError> {
    let (z_out, _) = layer.forward(z, probe.is_input, probe.batch, probe.seed)?;
    Ok(z_out.iter().zip(probe.dz_out).map(|(&a, &b)| a as f64 * b as f64).sum())
}

/// Central differences of L with respect to every weight entry.
pub fn fd_weight_gradient(layer: &SatLayer, probe: &GradProbe<'_>, h: f32) -> Result<Vec<f32>, MixError> {
    let mut grad = vec![0.0f32; layer.s.len()];
    let mut perturbed = layer.clone();
    for idx in 0..layer.s.len() {
        let orig = layer.s[idx];
        perturbed.s[idx] = orig + h;
        let plus = probe_loss(&perturbed, probe, probe.z)?;
        perturbed.s[idx] = orig - h;
        let minus = probe_loss(&perturbed, probe, probe.z)?;
        perturbed.s[idx] = orig;
        grad[idx] = ((plus - minus) / (2.0 * h as f64)) as f32;
    }
    Ok(grad)
}

/// Central differences of L with respect to the input values of
/// `is_input` slots; free slots get 0.
pub fn fd_input_gradient(layer: &SatLayer, probe: &GradProbe<'_>, h: f32) -> Result<Vec<f32>, MixError> {
    let mut grad = vec![0.0f32; probe.z.len()];
    let mut z = probe.z.to_vec();
    for idx in 0..z.len() {
        if !probe.is_input[idx] {
            continue;
        }
        let orig = z[idx];
        z[idx] = orig + h;
        let plus = probe_loss(layer, probe, &z)?;
        z[idx] = orig - h;
        let minus = probe_loss(layer, probe, &z)?;
        z[idx] = orig;
        grad[idx] = ((plus - minus) / (2.0 * h as f64)) as f32;
    }
    Ok(grad)
}

/// ||a - b|| / ||b||, with ||b|| floored to avoid dividing by zero.
pub fn relative_error(analytic: &[f32], numeric: &[f32]) -> f32 {
    debug_assert_eq!(analytic.len(), numeric.len());
    let mut diff = 0.0f64;
    let mut norm = 0.0f64;
    for (&a, &b) in analytic.iter().zip(numeric) {
        diff += (a as f64 - b as f64).powi(2);
        norm += (b as f64).powi(2);
    }
    (diff.sqrt() / norm.sqrt().max(1e-12)) as f32
}

/// Result of comparing analytic against numerical weight gradients.
#[derive(Clone, Debug)]
pub struct GradCheck {
    pub rel_error: f32,
    pub analytic_norm: f32,
    pub numeric_norm: f32,
}

/// Run backward and finite differences on the weights and compare them.
/// Returns `None` when backward fell back to zero gradients.
pub fn check_weight_gradient(
    layer: &SatLayer,
    probe: &GradProbe<'_>,
    h: f32,
) -> Result<Option<GradCheck>, MixError> {
    let (_, mut cache) = layer.forward(probe.z, probe.is_input, probe.batch, probe.seed)?;
    let grads = layer.backward(&mut cache, probe.dz_out)?;
    if grads.status.iter().any(|s| !s.is_valid()) {
        return Ok(None);
    }
    let numeric = fd_weight_gradient(layer, probe, h)?;
    let norm = |x: &[f32]| x.iter().map(|&v| (v as f64).powi(2)).sum::<f64>().sqrt() as f32;
    let check = GradCheck {
        rel_error: relative_error(&grads.ds, &numeric),
        analytic_norm: norm(&grads.ds),
        numeric_norm: norm(&numeric),
    };
    log::info!(
        "weight gradient check: rel_err={:.3e} |analytic|={:.4} |numeric|={:.4}",
        check.rel_error, check.analytic_norm, check.numeric_norm
    );
    Ok(Some(check))
}
