/// Batch buffer arena for the mixing solver.
///
/// Every buffer is one flat Vec holding all batch elements back to back.
/// Per-element views are carved out with `split_at_mut`, so each worker gets
/// disjoint `&mut` slices and the shared weights as `&` slices. The kernels
/// themselves never allocate.
///
/// Layouts (row-major):
///   s:        [n, m]     shared weights, one row per variable
///   snrms:    [n]        squared row norms of s
///   is_input: [b, n]
///   index:    [b, n]     sweep order, 0-terminated
///   z, dz:    [b, n]
///   gnrm:     [b, n]
///   v, u:     [b, n, k]  embeddings / adjoint embeddings
///   w, phi:   [b, k, m]  accumulators W = V^T S, Phi = U^T S
///   ds:       [b, n, m]
///   niter:    [b]
///   cache:    [b, k]

use rayon::prelude::*;
use crate::config::MixDims;
use crate::error::{check_len, MixError};
use crate::tensor::{axpy_f32, zero_f32};

#[derive(Clone, Debug)]
pub struct MixBuffers {
    pub dims: MixDims,
    pub s: Vec<f32>,
    pub snrms: Vec<f32>,
    pub is_input: Vec<bool>,
    pub index: Vec<u32>,
    pub z: Vec<f32>,
    pub dz: Vec<f32>,
    pub gnrm: Vec<f32>,
    pub v: Vec<f32>,
    pub u: Vec<f32>,
    pub w: Vec<f32>,
    pub phi: Vec<f32>,
    pub ds: Vec<f32>,
    pub niter: Vec<usize>,
    pub cache: Vec<f32>,
}

/// Read-only weights shared by every element of a batch.
#[derive(Clone, Copy)]
pub struct SharedWeights<'a> {
    pub s: &'a [f32],
    pub snrms: &'a [f32],
}

/// One batch element's slices of every per-element buffer.
pub struct InstanceMut<'a> {
    pub is_input: &'a [bool],
    pub index: &'a mut [u32],
    pub z: &'a mut [f32],
    pub dz: &'a mut [f32],
    pub gnrm: &'a mut [f32],
    pub v: &'a mut [f32],
    pub u: &'a mut [f32],
    pub w: &'a mut [f32],
    pub phi: &'a mut [f32],
    pub ds: &'a mut [f32],
    pub niter: &'a mut usize,
    pub cache: &'a mut [f32],
}

fn take_chunk<'a, T>(rest: &mut &'a mut [T], len: usize) -> &'a mut [T] {
    let (head, tail) = std::mem::take(rest).split_at_mut(len);
    *rest = tail;
    head
}

impl MixBuffers {
    /// Zero-filled buffers for `dims`.
    pub fn new(dims: MixDims) -> Result<Self, MixError> {
        dims.validate()?;
        let MixDims { b, n, m, k } = dims;
        Ok(MixBuffers {
            dims,
            s: vec![0.0; n * m],
            snrms: vec![0.0; n],
            is_input: vec![false; b * n],
            index: vec![0; b * n],
            z: vec![0.0; b * n],
            dz: vec![0.0; b * n],
            gnrm: vec![0.0; b * n],
            v: vec![0.0; b * n * k],
            u: vec![0.0; b * n * k],
            w: vec![0.0; b * k * m],
            phi: vec![0.0; b * k * m],
            ds: vec![0.0; b * n * m],
            niter: vec![0; b],
            cache: vec![0.0; b * k],
        })
    }

    /// Check every buffer against the strides implied by `dims`.
    pub fn validate(&self) -> Result<(), MixError> {
        self.dims.validate()?;
        let MixDims { b, n, m, k } = self.dims;
        check_len("s", self.s.len(), n * m)?;
        check_len("snrms", self.snrms.len(), n)?;
        check_len("is_input", self.is_input.len(), b * n)?;
        check_len("index", self.index.len(), b * n)?;
        check_len("z", self.z.len(), b * n)?;
        check_len("dz", self.dz.len(), b * n)?;
        check_len("gnrm", self.gnrm.len(), b * n)?;
        check_len("v", self.v.len(), b * n * k)?;
        check_len("u", self.u.len(), b * n * k)?;
        check_len("w", self.w.len(), b * k * m)?;
        check_len("phi", self.phi.len(), b * k * m)?;
        check_len("ds", self.ds.len(), b * n * m)?;
        check_len("niter", self.niter.len(), b)?;
        check_len("cache", self.cache.len(), b * k)?;
        Ok(())
    }

    /// Split into shared weights plus one disjoint view per batch element.
    ///
    /// Panics if buffer lengths disagree with `dims`; call `validate` first.
    pub fn split_mut(&mut self) -> (SharedWeights<'_>, Vec<InstanceMut<'_>>) {
        let MixDims { b, n, m, k } = self.dims;
        let mut is_input = &self.is_input[..];
        let mut index = &mut self.index[..];
        let mut z = &mut self.z[..];
        let mut dz = &mut self.dz[..];
        let mut gnrm = &mut self.gnrm[..];
        let mut v = &mut self.v[..];
        let mut u = &mut self.u[..];
        let mut w = &mut self.w[..];
        let mut phi = &mut self.phi[..];
        let mut ds = &mut self.ds[..];
        let mut niter = &mut self.niter[..];
        let mut cache = &mut self.cache[..];

        let mut views = Vec::with_capacity(b);
        for _ in 0..b {
            let (inp, rest) = is_input.split_at(n);
            is_input = rest;
            let (it, rest) = std::mem::take(&mut niter).split_at_mut(1);
            niter = rest;
            views.push(InstanceMut {
                is_input: inp,
                index: take_chunk(&mut index, n),
                z: take_chunk(&mut z, n),
                dz: take_chunk(&mut dz, n),
                gnrm: take_chunk(&mut gnrm, n),
                v: take_chunk(&mut v, n * k),
                u: take_chunk(&mut u, n * k),
                w: take_chunk(&mut w, k * m),
                phi: take_chunk(&mut phi, k * m),
                ds: take_chunk(&mut ds, n * m),
                niter: &mut it[0],
                cache: take_chunk(&mut cache, k),
            });
        }
        (SharedWeights { s: &self.s, snrms: &self.snrms }, views)
    }

    /// snrms[i] = ||S_i||^2.
    pub fn compute_snrms(&mut self) {
        let m = self.dims.m;
        for (sn, row) in self.snrms.iter_mut().zip(self.s.chunks_exact(m)) {
            *sn = row.iter().map(|x| x * x).sum();
        }
    }

    /// Re-derive W = V^T S for every element from the current embeddings.
    pub fn compute_w(&mut self) {
        let MixDims { n, m, k, .. } = self.dims;
        let s = &self.s;
        self.w
            .par_chunks_mut(k * m)
            .zip(self.v.par_chunks(n * k))
            .for_each(|(w, v)| {
                zero_f32(w);
                for i in 0..n {
                    let s_i = &s[i * m..(i + 1) * m];
                    for kk in 0..k {
                        axpy_f32(&mut w[kk * m..(kk + 1) * m], v[i * k + kk], s_i);
                    }
                }
            });
    }

    /// Zero the adjoint state (U, Phi) and the weight gradient before backward.
    pub fn reset_adjoint(&mut self) {
        zero_f32(&mut self.u);
        zero_f32(&mut self.phi);
        zero_f32(&mut self.ds);
    }

    /// Sum the per-element weight gradients into `out` [n, m].
    pub fn reduce_ds(&self, out: &mut [f32]) -> Result<(), MixError> {
        let MixDims { n, m, .. } = self.dims;
        check_len("ds_out", out.len(), n * m)?;
        zero_f32(out);
        for ds in self.ds.chunks_exact(n * m) {
            axpy_f32(out, 1.0, ds);
        }
        Ok(())
    }

    /// Copy batch element `bi` (and the shared weights) into standalone
    /// buffers with batch size one.
    pub fn extract(&self, bi: usize) -> Result<MixBuffers, MixError> {
        let MixDims { b, n, m, k } = self.dims;
        if bi >= b {
            return Err(MixError::InvalidConfig(format!("batch element {bi} out of range (b={b})")));
        }
        let per = |len: usize| bi * len..(bi + 1) * len;
        Ok(MixBuffers {
            dims: self.dims.single(),
            s: self.s.clone(),
            snrms: self.snrms.clone(),
            is_input: self.is_input[per(n)].to_vec(),
            index: self.index[per(n)].to_vec(),
            z: self.z[per(n)].to_vec(),
            dz: self.dz[per(n)].to_vec(),
            gnrm: self.gnrm[per(n)].to_vec(),
            v: self.v[per(n * k)].to_vec(),
            u: self.u[per(n * k)].to_vec(),
            w: self.w[per(k * m)].to_vec(),
            phi: self.phi[per(k * m)].to_vec(),
            ds: self.ds[per(n * m)].to_vec(),
            niter: vec![self.niter[bi]],
            cache: self.cache[per(k)].to_vec(),
        })
    }
}
