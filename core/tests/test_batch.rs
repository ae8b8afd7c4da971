//! Batch launcher tests: elements are independent, so a batch of 8 must
//! reproduce eight batch-of-one runs exactly.
//!
//! Run: cargo test --test test_batch

mod common;

use satmix_core::buffers::MixBuffers;
use satmix_core::launch::{mix_backward_launcher, mix_forward_launcher, mix_init_launcher};
use common::random_batch;

fn run_pipeline(buf: &mut MixBuffers, perm: &[u32]) {
    mix_init_launcher(buf, perm).unwrap();
    buf.compute_snrms();
    buf.compute_w();
    mix_forward_launcher(buf, 60, 1e-5).unwrap();
    buf.reset_adjoint();
    let n = buf.dims.n;
    for (i, dz) in buf.dz.iter_mut().enumerate() {
        *dz = if i % n % 2 == 1 { 1.0 } else { -0.5 };
    }
    mix_backward_launcher(buf, 1e-2).unwrap();
}

#[test_log::test]
fn test_batch_matches_individual_runs() {
    let b = 8;
    let (batch, perm) = random_batch(b, 9, 6, 4, 17);
    let singles: Vec<MixBuffers> = (0..b).map(|bi| batch.extract(bi).unwrap()).collect();

    let mut batch = batch;
    run_pipeline(&mut batch, &perm);

    for (bi, mut single) in singles.into_iter().enumerate() {
        run_pipeline(&mut single, &perm);
        let whole = batch.extract(bi).unwrap();
        assert_eq!(single.niter, whole.niter, "niter differs for element {bi}");
        assert_eq!(single.index, whole.index, "index differs for element {bi}");
        assert_eq!(single.v, whole.v, "V differs for element {bi}");
        assert_eq!(single.w, whole.w, "W differs for element {bi}");
        assert_eq!(single.z, whole.z, "z differs for element {bi}");
        assert_eq!(single.dz, whole.dz, "dz differs for element {bi}");
        assert_eq!(single.ds, whole.ds, "dS differs for element {bi}");
    }
}

#[test]
fn test_elements_with_different_inputs_differ() {
    let (mut buf, perm) = random_batch(3, 9, 6, 4, 2);
    run_pipeline(&mut buf, &perm);
    let n = buf.dims.n;
    // Distinct input patterns per element give distinct solutions.
    assert_ne!(&buf.z[0..n], &buf.z[n..2 * n]);
    assert!(buf.niter.iter().all(|&it| it >= 1));
}

#[test]
fn test_reduce_ds_sums_elements() {
    let (mut buf, perm) = random_batch(4, 9, 6, 4, 21);
    run_pipeline(&mut buf, &perm);
    let (n, m) = (buf.dims.n, buf.dims.m);
    let mut total = vec![0.0f32; n * m];
    buf.reduce_ds(&mut total).unwrap();
    for j in 0..n * m {
        let expected: f32 = (0..4).map(|bi| buf.ds[bi * n * m + j]).sum();
        assert!((total[j] - expected).abs() <= 1e-6 * expected.abs().max(1.0));
    }
}
