//! Batched mixing-method solver for differentiable MAXSAT relaxations.
//!
//! Forward: block-coordinate descent on unit-vector embeddings until the
//! per-sweep movement falls below a relative tolerance, then decode each
//! free variable into a relaxed truth value in [0, 1].
//! Backward: implicit-function gradients of that fixed point, solved by
//! replaying the same coordinate sweeps in adjoint mode.
//!
//! All kernels work on flat f32 slices carved out of `MixBuffers`.

pub mod tensor;
pub mod error;
pub mod config;
pub mod buffers;
pub mod init;
pub mod kernel;
pub mod forward;
pub mod backward;
pub mod launch;
pub mod layer;
pub mod gradient;

pub use backward::BackwardStatus;
pub use buffers::MixBuffers;
pub use config::{LayerConfig, MixDims, SolverConfig};
pub use error::MixError;
pub use layer::{LayerCache, LayerGrads, SatLayer};
