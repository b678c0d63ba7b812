//! Joseph 3D ray-driven forward/back projector for PET image reconstruction.
//!
//! This crate is the inner loop shared by every iterative reconstruction
//! algorithm (OSEM, SPDHG, PDHG, ...) built on top of it: it computes the
//! line integral of a voxelized 3-D image along a batch of lines of
//! response (LORs), with and without time-of-flight (TOF) weighting, in
//! both the forward (image -> sinogram/event values) and back (values ->
//! image) directions. Those reconstruction algorithms, scanner geometry
//! builders and sinogram bookkeeping layers are out of scope here; this
//! crate only promises that forward and back projection are exact
//! adjoints of one another to single-precision tolerance.
//!
//! The public surface is the six operations in [`adapter`]; everything
//! else is implementation detail reused across them.

pub mod error;
pub mod context;
pub mod ffi;
pub mod image;
pub mod lor;
pub mod tof;
pub mod geom_kernel;
pub mod nontof;
pub mod tof_sino;
pub mod tof_lm;
pub mod dispatch;
pub mod multigpu;
pub mod buffer;
pub mod gpu_options;
pub mod adapter;

pub use error::ProjectorError;
pub use context::ProjectorContext;
pub use image::{Image, ImageMeta};
pub use lor::LorBatch;
pub use tof::TofConfig;
pub use buffer::Residency;
pub use gpu_options::GpuOptions;

/// Single-precision length type used throughout the crate. The projector
/// is monomorphic in `f32`: every array that crosses the public API is
/// 32-bit float (or 32/16-bit integer for shapes and TOF bin indices).
pub type Length = f32;
