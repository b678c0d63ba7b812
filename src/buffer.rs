//! Device-aware residency for the image argument.
//!
//! Every other array crossing the boundary (LOR endpoints, sinograms,
//! TOF bin indices, projection values) stays host memory; only the
//! image is worth giving the caller explicit control over, since it is
//! what stays resident across the repeated forward/back calls of one
//! reconstruction iteration. [`Residency`] is what [`crate::adapter`]
//! branches on to choose between [`crate::dispatch::cpu`] and
//! [`crate::dispatch::cuda`].

/// Where the caller wants a projector call executed. `Cuda` requires a
/// [`crate::context::ProjectorContext`] with a CUDA backend loaded; the
/// adapter reports a [`crate::error::ProjectorError::Configuration`]
/// rather than silently falling back to `Host` if it isn't.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Residency {
    #[default]
    Host,
    Cuda,
}

impl Residency {
    pub fn is_cuda(self) -> bool {
        matches!(self, Self::Cuda)
    }
}
