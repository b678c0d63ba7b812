//! Per-call tuning knobs for the CUDA dispatch path (`§4.6`/`§6`):
//! threads-per-block for the device kernel launch, and a chunk count
//! that caps peak device memory by splitting the LOR batch into
//! sequential launches. Ignored entirely on the CPU path.

/// `threads_per_block` defaults to 32 (one warp), matching the native
/// library's own default. `num_chunks` defaults to 1 (a single launch
/// covering the whole batch); callers with large batches and limited
/// device memory raise it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuOptions {
    pub threads_per_block: i32,
    pub num_chunks: usize,
}

impl Default for GpuOptions {
    fn default() -> Self {
        Self { threads_per_block: 32, num_chunks: 1 }
    }
}
