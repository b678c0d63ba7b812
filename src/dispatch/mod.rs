//! Batch dispatch: turning the single-LOR kernels in [`crate::nontof`],
//! [`crate::tof_sino`] and [`crate::tof_lm`] into parallel, whole-batch
//! operations. [`cpu`] is the data-parallel `rayon` path; [`cuda`] is the
//! device dispatch and multi-GPU reduction path, built against the
//! native FFI surface in [`crate::ffi`].

pub mod cpu;
pub mod cuda;

/// Splits `n` items into `num_chunks` contiguous ranges, distributing the
/// remainder to the first `rem` chunks (same rule as the upstream
/// `calc_chunks` helper this is grounded on: splitting 10 items into 3
/// chunks yields `[0,4,7,10]`). Caps peak device memory on the GPU path
/// when a caller asks for more than one chunk; on CPU `rayon` already
/// handles work-stealing internally, so chunking is primarily a GPU
/// memory-budget knob.
pub fn chunk_ranges(n: usize, num_chunks: usize) -> Vec<(usize, usize)> {
    let num_chunks = num_chunks.max(1);
    let rem = n % num_chunks;
    let div = n / num_chunks;
    let mut ranges = Vec::with_capacity(num_chunks);
    let mut start = 0;
    for i in 0..num_chunks {
        let len = if i < rem { div + 1 } else { div };
        ranges.push((start, start + len));
        start += len;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_reference_example() {
        assert_eq!(chunk_ranges(10, 3), vec![(0, 4), (4, 7), (7, 10)]);
    }

    #[test]
    fn single_chunk_covers_everything() {
        assert_eq!(chunk_ranges(7, 1), vec![(0, 7)]);
    }

    #[test]
    fn more_chunks_than_items() {
        let ranges = chunk_ranges(2, 5);
        assert_eq!(ranges.iter().map(|(a, b)| b - a).sum::<usize>(), 2);
        assert_eq!(ranges.len(), 5);
    }
}
