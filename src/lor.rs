//! A batch of lines of response (LORs): pairs of 3-D world-space
//! endpoints. The projector only uses the line each pair defines; LORs
//! need not be unit length, but a degenerate (zero-length or
//! non-finite-direction) LOR is rejected up front rather than silently
//! producing a zero contribution, since it usually indicates a caller
//! bug rather than a genuine "misses the image" LOR.

use ndarray::Array2;

use crate::error::{ProjectorError, Result};
use crate::Length;

#[derive(Debug, Clone)]
pub struct LorBatch {
    pub xstart: Array2<Length>,
    pub xend: Array2<Length>,
}

impl LorBatch {
    pub fn new(xstart: Array2<Length>, xend: Array2<Length>) -> Result<Self> {
        if xstart.dim() != xend.dim() {
            return Err(ProjectorError::Argument(format!(
                "xstart shape {:?} and xend shape {:?} must match",
                xstart.dim(),
                xend.dim()
            )));
        }
        let (n, c) = xstart.dim();
        if c != 3 {
            return Err(ProjectorError::Argument(format!(
                "xstart/xend must have shape (nLORs, 3), got (_, {c})"
            )));
        }
        if !xstart.is_standard_layout() || !xend.is_standard_layout() {
            return Err(ProjectorError::Argument(
                "xstart/xend must be contiguous, row-major (C order)".to_string(),
            ));
        }
        let batch = Self { xstart, xend };
        for k in 0..n {
            let (p1, p2) = batch.endpoints(k);
            let dir = [p2[0] - p1[0], p2[1] - p1[1], p2[2] - p1[2]];
            if dir.iter().any(|d| !d.is_finite()) {
                return Err(ProjectorError::Argument(format!(
                    "LOR {k} has a non-finite endpoint"
                )));
            }
            let len2: Length = dir.iter().map(|d| d * d).sum();
            if len2 == 0.0 {
                return Err(ProjectorError::Argument(format!(
                    "LOR {k} has coincident endpoints (zero-length direction)"
                )));
            }
        }
        Ok(batch)
    }

    pub fn n_lors(&self) -> usize {
        self.xstart.dim().0
    }

    #[inline]
    pub fn endpoints(&self, k: usize) -> ([Length; 3], [Length; 3]) {
        let p1 = [self.xstart[[k, 0]], self.xstart[[k, 1]], self.xstart[[k, 2]]];
        let p2 = [self.xend[[k, 0]], self.xend[[k, 1]], self.xend[[k, 2]]];
        (p1, p2)
    }
}
