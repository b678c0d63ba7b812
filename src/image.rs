//! The voxelized image the projector reads from (forward) or accumulates
//! into (back projection).

use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::error::{ProjectorError, Result};
use crate::Length;

/// World-space placement and sampling of an [`Image`].
///
/// `img_origin` is the world coordinate of the *centre* of voxel
/// `(0, 0, 0)`, matching the convention used throughout the geometry
/// kernel (`img_origin + i * voxsize` is the centre of voxel `i` along an
/// axis).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageMeta {
    pub dim: [usize; 3],
    pub voxsize: [Length; 3],
    pub img_origin: [Length; 3],
}

impl ImageMeta {
    pub fn new(dim: [usize; 3], voxsize: [Length; 3], img_origin: [Length; 3]) -> Result<Self> {
        if dim.iter().any(|&n| n < 2) {
            return Err(ProjectorError::Argument(format!(
                "image dimensions must all be >= 2, got {dim:?}"
            )));
        }
        if voxsize.iter().any(|&v| !(v > 0.0) || !v.is_finite()) {
            return Err(ProjectorError::Argument(format!(
                "voxsize components must be strictly positive and finite, got {voxsize:?}"
            )));
        }
        if img_origin.iter().any(|&o| !o.is_finite()) {
            return Err(ProjectorError::Argument(format!(
                "img_origin components must be finite, got {img_origin:?}"
            )));
        }
        Ok(Self { dim, voxsize, img_origin })
    }

    pub fn n_voxels(&self) -> usize {
        self.dim[0] * self.dim[1] * self.dim[2]
    }
}

/// A dense, row-major 3-D image, `data[[i0, i1, i2]]` at
/// `i0*n1*n2 + i1*n2 + i2`. Caller-owned and caller-allocated, same as
/// every other buffer that crosses the projector boundary.
#[derive(Debug, Clone)]
pub struct Image {
    pub meta: ImageMeta,
    pub data: Array3<Length>,
}

impl Image {
    pub fn zeros(meta: ImageMeta) -> Self {
        let [n0, n1, n2] = meta.dim;
        Self { meta, data: Array3::zeros((n0, n1, n2)) }
    }

    pub fn from_data(meta: ImageMeta, data: Array3<Length>) -> Result<Self> {
        let expected = (meta.dim[0], meta.dim[1], meta.dim[2]);
        if data.dim() != expected {
            return Err(ProjectorError::Argument(format!(
                "image data shape {:?} does not match meta.dim {:?}",
                data.dim(),
                meta.dim
            )));
        }
        if !data.is_standard_layout() {
            return Err(ProjectorError::Argument(
                "image data must be contiguous, row-major (C order)".to_string(),
            ));
        }
        Ok(Self { meta, data })
    }
}
