//! TOF listmode forward/back projection: each event carries a single TOF
//! bin index, rather than every LOR fanning out over a contiguous bin
//! range. Same plane traversal and weight kernel as [`crate::tof_sino`],
//! evaluated at one bin only.

use ndarray::{ArrayView3, ArrayViewMut3};

use crate::geom_kernel::{bilinear_taps, LorGeometry};
use crate::image::ImageMeta;
use crate::nontof::plane_index;
use crate::tof::{tof_weight, TofConfig};
use crate::Length;

/// `img_fwd[k] = step * sum_i W(t_i, tof_bin[k], k) * trilinear_sample(img, i, u, v)`.
pub fn forward_one(
    img: &ArrayView3<Length>,
    meta: &ImageMeta,
    p1: [Length; 3],
    p2: [Length; 3],
    cfg: &TofConfig,
    k: usize,
    bin: i32,
) -> Length {
    let Some(geom) = LorGeometry::new(p1, p2, meta) else { return 0.0 };
    let n_other0 = meta.dim[geom.other[0]] as i32;
    let n_other1 = meta.dim[geom.other[1]] as i32;

    let mut acc = 0.0_f32;
    for i in geom.i_min..=geom.i_max {
        let (u, v, t_i) = geom.plane_uv(i);
        let w_tof = tof_weight(cfg, t_i, bin, k);
        if w_tof == 0.0 {
            continue;
        }
        let sample: Length = bilinear_taps(u, v)
            .into_iter()
            .filter(|&((m, n), w)| w > 0.0 && m >= 0 && m < n_other0 && n >= 0 && n < n_other1)
            .map(|((m, n), w)| {
                let idx = plane_index(geom.axis, geom.other, i, m, n);
                w * img[idx]
            })
            .sum();
        acc += geom.step * w_tof * sample;
    }
    acc
}

/// `img[plane i, stencil taps] += step * W(t_i, tof_bin[k], k) * p_k *
/// stencil weight`.
pub fn back_one(
    img: &mut ArrayViewMut3<Length>,
    meta: &ImageMeta,
    p1: [Length; 3],
    p2: [Length; 3],
    cfg: &TofConfig,
    k: usize,
    bin: i32,
    value: Length,
) {
    let Some(geom) = LorGeometry::new(p1, p2, meta) else { return };
    let n_other0 = meta.dim[geom.other[0]] as i32;
    let n_other1 = meta.dim[geom.other[1]] as i32;

    for i in geom.i_min..=geom.i_max {
        let (u, v, t_i) = geom.plane_uv(i);
        let w_tof = tof_weight(cfg, t_i, bin, k);
        if w_tof == 0.0 {
            continue;
        }
        let payload = w_tof * value;
        for ((m, n), w) in bilinear_taps(u, v) {
            if w <= 0.0 || m < 0 || m >= n_other0 || n < 0 || n >= n_other1 {
                continue;
            }
            let idx = plane_index(geom.axis, geom.other, i, m, n);
            img[idx] += geom.step * w * payload;
        }
    }
}
