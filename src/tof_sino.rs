//! TOF sinogram forward/back projection: every LOR contributes to the
//! fixed, contiguous TOF bin index set `{-(n_tofbins/2) ..= +(n_tofbins/2)}`.
//! Same plane traversal as [`crate::nontof`], with the trilinear weight
//! additionally scaled by the `erf`-based TOF weight per bin.

use ndarray::{ArrayView3, ArrayViewMut3};

use crate::geom_kernel::{bilinear_taps, LorGeometry};
use crate::image::ImageMeta;
use crate::nontof::plane_index;
use crate::tof::{bin_range_near, tof_weight, TofConfig};
use crate::Length;

/// `img_fwd[k, b] += step * W(t_i, b, k) * trilinear_sample(img, i, u, v)`
/// for every plane `i` and every bin `b` within `n_sigmas` of `t_i`.
/// `out` must have length `n_tofbins`, indexed so that `out[bin_index +
/// n_tofbins/2]` holds bin `bin_index`.
pub fn forward_one(
    img: &ArrayView3<Length>,
    meta: &ImageMeta,
    p1: [Length; 3],
    p2: [Length; 3],
    cfg: &TofConfig,
    k: usize,
    out: &mut [Length],
) {
    let Some(geom) = LorGeometry::new(p1, p2, meta) else { return };
    let n_other0 = meta.dim[geom.other[0]] as i32;
    let n_other1 = meta.dim[geom.other[1]] as i32;
    let half_n = (out.len() as i32) / 2;

    for i in geom.i_min..=geom.i_max {
        let (u, v, t_i) = geom.plane_uv(i);
        let sample: Length = bilinear_taps(u, v)
            .into_iter()
            .filter(|&((m, n), w)| w > 0.0 && m >= 0 && m < n_other0 && n >= 0 && n < n_other1)
            .map(|((m, n), w)| {
                let idx = plane_index(geom.axis, geom.other, i, m, n);
                w * img[idx]
            })
            .sum();
        if sample == 0.0 {
            continue;
        }
        let (lo, hi) = bin_range_near(cfg, t_i, k);
        for b in lo..=hi {
            let w_tof = tof_weight(cfg, t_i, b, k);
            if w_tof == 0.0 {
                continue;
            }
            out[(b + half_n) as usize] += geom.step * w_tof * sample;
        }
    }
}

/// `img[plane i, stencil taps] += step * W(t_i, b, k) * sino[k, b] *
/// stencil weight`, for every plane and every bin within `n_sigmas`.
pub fn back_one(
    img: &mut ArrayViewMut3<Length>,
    meta: &ImageMeta,
    p1: [Length; 3],
    p2: [Length; 3],
    cfg: &TofConfig,
    k: usize,
    sino_row: &[Length],
) {
    let Some(geom) = LorGeometry::new(p1, p2, meta) else { return };
    let n_other0 = meta.dim[geom.other[0]] as i32;
    let n_other1 = meta.dim[geom.other[1]] as i32;
    let half_n = (sino_row.len() as i32) / 2;

    for i in geom.i_min..=geom.i_max {
        let (u, v, t_i) = geom.plane_uv(i);
        let (lo, hi) = bin_range_near(cfg, t_i, k);
        if lo > hi {
            continue;
        }
        let mut weighted_payload = 0.0_f32;
        for b in lo..=hi {
            let w_tof = tof_weight(cfg, t_i, b, k);
            weighted_payload += w_tof * sino_row[(b + half_n) as usize];
        }
        if weighted_payload == 0.0 {
            continue;
        }
        for ((m, n), w) in bilinear_taps(u, v) {
            if w <= 0.0 || m < 0 || m >= n_other0 || n < 0 || n >= n_other1 {
                continue;
            }
            let idx = plane_index(geom.axis, geom.other, i, m, n);
            img[idx] += geom.step * w * weighted_payload;
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::image::Image;
    use crate::tof::TofBinSpec;

    #[test]
    fn point_source_tof_sino_sums_to_nontof_and_has_correct_fwhm() {
        let n = 171usize;
        let vox = 0.1_f32;
        let centre = (n as Length - 1.0) / 2.0;
        let origin = [-centre * vox, -centre * vox, -centre * vox];
        let meta = ImageMeta::new([n, n, n], [vox, vox, vox], origin).unwrap();
        let mut image = Image::zeros(meta);
        image.data[(n / 2, n / 2, n / 2)] = 1.0;

        let p1 = [100.0, 0.0, 0.0];
        let p2 = [-100.0, 0.0, 0.0];

        let fwhm = 6.0_f32;
        let sigma = fwhm / (2.0 * (2.0_f32 * 2.0_f32.ln()).sqrt());
        let cfg = TofConfig {
            tofbin_width: 0.05,
            sigma_tof: vec![sigma],
            tofcenter_offset: vec![0.0],
            n_sigmas: 9.0,
            bin_spec: TofBinSpec::Sinogram { n_tofbins: 501 },
            lor_dep_sigma: false,
            lor_dep_offset: false,
        };

        let mut row = vec![0.0; 501];
        forward_one(&image.data.view(), &image.meta, p1, p2, &cfg, 0, &mut row);

        let summed: Length = row.iter().sum();
        assert_approx_eq!(summed, vox, 1e-6);

        let (max_idx, &max_val) = row
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap();
        assert_eq!(max_idx, 250, "point source with zero offset must peak at bin 0");

        // FWHM/2 = 3.0 mm from the midpoint; bin index 3.0 / tofbin_width = 60.
        let half_width_bin = (fwhm / 2.0 / cfg.tofbin_width).round() as usize;
        let plus = row[250 + half_width_bin];
        let minus = row[250 - half_width_bin];
        assert_approx_eq!(plus, 0.5 * max_val, 1e-6);
        assert_approx_eq!(minus, 0.5 * max_val, 1e-6);
    }
}
