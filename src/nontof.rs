//! Non-TOF Joseph forward and back projection, per single LOR. The batch
//! dispatcher in [`crate::dispatch`] is what turns these into the
//! parallel, whole-batch operations exposed by [`crate::adapter`].

use ndarray::{ArrayView3, ArrayViewMut3};

use crate::geom_kernel::{bilinear_taps, LorGeometry};
use crate::image::ImageMeta;
use crate::Length;

/// `img_fwd[k] = step * sum_i sum_{m,n} w(u,v) * img[plane i, taps m,n]`,
/// with any out-of-image tap treated as zero.
pub fn forward_one(img: &ArrayView3<Length>, meta: &ImageMeta, p1: [Length; 3], p2: [Length; 3]) -> Length {
    let Some(geom) = LorGeometry::new(p1, p2, meta) else { return 0.0 };
    let n_other0 = meta.dim[geom.other[0]] as i32;
    let n_other1 = meta.dim[geom.other[1]] as i32;

    let mut acc = 0.0_f32;
    for i in geom.i_min..=geom.i_max {
        let (u, v, _t) = geom.plane_uv(i);
        for ((m, n), w) in bilinear_taps(u, v) {
            if w <= 0.0 || m < 0 || m >= n_other0 || n < 0 || n >= n_other1 {
                continue;
            }
            let idx = plane_index(geom.axis, geom.other, i, m, n);
            acc += w * img[idx];
        }
    }
    geom.step * acc
}

/// `img[plane i, tap] += step * w(u,v) * p_k`, for every in-bounds
/// stencil tap. Identical traversal to [`forward_one`], so that back
/// projection is the exact transpose of forward projection.
pub fn back_one(
    img: &mut ArrayViewMut3<Length>,
    meta: &ImageMeta,
    p1: [Length; 3],
    p2: [Length; 3],
    value: Length,
) {
    let Some(geom) = LorGeometry::new(p1, p2, meta) else { return };
    let n_other0 = meta.dim[geom.other[0]] as i32;
    let n_other1 = meta.dim[geom.other[1]] as i32;

    for i in geom.i_min..=geom.i_max {
        let (u, v, _t) = geom.plane_uv(i);
        for ((m, n), w) in bilinear_taps(u, v) {
            if w <= 0.0 || m < 0 || m >= n_other0 || n < 0 || n >= n_other1 {
                continue;
            }
            let idx = plane_index(geom.axis, geom.other, i, m, n);
            img[idx] += geom.step * w * value;
        }
    }
}

/// Maps the principal-axis plane index and the two off-axis tap indices
/// back to the image's native `(i0, i1, i2)` indexing.
#[inline]
pub(crate) fn plane_index(axis: usize, other: [usize; 2], i: i32, m: i32, n: i32) -> (usize, usize, usize) {
    let mut idx = [0usize; 3];
    idx[axis] = i as usize;
    idx[other[0]] = m as usize;
    idx[other[1]] = n as usize;
    (idx[0], idx[1], idx[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Image;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn point_source_non_tof() {
        let n = 171usize;
        let vox = 0.1_f32;
        let centre = (n as Length - 1.0) / 2.0;
        let origin = [-centre * vox, -centre * vox, -centre * vox];
        let meta = ImageMeta::new([n, n, n], [vox, vox, vox], origin).unwrap();
        let mut image = Image::zeros(meta);
        let c = (n / 2, n / 2, n / 2);
        image.data[c] = 1.0;

        let p1 = [100.0, 0.0, 0.0];
        let p2 = [-100.0, 0.0, 0.0];
        let fwd = forward_one(&image.data.view(), &image.meta, p1, p2);
        assert_approx_eq!(fwd, vox, 1e-6);
    }

    #[test]
    fn zero_image_forward_is_zero() {
        let meta = ImageMeta::new([8, 8, 8], [1.0, 1.0, 1.0], [0.0, 0.0, 0.0]).unwrap();
        let image = Image::zeros(meta);
        let fwd = forward_one(&image.data.view(), &image.meta, [10.0, 0.0, 0.0], [-10.0, 0.0, 0.0]);
        assert_eq!(fwd, 0.0);
    }

    #[test]
    fn lor_outside_box_contributes_nothing() {
        let meta = ImageMeta::new([8, 8, 8], [1.0, 1.0, 1.0], [0.0, 0.0, 0.0]).unwrap();
        let mut image = Image::zeros(meta);
        image.data.fill(1.0);
        let fwd = forward_one(&image.data.view(), &image.meta, [100.0, 100.0, 0.0], [-100.0, 100.0, 0.0]);
        assert_eq!(fwd, 0.0);

        let mut back_img = image.clone();
        let before = back_img.data.clone();
        {
            let mut view = back_img.data.view_mut();
            back_one(&mut view, &image.meta, [100.0, 100.0, 0.0], [-100.0, 100.0, 0.0], 5.0);
        }
        assert_eq!(back_img.data, before);
    }
}
