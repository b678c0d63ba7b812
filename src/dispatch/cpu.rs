//! CPU dispatch: one logical task per LOR, scheduled over a `rayon`
//! thread pool. Forward projection is embarrassingly parallel
//! (`output[k]` depends only on LOR `k`). Back projection accumulates
//! into a shared image; rather than relying on a portable lock-free
//! float atomic-add, each parallel task folds into its own partial
//! image and the partials are summed in a final reduction pass — this
//! satisfies the adjointness invariant exactly as well as float atomics
//! would, at the cost of transient per-thread memory.

use ndarray::{Array1, Array2, Array3};
use rayon::prelude::*;

use crate::context::ProjectorContext;
use crate::image::ImageMeta;
use crate::lor::LorBatch;
use crate::nontof;
use crate::tof::TofConfig;
use crate::tof_lm;
use crate::tof_sino;
use crate::Length;

fn zeros(meta: &ImageMeta) -> Array3<Length> {
    let [n0, n1, n2] = meta.dim;
    Array3::zeros((n0, n1, n2))
}

pub fn forward_nontof(ctx: &ProjectorContext, img: &Array3<Length>, meta: &ImageMeta, lors: &LorBatch) -> Array1<Length> {
    let view = img.view();
    let out: Vec<Length> = ctx.pool().install(|| {
        (0..lors.n_lors())
            .into_par_iter()
            .map(|k| {
                let (p1, p2) = lors.endpoints(k);
                nontof::forward_one(&view, meta, p1, p2)
            })
            .collect()
    });
    Array1::from_vec(out)
}

pub fn back_nontof(ctx: &ProjectorContext, meta: &ImageMeta, lors: &LorBatch, payload: &[Length]) -> Array3<Length> {
    ctx.pool().install(|| {
        (0..lors.n_lors())
            .into_par_iter()
            .fold(
                || zeros(meta),
                |mut acc, k| {
                    let (p1, p2) = lors.endpoints(k);
                    let mut view = acc.view_mut();
                    nontof::back_one(&mut view, meta, p1, p2, payload[k]);
                    acc
                },
            )
            .reduce(|| zeros(meta), |a, b| a + b)
    })
}

pub fn forward_tof_sino(
    ctx: &ProjectorContext,
    img: &Array3<Length>,
    meta: &ImageMeta,
    lors: &LorBatch,
    cfg: &TofConfig,
) -> Array2<Length> {
    let n_tofbins = cfg.half_bin_range().expect("sinogram TOF config") * 2 + 1;
    let view = img.view();
    let rows: Vec<Length> = ctx.pool().install(|| {
        (0..lors.n_lors())
            .into_par_iter()
            .flat_map_iter(|k| {
                let (p1, p2) = lors.endpoints(k);
                let mut row = vec![0.0; n_tofbins as usize];
                tof_sino::forward_one(&view, meta, p1, p2, cfg, k, &mut row);
                row.into_iter()
            })
            .collect()
    });
    Array2::from_shape_vec((lors.n_lors(), n_tofbins as usize), rows).expect("row-major by construction")
}

pub fn back_tof_sino(
    ctx: &ProjectorContext,
    meta: &ImageMeta,
    lors: &LorBatch,
    cfg: &TofConfig,
    sino: &Array2<Length>,
) -> Array3<Length> {
    ctx.pool().install(|| {
        (0..lors.n_lors())
            .into_par_iter()
            .fold(
                || zeros(meta),
                |mut acc, k| {
                    let (p1, p2) = lors.endpoints(k);
                    let row = sino.row(k);
                    let row_slice = row.as_slice().expect("sinogram row must be contiguous");
                    let mut view = acc.view_mut();
                    tof_sino::back_one(&mut view, meta, p1, p2, cfg, k, row_slice);
                    acc
                },
            )
            .reduce(|| zeros(meta), |a, b| a + b)
    })
}

pub fn forward_tof_lm(
    ctx: &ProjectorContext,
    img: &Array3<Length>,
    meta: &ImageMeta,
    lors: &LorBatch,
    cfg: &TofConfig,
    tof_bin: &[i16],
) -> Array1<Length> {
    let view = img.view();
    let out: Vec<Length> = ctx.pool().install(|| {
        (0..lors.n_lors())
            .into_par_iter()
            .map(|k| {
                let (p1, p2) = lors.endpoints(k);
                tof_lm::forward_one(&view, meta, p1, p2, cfg, k, tof_bin[k] as i32)
            })
            .collect()
    });
    Array1::from_vec(out)
}

pub fn back_tof_lm(
    ctx: &ProjectorContext,
    meta: &ImageMeta,
    lors: &LorBatch,
    cfg: &TofConfig,
    tof_bin: &[i16],
    payload: &[Length],
) -> Array3<Length> {
    ctx.pool().install(|| {
        (0..lors.n_lors())
        .into_par_iter()
        .fold(
            || zeros(meta),
            |mut acc, k| {
                let (p1, p2) = lors.endpoints(k);
                let mut view = acc.view_mut();
                tof_lm::back_one(&mut view, meta, p1, p2, cfg, k, tof_bin[k] as i32, payload[k]);
                acc
            },
        )
        .reduce(|| zeros(meta), |a, b| a + b)
    })
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    #[allow(unused)]
    use pretty_assertions::{assert_eq, assert_ne};
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;
    use crate::tof::TofBinSpec;

    fn meta() -> ImageMeta {
        ImageMeta::new([9, 9, 9], [1.0, 1.0, 1.0], [0.0, 0.0, 0.0]).unwrap()
    }

    fn ctx() -> ProjectorContext {
        ProjectorContext::cpu_only(2).unwrap()
    }

    fn random_image(meta: &ImageMeta, seed: u64) -> Array3<Length> {
        let [n0, n1, n2] = meta.dim;
        let mut img = Array3::zeros((n0, n1, n2));
        let mut s = seed;
        for v in img.iter_mut() {
            s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
            *v = ((s >> 33) as u32 % 1000) as Length / 1000.0;
        }
        img
    }

    fn ring_lors(n: usize, radius: Length, meta: &ImageMeta) -> LorBatch {
        let centre = [
            meta.img_origin[0] + (meta.dim[0] as Length - 1.0) * meta.voxsize[0] * 0.5,
            meta.img_origin[1] + (meta.dim[1] as Length - 1.0) * meta.voxsize[1] * 0.5,
            meta.img_origin[2] + (meta.dim[2] as Length - 1.0) * meta.voxsize[2] * 0.5,
        ];
        let mut xstart = Vec::with_capacity(n * 3);
        let mut xend = Vec::with_capacity(n * 3);
        for i in 0..n {
            let theta = (i as Length / n as Length) * std::f32::consts::PI;
            let dx = theta.cos();
            let dy = theta.sin();
            xstart.extend_from_slice(&[centre[0] + radius * dx, centre[1] + radius * dy, centre[2]]);
            xend.extend_from_slice(&[centre[0] - radius * dx, centre[1] - radius * dy, centre[2]]);
        }
        LorBatch::new(
            Array2::from_shape_vec((n, 3), xstart).unwrap(),
            Array2::from_shape_vec((n, 3), xend).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn forward_is_deterministic() {
        let meta = meta();
        let img = random_image(&meta, 42);
        let lors = ring_lors(12, 20.0, &meta);
        let a = forward_nontof(&ctx(), &img, &meta, &lors);
        let b = forward_nontof(&ctx(), &img, &meta, &lors);
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn nontof_forward_and_back_are_adjoint(
            seed in 0u64..10_000,
            n_lors in 4usize..16,
            radius in 10.0..25.0f32,
        ) {
            let meta = meta();
            let img = random_image(&meta, seed);
            let lors = ring_lors(n_lors, radius, &meta);

            let ax = forward_nontof(&ctx(), &img, &meta, &lors);
            let y = random_image(&meta, seed.wrapping_add(1));
            let y_flat: Vec<Length> = (0..n_lors)
                .map(|k| {
                    let (p1, p2) = lors.endpoints(k);
                    crate::nontof::forward_one(&y.view(), &meta, p1, p2)
                })
                .collect();

            let lhs: Length = ax.iter().zip(y_flat.iter()).map(|(a, y)| a * y).sum();

            let aty = back_nontof(&ctx(), &meta, &lors, &y_flat);
            let rhs: Length = img.iter().zip(aty.iter()).map(|(x, a)| x * a).sum();

            assert_approx_eq!(lhs, rhs, 1e-2);
        }
    }

    proptest! {
        #[test]
        fn nontof_forward_is_linear(
            seed_x in 0u64..10_000,
            seed_z in 0u64..10_000,
            alpha in -2.0..2.0f32,
            beta in -2.0..2.0f32,
            n_lors in 4usize..16,
            radius in 10.0..25.0f32,
        ) {
            let meta = meta();
            let x = random_image(&meta, seed_x);
            let z = random_image(&meta, seed_z.wrapping_add(1));
            let lors = ring_lors(n_lors, radius, &meta);

            let combined = &x * alpha + &z * beta;
            let lhs = forward_nontof(&ctx(), &combined, &meta, &lors);

            let ax = forward_nontof(&ctx(), &x, &meta, &lors);
            let az = forward_nontof(&ctx(), &z, &meta, &lors);
            let rhs = &ax * alpha + &az * beta;

            for (&l, &r) in lhs.iter().zip(rhs.iter()) {
                assert_approx_eq!(l, r, 1e-3);
            }
        }

        #[test]
        fn nontof_forward_is_invariant_under_shared_translation(
            seed in 0u64..10_000,
            n_lors in 4usize..16,
            radius in 10.0..25.0f32,
            shift in -3.0..3.0f32,
        ) {
            let meta = meta();
            let img = random_image(&meta, seed);
            let lors = ring_lors(n_lors, radius, &meta);
            let baseline = forward_nontof(&ctx(), &img, &meta, &lors);

            // Translate every LOR endpoint and the image origin by the same
            // world-space offset: the line each LOR defines relative to the
            // image is unchanged, so the projection sums must match.
            let shifted_meta = ImageMeta::new(
                meta.dim,
                meta.voxsize,
                [meta.img_origin[0] + shift, meta.img_origin[1] + shift, meta.img_origin[2] + shift],
            ).unwrap();
            let mut xstart = lors.xstart.clone();
            let mut xend = lors.xend.clone();
            for v in xstart.iter_mut().chain(xend.iter_mut()) {
                *v += shift;
            }
            let shifted_lors = LorBatch::new(xstart, xend).unwrap();

            let shifted = forward_nontof(&ctx(), &img, &shifted_meta, &shifted_lors);
            for (&a, &b) in baseline.iter().zip(shifted.iter()) {
                assert_approx_eq!(a, b, 1e-3);
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]
        #[test]
        fn tof_sino_forward_and_back_are_adjoint(
            seed in 0u64..10_000,
            n_lors in 3usize..10,
            radius in 10.0..25.0f32,
        ) {
            let meta = meta();
            let img = random_image(&meta, seed);
            let lors = ring_lors(n_lors, radius, &meta);
            let cfg = TofConfig {
                tofbin_width: 2.0,
                sigma_tof: vec![3.0],
                tofcenter_offset: vec![0.0],
                n_sigmas: 4.0,
                bin_spec: TofBinSpec::Sinogram { n_tofbins: 9 },
                lor_dep_sigma: false,
                lor_dep_offset: false,
            };

            let ax = forward_tof_sino(&ctx(), &img, &meta, &lors, &cfg);
            let y = random_image(&meta, seed.wrapping_add(7));
            let n_tofbins = cfg.half_bin_range().unwrap() * 2 + 1;
            let mut y_sino = Array2::zeros((n_lors, n_tofbins as usize));
            for k in 0..n_lors {
                let (p1, p2) = lors.endpoints(k);
                let mut row = vec![0.0; n_tofbins as usize];
                crate::tof_sino::forward_one(&y.view(), &meta, p1, p2, &cfg, k, &mut row);
                for (b, v) in row.into_iter().enumerate() {
                    y_sino[[k, b]] = v;
                }
            }

            let lhs: Length = ax.iter().zip(y_sino.iter()).map(|(a, y)| a * y).sum();

            let aty = back_tof_sino(&ctx(), &meta, &lors, &cfg, &y_sino);
            let rhs: Length = img.iter().zip(aty.iter()).map(|(x, a)| x * a).sum();

            assert_approx_eq!(lhs, rhs, 1e-2);
        }
    }

    #[rstest(
        n_lors,
        case(1),
        case(4),
        case(9),
    )]
    fn tof_sinogram_bins_sum_to_nontof_projection(n_lors: usize) {
        let meta = meta();
        let img = random_image(&meta, 7);
        let lors = ring_lors(n_lors, 20.0, &meta);
        let cfg = TofConfig {
            tofbin_width: 2.0,
            sigma_tof: vec![3.0],
            tofcenter_offset: vec![0.0],
            n_sigmas: 5.0,
            bin_spec: TofBinSpec::Sinogram { n_tofbins: 11 },
            lor_dep_sigma: false,
            lor_dep_offset: false,
        };

        let nontof = forward_nontof(&ctx(), &img, &meta, &lors);
        let sino = forward_tof_sino(&ctx(), &img, &meta, &lors, &cfg);
        for k in 0..n_lors {
            let summed: Length = sino.row(k).iter().sum();
            assert_approx_eq!(summed, nontof[k], 1e-3);
        }
    }

    #[test]
    fn listmode_matches_the_corresponding_sinogram_bin() {
        let meta = meta();
        let img = random_image(&meta, 99);
        let lors = ring_lors(6, 20.0, &meta);
        let cfg = TofConfig {
            tofbin_width: 2.0,
            sigma_tof: vec![3.0],
            tofcenter_offset: vec![0.0],
            n_sigmas: 5.0,
            bin_spec: TofBinSpec::Sinogram { n_tofbins: 11 },
            lor_dep_sigma: false,
            lor_dep_offset: false,
        };
        let sino = forward_tof_sino(&ctx(), &img, &meta, &lors, &cfg);

        let tof_bin: Vec<i16> = vec![-2, -1, 0, 0, 1, 2];
        let half_n = cfg.half_bin_range().unwrap();
        let lm = forward_tof_lm(&ctx(), &img, &meta, &lors, &cfg, &tof_bin);

        for k in 0..lors.n_lors() {
            let b = tof_bin[k] as i32;
            let expected = sino[[k, (b + half_n) as usize]];
            assert_approx_eq!(lm[k], expected, 1e-5);
        }
    }
}
