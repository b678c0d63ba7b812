//! The crate's public surface: six operations, each validating its
//! arguments once and then routing to [`crate::dispatch::cpu`] or
//! [`crate::dispatch::cuda`] depending on the requested [`Residency`].
//!
//! Every operation takes an explicit `&ProjectorContext` rather than
//! reaching for [`crate::context::default_context`] itself, so callers
//! that need a pinned thread count or an explicitly loaded CUDA library
//! (tests, multi-tenant servers) are never forced through the process
//! singleton. [`crate::context::default_context`] remains the
//! convenience entry point for everyone else.

use ndarray::{Array1, Array2, Array3};
use tracing::instrument;

use crate::buffer::Residency;
use crate::context::ProjectorContext;
use crate::dispatch::{cpu, cuda};
use crate::error::{ProjectorError, Result};
use crate::gpu_options::GpuOptions;
use crate::image::{Image, ImageMeta};
use crate::lor::LorBatch;
use crate::tof::TofConfig;
use crate::Length;

fn require_cuda(ctx: &ProjectorContext, residency: Residency) -> Result<()> {
    if residency.is_cuda() && ctx.cuda().is_none() {
        return Err(ProjectorError::Configuration(
            "Cuda residency requested but no CUDA backend is loaded on this context".to_string(),
        ));
    }
    Ok(())
}

/// Non-TOF forward projection: `image -> Array1` of length-integrals,
/// one per LOR.
#[instrument(skip(ctx, image, lors))]
pub fn fwd(
    ctx: &ProjectorContext,
    image: &Image,
    lors: &LorBatch,
    residency: Residency,
    gpu_opts: GpuOptions,
) -> Result<Array1<Length>> {
    require_cuda(ctx, residency)?;
    match residency {
        Residency::Host => Ok(cpu::forward_nontof(ctx, &image.data, &image.meta, lors)),
        Residency::Cuda => cuda::forward_nontof(ctx, &image.data, &image.meta, lors, gpu_opts),
    }
}

/// Non-TOF back projection: per-LOR values `-> Array3` image.
#[instrument(skip(ctx, lors, payload))]
pub fn back(
    ctx: &ProjectorContext,
    meta: ImageMeta,
    lors: &LorBatch,
    payload: &[Length],
    residency: Residency,
    gpu_opts: GpuOptions,
) -> Result<Image> {
    require_cuda(ctx, residency)?;
    if payload.len() != lors.n_lors() {
        return Err(ProjectorError::Argument(format!(
            "payload has {} entries but there are {} LORs",
            payload.len(),
            lors.n_lors()
        )));
    }
    let data = match residency {
        Residency::Host => cpu::back_nontof(ctx, &meta, lors, payload),
        Residency::Cuda => cuda::back_nontof(ctx, &meta, lors, payload, gpu_opts)?,
    };
    Image::from_data(meta, data)
}

/// TOF-sinogram forward projection: `image -> Array2` of shape
/// `(nLORs, n_tofbins)`.
#[instrument(skip(ctx, image, lors, cfg))]
pub fn fwd_tof_sino(
    ctx: &ProjectorContext,
    image: &Image,
    lors: &LorBatch,
    cfg: &TofConfig,
    residency: Residency,
    gpu_opts: GpuOptions,
) -> Result<Array2<Length>> {
    require_cuda(ctx, residency)?;
    cfg.validate(lors.n_lors())?;
    if cfg.half_bin_range().is_none() {
        return Err(ProjectorError::Argument(
            "fwd_tof_sino requires a sinogram TofBinSpec, not listmode".to_string(),
        ));
    }
    match residency {
        Residency::Host => Ok(cpu::forward_tof_sino(ctx, &image.data, &image.meta, lors, cfg)),
        Residency::Cuda => cuda::forward_tof_sino(ctx, &image.data, &image.meta, lors, cfg, gpu_opts),
    }
}

/// TOF-sinogram back projection: `Array2` of shape `(nLORs, n_tofbins)`
/// `-> Array3` image.
#[instrument(skip(ctx, lors, cfg, sino))]
pub fn back_tof_sino(
    ctx: &ProjectorContext,
    meta: ImageMeta,
    lors: &LorBatch,
    cfg: &TofConfig,
    sino: &Array2<Length>,
    residency: Residency,
    gpu_opts: GpuOptions,
) -> Result<Image> {
    require_cuda(ctx, residency)?;
    cfg.validate(lors.n_lors())?;
    let n_tofbins = cfg
        .half_bin_range()
        .ok_or_else(|| ProjectorError::Argument("back_tof_sino requires a sinogram TofBinSpec, not listmode".to_string()))?
        * 2
        + 1;
    if sino.dim() != (lors.n_lors(), n_tofbins as usize) {
        return Err(ProjectorError::Argument(format!(
            "sinogram shape {:?} does not match (nLORs={}, n_tofbins={n_tofbins})",
            sino.dim(),
            lors.n_lors()
        )));
    }
    let data = match residency {
        Residency::Host => cpu::back_tof_sino(ctx, &meta, lors, cfg, sino),
        Residency::Cuda => cuda::back_tof_sino(ctx, &meta, lors, cfg, sino, gpu_opts)?,
    };
    Image::from_data(meta, data)
}

/// TOF-listmode forward projection: `image -> Array1`, one value per
/// event, evaluated only at each event's recorded `tof_bin`.
#[instrument(skip(ctx, image, lors, cfg, tof_bin))]
pub fn fwd_tof_lm(
    ctx: &ProjectorContext,
    image: &Image,
    lors: &LorBatch,
    cfg: &TofConfig,
    tof_bin: &[i16],
    residency: Residency,
    gpu_opts: GpuOptions,
) -> Result<Array1<Length>> {
    require_cuda(ctx, residency)?;
    validate_listmode(lors, cfg, tof_bin)?;
    match residency {
        Residency::Host => Ok(cpu::forward_tof_lm(ctx, &image.data, &image.meta, lors, cfg, tof_bin)),
        Residency::Cuda => cuda::forward_tof_lm(ctx, &image.data, &image.meta, lors, cfg, tof_bin, gpu_opts),
    }
}

/// TOF-listmode back projection: per-event values `-> Array3` image.
#[instrument(skip(ctx, lors, cfg, tof_bin, payload))]
pub fn back_tof_lm(
    ctx: &ProjectorContext,
    meta: ImageMeta,
    lors: &LorBatch,
    cfg: &TofConfig,
    tof_bin: &[i16],
    payload: &[Length],
    residency: Residency,
    gpu_opts: GpuOptions,
) -> Result<Image> {
    require_cuda(ctx, residency)?;
    validate_listmode(lors, cfg, tof_bin)?;
    if payload.len() != lors.n_lors() {
        return Err(ProjectorError::Argument(format!(
            "payload has {} entries but there are {} LORs",
            payload.len(),
            lors.n_lors()
        )));
    }
    let data = match residency {
        Residency::Host => cpu::back_tof_lm(ctx, &meta, lors, cfg, tof_bin, payload),
        Residency::Cuda => cuda::back_tof_lm(ctx, &meta, lors, cfg, tof_bin, payload, gpu_opts)?,
    };
    Image::from_data(meta, data)
}

fn validate_listmode(lors: &LorBatch, cfg: &TofConfig, tof_bin: &[i16]) -> Result<()> {
    cfg.validate(lors.n_lors())?;
    if tof_bin.len() != lors.n_lors() {
        return Err(ProjectorError::Argument(format!(
            "tof_bin has {} entries but there are {} LORs",
            tof_bin.len(),
            lors.n_lors()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;
    use crate::tof::TofBinSpec;

    fn small_meta() -> ImageMeta {
        ImageMeta::new([11, 11, 11], [1.0, 1.0, 1.0], [-5.0, -5.0, -5.0]).unwrap()
    }

    fn axis0_lor() -> LorBatch {
        let xstart = Array2::from_shape_vec((1, 3), vec![-20.0, 0.0, 0.0]).unwrap();
        let xend = Array2::from_shape_vec((1, 3), vec![20.0, 0.0, 0.0]).unwrap();
        LorBatch::new(xstart, xend).unwrap()
    }

    #[test]
    fn cuda_residency_without_backend_is_a_configuration_error() {
        let ctx = ProjectorContext::cpu_only(1).unwrap();
        let meta = small_meta();
        let image = Image::zeros(meta);
        let lors = axis0_lor();
        let err = fwd(&ctx, &image, &lors, Residency::Cuda, GpuOptions::default()).unwrap_err();
        assert!(matches!(err, ProjectorError::Configuration(_)));
    }

    #[test]
    fn fwd_then_back_on_host_roundtrips_shapes() {
        let ctx = ProjectorContext::cpu_only(1).unwrap();
        let meta = small_meta();
        let mut image = Image::zeros(meta);
        image.data[[5, 5, 5]] = 1.0;
        let lors = axis0_lor();
        let p = fwd(&ctx, &image, &lors, Residency::Host, GpuOptions::default()).unwrap();
        assert_eq!(p.len(), 1);
        assert!(p[0] > 0.0);

        let back_image = back(&ctx, meta, &lors, p.as_slice().unwrap(), Residency::Host, GpuOptions::default()).unwrap();
        assert_eq!(back_image.data.dim(), (11, 11, 11));
    }

    #[test]
    fn fwd_tof_sino_rejects_listmode_config() {
        let ctx = ProjectorContext::cpu_only(1).unwrap();
        let meta = small_meta();
        let image = Image::zeros(meta);
        let lors = axis0_lor();
        let cfg = TofConfig {
            tofbin_width: 2.0,
            sigma_tof: vec![3.0],
            tofcenter_offset: vec![0.0],
            n_sigmas: 3.0,
            bin_spec: TofBinSpec::Listmode { tof_bin: vec![0] },
            lor_dep_sigma: false,
            lor_dep_offset: false,
        };
        let err = fwd_tof_sino(&ctx, &image, &lors, &cfg, Residency::Host, GpuOptions::default()).unwrap_err();
        assert!(matches!(err, ProjectorError::Argument(_)));
    }
}
