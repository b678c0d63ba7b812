//! Time-of-flight configuration and the per-bin Gaussian weight kernel.
//!
//! The weight is the integral of a Gaussian over a bin's span, expressed
//! as an `erf` difference rather than sampled at the bin centre: that is
//! what makes `sum_b W(t, b, k)` exact partition-of-unity, which in turn
//! is what makes "sum over TOF bins equals the non-TOF projection" an
//! exact property rather than an approximation (see crate docs on
//! `tof_sino`/`tof_lm`).

use crate::error::{ProjectorError, Result};
use crate::Length;

const SQRT2: f32 = std::f32::consts::SQRT_2;

/// erf via `libm`, kept in `f32` end to end so the kernel never silently
/// promotes to `f64` and back.
#[inline]
fn erf(x: f32) -> f32 {
    libm::erff(x)
}

#[derive(Debug, Clone)]
pub enum TofBinSpec {
    /// Sinogram mode: every LOR contributes to the fixed, contiguous bin
    /// index set `{-(n_tofbins/2) ..= +(n_tofbins/2)}`.
    Sinogram { n_tofbins: usize },
    /// Listmode mode: one signed bin index per event.
    Listmode { tof_bin: Vec<i16> },
}

#[derive(Debug, Clone)]
pub struct TofConfig {
    pub tofbin_width: Length,
    pub sigma_tof: Vec<Length>,
    pub tofcenter_offset: Vec<Length>,
    pub n_sigmas: Length,
    pub bin_spec: TofBinSpec,
    pub lor_dep_sigma: bool,
    pub lor_dep_offset: bool,
}

impl TofConfig {
    pub fn validate(&self, n_lors: usize) -> Result<()> {
        if !(self.tofbin_width > 0.0) || !self.tofbin_width.is_finite() {
            return Err(ProjectorError::Argument(format!(
                "tofbin_width must be positive and finite, got {}",
                self.tofbin_width
            )));
        }
        if !(self.n_sigmas > 0.0) || !self.n_sigmas.is_finite() {
            return Err(ProjectorError::Argument(format!(
                "n_sigmas must be positive and finite, got {}",
                self.n_sigmas
            )));
        }
        check_lor_dependent_array("sigma_tof", &self.sigma_tof, self.lor_dep_sigma, n_lors)?;
        if self.sigma_tof.iter().any(|&s| !(s > 0.0) || !s.is_finite()) {
            return Err(ProjectorError::Argument(
                "sigma_tof entries must be strictly positive and finite".to_string(),
            ));
        }
        check_lor_dependent_array(
            "tofcenter_offset",
            &self.tofcenter_offset,
            self.lor_dep_offset,
            n_lors,
        )?;
        if self.tofcenter_offset.iter().any(|o| !o.is_finite()) {
            return Err(ProjectorError::Argument(
                "tofcenter_offset entries must be finite".to_string(),
            ));
        }
        match &self.bin_spec {
            TofBinSpec::Sinogram { n_tofbins } => {
                if *n_tofbins == 0 || n_tofbins % 2 == 0 {
                    return Err(ProjectorError::Argument(format!(
                        "n_tofbins must be an odd positive integer, got {n_tofbins}"
                    )));
                }
            }
            TofBinSpec::Listmode { tof_bin } => {
                if tof_bin.len() != n_lors {
                    return Err(ProjectorError::Argument(format!(
                        "tof_bin has length {} but nLORs is {n_lors}",
                        tof_bin.len()
                    )));
                }
            }
        }
        Ok(())
    }

    #[inline]
    pub fn sigma(&self, k: usize) -> Length {
        if self.lor_dep_sigma { self.sigma_tof[k] } else { self.sigma_tof[0] }
    }

    #[inline]
    pub fn center_offset(&self, k: usize) -> Length {
        if self.lor_dep_offset { self.tofcenter_offset[k] } else { self.tofcenter_offset[0] }
    }

    pub fn half_bin_range(&self) -> Option<i32> {
        match &self.bin_spec {
            TofBinSpec::Sinogram { n_tofbins } => Some((*n_tofbins as i32) / 2),
            TofBinSpec::Listmode { .. } => None,
        }
    }
}

fn check_lor_dependent_array(
    name: &str,
    values: &[Length],
    lor_dependent: bool,
    n_lors: usize,
) -> Result<()> {
    let expected = if lor_dependent { n_lors } else { 1 };
    if values.len() != expected {
        return Err(ProjectorError::Argument(format!(
            "{name} has length {} but lor_dep_{name}={lor_dependent} expects length {expected} \
             (this length/flag combination is not validated by the native parallelproj boundary; \
             this adapter validates it before any kernel launch)",
            values.len()
        )));
    }
    Ok(())
}

/// Centre of TOF bin `b`, in LOR-distance units relative to the LOR
/// midpoint, for LOR `k`.
#[inline]
pub fn bin_center(cfg: &TofConfig, k: usize, b: i32) -> Length {
    (b as Length) * cfg.tofbin_width + cfg.center_offset(k)
}

/// `W(t, b, k)`: area of a unit Gaussian centred at `t` under bin `b`'s
/// span `[t_b - w/2, t_b + w/2]`, via `erf` differences. Returns `0.0`
/// once `|t - t_b|` exceeds the truncation radius.
#[inline]
pub fn tof_weight(cfg: &TofConfig, t: Length, b: i32, k: usize) -> Length {
    let sigma = cfg.sigma(k);
    let w = cfg.tofbin_width;
    let t_b = bin_center(cfg, k, b);
    let dt = t - t_b;
    if dt.abs() > cfg.n_sigmas * sigma + w / 2.0 {
        return 0.0;
    }
    let denom = sigma * SQRT2;
    0.5 * (erf((dt + w / 2.0) / denom) - erf((dt - w / 2.0) / denom))
}

/// Contiguous range of TOF bin indices whose span falls within
/// `n_sigmas` of `t`, clipped to the sinogram's representable bin set
/// when one is configured. `(lo, hi)` inclusive; empty when `lo > hi`.
pub fn bin_range_near(cfg: &TofConfig, t: Length, k: usize) -> (i32, i32) {
    let sigma = cfg.sigma(k);
    let half_width = cfg.n_sigmas * sigma + cfg.tofbin_width / 2.0;
    let offset = cfg.center_offset(k);
    let lo_t = t - half_width - offset;
    let hi_t = t + half_width - offset;
    let mut lo = (lo_t / cfg.tofbin_width).floor() as i32;
    let mut hi = (hi_t / cfg.tofbin_width).ceil() as i32;
    if let Some(half_n) = cfg.half_bin_range() {
        lo = lo.max(-half_n);
        hi = hi.min(half_n);
    }
    (lo, hi)
}
