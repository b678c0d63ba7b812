//! GPU dispatch: the same six operations as [`super::cpu`], but routed
//! through a loaded [`crate::ffi::NativeCudaLib`] instead of `rayon`.
//!
//! The image lives on every visible device for the duration of the call
//! ([`crate::multigpu::DeviceImageReplicas`]); the LOR batch is split into
//! sequential chunks via [`super::chunk_ranges`] to bound peak host-side
//! staging memory, the same role `calc_chunks` plays upstream. Each chunk
//! is one native call; the native library is responsible for spreading a
//! chunk's LORs across its visible devices internally.

use ndarray::{Array1, Array2, Array3};

use crate::context::ProjectorContext;
use crate::error::{ProjectorError, Result};
use crate::image::ImageMeta;
use crate::lor::LorBatch;
use crate::gpu_options::GpuOptions;
use crate::multigpu::DeviceImageReplicas;
use crate::tof::TofConfig;
use crate::Length;

use super::chunk_ranges;

fn dims_i32(meta: &ImageMeta) -> [i32; 3] {
    [meta.dim[0] as i32, meta.dim[1] as i32, meta.dim[2] as i32]
}

fn lor_slices<'a>(lors: &'a LorBatch, lo: usize, hi: usize) -> (&'a [Length], &'a [Length]) {
    let xstart = lors.xstart.as_slice().expect("contiguous by construction");
    let xend = lors.xend.as_slice().expect("contiguous by construction");
    (&xstart[lo * 3..hi * 3], &xend[lo * 3..hi * 3])
}

pub fn forward_nontof(
    ctx: &ProjectorContext,
    img: &Array3<Length>,
    meta: &ImageMeta,
    lors: &LorBatch,
    opts: GpuOptions,
) -> Result<Array1<Length>> {
    let lib = ctx
        .cuda()
        .ok_or_else(|| ProjectorError::Device("no CUDA backend loaded".to_string()))?;
    let flat = img.as_slice().expect("contiguous by construction");
    let replicas = DeviceImageReplicas::upload(ctx, flat)?;
    let dims = dims_i32(meta);
    let mut out = vec![0.0f32; lors.n_lors()];
    for (lo, hi) in chunk_ranges(lors.n_lors(), opts.num_chunks) {
        let (xstart, xend) = lor_slices(lors, lo, hi);
        unsafe {
            (lib.joseph3d_fwd_cuda)(
                xstart.as_ptr(),
                xend.as_ptr(),
                replicas.device_ptrs(),
                meta.img_origin.as_ptr(),
                meta.voxsize.as_ptr(),
                out[lo..hi].as_mut_ptr(),
                (hi - lo) as i64,
                dims.as_ptr(),
                opts.threads_per_block,
            );
        }
    }
    Ok(Array1::from_vec(out))
}

pub fn back_nontof(
    ctx: &ProjectorContext,
    meta: &ImageMeta,
    lors: &LorBatch,
    payload: &[Length],
    opts: GpuOptions,
) -> Result<Array3<Length>> {
    let lib = ctx
        .cuda()
        .ok_or_else(|| ProjectorError::Device("no CUDA backend loaded".to_string()))?;
    let mut host = vec![0.0f32; meta.n_voxels()];
    let replicas = DeviceImageReplicas::upload(ctx, &host)?;
    let dims = dims_i32(meta);
    for (lo, hi) in chunk_ranges(lors.n_lors(), opts.num_chunks) {
        let (xstart, xend) = lor_slices(lors, lo, hi);
        let mut p = payload[lo..hi].to_vec();
        unsafe {
            (lib.joseph3d_back_cuda)(
                xstart.as_ptr(),
                xend.as_ptr(),
                replicas.device_ptrs(),
                meta.img_origin.as_ptr(),
                meta.voxsize.as_ptr(),
                p.as_mut_ptr(),
                (hi - lo) as i64,
                dims.as_ptr(),
                opts.threads_per_block,
            );
        }
    }
    replicas.reduce_to_host(&mut host)?;
    let [n0, n1, n2] = meta.dim;
    Ok(Array3::from_shape_vec((n0, n1, n2), host).expect("row-major by construction"))
}

pub fn forward_tof_sino(
    ctx: &ProjectorContext,
    img: &Array3<Length>,
    meta: &ImageMeta,
    lors: &LorBatch,
    cfg: &TofConfig,
    opts: GpuOptions,
) -> Result<Array2<Length>> {
    let lib = ctx
        .cuda()
        .ok_or_else(|| ProjectorError::Device("no CUDA backend loaded".to_string()))?;
    let n_tofbins = cfg.half_bin_range().expect("sinogram TOF config") * 2 + 1;
    let flat = img.as_slice().expect("contiguous by construction");
    let replicas = DeviceImageReplicas::upload(ctx, flat)?;
    let dims = dims_i32(meta);
    let mut out = vec![0.0f32; lors.n_lors() * n_tofbins as usize];
    for (lo, hi) in chunk_ranges(lors.n_lors(), opts.num_chunks) {
        let (xstart, xend) = lor_slices(lors, lo, hi);
        let out_chunk = &mut out[lo * n_tofbins as usize..hi * n_tofbins as usize];
        unsafe {
            (lib.joseph3d_fwd_tof_sino_cuda)(
                xstart.as_ptr(),
                xend.as_ptr(),
                replicas.device_ptrs(),
                meta.img_origin.as_ptr(),
                meta.voxsize.as_ptr(),
                out_chunk.as_mut_ptr(),
                (hi - lo) as i64,
                dims.as_ptr(),
                cfg.tofbin_width,
                cfg.sigma_tof.as_ptr(),
                cfg.tofcenter_offset.as_ptr(),
                cfg.n_sigmas,
                n_tofbins as i16,
                cfg.lor_dep_sigma as u8,
                cfg.lor_dep_offset as u8,
                opts.threads_per_block,
            );
        }
    }
    Array2::from_shape_vec((lors.n_lors(), n_tofbins as usize), out)
        .map_err(|e| ProjectorError::Device(format!("malformed sinogram buffer: {e}")))
}

pub fn back_tof_sino(
    ctx: &ProjectorContext,
    meta: &ImageMeta,
    lors: &LorBatch,
    cfg: &TofConfig,
    sino: &Array2<Length>,
    opts: GpuOptions,
) -> Result<Array3<Length>> {
    let lib = ctx
        .cuda()
        .ok_or_else(|| ProjectorError::Device("no CUDA backend loaded".to_string()))?;
    let n_tofbins = cfg.half_bin_range().expect("sinogram TOF config") * 2 + 1;
    let mut host = vec![0.0f32; meta.n_voxels()];
    let replicas = DeviceImageReplicas::upload(ctx, &host)?;
    let dims = dims_i32(meta);
    let flat_sino = sino.as_slice().expect("contiguous by construction");
    for (lo, hi) in chunk_ranges(lors.n_lors(), opts.num_chunks) {
        let (xstart, xend) = lor_slices(lors, lo, hi);
        let mut p = flat_sino[lo * n_tofbins as usize..hi * n_tofbins as usize].to_vec();
        unsafe {
            (lib.joseph3d_back_tof_sino_cuda)(
                xstart.as_ptr(),
                xend.as_ptr(),
                replicas.device_ptrs(),
                meta.img_origin.as_ptr(),
                meta.voxsize.as_ptr(),
                p.as_mut_ptr(),
                (hi - lo) as i64,
                dims.as_ptr(),
                cfg.tofbin_width,
                cfg.sigma_tof.as_ptr(),
                cfg.tofcenter_offset.as_ptr(),
                cfg.n_sigmas,
                n_tofbins as i16,
                cfg.lor_dep_sigma as u8,
                cfg.lor_dep_offset as u8,
                opts.threads_per_block,
            );
        }
    }
    replicas.reduce_to_host(&mut host)?;
    let [n0, n1, n2] = meta.dim;
    Ok(Array3::from_shape_vec((n0, n1, n2), host).expect("row-major by construction"))
}

pub fn forward_tof_lm(
    ctx: &ProjectorContext,
    img: &Array3<Length>,
    meta: &ImageMeta,
    lors: &LorBatch,
    cfg: &TofConfig,
    tof_bin: &[i16],
    opts: GpuOptions,
) -> Result<Array1<Length>> {
    let lib = ctx
        .cuda()
        .ok_or_else(|| ProjectorError::Device("no CUDA backend loaded".to_string()))?;
    let flat = img.as_slice().expect("contiguous by construction");
    let replicas = DeviceImageReplicas::upload(ctx, flat)?;
    let dims = dims_i32(meta);
    let mut out = vec![0.0f32; lors.n_lors()];
    for (lo, hi) in chunk_ranges(lors.n_lors(), opts.num_chunks) {
        let (xstart, xend) = lor_slices(lors, lo, hi);
        unsafe {
            (lib.joseph3d_fwd_tof_lm_cuda)(
                xstart.as_ptr(),
                xend.as_ptr(),
                replicas.device_ptrs(),
                meta.img_origin.as_ptr(),
                meta.voxsize.as_ptr(),
                out[lo..hi].as_mut_ptr(),
                (hi - lo) as i64,
                dims.as_ptr(),
                cfg.tofbin_width,
                cfg.sigma_tof.as_ptr(),
                cfg.tofcenter_offset.as_ptr(),
                cfg.n_sigmas,
                tof_bin[lo..hi].as_ptr(),
                cfg.lor_dep_sigma as u8,
                cfg.lor_dep_offset as u8,
                opts.threads_per_block,
            );
        }
    }
    Ok(Array1::from_vec(out))
}

pub fn back_tof_lm(
    ctx: &ProjectorContext,
    meta: &ImageMeta,
    lors: &LorBatch,
    cfg: &TofConfig,
    tof_bin: &[i16],
    payload: &[Length],
    opts: GpuOptions,
) -> Result<Array3<Length>> {
    let lib = ctx
        .cuda()
        .ok_or_else(|| ProjectorError::Device("no CUDA backend loaded".to_string()))?;
    let mut host = vec![0.0f32; meta.n_voxels()];
    let replicas = DeviceImageReplicas::upload(ctx, &host)?;
    let dims = dims_i32(meta);
    for (lo, hi) in chunk_ranges(lors.n_lors(), opts.num_chunks) {
        let (xstart, xend) = lor_slices(lors, lo, hi);
        let mut p = payload[lo..hi].to_vec();
        unsafe {
            (lib.joseph3d_back_tof_lm_cuda)(
                xstart.as_ptr(),
                xend.as_ptr(),
                replicas.device_ptrs(),
                meta.img_origin.as_ptr(),
                meta.voxsize.as_ptr(),
                p.as_mut_ptr(),
                (hi - lo) as i64,
                dims.as_ptr(),
                cfg.tofbin_width,
                cfg.sigma_tof.as_ptr(),
                cfg.tofcenter_offset.as_ptr(),
                cfg.n_sigmas,
                tof_bin[lo..hi].as_ptr(),
                cfg.lor_dep_sigma as u8,
                cfg.lor_dep_offset as u8,
                opts.threads_per_block,
            );
        }
    }
    replicas.reduce_to_host(&mut host)?;
    let [n0, n1, n2] = meta.dim;
    Ok(Array3::from_shape_vec((n0, n1, n2), host).expect("row-major by construction"))
}
