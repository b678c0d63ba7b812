//! C ABI surface of the native CUDA backend.
//!
//! The CPU backend in this crate is realized natively (the `rayon`
//! dispatch in [`crate::dispatch::cpu`] stands in for an external OpenMP
//! shared object), but the GPU backend is modeled as a genuine dynamic
//! library boundary: multi-GPU orchestration, device memory replication
//! and device-side kernel launches are exactly the kind of thing that
//! lives in a vendor-toolchain-compiled `.so`/`.dll` next to a Rust
//! driver crate, so the function signatures below are declared as raw
//! `extern "C"` pointers loaded at runtime via `libloading`, the same
//! shape as the upstream library's `ctypes` bindings.
//!
//! All arrays are row-major, contiguous, single precision; `img_dim` is
//! three `i32`s. None of these entry points return a status code — by
//! contract, their preconditions are validated by the adapter
//! (`crate::adapter`) before the call is made.

use libloading::{Library, Symbol};

use crate::error::{ProjectorError, Result};

pub type JosephFwdCudaFn = unsafe extern "C" fn(
    h_xstart: *const f32,
    h_xend: *const f32,
    d_img: *mut *mut f32,
    h_img_origin: *const f32,
    h_voxsize: *const f32,
    h_p: *mut f32,
    nlors: i64,
    h_img_dim: *const i32,
    threadsperblock: i32,
);

pub type JosephBackCudaFn = JosephFwdCudaFn;

pub type JosephFwdTofSinoCudaFn = unsafe extern "C" fn(
    h_xstart: *const f32,
    h_xend: *const f32,
    d_img: *mut *mut f32,
    h_img_origin: *const f32,
    h_voxsize: *const f32,
    h_p: *mut f32,
    nlors: i64,
    h_img_dim: *const i32,
    tofbin_width: f32,
    sigma_tof: *const f32,
    tofcenter_offset: *const f32,
    n_sigmas: f32,
    n_tofbins: i16,
    lor_dep_sigma: u8,
    lor_dep_offset: u8,
    threadsperblock: i32,
);

pub type JosephBackTofSinoCudaFn = JosephFwdTofSinoCudaFn;

pub type JosephFwdTofLmCudaFn = unsafe extern "C" fn(
    h_xstart: *const f32,
    h_xend: *const f32,
    d_img: *mut *mut f32,
    h_img_origin: *const f32,
    h_voxsize: *const f32,
    h_p: *mut f32,
    nlors: i64,
    h_img_dim: *const i32,
    tofbin_width: f32,
    sigma_tof: *const f32,
    tofcenter_offset: *const f32,
    n_sigmas: f32,
    tof_bin: *const i16,
    lor_dep_sigma: u8,
    lor_dep_offset: u8,
    threadsperblock: i32,
);

pub type JosephBackTofLmCudaFn = JosephFwdTofLmCudaFn;

pub type GetCudaDeviceCountFn = unsafe extern "C" fn() -> i32;
pub type CopyFloatArrayToAllDevicesFn = unsafe extern "C" fn(h_array: *const f32, n: i64) -> *mut *mut f32;
pub type FreeFloatArrayOnAllDevicesFn = unsafe extern "C" fn(d_array: *mut *mut f32);
pub type SumFloatArraysOnFirstDeviceFn = unsafe extern "C" fn(d_array: *mut *mut f32, n: i64);
pub type GetFloatArrayFromDeviceFn =
    unsafe extern "C" fn(d_array: *mut *mut f32, n: i64, i_dev: i32, h_array: *mut f32);

/// A loaded native CUDA shared object, with every symbol this crate
/// needs resolved up front (fail fast at load time rather than at the
/// first kernel launch).
pub struct NativeCudaLib {
    _lib: Library,
    pub joseph3d_fwd_cuda: JosephFwdCudaFn,
    pub joseph3d_back_cuda: JosephBackCudaFn,
    pub joseph3d_fwd_tof_sino_cuda: JosephFwdTofSinoCudaFn,
    pub joseph3d_back_tof_sino_cuda: JosephBackTofSinoCudaFn,
    pub joseph3d_fwd_tof_lm_cuda: JosephFwdTofLmCudaFn,
    pub joseph3d_back_tof_lm_cuda: JosephBackTofLmCudaFn,
    pub get_cuda_device_count: GetCudaDeviceCountFn,
    pub copy_float_array_to_all_devices: CopyFloatArrayToAllDevicesFn,
    pub free_float_array_on_all_devices: FreeFloatArrayOnAllDevicesFn,
    pub sum_float_arrays_on_first_device: SumFloatArraysOnFirstDeviceFn,
    pub get_float_array_from_device: GetFloatArrayFromDeviceFn,
}

macro_rules! resolve {
    ($lib:expr, $name:literal) => {{
        let sym: Symbol<'_, _> = unsafe {
            $lib.get($name)
                .map_err(|e| ProjectorError::Configuration(format!("missing symbol {}: {e}", $name)))?
        };
        *sym
    }};
}

impl NativeCudaLib {
    /// Loads `path` and resolves every required symbol. A missing
    /// library or a missing symbol is a [`ProjectorError::Configuration`],
    /// surfaced once at context construction rather than at the first
    /// projection call.
    pub fn load(path: &str) -> Result<Self> {
        let lib = unsafe {
            Library::new(path).map_err(|e| {
                ProjectorError::Configuration(format!("cannot load CUDA library {path}: {e}"))
            })?
        };

        let joseph3d_fwd_cuda = resolve!(lib, b"joseph3d_fwd_cuda\0");
        let joseph3d_back_cuda = resolve!(lib, b"joseph3d_back_cuda\0");
        let joseph3d_fwd_tof_sino_cuda = resolve!(lib, b"joseph3d_fwd_tof_sino_cuda\0");
        let joseph3d_back_tof_sino_cuda = resolve!(lib, b"joseph3d_back_tof_sino_cuda\0");
        let joseph3d_fwd_tof_lm_cuda = resolve!(lib, b"joseph3d_fwd_tof_lm_cuda\0");
        let joseph3d_back_tof_lm_cuda = resolve!(lib, b"joseph3d_back_tof_lm_cuda\0");
        let get_cuda_device_count = resolve!(lib, b"get_cuda_device_count\0");
        let copy_float_array_to_all_devices = resolve!(lib, b"copy_float_array_to_all_devices\0");
        let free_float_array_on_all_devices = resolve!(lib, b"free_float_array_on_all_devices\0");
        let sum_float_arrays_on_first_device = resolve!(lib, b"sum_float_arrays_on_first_device\0");
        let get_float_array_from_device = resolve!(lib, b"get_float_array_from_device\0");

        Ok(Self {
            _lib: lib,
            joseph3d_fwd_cuda,
            joseph3d_back_cuda,
            joseph3d_fwd_tof_sino_cuda,
            joseph3d_back_tof_sino_cuda,
            joseph3d_fwd_tof_lm_cuda,
            joseph3d_back_tof_lm_cuda,
            get_cuda_device_count,
            copy_float_array_to_all_devices,
            free_float_array_on_all_devices,
            sum_float_arrays_on_first_device,
            get_float_array_from_device,
        })
    }
}
