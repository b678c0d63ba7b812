//! Multi-GPU image replication and reduction.
//!
//! When the caller hands the adapter a plain host image and at least one
//! CUDA device is visible, the image is copied once per visible device;
//! each device projects its assigned chunk of LORs. For back projection,
//! each device accumulates into its own zero-initialized replica and the
//! replicas are summed onto device 0 before the result is copied back to
//! the host. All device allocations are scoped to the call: acquired at
//! entry, released on every exit path via `Drop`.

use crate::context::ProjectorContext;
use crate::error::{ProjectorError, Result};
use crate::ffi::NativeCudaLib;
use crate::Length;

/// A host-allocated image replicated across every visible CUDA device.
/// `Drop` releases every device allocation, including on an early return
/// from a failed kernel launch further down the call stack.
pub struct DeviceImageReplicas<'ctx> {
    lib: &'ctx NativeCudaLib,
    ptrs: *mut *mut f32,
    n_voxels: i64,
}

impl<'ctx> DeviceImageReplicas<'ctx> {
    pub fn upload(ctx: &'ctx ProjectorContext, host: &[Length]) -> Result<Self> {
        let lib = ctx
            .cuda()
            .ok_or_else(|| ProjectorError::Device("no CUDA backend loaded".to_string()))?;
        let n_voxels = host.len() as i64;
        let ptrs = unsafe { (lib.copy_float_array_to_all_devices)(host.as_ptr(), n_voxels) };
        if ptrs.is_null() {
            return Err(ProjectorError::Device(
                "copy_float_array_to_all_devices returned a null replica table".to_string(),
            ));
        }
        Ok(Self { lib, ptrs, n_voxels })
    }

    pub fn device_ptrs(&self) -> *mut *mut f32 {
        self.ptrs
    }

    /// Sums every replica onto device 0 and copies the result back to
    /// `host`. Used by the back-projection path once every device has
    /// finished accumulating into its own replica.
    pub fn reduce_to_host(&self, host: &mut [Length]) -> Result<()> {
        if host.len() as i64 != self.n_voxels {
            return Err(ProjectorError::Argument(format!(
                "host buffer has {} elements, expected {}",
                host.len(),
                self.n_voxels
            )));
        }
        unsafe {
            (self.lib.sum_float_arrays_on_first_device)(self.ptrs, self.n_voxels);
            (self.lib.get_float_array_from_device)(self.ptrs, self.n_voxels, 0, host.as_mut_ptr());
        }
        Ok(())
    }
}

impl Drop for DeviceImageReplicas<'_> {
    fn drop(&mut self) {
        unsafe { (self.lib.free_float_array_on_all_devices)(self.ptrs) };
    }
}

/// A CPU stand-in for "replicate across `n_devices` and reduce", used to
/// test the multi-GPU parity property (§8, "Multi-GPU parity") without
/// requiring physical CUDA hardware: splitting the same LOR batch into
/// `n_devices` chunks, accumulating each chunk into its own image and
/// summing at the end must agree with accumulating the whole batch into
/// a single image, to within summation-order floating-point noise.
pub fn simulate_replica_reduction<F>(n_devices: usize, chunks: Vec<(usize, usize)>, mut accumulate_chunk: F) -> ndarray::Array3<Length>
where
    F: FnMut(usize, usize, usize) -> ndarray::Array3<Length>,
{
    let mut replicas: Vec<Option<ndarray::Array3<Length>>> = vec![None; n_devices.max(1)];
    for (dev, &(lo, hi)) in chunks.iter().enumerate() {
        let dev = dev % n_devices.max(1);
        let partial = accumulate_chunk(dev, lo, hi);
        replicas[dev] = Some(match replicas[dev].take() {
            Some(acc) => acc + partial,
            None => partial,
        });
    }
    replicas
        .into_iter()
        .flatten()
        .reduce(|a, b| a + b)
        .expect("at least one chunk")
}
