//! Process-wide backend state, wrapped in one object instead of the
//! module-level globals the native library historically used.
//!
//! A [`ProjectorContext`] resolves the CUDA native library once (or not
//! at all, if none is configured) and caches the visible device count;
//! threads share it behind a read-only reference. CPU dispatch needs no
//! native handle at all in this reimplementation (see [`crate::ffi`]).

use std::env;

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::{ProjectorError, Result};
use crate::ffi::NativeCudaLib;

/// Environment variable naming the CUDA native library, mirroring the
/// upstream project's `PARALLELPROJ_CUDA_LIB`. When unset, a context
/// built via [`ProjectorContext::from_env`] runs CPU-only: that is not a
/// configuration error, since CPU-only operation is always available.
pub const CUDA_LIB_ENV: &str = "PETPROJ_CUDA_LIB";

#[cfg(target_os = "linux")]
const DEFAULT_CUDA_LIB_NAME: &str = "libpetproj_cuda.so";
#[cfg(target_os = "macos")]
const DEFAULT_CUDA_LIB_NAME: &str = "libpetproj_cuda.dylib";
#[cfg(target_os = "windows")]
const DEFAULT_CUDA_LIB_NAME: &str = "petproj_cuda.dll";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const DEFAULT_CUDA_LIB_NAME: &str = "libpetproj_cuda.so";

pub struct ProjectorContext {
    cuda: Option<NativeCudaLib>,
    num_visible_cuda_devices: i32,
    pool: rayon::ThreadPool,
}

impl ProjectorContext {
    /// Builds a CPU-only context: no attempt is made to locate a CUDA
    /// library. Always succeeds.
    pub fn cpu_only(num_threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| ProjectorError::Configuration(format!("failed to build thread pool: {e}")))?;
        Ok(Self { cuda: None, num_visible_cuda_devices: 0, pool })
    }

    /// Builds a context the way the native library's module
    /// initialization does: an explicit `PETPROJ_CUDA_LIB` is
    /// authoritative and a failure to load it is a hard
    /// [`ProjectorError::Configuration`]; when unset, the system loader
    /// path is probed for the platform-default name, and failure there
    /// just means "no CUDA visible", not an error.
    pub fn from_env() -> Result<Self> {
        let num_threads = num_cpus::get();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| ProjectorError::Configuration(format!("failed to build thread pool: {e}")))?;

        let cuda = match env::var(CUDA_LIB_ENV) {
            Ok(path) => Some(NativeCudaLib::load(&path)?),
            Err(_) => {
                debug!(
                    lib = DEFAULT_CUDA_LIB_NAME,
                    "{CUDA_LIB_ENV} not set, probing system loader path"
                );
                match NativeCudaLib::load(DEFAULT_CUDA_LIB_NAME) {
                    Ok(lib) => Some(lib),
                    Err(e) => {
                        warn!("no CUDA backend available, falling back to CPU-only: {e}");
                        None
                    }
                }
            }
        };

        let num_visible_cuda_devices = match &cuda {
            Some(lib) => unsafe { (lib.get_cuda_device_count)() },
            None => 0,
        };

        Ok(Self { cuda, num_visible_cuda_devices, pool })
    }

    pub fn cuda(&self) -> Option<&NativeCudaLib> {
        self.cuda.as_ref()
    }

    pub fn num_visible_cuda_devices(&self) -> i32 {
        self.num_visible_cuda_devices
    }

    pub fn pool(&self) -> &rayon::ThreadPool {
        &self.pool
    }
}

/// Process-wide default context, built lazily on first use and shared
/// read-only across threads, mirroring the module-level singletons the
/// native library establishes at load time.
static DEFAULT_CONTEXT: OnceCell<ProjectorContext> = OnceCell::new();

pub fn default_context() -> &'static ProjectorContext {
    DEFAULT_CONTEXT.get_or_init(|| {
        ProjectorContext::from_env().unwrap_or_else(|e| {
            warn!("falling back to a CPU-only default context: {e}");
            ProjectorContext::cpu_only(num_cpus::get())
                .expect("CPU-only context construction cannot fail")
        })
    })
}
