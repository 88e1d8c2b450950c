//! Compute backends for GPU image processing.
//!
//! Provides CPU (rayon) and wgpu backends with automatic selection.

mod gpu_primitives;
mod detect;
mod cpu_backend;

#[cfg(feature = "wgpu")]
mod wgpu_backend;

pub use gpu_primitives::{AsAny, ImageHandle};
pub use detect::{detect_backends, select_best_backend, describe_backends, BackendInfo};
pub use cpu_backend::{CpuBackend, CpuImage};

#[cfg(feature = "wgpu")]
pub use wgpu_backend::WgpuBackend;

#[cfg(not(feature = "wgpu"))]
use crate::ComputeError;
use crate::ComputeResult;


/// Available compute backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Auto-select best available (wgpu > CPU).
    #[default]
    Auto,
    /// CPU backend using rayon for parallelization.
    Cpu,
    /// wgpu backend (Vulkan/Metal/DX12).
    Wgpu,
}

impl Backend {
    /// Check if this backend is available on current system.
    pub fn is_available(&self) -> bool {
        match self {
            Self::Auto => true,
            Self::Cpu => true,
            #[cfg(feature = "wgpu")]
            Self::Wgpu => WgpuBackend::is_available(),
            #[cfg(not(feature = "wgpu"))]
            Self::Wgpu => false,
        }
    }
}

/// A filter operation dispatchable to a [`ProcessingBackend`], named so a
/// backend can recognize and accelerate an op it has a native
/// implementation for without this crate depending on `vfx-ops`'s filter
/// types. Variants are added as filters grow an on-device path; a filter
/// with no variant here simply has no [`ProcessingBackend::dispatch`]
/// route and always runs through its CPU `process()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterOp {
    /// Radial vignette: darkens pixels by a smoothstep falloff from
    /// `center`, reaching full `strength` at `radius`.
    Vignette { center: (f32, f32), radius: f32, strength: f32 },
}

/// Trait for processing backends that move pixels on and off a device.
pub trait ProcessingBackend: Send + Sync {
    /// Backend name.
    fn name(&self) -> &'static str;

    /// Available memory in bytes.
    fn available_memory(&self) -> u64;

    /// Upload image to GPU memory.
    fn upload(&self, data: &[f32], width: u32, height: u32, channels: u32) -> ComputeResult<Box<dyn ImageHandle>>;

    /// Download image from GPU.
    fn download(&self, handle: &dyn ImageHandle) -> ComputeResult<Vec<f32>>;

    /// Attempts an on-device implementation of `op`, reading `src` and
    /// writing `dst` (both already uploaded to this backend). Returns
    /// `Ok(false)` if this backend has no native implementation of `op`,
    /// in which case the caller falls back to the filter's CPU `process`.
    /// The CPU backend never overrides this: CPU filters already run their
    /// own math directly and have no separate on-device path.
    fn dispatch(&self, _op: FilterOp, _dst: &mut dyn ImageHandle, _src: &dyn ImageHandle) -> ComputeResult<bool> {
        Ok(false)
    }
}

/// Create a backend instance.
pub fn create_backend(backend: Backend) -> ComputeResult<Box<dyn ProcessingBackend>> {
    match backend {
        Backend::Auto => {
            let best = select_best_backend();
            create_backend(best)
        }
        Backend::Cpu => Ok(Box::new(CpuBackend::new())),
        Backend::Wgpu => {
            #[cfg(feature = "wgpu")]
            {
                Ok(Box::new(WgpuBackend::new()?))
            }
            #[cfg(not(feature = "wgpu"))]
            {
                Err(ComputeError::BackendNotAvailable(
                    "wgpu feature not enabled".to_string()
                ))
            }
        }
    }
}
