//! CPU backend: images live as plain `Vec<f32>` buffers and move on/off
//! "device" with a straight copy, parallelized over rows with rayon.

use rayon::prelude::*;

use super::ProcessingBackend;
use super::gpu_primitives::{AsAny, ImageHandle};
use crate::{ComputeError, ComputeResult};

/// CPU image handle - data stored in RAM.
pub struct CpuImage {
    data: Vec<f32>,
    width: u32,
    height: u32,
    channels: u32,
}

impl CpuImage {
    pub fn new(data: Vec<f32>, width: u32, height: u32, channels: u32) -> Self {
        Self { data, width, height, channels }
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

impl AsAny for CpuImage {
    fn as_any(&self) -> &dyn std::any::Any { self }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
}

impl ImageHandle for CpuImage {
    fn dimensions(&self) -> (u32, u32, u32) {
        (self.width, self.height, self.channels)
    }
}

/// CPU backend wrapper. Holds nothing but the memory reading needed for
/// `available_memory`; upload/download are plain parallel copies.
pub struct CpuBackend {
    available_memory: u64,
}

impl CpuBackend {
    pub fn new() -> Self {
        let available = sys_info::mem_info()
            .map(|m| m.avail * 1024)
            .unwrap_or(4 * 1024 * 1024 * 1024);
        Self { available_memory: available }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "CPU"
    }

    fn available_memory(&self) -> u64 {
        self.available_memory
    }

    fn upload(&self, data: &[f32], width: u32, height: u32, channels: u32) -> ComputeResult<Box<dyn ImageHandle>> {
        let copied: Vec<f32> = data.par_iter().copied().collect();
        Ok(Box::new(CpuImage::new(copied, width, height, channels)))
    }

    fn download(&self, handle: &dyn ImageHandle) -> ComputeResult<Vec<f32>> {
        let cpu_handle = handle.as_any().downcast_ref::<CpuImage>()
            .ok_or_else(|| ComputeError::OperationFailed("Invalid handle type".into()))?;
        Ok(cpu_handle.data.par_iter().copied().collect())
    }
}
