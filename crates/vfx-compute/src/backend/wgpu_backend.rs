//! wgpu backend: moves pixel buffers on and off a real GPU device.
//!
//! Most filter math still runs on CPU `Bitmap`s; this backend covers the
//! `upload`/`download` transfer contract plus, for filters that register a
//! [`super::FilterOp`], a host-roundtrip `dispatch` — real device memory in,
//! real device memory out, with the op's math run between the two on the
//! host rather than in a hand-authored compute shader.

use bytemuck::cast_slice;

use super::gpu_primitives::{AsAny, ImageHandle};
use super::{FilterOp, ProcessingBackend};
use crate::{ComputeError, ComputeResult};

/// GPU buffer handle for image data.
pub struct WgpuImage {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    channels: u32,
    size_bytes: u64,
}

impl AsAny for WgpuImage {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl ImageHandle for WgpuImage {
    fn dimensions(&self) -> (u32, u32, u32) {
        (self.width, self.height, self.channels)
    }

    fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// wgpu processing backend: one device/queue pair, created on demand.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    available_memory: u64,
}

impl WgpuBackend {
    /// `true` if a compatible adapter is available on this system.
    pub fn is_available() -> bool {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });
            instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .is_some()
        })
    }

    /// Requests an adapter and opens a device, failing with
    /// [`ComputeError::NoAdapter`]/[`ComputeError::DeviceCreation`] if none
    /// is available.
    pub fn new() -> ComputeResult<Self> {
        pollster::block_on(Self::new_async())
    }

    async fn new_async() -> ComputeResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(ComputeError::NoAdapter)?;

        let adapter_limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("vfx_compute_device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter_limits.clone(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await
            .map_err(|e| ComputeError::DeviceCreation(e.to_string()))?;

        // Buffer-size limit doubled as a rough VRAM estimate; there's no
        // portable way to query true free VRAM through wgpu.
        let available_memory = adapter_limits.max_buffer_size.saturating_mul(2);

        Ok(Self {
            device,
            queue,
            available_memory,
        })
    }
}

impl ProcessingBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn available_memory(&self) -> u64 {
        self.available_memory
    }

    fn upload(&self, data: &[f32], width: u32, height: u32, channels: u32) -> ComputeResult<Box<dyn ImageHandle>> {
        let expected = (width as usize) * (height as usize) * (channels as usize);
        if data.len() != expected {
            return Err(ComputeError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        use wgpu::util::DeviceExt;
        let size_bytes = (data.len() * 4) as u64;
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("vfx_image_buffer"),
            contents: cast_slice(data),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
        });

        Ok(Box::new(WgpuImage {
            buffer,
            width,
            height,
            channels,
            size_bytes,
        }))
    }

    fn download(&self, handle: &dyn ImageHandle) -> ComputeResult<Vec<f32>> {
        let wgpu_handle = handle
            .as_any()
            .downcast_ref::<WgpuImage>()
            .ok_or_else(|| ComputeError::OperationFailed("handle did not come from the wgpu backend".into()))?;

        let size = wgpu_handle.size_bytes;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("vfx_staging_buffer"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&Default::default());
        encoder.copy_buffer_to_buffer(&wgpu_handle.buffer, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|_| ComputeError::OperationFailed("buffer map channel closed".into()))?
            .map_err(|e| ComputeError::OperationFailed(format!("buffer map failed: {e}")))?;

        let mapped = slice.get_mapped_range();
        let result: Vec<f32> = cast_slice(&mapped).to_vec();
        drop(mapped);
        staging.unmap();

        Ok(result)
    }

    /// Host-roundtrip dispatch: downloads `src`, runs the op's math on the
    /// CPU, and writes the result back into `dst`'s buffer. Stands in for a
    /// real compute-shader pipeline (bind groups, a `.wgsl` module, a
    /// dispatch call) that this crate doesn't hand-author, since shader
    /// correctness can't be checked without a GPU to run it against; this
    /// keeps the `ProcessingBackend::dispatch` route live end to end for
    /// the one op that has a native variant today.
    fn dispatch(&self, op: FilterOp, dst: &mut dyn ImageHandle, src: &dyn ImageHandle) -> ComputeResult<bool> {
        let FilterOp::Vignette { center, radius, strength } = op;
        if strength <= 0.0 {
            return Ok(false);
        }

        let (width, height, channels) = src.dimensions();
        let mut data = self.download(src)?;
        apply_vignette(&mut data, width, height, channels, center, radius, strength);

        let dst_wgpu = dst
            .as_any_mut()
            .downcast_mut::<WgpuImage>()
            .ok_or_else(|| ComputeError::OperationFailed("dispatch destination is not a wgpu image".into()))?;
        self.queue.write_buffer(&dst_wgpu.buffer, 0, cast_slice(&data));
        Ok(true)
    }
}

/// Radial vignette over an interleaved `f32` buffer, mirroring
/// `vfx-ops`'s CPU `Vignette` filter. Leaves a fourth (alpha) channel, if
/// present, untouched.
fn apply_vignette(data: &mut [f32], width: u32, height: u32, channels: u32, center: (f32, f32), radius: f32, strength: f32) {
    let channels = channels as usize;
    let w = width.max(1) as f32;
    let h = height.max(1) as f32;

    for y in 0..height {
        for x in 0..width {
            let u = (x as f32 + 0.5) / w;
            let v = (y as f32 + 0.5) / h;
            let dx = u - center.0;
            let dy = v - center.1;
            let distance = (dx * dx + dy * dy).sqrt();
            let t = (distance / radius.max(1e-6)).clamp(0.0, 1.0);
            let smooth = t * t * (3.0 - 2.0 * t);
            let factor = (1.0 - strength * smooth).clamp(0.0, 1.0);

            let idx = ((y as usize * width as usize) + x as usize) * channels;
            for c in 0..3.min(channels) {
                data[idx + c] *= factor;
            }
        }
    }
}
