//! The narrow device-handle contract [`tile_image`](crate::tile_image) and
//! [`ImageLayer`](crate::image_layer::ImageLayer) build on: a GPU-resident
//! image's dimensions plus enough downcasting to let a concrete backend
//! (CPU, wgpu, ...) recover its own handle type out of a `dyn ImageHandle`.
//!
//! Per-pixel filter math runs on CPU `Bitmap`s, so no color-matrix/LUT/blend
//! kernel surface lives here; only the tile/texture contract a backend needs
//! to move pixels on and off the device.

/// Handle to an image in GPU memory.
pub trait ImageHandle: Send + Sync + AsAny {
    /// Image dimensions (width, height, channels).
    fn dimensions(&self) -> (u32, u32, u32);

    /// Width.
    fn width(&self) -> u32 { self.dimensions().0 }

    /// Height.
    fn height(&self) -> u32 { self.dimensions().1 }

    /// Channel count.
    fn channels(&self) -> u32 { self.dimensions().2 }

    /// Size in bytes of GPU memory used.
    fn size_bytes(&self) -> u64 {
        let (w, h, c) = self.dimensions();
        (w as u64) * (h as u64) * (c as u64) * 4 // f32
    }
}

/// Helper trait for downcasting a `&dyn ImageHandle` back to its concrete type.
pub trait AsAny: 'static {
    fn as_any(&self) -> &dyn std::any::Any;
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
