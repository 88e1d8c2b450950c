//! `ImageLayer`: one plane of pixel data with lazily-synchronized CPU and
//! GPU storage.
//!
//! One backend-owned image object per layer, recreated on format change,
//! simplified to the single active
//! [`ProcessingBackend`](crate::backend::ProcessingBackend) this workspace
//! selects rather than a per-backend object array: nothing here needs a
//! layer uploaded to several devices at once.
//!
//! A layer holds at most one authoritative copy at a time plus, optionally,
//! a stale mirror on the other side. [`ImageLayer::bitmap`] and
//! [`ImageLayer::gpu_image`] each pull the other side back into sync before
//! returning a reference, so callers never observe divergent CPU/GPU
//! content.

use std::sync::{Arc, Mutex};

use vfx_core::allocator::Allocator;
use vfx_core::bitmap::Bitmap;
use vfx_core::error::{Error, Result};
use vfx_core::pixel_format::PixelFormat;
use vfx_core::rect::Rect;

use crate::backend::ProcessingBackend;
use crate::tile_image::GpuImageObject;

/// Which side currently holds the authoritative pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coherence {
    /// Only the CPU bitmap is valid.
    CpuOnly,
    /// Only the GPU tile image is valid.
    GpuOnly,
    /// Both sides agree; either may be read without resync.
    Synced,
}

/// How a mask layer is combined with the layer it's assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskMode {
    /// Linear interpolation: `result = unmasked*(1-m) + masked*m`.
    Blend,
    /// Mask values below 0.5 fully block the masked contribution.
    Threshold,
    /// Mask is inverted before blending.
    Invert,
}

impl MaskMode {
    /// Applies this mode's mixing function to one normalized sample pair.
    pub fn mix(self, unmasked: f32, masked: f32, mask_value: f32) -> f32 {
        let m = match self {
            MaskMode::Blend => mask_value,
            MaskMode::Threshold => {
                if mask_value >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            MaskMode::Invert => 1.0 - mask_value,
        };
        unmasked * (1.0 - m) + masked * m
    }
}

/// One plane of pixel data, transparently mirrored between a CPU
/// [`Bitmap`] and a GPU [`GpuImageObject`].
///
/// Most operations only ever touch one side (CPU filters read/write the
/// bitmap, GPU filters read/write the tile image); [`ImageLayer`] defers
/// the cross-side copy until the other side is actually requested.
pub struct ImageLayer {
    name: String,
    bitmap: Option<Bitmap>,
    gpu: Option<GpuImageObject>,
    coherence: Coherence,
    width: u32,
    height: u32,
    format: PixelFormat,
    mask: Option<SharedImageLayer>,
    mask_mode: Option<MaskMode>,
}

impl ImageLayer {
    /// An empty, unnamed layer of the given format with no pixels.
    pub fn empty(format: PixelFormat) -> Self {
        ImageLayer {
            name: String::new(),
            bitmap: None,
            gpu: None,
            coherence: Coherence::Synced,
            width: 0,
            height: 0,
            format,
            mask: None,
            mask_mode: None,
        }
    }

    /// Creates a layer from an existing CPU bitmap, taking ownership.
    pub fn from_bitmap(name: impl Into<String>, bitmap: Bitmap) -> Self {
        ImageLayer {
            name: name.into(),
            width: bitmap.width(),
            height: bitmap.height(),
            format: bitmap.format(),
            bitmap: Some(bitmap),
            gpu: None,
            coherence: Coherence::CpuOnly,
            mask: None,
            mask_mode: None,
        }
    }

    /// Layer name (used as a key in [`crate::layered_image::Image`]'s layer list).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the layer.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Plane width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Plane height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel format.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// `true` if this layer currently holds no pixels on either side.
    pub fn is_empty(&self) -> bool {
        self.bitmap.is_none() && self.gpu.is_none()
    }

    /// Replaces this layer's contents with zero-filled storage of
    /// `(format, width, height)`, discarding both sides.
    pub fn reset(&mut self, format: PixelFormat, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            self.bitmap = None;
            self.gpu = None;
            self.coherence = Coherence::Synced;
            self.width = 0;
            self.height = 0;
            self.format = format;
            return Ok(());
        }
        let bitmap = Bitmap::new(format, width, height)?;
        self.width = width;
        self.height = height;
        self.format = format;
        self.bitmap = Some(bitmap);
        self.gpu = None;
        self.coherence = Coherence::CpuOnly;
        Ok(())
    }

    /// Resets this layer using a pooled allocator for the CPU bitmap.
    pub fn reset_pooled(&mut self, allocator: Allocator, format: PixelFormat, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return self.reset(format, width, height);
        }
        let bitmap = Bitmap::with_allocator(allocator, format, width, height)?;
        self.width = width;
        self.height = height;
        self.format = format;
        self.bitmap = Some(bitmap);
        self.gpu = None;
        self.coherence = Coherence::CpuOnly;
        Ok(())
    }

    /// Returns a reference to the CPU bitmap, pulling GPU contents down
    /// first if the CPU side is stale.
    ///
    /// Fails with [`Error::BackendFailure`] if a required download fails;
    /// per this engine's contract the layer is left `GpuOnly` so a retry
    /// is possible.
    pub fn bitmap(&mut self, backend: &dyn ProcessingBackend) -> Result<&Bitmap> {
        self.sync_to_cpu(backend)?;
        self.bitmap.as_ref().ok_or_else(|| Error::invalid_argument("layer has no pixel data"))
    }

    /// Returns a mutable reference to the CPU bitmap, pulling GPU contents
    /// down first, and marks the GPU side stale (the caller is expected to
    /// mutate it).
    pub fn bitmap_mut(&mut self, backend: &dyn ProcessingBackend) -> Result<&mut Bitmap> {
        self.sync_to_cpu(backend)?;
        self.gpu = None;
        self.coherence = Coherence::CpuOnly;
        self.bitmap.as_mut().ok_or_else(|| Error::invalid_argument("layer has no pixel data"))
    }

    /// Returns a reference to the GPU tile image, uploading CPU contents
    /// first if the GPU side is stale or absent. The upload is a
    /// read-only one: a Mono layer used only as a mask source is
    /// accepted.
    pub fn gpu_image(&mut self, backend: &dyn ProcessingBackend) -> Result<&GpuImageObject> {
        self.sync_to_gpu(backend, false)?;
        self.gpu.as_ref().ok_or_else(|| Error::invalid_argument("layer has no pixel data"))
    }

    /// Returns a mutable reference to the GPU tile image, uploading CPU
    /// contents first, and marks the CPU side stale. The upload is a
    /// render-target one: a Mono format is rejected, since the returned
    /// handle is expected to be written into by a filter.
    pub fn gpu_image_mut(&mut self, backend: &dyn ProcessingBackend) -> Result<&mut GpuImageObject> {
        self.sync_to_gpu(backend, true)?;
        self.bitmap = None;
        self.coherence = Coherence::GpuOnly;
        self.gpu.as_mut().ok_or_else(|| Error::invalid_argument("layer has no pixel data"))
    }

    fn sync_to_cpu(&mut self, backend: &dyn ProcessingBackend) -> Result<()> {
        if matches!(self.coherence, Coherence::CpuOnly | Coherence::Synced) {
            return Ok(());
        }
        let gpu = self.gpu.as_ref().expect("GpuOnly coherence implies gpu is Some");
        let data = gpu.download(backend)?;
        let mut bitmap = Bitmap::new(self.format, self.width, self.height)?;
        write_f32_into_bitmap(&mut bitmap, &data)?;
        self.bitmap = Some(bitmap);
        self.coherence = Coherence::Synced;
        Ok(())
    }

    fn sync_to_gpu(&mut self, backend: &dyn ProcessingBackend, as_render_target: bool) -> Result<()> {
        if matches!(self.coherence, Coherence::GpuOnly | Coherence::Synced) {
            return Ok(());
        }
        let bitmap = self.bitmap.as_ref().expect("CpuOnly coherence implies bitmap is Some");
        let data = read_bitmap_as_f32(bitmap)?;
        let gpu = GpuImageObject::upload(backend, &data, self.width, self.height, self.format, as_render_target)?;
        self.gpu = Some(gpu);
        self.coherence = Coherence::Synced;
        Ok(())
    }

    /// Ensures this layer carries a representation usable by `backend`,
    /// without disturbing whichever side is already present. Idempotent:
    /// a no-op if that side is already synced.
    pub fn update_data_for_backend(&mut self, backend: &dyn ProcessingBackend) -> Result<()> {
        if backend.name() == "CPU" {
            self.sync_to_cpu(backend)
        } else {
            self.sync_to_gpu(backend, false)
        }
    }

    /// Drops the representation belonging to `backend_name` ("CPU" or a
    /// GPU backend's name), leaving the other side, if present,
    /// untouched. If the dropped side was the only one present, the
    /// layer ends up with no pixel data on either side.
    pub fn delete_data_for_backend(&mut self, backend_name: &str) {
        if backend_name == "CPU" {
            self.bitmap = None;
            if self.gpu.is_some() {
                self.coherence = Coherence::GpuOnly;
            }
        } else if self.gpu.is_some() {
            self.gpu = None;
            if self.bitmap.is_some() {
                self.coherence = Coherence::CpuOnly;
            }
        }
    }

    /// `true` if this layer currently carries a representation usable by
    /// `backend_name` ("CPU" or a GPU backend's name).
    pub fn contains_data_for_backend(&self, backend_name: &str) -> bool {
        if backend_name == "CPU" {
            self.bitmap.is_some()
        } else {
            self.gpu.is_some()
        }
    }

    /// Fills every channel of every pixel with `value` (normalized to the
    /// format's channel depth).
    pub fn fill(&mut self, backend: &dyn ProcessingBackend, value: f32) -> Result<()> {
        let bitmap = self.bitmap_mut(backend)?;
        let channel_bytes = bitmap.format().channel_size() as usize;
        for chunk in bitmap.data_mut().chunks_mut(channel_bytes) {
            write_normalized(value, chunk);
        }
        Ok(())
    }

    /// Fills a single channel of every pixel with `value`.
    pub fn fill_channel(&mut self, backend: &dyn ProcessingBackend, channel: u8, value: f32) -> Result<()> {
        let bitmap = self.bitmap_mut(backend)?;
        let format = bitmap.format();
        let channel_bytes = format.channel_size() as usize;
        let pixel_bytes = format.pixel_size() as usize;
        let offset = format.channel_offset(channel)? as usize;
        let npixels = bitmap.width() as usize * bitmap.height() as usize;
        let data = bitmap.data_mut();
        for p in 0..npixels {
            let base = p * pixel_bytes + offset;
            write_normalized(value, &mut data[base..base + channel_bytes]);
        }
        Ok(())
    }

    /// Copies `src_rect` of `source` into this layer at `(dst_x, dst_y)`.
    /// Fails if the two layers' formats don't match.
    pub fn copy(
        &mut self,
        backend: &dyn ProcessingBackend,
        source: &mut ImageLayer,
        src_rect: Rect,
        dst_x: i32,
        dst_y: i32,
    ) -> Result<()> {
        let src_bitmap = clone_bitmap(source.bitmap(backend)?)?;
        self.bitmap_mut(backend)?.copy(&src_bitmap, src_rect, dst_x, dst_y)
    }

    /// Copies one channel of `source` into channel `dst_channel` of this
    /// layer at `(dst_x, dst_y)`.
    pub fn copy_channel(
        &mut self,
        backend: &dyn ProcessingBackend,
        source: &mut ImageLayer,
        src_channel: u8,
        dst_channel: u8,
        src_rect: Rect,
        dst_x: i32,
        dst_y: i32,
    ) -> Result<()> {
        let src_bitmap = clone_bitmap(source.bitmap(backend)?)?;
        self.bitmap_mut(backend)?
            .copy_channel(src_channel, dst_channel, &src_bitmap, src_rect, dst_x, dst_y)
    }

    /// Returns a standalone copy of `rect` (the whole plane if `None`),
    /// pulling GPU contents down first if needed.
    pub fn retrieve(&mut self, backend: &dyn ProcessingBackend, rect: Option<Rect>) -> Result<Bitmap> {
        let bitmap = self.bitmap(backend)?;
        match rect {
            Some(r) => bitmap.to_format(bitmap.format(), r),
            None => clone_bitmap(bitmap),
        }
    }

    /// Extracts one channel of `rect` (the whole plane if `None`) into a
    /// standalone Mono8/Mono16 bitmap, matching the source channel's byte
    /// width.
    pub fn retrieve_channel(&mut self, backend: &dyn ProcessingBackend, channel: u8, rect: Option<Rect>) -> Result<Bitmap> {
        let bitmap = self.bitmap(backend)?;
        let rect = rect.unwrap_or_else(|| Rect::from_size(bitmap.width(), bitmap.height()));
        if !rect.is_valid_for(bitmap.width(), bitmap.height()) {
            return Err(Error::invalid_region(rect.x, rect.y, rect.width, rect.height, bitmap.width(), bitmap.height()));
        }
        extract_channel_bitmap(bitmap, channel, rect)
    }

    /// Deep-clones this layer, including both storage sides if present.
    pub fn duplicate(&self) -> Self {
        let bitmap = self.bitmap.as_ref().map(|b| clone_bitmap(b).expect("duplicate of valid bitmap"));
        ImageLayer {
            name: self.name.clone(),
            bitmap,
            gpu: None,
            coherence: Coherence::CpuOnly,
            width: self.width,
            height: self.height,
            format: self.format,
            mask: self.mask.clone(),
            mask_mode: self.mask_mode,
        }
    }

    /// Clones a sub-rectangle of this layer into a new, unnamed layer.
    pub fn duplicate_area(&mut self, backend: &dyn ProcessingBackend, rect: Rect) -> Result<ImageLayer> {
        let bitmap = self.bitmap(backend)?;
        if !rect.is_valid_for(bitmap.width(), bitmap.height()) {
            return Err(Error::invalid_region(rect.x, rect.y, rect.width, rect.height, bitmap.width(), bitmap.height()));
        }
        let cropped = bitmap.to_format(bitmap.format(), rect)?;
        Ok(ImageLayer::from_bitmap(format!("{}_area", self.name), cropped))
    }

    /// Extracts one channel of `rect` (the whole plane if `None`) into a
    /// new Mono8/Mono16 layer.
    pub fn duplicate_channel(&mut self, backend: &dyn ProcessingBackend, channel: u8, rect: Option<Rect>) -> Result<ImageLayer> {
        let channel_bitmap = self.retrieve_channel(backend, channel, rect)?;
        Ok(ImageLayer::from_bitmap(format!("{}_channel{channel}", self.name), channel_bitmap))
    }

    /// Strips the alpha channel from this layer's format, on whichever
    /// side is currently authoritative.
    pub fn discard_alpha_channel(&mut self, backend: &dyn ProcessingBackend) -> Result<()> {
        self.remove_alpha_channel(backend)?;
        Ok(())
    }

    /// Widens this layer's format to carry an alpha channel, zero-filling
    /// it. No-op returning `false` if the format already has one.
    pub fn add_alpha_channel(&mut self, backend: &dyn ProcessingBackend) -> Result<bool> {
        if self.format.has_alpha() {
            return Ok(false);
        }
        let new_format = self.format.with_alpha()?;
        let bitmap = self.bitmap_mut(backend)?;
        let width = bitmap.width();
        let height = bitmap.height();
        let old_pixel = bitmap.format().pixel_size() as usize;
        let new_pixel = new_format.pixel_size() as usize;
        let npixels = width as usize * height as usize;
        let mut out = vec![0u8; npixels * new_pixel];
        {
            let old = bitmap.data();
            for p in 0..npixels {
                let src = p * old_pixel;
                let dst = p * new_pixel;
                out[dst..dst + old_pixel].copy_from_slice(&old[src..src + old_pixel]);
            }
        }
        bitmap.reset(new_format, width, height, Some(&out))?;
        self.format = new_format;
        Ok(true)
    }

    /// Drops this layer's alpha channel. No-op returning `false` if the
    /// format has none.
    pub fn remove_alpha_channel(&mut self, backend: &dyn ProcessingBackend) -> Result<bool> {
        if !self.format.has_alpha() {
            return Ok(false);
        }
        let bitmap = self.bitmap_mut(backend)?;
        bitmap.discard_alpha_channel()?;
        self.format = bitmap.format();
        Ok(true)
    }

    /// Associates `mask` with this layer, storing a non-owning reference
    /// (shared with whichever `Image` registered it).
    pub fn set_mask(&mut self, mask: SharedImageLayer) {
        self.mask = Some(mask);
    }

    /// Sets how `apply_mask` blends this layer's mask.
    pub fn set_mask_mode(&mut self, mode: MaskMode) {
        self.mask_mode = Some(mode);
    }

    /// Removes this layer's mask association entirely.
    pub fn clear_mask(&mut self) {
        self.mask = None;
        self.mask_mode = None;
    }

    /// Blends `masked` (an already-computed alternate rendering of this
    /// layer, row-major normalized `f32`) into this layer's CPU data using
    /// its assigned mask and mode. No-op returning `false` if either is
    /// unset.
    pub fn apply_mask(&mut self, backend: &dyn ProcessingBackend, masked: &[f32]) -> Result<bool> {
        let (Some(mask), Some(mode)) = (self.mask.clone(), self.mask_mode) else {
            return Ok(false);
        };

        let (mask_data, mask_depth) = {
            let mut mask_layer = mask.lock().map_err(|_| Error::other("mask layer lock poisoned"))?;
            let mask_bitmap = mask_layer.bitmap(backend)?;
            (mask_bitmap.data().to_vec(), mask_bitmap.format().channel_depth())
        };
        let mask_max = mask_depth.max_value();
        let mask_channel_bytes = mask_depth.bytes() as usize;

        let bitmap = self.bitmap_mut(backend)?;
        let channels = bitmap.format().channel_count() as usize;
        let channel_bytes = bitmap.format().channel_size() as usize;
        let npixels = bitmap.width() as usize * bitmap.height() as usize;

        for p in 0..npixels {
            let mask_value = mask_sample(&mask_data, p, mask_channel_bytes) as f32 / mask_max;
            for c in 0..channels {
                let offset = p * channels * channel_bytes + c * channel_bytes;
                let unmasked = read_normalized(&bitmap.data()[offset..offset + channel_bytes]);
                let masked_value = if masked.len() == npixels * channels {
                    masked[p * channels + c]
                } else {
                    unmasked
                };
                let mixed = mode.mix(unmasked, masked_value, mask_value);
                write_normalized(mixed, &mut bitmap.data_mut()[offset..offset + channel_bytes]);
            }
        }
        Ok(true)
    }
}

fn clone_bitmap(bitmap: &Bitmap) -> Result<Bitmap> {
    let mut copy = Bitmap::new(bitmap.format(), bitmap.width(), bitmap.height())?;
    copy.data_mut().copy_from_slice(bitmap.data());
    Ok(copy)
}

fn extract_channel_bitmap(bitmap: &Bitmap, channel: u8, rect: Rect) -> Result<Bitmap> {
    let format = bitmap.format();
    let channel_bytes = format.channel_size() as usize;
    let offset = format.channel_offset(channel)? as usize;
    let pixel_bytes = format.pixel_size() as usize;
    let out_format = if channel_bytes <= 1 { PixelFormat::MONO8 } else { PixelFormat::MONO16 };
    let mut out = Bitmap::new(out_format, rect.width, rect.height)?;
    let out_channel_bytes = out_format.channel_size() as usize;
    let stride = bitmap.stride();

    for y in 0..rect.height as usize {
        for x in 0..rect.width as usize {
            let sx = rect.x as usize + x;
            let sy = rect.y as usize + y;
            let src_off = sy * stride + sx * pixel_bytes + offset;
            let value = read_normalized(&bitmap.data()[src_off..src_off + channel_bytes]);
            let dst_off = (y * rect.width as usize + x) * out_channel_bytes;
            write_normalized(value, &mut out.data_mut()[dst_off..dst_off + out_channel_bytes]);
        }
    }
    Ok(out)
}

fn mask_sample(data: &[u8], pixel: usize, channel_bytes: usize) -> u32 {
    let offset = pixel * channel_bytes;
    match channel_bytes {
        1 => data[offset] as u32,
        2 => u16::from_le_bytes([data[offset], data[offset + 1]]) as u32,
        _ => 0,
    }
}

fn read_normalized(bytes: &[u8]) -> f32 {
    match bytes.len() {
        1 => bytes[0] as f32 / 255.0,
        2 => u16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 65535.0,
        4 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        _ => 0.0,
    }
}

fn write_normalized(value: f32, bytes: &mut [u8]) {
    let clamped = value.clamp(0.0, 1.0);
    match bytes.len() {
        1 => bytes[0] = (clamped * 255.0).round() as u8,
        2 => bytes.copy_from_slice(&((clamped * 65535.0).round() as u16).to_le_bytes()),
        4 => bytes.copy_from_slice(&value.to_le_bytes()),
        _ => {}
    }
}

fn read_bitmap_as_f32(bitmap: &Bitmap) -> Result<Vec<f32>> {
    let pivot = vfx_core::pixel_format::PixelFormat::new(
        bitmap.format().family(),
        vfx_core::pixel_format::ChannelDepth::F32,
    );
    let mut converted = Bitmap::new(bitmap.format(), bitmap.width(), bitmap.height())?;
    converted.data_mut().copy_from_slice(bitmap.data());
    converted.transform_format(pivot)?;
    let bytes = converted.data();
    let mut out = Vec::with_capacity(bytes.len() / 4);
    for chunk in bytes.chunks_exact(4) {
        out.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(out)
}

fn write_f32_into_bitmap(bitmap: &mut Bitmap, data: &[f32]) -> Result<()> {
    let pivot = PixelFormat::new(bitmap.format().family(), vfx_core::pixel_format::ChannelDepth::F32);
    let mut raw = Vec::with_capacity(data.len() * 4);
    for v in data {
        raw.extend_from_slice(&v.to_le_bytes());
    }
    let mut pivot_bitmap = Bitmap::new(pivot, bitmap.width(), bitmap.height())?;
    pivot_bitmap.data_mut().copy_from_slice(&raw);
    pivot_bitmap.transform_format(bitmap.format())?;
    bitmap.data_mut().copy_from_slice(pivot_bitmap.data());
    Ok(())
}

/// Shared handle to a layer, used when several [`crate::layered_image::Image`]
/// layer-list entries reference the same underlying mask.
pub type SharedImageLayer = Arc<Mutex<ImageLayer>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{create_backend, Backend};

    fn cpu_backend() -> Box<dyn ProcessingBackend> {
        create_backend(Backend::Cpu).unwrap()
    }

    #[test]
    fn reset_then_bitmap_gives_zeroed_plane() {
        let mut layer = ImageLayer::empty(PixelFormat::RGBA8);
        layer.reset(PixelFormat::RGBA8, 4, 4).unwrap();
        let backend = cpu_backend();
        let bmp = layer.bitmap(backend.as_ref()).unwrap();
        assert!(bmp.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn gpu_round_trip_preserves_values() {
        let mut layer = ImageLayer::empty(PixelFormat::RGBA8);
        layer.reset(PixelFormat::RGBA8, 2, 2).unwrap();
        let backend = cpu_backend();
        {
            let bmp = layer.bitmap_mut(backend.as_ref()).unwrap();
            bmp.data_mut().copy_from_slice(&[10, 20, 30, 255, 40, 50, 60, 255, 70, 80, 90, 255, 100, 110, 120, 255]);
        }
        // gpu_image_mut forces an upload and drops the cached CPU bitmap
        // (coherence -> GpuOnly), so the following bitmap() call must do
        // a real download rather than short-circuiting on Synced.
        layer.gpu_image_mut(backend.as_ref()).unwrap();
        let bmp = layer.bitmap(backend.as_ref()).unwrap();
        assert_eq!(bmp.data()[0], 10);
        assert_eq!(bmp.data()[7], 255);
    }

    #[test]
    fn empty_layer_has_no_pixels() {
        let layer = ImageLayer::empty(PixelFormat::RGBA8);
        assert!(layer.is_empty());
    }

    #[test]
    fn duplicate_is_independent_storage() {
        let mut layer = ImageLayer::empty(PixelFormat::RGBA8);
        layer.reset(PixelFormat::RGBA8, 2, 2).unwrap();
        let backend = cpu_backend();
        layer.bitmap_mut(backend.as_ref()).unwrap().data_mut()[0] = 99;
        let mut dup = layer.duplicate();
        dup.bitmap_mut(backend.as_ref()).unwrap().data_mut()[0] = 1;
        assert_eq!(layer.bitmap(backend.as_ref()).unwrap().data()[0], 99);
    }

    #[test]
    fn fill_sets_every_channel() {
        let mut layer = ImageLayer::empty(PixelFormat::RGBA8);
        layer.reset(PixelFormat::RGBA8, 2, 2).unwrap();
        let backend = cpu_backend();
        layer.fill(backend.as_ref(), 1.0).unwrap();
        assert!(layer.bitmap(backend.as_ref()).unwrap().data().iter().all(|&b| b == 255));
    }

    #[test]
    fn fill_channel_only_touches_that_channel() {
        let mut layer = ImageLayer::empty(PixelFormat::RGBA8);
        layer.reset(PixelFormat::RGBA8, 1, 1).unwrap();
        let backend = cpu_backend();
        layer.fill_channel(backend.as_ref(), 1, 1.0).unwrap();
        let data = layer.bitmap(backend.as_ref()).unwrap().data();
        assert_eq!(data, &[0, 255, 0, 0]);
    }

    #[test]
    fn copy_brings_in_source_pixels() {
        let backend = cpu_backend();
        let mut src = ImageLayer::empty(PixelFormat::RGBA8);
        src.reset(PixelFormat::RGBA8, 2, 2).unwrap();
        src.fill(backend.as_ref(), 1.0).unwrap();

        let mut dst = ImageLayer::empty(PixelFormat::RGBA8);
        dst.reset(PixelFormat::RGBA8, 2, 2).unwrap();
        dst.copy(backend.as_ref(), &mut src, Rect::from_size(2, 2), 0, 0).unwrap();
        assert!(dst.bitmap(backend.as_ref()).unwrap().data().iter().all(|&b| b == 255));
    }

    #[test]
    fn add_then_remove_alpha_channel_round_trips() {
        let backend = cpu_backend();
        let mut layer = ImageLayer::empty(PixelFormat::RGB8);
        layer.reset(PixelFormat::RGB8, 1, 1).unwrap();
        layer.bitmap_mut(backend.as_ref()).unwrap().data_mut().copy_from_slice(&[10, 20, 30]);

        assert!(layer.add_alpha_channel(backend.as_ref()).unwrap());
        assert_eq!(layer.format(), PixelFormat::RGBA8);
        assert_eq!(layer.bitmap(backend.as_ref()).unwrap().data(), &[10, 20, 30, 0]);
        assert!(!layer.add_alpha_channel(backend.as_ref()).unwrap());

        assert!(layer.remove_alpha_channel(backend.as_ref()).unwrap());
        assert_eq!(layer.format(), PixelFormat::RGB8);
        assert!(!layer.remove_alpha_channel(backend.as_ref()).unwrap());
    }

    #[test]
    fn duplicate_channel_extracts_mono_layer() {
        let backend = cpu_backend();
        let mut layer = ImageLayer::empty(PixelFormat::RGBA8);
        layer.reset(PixelFormat::RGBA8, 1, 1).unwrap();
        layer.bitmap_mut(backend.as_ref()).unwrap().data_mut().copy_from_slice(&[10, 20, 30, 255]);
        let channel = layer.duplicate_channel(backend.as_ref(), 1, None).unwrap();
        assert_eq!(channel.format(), PixelFormat::MONO8);
    }

    #[test]
    fn update_and_contains_data_for_backend() {
        let backend = cpu_backend();
        let mut layer = ImageLayer::empty(PixelFormat::RGBA8);
        layer.reset(PixelFormat::RGBA8, 2, 2).unwrap();
        assert!(layer.contains_data_for_backend("CPU"));
        assert!(!layer.contains_data_for_backend(backend.name()));
        layer.update_data_for_backend(backend.as_ref()).unwrap();
        assert!(layer.contains_data_for_backend(backend.name()));
        layer.delete_data_for_backend("CPU");
        assert!(!layer.contains_data_for_backend("CPU"));
    }

    #[test]
    fn mask_blend_mixes_toward_masked_value() {
        let backend = cpu_backend();
        let mut layer = ImageLayer::empty(PixelFormat::MONO8);
        layer.reset(PixelFormat::MONO8, 1, 1).unwrap();

        let mut mask_layer = ImageLayer::empty(PixelFormat::MONO8);
        mask_layer.reset(PixelFormat::MONO8, 1, 1).unwrap();
        mask_layer.bitmap_mut(backend.as_ref()).unwrap().data_mut()[0] = 255;

        layer.set_mask(Arc::new(Mutex::new(mask_layer)));
        layer.set_mask_mode(MaskMode::Blend);
        let changed = layer.apply_mask(backend.as_ref(), &[1.0]).unwrap();
        assert!(changed);
        assert_eq!(layer.bitmap(backend.as_ref()).unwrap().data()[0], 255);
    }

    #[test]
    fn apply_mask_is_noop_without_assignment() {
        let backend = cpu_backend();
        let mut layer = ImageLayer::empty(PixelFormat::MONO8);
        layer.reset(PixelFormat::MONO8, 1, 1).unwrap();
        assert!(!layer.apply_mask(backend.as_ref(), &[1.0]).unwrap());
    }
}
