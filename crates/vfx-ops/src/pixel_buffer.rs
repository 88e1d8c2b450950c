//! Conversion helpers between [`Bitmap`] and flat interleaved `f32`
//! buffers, the shape every filter's per-pixel math operates on.
//!
//! Filters work in normalized float regardless of the bitmap's storage
//! depth, against plain `&[f32]` buffers rather than a typed pixel struct.

use vfx_core::bitmap::Bitmap;
use vfx_core::error::Result;
use vfx_core::pixel_format::{ChannelDepth, PixelFormat};

/// Extracts `bitmap`'s pixels as normalized interleaved `f32`, one value
/// per channel per pixel, preserving `bitmap`'s channel count and order.
pub fn to_f32(bitmap: &Bitmap) -> Result<Vec<f32>> {
    let pivot = PixelFormat::new(bitmap.format().family(), ChannelDepth::F32);
    let mut converted = Bitmap::new(bitmap.format(), bitmap.width(), bitmap.height())?;
    converted.data_mut().copy_from_slice(bitmap.data());
    converted.transform_format(pivot)?;
    let bytes = converted.data();
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Writes normalized interleaved `f32` data back into `bitmap`, converting
/// to `bitmap`'s native storage depth. `data` must have
/// `width * height * channel_count` entries.
pub fn write_f32(bitmap: &mut Bitmap, data: &[f32]) -> Result<()> {
    let pivot = PixelFormat::new(bitmap.format().family(), ChannelDepth::F32);
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

/// Index of the alpha channel in an interleaved `f32` buffer for
/// `format`, if it has one.
pub fn alpha_index(format: PixelFormat) -> Option<usize> {
    format.family().alpha_index()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_u8_values() {
        let mut bmp = Bitmap::new(PixelFormat::RGBA8, 1, 1).unwrap();
        bmp.data_mut().copy_from_slice(&[10, 20, 30, 255]);
        let f = to_f32(&bmp).unwrap();
        assert!((f[0] - 10.0 / 255.0).abs() < 1e-5);
        let mut out = Bitmap::new(PixelFormat::RGBA8, 1, 1).unwrap();
        write_f32(&mut out, &f).unwrap();
        assert_eq!(out.data(), bmp.data());
    }
}
