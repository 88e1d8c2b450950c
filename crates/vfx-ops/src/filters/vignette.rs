//! `Vignette`: radial falloff darkening toward the image edges.
//!
//! The 2-D center is a plain pair of `f32` fields rather than a pulled-in
//! vector type.

use vfx_compute::backend::{FilterOp, ProcessingBackend};
use vfx_core::bitmap::Bitmap;
use vfx_core::error::Result;

use crate::filter_kind::{require_float, require_point, Filter, FilterPreset};
use crate::pixel_buffer::{alpha_index, to_f32, write_f32};

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Radial vignette: darkens pixels as a smoothstep function of their
/// distance from `center`.
#[derive(Debug, Clone, Copy)]
pub struct Vignette {
    /// Vignette center in normalized `[0, 1]^2` image coordinates.
    pub center: (f32, f32),
    /// Radius (in normalized coordinates) at which falloff reaches full
    /// strength.
    pub radius: f32,
    /// Darkening strength, typically in `[0, 1]`.
    pub strength: f32,
}

impl Default for Vignette {
    fn default() -> Self {
        Vignette {
            center: (0.5, 0.5),
            radius: 0.75,
            strength: 0.5,
        }
    }
}

impl Filter for Vignette {
    fn type_name(&self) -> &'static str {
        "Vignette"
    }

    fn process(&self, dst: &mut Bitmap, src: &Bitmap, _backend: &dyn ProcessingBackend) -> Result<bool> {
        if self.strength <= 0.0 {
            dst.data_mut().copy_from_slice(src.data());
            return Ok(false);
        }

        let width = src.width().max(1) as f32;
        let height = src.height().max(1) as f32;
        let channels = src.format().channel_count() as usize;
        let alpha = alpha_index(src.format());
        let mut data = to_f32(src)?;

        for y in 0..src.height() {
            for x in 0..src.width() {
                let u = (x as f32 + 0.5) / width;
                let v = (y as f32 + 0.5) / height;
                let dx = u - self.center.0;
                let dy = v - self.center.1;
                let distance = (dx * dx + dy * dy).sqrt();
                let factor = (1.0 - self.strength * smoothstep(0.0, self.radius, distance)).clamp(0.0, 1.0);

                let idx = ((y as usize * src.width() as usize) + x as usize) * channels;
                for c in 0..channels {
                    if Some(c) == alpha {
                        continue;
                    }
                    data[idx + c] *= factor;
                }
            }
        }

        write_f32(dst, &data)?;
        Ok(true)
    }

    fn gpu_op(&self) -> Option<FilterOp> {
        if self.strength <= 0.0 {
            None
        } else {
            Some(FilterOp::Vignette {
                center: self.center,
                radius: self.radius,
                strength: self.strength,
            })
        }
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(*self)
    }

    fn to_preset(&self, name: &str) -> FilterPreset {
        let mut preset = FilterPreset::new(self.type_name(), name);
        preset.points.insert("center".into(), self.center);
        preset.floats.insert("radius".into(), self.radius);
        preset.floats.insert("strength".into(), self.strength);
        preset
    }

    fn from_preset(&mut self, preset: &FilterPreset) -> Result<()> {
        self.center = require_point(preset, "center")?;
        self.radius = require_float(preset, "radius")?;
        self.strength = require_float(preset, "strength")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfx_compute::backend::{create_backend, Backend as ComputeBackend};
    use vfx_core::pixel_format::PixelFormat;

    fn test_backend() -> Box<dyn ProcessingBackend> {
        create_backend(ComputeBackend::Cpu).unwrap()
    }

    #[test]
    fn zero_strength_is_noop() {
        let vignette = Vignette { strength: 0.0, ..Default::default() };
        let mut src = Bitmap::new(PixelFormat::RGBA8, 2, 2).unwrap();
        src.data_mut().fill(200);
        let mut dst = Bitmap::new(PixelFormat::RGBA8, 2, 2).unwrap();
        let changed = vignette.process(&mut dst, &src, test_backend().as_ref()).unwrap();
        assert!(!changed);
        assert_eq!(dst.data(), src.data());
        assert!(vignette.gpu_op().is_none());
    }

    #[test]
    fn corners_darker_than_center() {
        let vignette = Vignette::default();
        let mut src = Bitmap::new(PixelFormat::RGBA8, 32, 32).unwrap();
        src.data_mut().fill(200);
        let mut dst = Bitmap::new(PixelFormat::RGBA8, 32, 32).unwrap();
        vignette.process(&mut dst, &src, test_backend().as_ref()).unwrap();
        let channels = 4usize;
        let center_idx = ((16 * 32) + 16) * channels;
        let corner_idx = 0;
        assert!(dst.data()[corner_idx] <= dst.data()[center_idx]);
        assert!(vignette.gpu_op().is_some());
    }

    #[test]
    fn alpha_channel_untouched() {
        let vignette = Vignette::default();
        let mut src = Bitmap::new(PixelFormat::RGBA8, 4, 4).unwrap();
        src.data_mut().fill(200);
        let mut dst = Bitmap::new(PixelFormat::RGBA8, 4, 4).unwrap();
        vignette.process(&mut dst, &src, test_backend().as_ref()).unwrap();
        for chunk in dst.data().chunks(4) {
            assert_eq!(chunk[3], 200);
        }
    }
}
