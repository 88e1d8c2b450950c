//! `SplitTone`: tints shadows and highlights with independent colors,
//! weighted by luma and blended toward neutral by `balance`.
//!
//! Shares its shadow/highlight split structure with other tone-grading
//! filters in this codebase, simplified to a flat additive tint with no
//! per-region lift/gamma/gain curves.

use vfx_compute::backend::ProcessingBackend;
use vfx_core::bitmap::Bitmap;
use vfx_core::error::Result;

use crate::filter_kind::{require_float, require_point, Filter, FilterPreset};
use crate::pixel_buffer::{alpha_index, to_f32, write_f32};

/// Splits a tint between shadows and highlights based on per-pixel luma.
#[derive(Debug, Clone, Copy)]
pub struct SplitTone {
    /// Tint color applied to highlights, as `(r, g, b)` in `[0, 1]`.
    pub highlight_color: (f32, f32, f32),
    /// Tint color applied to shadows, as `(r, g, b)` in `[0, 1]`.
    pub shadow_color: (f32, f32, f32),
    /// Balance between shadow and highlight tint, in `[-1, 1]`. `0` splits
    /// evenly at mid-gray; positive biases the split toward shadows (more
    /// of the range is treated as "shadow"), negative toward highlights.
    pub balance: f32,
    /// Overall tint strength, in `[0, 1]`.
    pub strength: f32,
}

impl Default for SplitTone {
    fn default() -> Self {
        SplitTone {
            highlight_color: (1.0, 0.9, 0.7),
            shadow_color: (0.2, 0.3, 0.5),
            balance: 0.0,
            strength: 0.3,
        }
    }
}

fn luma(pixel: &[f32]) -> f32 {
    (pixel[0] + pixel[1] + pixel[2]) / 3.0
}

impl Filter for SplitTone {
    fn type_name(&self) -> &'static str {
        "SplitTone"
    }

    fn process(&self, dst: &mut Bitmap, src: &Bitmap, _backend: &dyn ProcessingBackend) -> Result<bool> {
        if self.strength <= 0.0 {
            dst.data_mut().copy_from_slice(src.data());
            return Ok(false);
        }

        let channels = src.format().channel_count() as usize;
        let alpha = alpha_index(src.format());
        let mut data = to_f32(src)?;
        // Shift the 50/50 split point by `balance`, clamped so the pivot
        // never leaves (0, 1).
        let pivot = (0.5 - 0.5 * self.balance).clamp(0.01, 0.99);

        for pixel in data.chunks_mut(channels) {
            let y = luma(pixel);
            let highlight_weight = ((y - pivot) / (1.0 - pivot)).clamp(0.0, 1.0);
            let shadow_weight = ((pivot - y) / pivot).clamp(0.0, 1.0);
            let tint = [
                highlight_weight * self.highlight_color.0 + shadow_weight * self.shadow_color.0,
                highlight_weight * self.highlight_color.1 + shadow_weight * self.shadow_color.1,
                highlight_weight * self.highlight_color.2 + shadow_weight * self.shadow_color.2,
            ];
            for c in 0..3.min(channels) {
                if Some(c) == alpha {
                    continue;
                }
                let tinted = pixel[c] * (1.0 - self.strength) + (pixel[c] * tint[c]) * self.strength;
                pixel[c] = tinted.clamp(0.0, 1.0);
            }
        }

        write_f32(dst, &data)?;
        Ok(true)
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(*self)
    }

    fn to_preset(&self, name: &str) -> FilterPreset {
        let mut preset = FilterPreset::new(self.type_name(), name);
        preset.points.insert("highlightRG".into(), (self.highlight_color.0, self.highlight_color.1));
        preset.floats.insert("highlightB".into(), self.highlight_color.2);
        preset.points.insert("shadowRG".into(), (self.shadow_color.0, self.shadow_color.1));
        preset.floats.insert("shadowB".into(), self.shadow_color.2);
        preset.floats.insert("balance".into(), self.balance);
        preset.floats.insert("strength".into(), self.strength);
        preset
    }

    fn from_preset(&mut self, preset: &FilterPreset) -> Result<()> {
        let (hr, hg) = require_point(preset, "highlightRG")?;
        let hb = require_float(preset, "highlightB")?;
        let (sr, sg) = require_point(preset, "shadowRG")?;
        let sb = require_float(preset, "shadowB")?;
        self.highlight_color = (hr, hg, hb);
        self.shadow_color = (sr, sg, sb);
        self.balance = require_float(preset, "balance")?;
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
        let tone = SplitTone { strength: 0.0, ..Default::default() };
        let mut src = Bitmap::new(PixelFormat::RGBA8, 2, 2).unwrap();
        src.data_mut().fill(150);
        let mut dst = Bitmap::new(PixelFormat::RGBA8, 2, 2).unwrap();
        let changed = tone.process(&mut dst, &src, test_backend().as_ref()).unwrap();
        assert!(!changed);
        assert_eq!(dst.data(), src.data());
    }

    #[test]
    fn bright_pixel_pulls_toward_highlight_color() {
        let tone = SplitTone { strength: 1.0, ..Default::default() };
        let mut src = Bitmap::new(PixelFormat::RGBA8, 1, 1).unwrap();
        src.data_mut().copy_from_slice(&[255, 255, 255, 255]);
        let mut dst = Bitmap::new(PixelFormat::RGBA8, 1, 1).unwrap();
        tone.process(&mut dst, &src, test_backend().as_ref()).unwrap();
        // Highlight color has more red than blue; the nearly-white pixel
        // should now lean the same way.
        assert!(dst.data()[0] >= dst.data()[2]);
    }

    #[test]
    fn alpha_channel_untouched() {
        let tone = SplitTone::default();
        let mut src = Bitmap::new(PixelFormat::RGBA8, 2, 2).unwrap();
        src.data_mut().fill(120);
        let mut dst = Bitmap::new(PixelFormat::RGBA8, 2, 2).unwrap();
        tone.process(&mut dst, &src, test_backend().as_ref()).unwrap();
        for chunk in dst.data().chunks(4) {
            assert_eq!(chunk[3], 120);
        }
    }

    #[test]
    fn preset_round_trip() {
        let tone = SplitTone {
            highlight_color: (0.9, 0.8, 0.6),
            shadow_color: (0.1, 0.2, 0.4),
            balance: 0.25,
            strength: 0.6,
        };
        let preset = tone.to_preset("tone1");
        let mut restored = SplitTone::default();
        restored.from_preset(&preset).unwrap();
        assert_eq!(restored.highlight_color, tone.highlight_color);
        assert_eq!(restored.shadow_color, tone.shadow_color);
        assert_eq!(restored.balance, tone.balance);
    }
}
