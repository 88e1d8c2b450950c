//! `BWAdaptiveMixer`: per-channel gray mixing with a highlight/shadow
//! balance term, replicated across all color channels.
//!
//! A weighted-luma mixer expressed as per-pixel math over normalized
//! float channels.

use vfx_compute::backend::ProcessingBackend;
use vfx_core::bitmap::Bitmap;
use vfx_core::error::Result;

use crate::filter_kind::{require_float, Filter, FilterPreset};
use crate::pixel_buffer::{alpha_index, to_f32, write_f32};

/// Per-channel weighted gray mixer with a highlight/shadow balance lift.
#[derive(Debug, Clone)]
pub struct BwAdaptiveMixer {
    /// Red channel weight.
    pub weight_r: f32,
    /// Green channel weight.
    pub weight_g: f32,
    /// Blue channel weight.
    pub weight_b: f32,
    /// Highlight/shadow balance, in `[-1, 1]`. Positive lifts highlights,
    /// negative lifts shadows.
    pub balance: f32,
}

impl Default for BwAdaptiveMixer {
    fn default() -> Self {
        // Rec. 709 luma weights.
        BwAdaptiveMixer {
            weight_r: 0.2126,
            weight_g: 0.7152,
            weight_b: 0.0722,
            balance: 0.0,
        }
    }
}

impl BwAdaptiveMixer {
    /// A mixer with explicit weights and balance.
    pub fn new(weight_r: f32, weight_g: f32, weight_b: f32, balance: f32) -> Self {
        BwAdaptiveMixer {
            weight_r,
            weight_g,
            weight_b,
            balance,
        }
    }

    fn normalized_weights(&self) -> (f32, f32, f32) {
        let sum = self.weight_r + self.weight_g + self.weight_b;
        if sum.abs() < f32::EPSILON {
            return (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0);
        }
        (self.weight_r / sum, self.weight_g / sum, self.weight_b / sum)
    }
}

impl Filter for BwAdaptiveMixer {
    fn type_name(&self) -> &'static str {
        "BWAdaptiveMixer"
    }

    fn process(&self, dst: &mut Bitmap, src: &Bitmap, _backend: &dyn ProcessingBackend) -> Result<bool> {
        let (wr, wg, wb) = self.normalized_weights();
        let channels = src.format().channel_count() as usize;
        let alpha = alpha_index(src.format());
        let mut data = to_f32(src)?;

        for pixel in data.chunks_mut(channels) {
            let gray = wr * pixel[0] + wg * pixel[1] + wb * pixel[2];
            let lifted = gray + self.balance * gray * (1.0 - gray);
            let lifted = lifted.clamp(0.0, 1.0);
            for (c, value) in pixel.iter_mut().enumerate() {
                if Some(c) == alpha {
                    continue;
                }
                *value = lifted;
            }
        }

        write_f32(dst, &data)?;
        Ok(true)
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }

    fn to_preset(&self, name: &str) -> FilterPreset {
        let mut preset = FilterPreset::new(self.type_name(), name);
        preset.floats.insert("weightR".into(), self.weight_r);
        preset.floats.insert("weightG".into(), self.weight_g);
        preset.floats.insert("weightB".into(), self.weight_b);
        preset.floats.insert("balance".into(), self.balance);
        preset
    }

    fn from_preset(&mut self, preset: &FilterPreset) -> Result<()> {
        self.weight_r = require_float(preset, "weightR")?;
        self.weight_g = require_float(preset, "weightG")?;
        self.weight_b = require_float(preset, "weightB")?;
        self.balance = require_float(preset, "balance")?;
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
    fn default_weights_sum_to_one() {
        let mixer = BwAdaptiveMixer::default();
        let (wr, wg, wb) = mixer.normalized_weights();
        assert!((wr + wg + wb - 1.0).abs() < 1e-6);
    }

    #[test]
    fn process_replicates_gray_across_channels() {
        let mixer = BwAdaptiveMixer::default();
        let mut src = Bitmap::new(PixelFormat::RGBA8, 1, 1).unwrap();
        src.data_mut().copy_from_slice(&[100, 150, 200, 255]);
        let mut dst = Bitmap::new(PixelFormat::RGBA8, 1, 1).unwrap();
        mixer.process(&mut dst, &src, test_backend().as_ref()).unwrap();
        let out = dst.data();
        assert_eq!(out[0], out[1]);
        assert_eq!(out[1], out[2]);
        assert_eq!(out[3], 255);
    }

    #[test]
    fn preset_round_trip() {
        let mixer = BwAdaptiveMixer::new(0.3, 0.4, 0.3, 0.2);
        let preset = mixer.to_preset("mix1");
        let mut restored = BwAdaptiveMixer::default();
        restored.from_preset(&preset).unwrap();
        assert_eq!(restored.weight_r, 0.3);
        assert_eq!(restored.balance, 0.2);
    }
}
