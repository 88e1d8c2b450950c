//! `Curves`: per-channel monotonic piecewise-linear tables resampled to a
//! 256-entry LUT.
//!
//! Control points are resampled to a monotonic piecewise-linear table
//! before being applied per-pixel, the same shape as other curve-grading
//! LUT resampling in this codebase, simplified to piecewise-linear rather
//! than a B-spline-with-slopes model.

use vfx_compute::backend::ProcessingBackend;
use vfx_core::bitmap::Bitmap;
use vfx_core::error::{Error, Result};

use crate::filter_kind::{Filter, FilterPreset};
use crate::pixel_buffer::{alpha_index, to_f32, write_f32};

const LUT_SIZE: usize = 256;

/// A monotonic piecewise-linear curve, resampled on demand into a
/// 256-entry lookup table.
#[derive(Debug, Clone)]
pub struct Curve {
    /// Control points, sorted by `x`, each in `[0, 1]`.
    points: Vec<(f32, f32)>,
}

impl Curve {
    /// The identity curve `y = x`.
    pub fn identity() -> Self {
        Curve {
            points: vec![(0.0, 0.0), (1.0, 1.0)],
        }
    }

    /// A curve from explicit control points. Fails if fewer than two
    /// points are given or `x` isn't non-decreasing.
    pub fn from_points(points: Vec<(f32, f32)>) -> Result<Self> {
        if points.len() < 2 {
            return Err(Error::invalid_argument("curve needs at least 2 control points"));
        }
        for w in points.windows(2) {
            if w[1].0 < w[0].0 {
                return Err(Error::invalid_argument("curve control points must be sorted by x"));
            }
        }
        Ok(Curve { points })
    }

    /// Control points as stored.
    pub fn points(&self) -> &[(f32, f32)] {
        &self.points
    }

    /// `true` if this curve is the identity `y = x` at every point.
    pub fn is_identity(&self) -> bool {
        self.points.iter().all(|&(x, y)| (x - y).abs() < 1e-6)
    }

    /// Resamples this curve to a [`LUT_SIZE`]-entry lookup table over
    /// `[0, 1]`.
    pub fn to_lut(&self) -> [f32; LUT_SIZE] {
        let mut lut = [0f32; LUT_SIZE];
        for (i, slot) in lut.iter_mut().enumerate() {
            let x = i as f32 / (LUT_SIZE - 1) as f32;
            *slot = self.eval(x);
        }
        lut
    }

    fn eval(&self, x: f32) -> f32 {
        if x <= self.points[0].0 {
            return self.points[0].1;
        }
        if x >= self.points[self.points.len() - 1].0 {
            return self.points[self.points.len() - 1].1;
        }
        for w in self.points.windows(2) {
            let (x0, y0) = w[0];
            let (x1, y1) = w[1];
            if x >= x0 && x <= x1 {
                if (x1 - x0).abs() < f32::EPSILON {
                    return y1;
                }
                let t = (x - x0) / (x1 - x0);
                return y0 + t * (y1 - y0);
            }
        }
        x
    }
}

impl Default for Curve {
    fn default() -> Self {
        Curve::identity()
    }
}

fn sample_lut(lut: &[f32; LUT_SIZE], value: f32) -> f32 {
    let clamped = value.clamp(0.0, 1.0);
    let pos = clamped * (LUT_SIZE - 1) as f32;
    let i0 = pos.floor() as usize;
    let i1 = (i0 + 1).min(LUT_SIZE - 1);
    let t = pos - i0 as f32;
    lut[i0] * (1.0 - t) + lut[i1] * t
}

/// Per-channel curve grade: master applied after each of R/G/B.
#[derive(Debug, Clone)]
pub struct Curves {
    /// Red channel curve.
    pub red: Curve,
    /// Green channel curve.
    pub green: Curve,
    /// Blue channel curve.
    pub blue: Curve,
    /// Master curve, applied after the per-channel curves.
    pub master: Curve,
}

impl Default for Curves {
    fn default() -> Self {
        Curves {
            red: Curve::identity(),
            green: Curve::identity(),
            blue: Curve::identity(),
            master: Curve::identity(),
        }
    }
}

impl Curves {
    /// Resets all four curves to identity.
    pub fn reset_curve(&mut self) {
        *self = Curves::default();
    }

    fn is_identity(&self) -> bool {
        self.red.is_identity() && self.green.is_identity() && self.blue.is_identity() && self.master.is_identity()
    }
}

impl Filter for Curves {
    fn type_name(&self) -> &'static str {
        "Curves"
    }

    fn process(&self, dst: &mut Bitmap, src: &Bitmap, _backend: &dyn ProcessingBackend) -> Result<bool> {
        if self.is_identity() {
            dst.data_mut().copy_from_slice(src.data());
            return Ok(false);
        }

        let channels = src.format().channel_count() as usize;
        let alpha = alpha_index(src.format());
        let mut data = to_f32(src)?;

        let channel_luts = [self.red.to_lut(), self.green.to_lut(), self.blue.to_lut()];
        let master_lut = self.master.to_lut();

        for pixel in data.chunks_mut(channels) {
            for c in 0..3.min(channels) {
                if Some(c) == alpha {
                    continue;
                }
                let graded = sample_lut(&channel_luts[c], pixel[c]);
                pixel[c] = sample_lut(&master_lut, graded);
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
        preset.curve_tables.insert("red".into(), self.red.points().to_vec());
        preset.curve_tables.insert("green".into(), self.green.points().to_vec());
        preset.curve_tables.insert("blue".into(), self.blue.points().to_vec());
        preset.curve_tables.insert("master".into(), self.master.points().to_vec());
        preset
    }

    fn from_preset(&mut self, preset: &FilterPreset) -> Result<()> {
        let get = |key: &str| -> Result<Curve> {
            let points = preset
                .curve_tables
                .get(key)
                .ok_or_else(|| Error::preset_parse(format!("missing curve '{key}' in preset '{}'", preset.name)))?;
            Curve::from_points(points.clone())
        };
        self.red = get("red")?;
        self.green = get("green")?;
        self.blue = get("blue")?;
        self.master = get("master")?;
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
    fn identity_curve_is_noop() {
        let curves = Curves::default();
        let mut src = Bitmap::new(PixelFormat::RGBA8, 1, 1).unwrap();
        src.data_mut().copy_from_slice(&[10, 20, 30, 255]);
        let mut dst = Bitmap::new(PixelFormat::RGBA8, 1, 1).unwrap();
        let changed = curves.process(&mut dst, &src, test_backend().as_ref()).unwrap();
        assert!(!changed);
        assert_eq!(dst.data(), src.data());
    }

    #[test]
    fn inverted_curve_flips_channel() {
        let mut curves = Curves::default();
        curves.master = Curve::from_points(vec![(0.0, 1.0), (1.0, 0.0)]).unwrap();
        let mut src = Bitmap::new(PixelFormat::RGBA8, 1, 1).unwrap();
        src.data_mut().copy_from_slice(&[0, 0, 0, 255]);
        let mut dst = Bitmap::new(PixelFormat::RGBA8, 1, 1).unwrap();
        curves.process(&mut dst, &src, test_backend().as_ref()).unwrap();
        assert_eq!(dst.data()[0], 255);
        assert_eq!(dst.data()[3], 255);
    }

    #[test]
    fn lut_resampling_is_monotonic_for_monotonic_curve() {
        let curve = Curve::from_points(vec![(0.0, 0.0), (0.5, 0.2), (1.0, 1.0)]).unwrap();
        let lut = curve.to_lut();
        for w in lut.windows(2) {
            assert!(w[1] >= w[0] - 1e-6);
        }
    }

    #[test]
    fn reset_curve_restores_identity() {
        let mut curves = Curves::default();
        curves.master = Curve::from_points(vec![(0.0, 1.0), (1.0, 0.0)]).unwrap();
        curves.reset_curve();
        assert!(curves.is_identity());
    }

    #[test]
    fn from_points_rejects_unsorted() {
        assert!(Curve::from_points(vec![(0.5, 0.0), (0.2, 1.0)]).is_err());
    }
}
