//! The preview controller: downsampling budget and frame-rate gate for
//! [`crate::session::Session::update_preview`].
//!
//! A megapixel budget scaled by a quality factor decides whether the
//! original image is previewed directly or downsampled, and a monotonic
//! frame timer throttles re-renders to a maximum FPS.

use std::time::{Duration, Instant};

use tracing::debug;
use vfx_core::bitmap::Bitmap;
use vfx_core::error::Result;
use vfx_ops::pixel_buffer::{to_f32, write_f32};

/// Step by which the scale factor is reduced each iteration while
/// searching for a budget-fitting preview size.
const SCALE_STEP: f32 = 0.015;

/// Decides preview geometry and gates how often it is re-rendered.
pub struct PreviewController {
    max_megapixels: f64,
    quality: f32,
    max_fps: f32,
    last_render: Option<Instant>,
    is_scaled_down: bool,
    scale_factor: f32,
}

impl Default for PreviewController {
    fn default() -> Self {
        PreviewController {
            max_megapixels: 50.0,
            quality: 1.0,
            max_fps: 30.0,
            last_render: None,
            is_scaled_down: false,
            scale_factor: 1.0,
        }
    }
}

impl PreviewController {
    /// A controller with the given budget/quality/rate-limit.
    pub fn new(max_megapixels: f64, quality: f32, max_fps: f32) -> Self {
        PreviewController {
            max_megapixels,
            quality: quality.clamp(f32::EPSILON, 1.0),
            max_fps: max_fps.max(1.0),
            ..PreviewController::default()
        }
    }

    /// `maxMegapixels · quality`, the effective budget for this controller.
    pub fn adjusted_max_megapixels(&self) -> f64 {
        self.max_megapixels * self.quality as f64
    }

    /// `true` if the most recently computed preview was downsampled from
    /// the original.
    pub fn is_scaled_down(&self) -> bool {
        self.is_scaled_down
    }

    /// The scale factor (1.0 = full resolution) used for the most
    /// recently computed preview.
    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    /// `true` if enough time has elapsed since the last render to allow
    /// another one at `maxFPS`, or `force` is set. Does not itself update
    /// the timer — call [`PreviewController::mark_rendered`] after the
    /// render actually runs.
    pub fn should_render(&self, force: bool) -> bool {
        if force {
            return true;
        }
        match self.last_render {
            None => true,
            Some(last) => {
                let min_interval = Duration::from_secs_f32(1.0 / self.max_fps);
                last.elapsed() >= min_interval
            }
        }
    }

    /// Records that a render just completed, resetting the frame timer.
    pub fn mark_rendered(&mut self) {
        self.last_render = Some(Instant::now());
    }

    /// Computes the preview image for `original`, downsampling through a
    /// box-averaging area sampler when `original` exceeds the adjusted
    /// budget. Updates [`PreviewController::is_scaled_down`]/
    /// [`PreviewController::scale_factor`] as a side effect.
    pub fn compute_preview(&mut self, original: &Bitmap) -> Result<Bitmap> {
        let adjusted_max = self.adjusted_max_megapixels();
        let original_mp = (original.width() as f64 * original.height() as f64) / 1_000_000.0;

        if original_mp <= adjusted_max {
            self.is_scaled_down = false;
            self.scale_factor = 1.0;
            return original.to_format(
                original.format(),
                vfx_core::rect::Rect::from_size(original.width(), original.height()),
            );
        }

        let mut scale = 1.0f32;
        loop {
            scale -= SCALE_STEP;
            if scale <= SCALE_STEP {
                scale = SCALE_STEP;
                break;
            }
            let scaled_mp = original_mp * (scale as f64).powi(2);
            if scaled_mp <= adjusted_max {
                break;
            }
        }

        let dst_w = ((original.width() as f32 * scale).round() as u32).max(1);
        let dst_h = ((original.height() as f32 * scale).round() as u32).max(1);
        debug!(scale, dst_w, dst_h, "downsampling preview");

        let preview = area_sample(original, dst_w, dst_h)?;
        self.is_scaled_down = true;
        self.scale_factor = scale;
        Ok(preview)
    }
}

/// Box-filter area downsample: each destination pixel is the unweighted
/// average of the source block it covers, generalizing a simple 2x2
/// sampler to the non-integer scale the budget search can land on.
fn area_sample(src: &Bitmap, dst_w: u32, dst_h: u32) -> Result<Bitmap> {
    let channels = src.format().channel_count() as usize;
    let src_w = src.width() as usize;
    let src_h = src.height() as usize;
    let src_data = to_f32(src)?;

    let mut dst_data = vec![0f32; dst_w as usize * dst_h as usize * channels];
    let x_scale = src_w as f32 / dst_w as f32;
    let y_scale = src_h as f32 / dst_h as f32;

    for dy in 0..dst_h as usize {
        let y0 = ((dy as f32) * y_scale).floor() as usize;
        let y1 = (((dy + 1) as f32) * y_scale).ceil().min(src_h as f32) as usize;
        let y1 = y1.max(y0 + 1);
        for dx in 0..dst_w as usize {
            let x0 = ((dx as f32) * x_scale).floor() as usize;
            let x1 = (((dx + 1) as f32) * x_scale).ceil().min(src_w as f32) as usize;
            let x1 = x1.max(x0 + 1);

            let mut sum = vec![0f32; channels];
            let mut count = 0f32;
            for sy in y0..y1.min(src_h) {
                for sx in x0..x1.min(src_w) {
                    let base = (sy * src_w + sx) * channels;
                    for c in 0..channels {
                        sum[c] += src_data[base + c];
                    }
                    count += 1.0;
                }
            }
            let dst_base = (dy * dst_w as usize + dx) * channels;
            for c in 0..channels {
                dst_data[dst_base + c] = if count > 0.0 { sum[c] / count } else { 0.0 };
            }
        }
    }

    let mut out = Bitmap::new(src.format(), dst_w, dst_h)?;
    write_f32(&mut out, &dst_data)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfx_core::pixel_format::PixelFormat;

    fn solid(value: u8, size: u32) -> Bitmap {
        let mut bmp = Bitmap::new(PixelFormat::RGBA8, size, size).unwrap();
        bmp.data_mut().fill(value);
        bmp
    }

    #[test]
    fn under_budget_uses_original_size() {
        let mut controller = PreviewController::new(50.0, 1.0, 30.0);
        let original = solid(128, 64);
        let preview = controller.compute_preview(&original).unwrap();
        assert_eq!((preview.width(), preview.height()), (64, 64));
        assert!(!controller.is_scaled_down());
    }

    #[test]
    fn over_budget_downsamples() {
        let mut controller = PreviewController::new(0.01, 1.0, 30.0);
        let original = solid(200, 512);
        let preview = controller.compute_preview(&original).unwrap();
        assert!(preview.width() < original.width());
        assert!(controller.is_scaled_down());
        assert!(controller.scale_factor() < 1.0);
    }

    #[test]
    fn area_sample_of_constant_image_stays_constant() {
        let src = solid(100, 16);
        let out = area_sample(&src, 4, 4).unwrap();
        assert!(out.data().iter().all(|&b| (b as i32 - 100).abs() <= 1));
    }

    #[test]
    fn should_render_allows_first_call_and_force() {
        let controller = PreviewController::default();
        assert!(controller.should_render(false));
        assert!(controller.should_render(true));
    }

    #[test]
    fn should_render_throttles_rapid_calls() {
        let mut controller = PreviewController::new(50.0, 1.0, 1.0);
        controller.mark_rendered();
        assert!(!controller.should_render(false));
        assert!(controller.should_render(true));
    }
}
