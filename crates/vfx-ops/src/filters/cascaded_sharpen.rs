//! `CascadedSharpen`: `cascadeCount` independent unsharp-mask passes
//! additively accumulated into the destination.
//!
//! Each cascade's blur step reuses `filter::{Kernel::gaussian, convolve}`
//! rather than a second hand-rolled separable pass. The blurred buffer for
//! a given cascade/backend/size is cached, since it only changes when the
//! cascade list or the source dimensions change.

use std::collections::HashMap;
use std::sync::Mutex;

use vfx_compute::backend::ProcessingBackend;
use vfx_core::bitmap::Bitmap;
use vfx_core::error::{Error, Result};

use crate::filter::{convolve, Kernel};
use crate::filter_kind::{require_float, require_int, Filter, FilterPreset};
use crate::pixel_buffer::{alpha_index, to_f32, write_f32};

/// Maximum number of cascades a single filter instance may hold.
pub const MAX_CASCADES: usize = 8;

/// Key identifying one cached blurred buffer: the backend it was computed
/// for, the cascade's position, and the source dimensions it was blurred
/// at.
type BlurCacheKey = (String, usize, u32, u32);

/// One unsharp-mask cascade's parameters.
#[derive(Debug, Clone, Copy)]
pub struct Cascade {
    /// Gaussian blur radius for this cascade's low-pass pass.
    pub blur_radius: f32,
    /// How strongly this cascade's high-frequency detail is added back.
    pub strength: f32,
}

/// Additive multi-radius unsharp mask.
///
/// Each cascade's blurred buffer is cached per backend/size so repeated
/// renders at the same resolution (the common preview-scrubbing case)
/// skip the convolution. The cache is cleared whenever the cascade list
/// changes.
#[derive(Debug)]
pub struct CascadedSharpen {
    cascades: Vec<Cascade>,
    blur_cache: Mutex<HashMap<BlurCacheKey, Vec<f32>>>,
}

impl Clone for CascadedSharpen {
    fn clone(&self) -> Self {
        CascadedSharpen {
            cascades: self.cascades.clone(),
            blur_cache: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for CascadedSharpen {
    fn default() -> Self {
        CascadedSharpen {
            cascades: vec![Cascade {
                blur_radius: 2.0,
                strength: 0.5,
            }],
            blur_cache: Mutex::new(HashMap::new()),
        }
    }
}

impl CascadedSharpen {
    /// Creates a cascaded sharpen from explicit cascades. Fails if more
    /// than [`MAX_CASCADES`] are given.
    pub fn new(cascades: Vec<Cascade>) -> Result<Self> {
        if cascades.len() > MAX_CASCADES {
            return Err(Error::invalid_argument(format!(
                "cascade count {} exceeds maximum {MAX_CASCADES}",
                cascades.len()
            )));
        }
        Ok(CascadedSharpen {
            cascades,
            blur_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Current cascades.
    pub fn cascades(&self) -> &[Cascade] {
        &self.cascades
    }

    /// Replaces the cascade list, invalidating every cached blur buffer
    /// (radii may have changed, so nothing in the cache can be trusted).
    pub fn update_cascades(&mut self, cascades: Vec<Cascade>) -> Result<()> {
        if cascades.len() > MAX_CASCADES {
            return Err(Error::invalid_argument(format!(
                "cascade count {} exceeds maximum {MAX_CASCADES}",
                cascades.len()
            )));
        }
        self.cascades = cascades;
        self.invalidate_blur_cache();
        Ok(())
    }

    /// Drops every cached blurred buffer, forcing recomputation on the
    /// next render regardless of backend or size.
    pub fn invalidate_blur_cache(&mut self) {
        self.blur_cache.get_mut().unwrap().clear();
    }

    /// Drops cached blurred buffers belonging to `backend_name`, leaving
    /// other backends' cached state intact. Call this when a backend's
    /// device context is torn down so stale buffers aren't retained past
    /// its lifetime.
    pub fn delete_blur_buffers_for_backend(&mut self, backend_name: &str) {
        self.blur_cache.get_mut().unwrap().retain(|(name, ..), _| name != backend_name);
    }
}

fn kernel_size_for_radius(radius: f32) -> usize {
    let size = (radius * 3.0).ceil() as usize * 2 + 1;
    size.max(3)
}

impl CascadedSharpen {
    /// Returns cascade `index`'s blurred buffer for `base`, computing and
    /// caching it under `(backend_name, index, width, height)` on a miss.
    fn blurred_buffer(
        &self,
        index: usize,
        cascade: &Cascade,
        base: &[f32],
        width: usize,
        height: usize,
        channels: usize,
        backend_name: &str,
    ) -> Result<Vec<f32>> {
        let key = (backend_name.to_string(), index, width as u32, height as u32);
        let mut cache = self
            .blur_cache
            .lock()
            .map_err(|_| Error::other("cascaded sharpen blur cache poisoned"))?;
        if let Some(cached) = cache.get(&key) {
            return Ok(cached.clone());
        }
        let kernel = Kernel::gaussian(kernel_size_for_radius(cascade.blur_radius), cascade.blur_radius.max(0.01));
        let blurred = convolve(base, width, height, channels, &kernel).map_err(|e| Error::pipeline(e.to_string()))?;
        cache.insert(key, blurred.clone());
        Ok(blurred)
    }
}

impl Filter for CascadedSharpen {
    fn type_name(&self) -> &'static str {
        "CascadedSharpen"
    }

    fn process(&self, dst: &mut Bitmap, src: &Bitmap, backend: &dyn ProcessingBackend) -> Result<bool> {
        if self.cascades.is_empty() {
            dst.data_mut().copy_from_slice(src.data());
            return Ok(false);
        }

        let width = src.width() as usize;
        let height = src.height() as usize;
        let channels = src.format().channel_count() as usize;
        let alpha = alpha_index(src.format());
        let base = to_f32(src)?;
        let mut accum = base.clone();

        for (index, cascade) in self.cascades.iter().enumerate() {
            let blurred = self.blurred_buffer(index, cascade, &base, width, height, channels, backend.name())?;

            for (i, (a, (&b, &bl))) in accum.iter_mut().zip(base.iter().zip(blurred.iter())).enumerate() {
                if Some(i % channels) == alpha {
                    continue;
                }
                let detail = b - bl;
                *a += cascade.strength * detail;
            }
        }

        for v in &mut accum {
            *v = v.clamp(0.0, 1.0);
        }

        write_f32(dst, &accum)?;
        Ok(true)
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }

    fn to_preset(&self, name: &str) -> FilterPreset {
        let mut preset = FilterPreset::new(self.type_name(), name);
        preset.ints.insert("cascadeCount".into(), self.cascades.len() as i64);
        for (i, cascade) in self.cascades.iter().enumerate() {
            preset.floats.insert(format!("blurRadius{i}"), cascade.blur_radius);
            preset.floats.insert(format!("strength{i}"), cascade.strength);
        }
        preset
    }

    fn from_preset(&mut self, preset: &FilterPreset) -> Result<()> {
        let count = require_int(preset, "cascadeCount")? as usize;
        if count > MAX_CASCADES {
            return Err(Error::preset_parse(format!("cascadeCount {count} exceeds maximum {MAX_CASCADES}")));
        }
        let mut cascades = Vec::with_capacity(count);
        for i in 0..count {
            let blur_radius = require_float(preset, &format!("blurRadius{i}"))?;
            let strength = require_float(preset, &format!("strength{i}"))?;
            cascades.push(Cascade { blur_radius, strength });
        }
        self.cascades = cascades;
        self.invalidate_blur_cache();
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
    fn empty_cascades_is_noop() {
        let sharpen = CascadedSharpen::new(vec![]).unwrap();
        let mut src = Bitmap::new(PixelFormat::RGBA8, 2, 2).unwrap();
        src.data_mut().fill(100);
        let mut dst = Bitmap::new(PixelFormat::RGBA8, 2, 2).unwrap();
        let changed = sharpen.process(&mut dst, &src, test_backend().as_ref()).unwrap();
        assert!(!changed);
        assert_eq!(dst.data(), src.data());
    }

    #[test]
    fn too_many_cascades_rejected() {
        let cascades = vec![Cascade { blur_radius: 1.0, strength: 0.1 }; MAX_CASCADES + 1];
        assert!(CascadedSharpen::new(cascades).is_err());
    }

    #[test]
    fn process_on_flat_image_is_identity() {
        let sharpen = CascadedSharpen::default();
        let mut src = Bitmap::new(PixelFormat::RGBA8, 8, 8).unwrap();
        src.data_mut().fill(128);
        let mut dst = Bitmap::new(PixelFormat::RGBA8, 8, 8).unwrap();
        sharpen.process(&mut dst, &src, test_backend().as_ref()).unwrap();
        // A flat image has no high-frequency detail to amplify.
        for &v in dst.data() {
            assert!((v as i32 - 128).abs() <= 1);
        }
    }

    #[test]
    fn repeated_render_reuses_cached_blur() {
        let sharpen = CascadedSharpen::default();
        let mut src = Bitmap::new(PixelFormat::RGBA8, 8, 8).unwrap();
        for (i, b) in src.data_mut().iter_mut().enumerate() {
            *b = (i % 255) as u8;
        }
        let backend = test_backend();
        let mut dst_a = Bitmap::new(PixelFormat::RGBA8, 8, 8).unwrap();
        let mut dst_b = Bitmap::new(PixelFormat::RGBA8, 8, 8).unwrap();
        sharpen.process(&mut dst_a, &src, backend.as_ref()).unwrap();
        sharpen.process(&mut dst_b, &src, backend.as_ref()).unwrap();
        assert_eq!(dst_a.data(), dst_b.data());
        assert_eq!(sharpen.blur_cache.lock().unwrap().len(), 1);
    }

    #[test]
    fn update_cascades_invalidates_cache() {
        let mut sharpen = CascadedSharpen::default();
        let mut src = Bitmap::new(PixelFormat::RGBA8, 8, 8).unwrap();
        src.data_mut().fill(64);
        let mut dst = Bitmap::new(PixelFormat::RGBA8, 8, 8).unwrap();
        sharpen.process(&mut dst, &src, test_backend().as_ref()).unwrap();
        assert!(!sharpen.blur_cache.lock().unwrap().is_empty());
        sharpen.update_cascades(vec![Cascade { blur_radius: 4.0, strength: 0.2 }]).unwrap();
        assert!(sharpen.blur_cache.lock().unwrap().is_empty());
    }

    #[test]
    fn preset_round_trip() {
        let sharpen = CascadedSharpen::new(vec![
            Cascade { blur_radius: 1.0, strength: 0.3 },
            Cascade { blur_radius: 3.0, strength: 0.1 },
        ])
        .unwrap();
        let preset = sharpen.to_preset("sharp1");
        let mut restored = CascadedSharpen::default();
        restored.from_preset(&preset).unwrap();
        assert_eq!(restored.cascades().len(), 2);
        assert_eq!(restored.cascades()[1].blur_radius, 3.0);
    }
}
