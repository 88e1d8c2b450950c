//! `Image`: an ordered list of named [`ImageLayer`]s sharing one format,
//! plus mask registration.
//!
//! Groups related layer data under one umbrella object, built around
//! whole [`ImageLayer`]s rather than per-channel groups. Layers are kept
//! in a plain `Vec` in append order: the most recently appended layer is
//! the top of the stack ([`Image::top_layer`]), the first is the bottom
//! ([`Image::bottom_layer`]); [`Image::move_layer`]'s `offset` is relative
//! to that same append-order indexing, positive moving a layer later
//! (toward the top).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use vfx_core::error::{Error, Result};
use vfx_core::pixel_format::PixelFormat;

use crate::backend::ProcessingBackend;
use crate::image_layer::{ImageLayer, MaskMode, SharedImageLayer};

/// A single-channel mask, validated at registration time and then shared
/// (by [`Image::set_mask`]) with every [`ImageLayer`] it's assigned to.
pub struct Mask {
    layer: ImageLayer,
}

impl Mask {
    /// Wraps a Mono8/Mono16 layer as a mask. Fails if `layer`'s format
    /// isn't a mono family.
    pub fn new(layer: ImageLayer) -> Result<Self> {
        if !layer.format().is_mono() {
            return Err(Error::invalid_argument("mask layer must use a Mono pixel format"));
        }
        Ok(Mask { layer })
    }
}

/// An ordered list of named [`ImageLayer`]s that all share one pixel
/// format and plane size.
///
/// Appending a layer whose `(width, height, format)` doesn't match the
/// image's is rejected rather than silently reformatted — callers convert
/// explicitly first.
pub struct Image {
    format: PixelFormat,
    width: u32,
    height: u32,
    layers: Vec<ImageLayer>,
    masks: HashMap<String, SharedImageLayer>,
    /// Scale factor recorded when this image's top layer is a downsampled
    /// preview built from an oversized original, so a later full-resolution
    /// export can recompute the same preview geometry without re-deriving
    /// it from the budget formula.
    preview_template_scale: Option<f32>,
}

impl Image {
    /// Creates an empty image of the given plane size and format.
    pub fn new(format: PixelFormat, width: u32, height: u32) -> Self {
        Image {
            format,
            width,
            height,
            layers: Vec::new(),
            masks: HashMap::new(),
            preview_template_scale: None,
        }
    }

    /// Pixel format shared by every layer in this image.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Plane width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Plane height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of layers.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Appends `layer` to the top of the stack. Fails with
    /// [`Error::DimensionMismatch`]/[`Error::ChannelMismatch`] if its
    /// `(width, height)` or `format` don't match this image.
    pub fn push_layer(&mut self, layer: ImageLayer) -> Result<()> {
        self.check_compatible(&layer)?;
        self.layers.push(layer);
        Ok(())
    }

    /// Appends `layer` like [`Image::push_layer`], additionally requiring
    /// that it already carries data for `backend` once appended — an
    /// existing layer sharing that backend's residency is assumed to back
    /// the same render path, so a fresh append is brought up to date with
    /// it rather than silently lagging one step behind.
    pub fn append_layer_with_compatible_device(
        &mut self,
        mut layer: ImageLayer,
        backend: &dyn ProcessingBackend,
    ) -> Result<()> {
        self.check_compatible(&layer)?;
        if !self.layers.is_empty() && !self.layers.iter().any(|l| l.contains_data_for_backend(backend.name())) {
            return Err(Error::invalid_argument(format!(
                "no existing layer carries data for backend '{}'",
                backend.name()
            )));
        }
        layer.update_data_for_backend(backend)?;
        self.layers.push(layer);
        Ok(())
    }

    fn check_compatible(&self, layer: &ImageLayer) -> Result<()> {
        if layer.width() != self.width || layer.height() != self.height {
            return Err(Error::dimension_mismatch(
                (self.width, self.height),
                (layer.width(), layer.height()),
            ));
        }
        if layer.format() != self.format {
            return Err(Error::channel_mismatch(self.format.channel_count(), layer.format().channel_count()));
        }
        Ok(())
    }

    /// Layer at `index`, append order, `None` if out of range.
    pub fn layer(&self, index: usize) -> Option<&ImageLayer> {
        self.layers.get(index)
    }

    /// Mutable access to the layer at `index`.
    pub fn layer_mut(&mut self, index: usize) -> Option<&mut ImageLayer> {
        self.layers.get_mut(index)
    }

    /// Finds a layer by name.
    pub fn layer_by_name(&self, name: &str) -> Option<&ImageLayer> {
        self.layers.iter().find(|l| l.name() == name)
    }

    /// Finds a mutable layer by name.
    pub fn layer_by_name_mut(&mut self, name: &str) -> Option<&mut ImageLayer> {
        self.layers.iter_mut().find(|l| l.name() == name)
    }

    /// Removes the layer named `name`, if present.
    pub fn remove_layer(&mut self, name: &str) -> Option<ImageLayer> {
        let idx = self.layers.iter().position(|l| l.name() == name)?;
        Some(self.layers.remove(idx))
    }

    /// Iterates layers in append order (bottom to top).
    pub fn layers(&self) -> impl Iterator<Item = &ImageLayer> {
        self.layers.iter()
    }

    /// Topmost layer (most recently appended), if any.
    pub fn top_layer(&self) -> Option<&ImageLayer> {
        self.layers.last()
    }

    /// Bottommost layer (first appended), if any.
    pub fn bottom_layer(&self) -> Option<&ImageLayer> {
        self.layers.first()
    }

    /// Appends a duplicate of the top layer, returning its new index.
    /// No-op returning `None` if the image has no layers.
    pub fn clone_top_layer(&mut self) -> Option<usize> {
        let dup = self.layers.last()?.duplicate();
        self.layers.push(dup);
        Some(self.layers.len() - 1)
    }

    /// Appends a duplicate of the bottom layer, returning its new index.
    /// No-op returning `None` if the image has no layers.
    pub fn clone_bottom_layer(&mut self) -> Option<usize> {
        let dup = self.layers.first()?.duplicate();
        self.layers.push(dup);
        Some(self.layers.len() - 1)
    }

    /// Moves the layer named `name` by `offset` positions (positive
    /// toward the top, i.e. toward the end of the append-order list).
    /// Fails if `name` is unknown or the move would fall out of bounds.
    pub fn move_layer(&mut self, name: &str, offset: i32) -> Result<()> {
        let from = self
            .layers
            .iter()
            .position(|l| l.name() == name)
            .ok_or_else(|| Error::invalid_argument(format!("no layer named '{name}'")))?;
        let to = from as i64 + offset as i64;
        if to < 0 || to >= self.layers.len() as i64 {
            return Err(Error::invalid_argument(format!(
                "move_layer: offset {offset} from index {from} is out of bounds"
            )));
        }
        let layer = self.layers.remove(from);
        self.layers.insert(to as usize, layer);
        Ok(())
    }

    /// Swaps the stack positions of the layers named `a` and `b`.
    pub fn switch_layers(&mut self, a: &str, b: &str) -> Result<()> {
        let ia = self
            .layers
            .iter()
            .position(|l| l.name() == a)
            .ok_or_else(|| Error::invalid_argument(format!("no layer named '{a}'")))?;
        let ib = self
            .layers
            .iter()
            .position(|l| l.name() == b)
            .ok_or_else(|| Error::invalid_argument(format!("no layer named '{b}'")))?;
        self.layers.swap(ia, ib);
        Ok(())
    }

    /// All layers whose format is `format`.
    pub fn layers_by_format(&self, format: PixelFormat) -> Vec<&ImageLayer> {
        self.layers.iter().filter(|l| l.format() == format).collect()
    }

    /// All layers whose plane size is `(width, height)`.
    pub fn layers_by_size(&self, width: u32, height: u32) -> Vec<&ImageLayer> {
        self.layers.iter().filter(|l| l.width() == width && l.height() == height).collect()
    }

    /// All layers matching `(format, width, height)` exactly.
    pub fn layers_matching(&self, format: PixelFormat, width: u32, height: u32) -> Vec<&ImageLayer> {
        self.layers
            .iter()
            .filter(|l| l.format() == format && l.width() == width && l.height() == height)
            .collect()
    }

    /// All layers currently carrying data resident on `backend_name`
    /// ("CPU" or a GPU backend's name).
    pub fn layers_resident_on(&self, backend_name: &str) -> Vec<&ImageLayer> {
        self.layers.iter().filter(|l| l.contains_data_for_backend(backend_name)).collect()
    }

    /// Registers `mask` under `name`, independent of any layer's lifetime,
    /// so several layers may share one mask.
    pub fn set_mask(&mut self, name: impl Into<String>, mask: Mask) {
        self.masks.insert(name.into(), Arc::new(Mutex::new(mask.layer)));
    }

    /// Associates a previously-registered mask with a layer by name, using
    /// `mode` to control blending. Fails if either name is unregistered.
    pub fn assign_mask(&mut self, layer_name: &str, mask_name: &str, mode: MaskMode) -> Result<()> {
        let mask = self
            .masks
            .get(mask_name)
            .cloned()
            .ok_or_else(|| Error::invalid_argument(format!("no mask named '{mask_name}'")))?;
        let layer = self
            .layers
            .iter_mut()
            .find(|l| l.name() == layer_name)
            .ok_or_else(|| Error::invalid_argument(format!("no layer named '{layer_name}'")))?;
        layer.set_mask(mask);
        layer.set_mask_mode(mode);
        Ok(())
    }

    /// Applies the mask assigned to `layer_name` (if any) by blending
    /// `masked`'s content into the layer using the mask's associated
    /// `MaskMode`. No-op if no mask is assigned.
    pub fn apply_mask(&mut self, backend: &dyn ProcessingBackend, layer_name: &str, masked: &[f32]) -> Result<()> {
        let layer = self
            .layers
            .iter_mut()
            .find(|l| l.name() == layer_name)
            .ok_or_else(|| Error::invalid_argument(format!("no layer named '{layer_name}'")))?;
        layer.apply_mask(backend, masked)?;
        Ok(())
    }

    /// Records that the top layer is a downsampled preview built at
    /// `scale` (preview dimension / original dimension) from an oversized
    /// original, so a later full-resolution export can recompute the same
    /// preview geometry directly.
    pub fn mark_preview_template(&mut self, scale: f32) {
        self.preview_template_scale = Some(scale);
    }

    /// The scale factor recorded by [`Image::mark_preview_template`], if any.
    pub fn preview_template_scale(&self) -> Option<f32> {
        self.preview_template_scale
    }

    /// Clears any preview-template marker.
    pub fn clear_preview_template(&mut self) {
        self.preview_template_scale = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{create_backend, Backend};

    fn cpu() -> Box<dyn ProcessingBackend> {
        create_backend(Backend::Cpu).unwrap()
    }

    fn named_layer(name: &str, format: PixelFormat, w: u32, h: u32) -> ImageLayer {
        let mut layer = ImageLayer::empty(format);
        layer.reset(format, w, h).unwrap();
        layer.set_name(name);
        layer
    }

    #[test]
    fn push_layer_rejects_dimension_mismatch() {
        let mut image = Image::new(PixelFormat::RGBA8, 4, 4);
        let layer = named_layer("a", PixelFormat::RGBA8, 8, 8);
        assert!(image.push_layer(layer).is_err());
    }

    #[test]
    fn push_layer_accepts_matching_format() {
        let mut image = Image::new(PixelFormat::RGBA8, 4, 4);
        image.push_layer(named_layer("a", PixelFormat::RGBA8, 4, 4)).unwrap();
        assert_eq!(image.layer_count(), 1);
    }

    #[test]
    fn layer_by_name_finds_layer() {
        let mut image = Image::new(PixelFormat::RGBA8, 2, 2);
        image.push_layer(named_layer("base", PixelFormat::RGBA8, 2, 2)).unwrap();
        assert!(image.layer_by_name("base").is_some());
        assert!(image.layer_by_name("missing").is_none());
    }

    #[test]
    fn top_and_bottom_track_append_order() {
        let mut image = Image::new(PixelFormat::RGBA8, 2, 2);
        image.push_layer(named_layer("first", PixelFormat::RGBA8, 2, 2)).unwrap();
        image.push_layer(named_layer("second", PixelFormat::RGBA8, 2, 2)).unwrap();
        assert_eq!(image.bottom_layer().unwrap().name(), "first");
        assert_eq!(image.top_layer().unwrap().name(), "second");
    }

    #[test]
    fn clone_top_layer_appends_a_duplicate() {
        let mut image = Image::new(PixelFormat::RGBA8, 2, 2);
        image.push_layer(named_layer("a", PixelFormat::RGBA8, 2, 2)).unwrap();
        let idx = image.clone_top_layer().unwrap();
        assert_eq!(idx, 1);
        assert_eq!(image.layer_count(), 2);
    }

    #[test]
    fn move_layer_shifts_position() {
        let mut image = Image::new(PixelFormat::RGBA8, 2, 2);
        image.push_layer(named_layer("a", PixelFormat::RGBA8, 2, 2)).unwrap();
        image.push_layer(named_layer("b", PixelFormat::RGBA8, 2, 2)).unwrap();
        image.push_layer(named_layer("c", PixelFormat::RGBA8, 2, 2)).unwrap();
        image.move_layer("a", 2).unwrap();
        assert_eq!(image.layer(2).unwrap().name(), "a");
        assert!(image.move_layer("a", 5).is_err());
    }

    #[test]
    fn switch_layers_swaps_positions() {
        let mut image = Image::new(PixelFormat::RGBA8, 2, 2);
        image.push_layer(named_layer("a", PixelFormat::RGBA8, 2, 2)).unwrap();
        image.push_layer(named_layer("b", PixelFormat::RGBA8, 2, 2)).unwrap();
        image.switch_layers("a", "b").unwrap();
        assert_eq!(image.layer(0).unwrap().name(), "b");
        assert_eq!(image.layer(1).unwrap().name(), "a");
    }

    #[test]
    fn grouping_queries_filter_by_attribute() {
        let mut image = Image::new(PixelFormat::RGBA8, 2, 2);
        image.push_layer(named_layer("a", PixelFormat::RGBA8, 2, 2)).unwrap();
        image.push_layer(named_layer("b", PixelFormat::RGBA8, 2, 2)).unwrap();
        assert_eq!(image.layers_by_format(PixelFormat::RGBA8).len(), 2);
        assert_eq!(image.layers_by_size(2, 2).len(), 2);
        assert_eq!(image.layers_matching(PixelFormat::RGBA8, 2, 2).len(), 2);
    }

    #[test]
    fn append_layer_with_compatible_device_requires_shared_backend() {
        let backend = cpu();
        let mut image = Image::new(PixelFormat::RGBA8, 2, 2);
        image.push_layer(named_layer("a", PixelFormat::RGBA8, 2, 2)).unwrap();
        // "a" only has CPU data (from reset/push_layer), so CPU is a
        // shared backend and this append should succeed.
        image
            .append_layer_with_compatible_device(named_layer("b", PixelFormat::RGBA8, 2, 2), backend.as_ref())
            .unwrap();
        assert_eq!(image.layer_count(), 2);
    }

    #[test]
    fn assign_mask_requires_both_registered() {
        let mut image = Image::new(PixelFormat::RGBA8, 2, 2);
        image.push_layer(named_layer("base", PixelFormat::RGBA8, 2, 2)).unwrap();
        assert!(image.assign_mask("base", "nope", MaskMode::Blend).is_err());
    }

    #[test]
    fn apply_mask_blends_toward_masked_value() {
        let mut image = Image::new(PixelFormat::MONO8, 1, 1);
        image.push_layer(named_layer("l", PixelFormat::MONO8, 1, 1)).unwrap();

        let mut mask_layer = ImageLayer::empty(PixelFormat::MONO8);
        mask_layer.reset(PixelFormat::MONO8, 1, 1).unwrap();
        let backend = cpu();
        mask_layer.bitmap_mut(backend.as_ref()).unwrap().data_mut()[0] = 255;
        image.set_mask("m", Mask::new(mask_layer).unwrap());
        image.assign_mask("l", "m", MaskMode::Blend).unwrap();
        image.apply_mask(backend.as_ref(), "l", &[1.0]).unwrap();
        assert_eq!(image.layer_by_name_mut("l").unwrap().bitmap(backend.as_ref()).unwrap().data()[0], 255);
    }

    #[test]
    fn preview_template_marker_round_trips() {
        let mut image = Image::new(PixelFormat::RGBA8, 2, 2);
        assert!(image.preview_template_scale().is_none());
        image.mark_preview_template(0.5);
        assert_eq!(image.preview_template_scale(), Some(0.5));
        image.clear_preview_template();
        assert!(image.preview_template_scale().is_none());
    }
}
