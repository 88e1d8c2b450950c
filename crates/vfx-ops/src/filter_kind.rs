//! The [`Filter`] trait and the six built-in filters' shared preset
//! scaffolding.
//!
//! The trait's `process(dst, src)` / `to_preset()` / `from_preset()` shape
//! mirrors the convolution idiom (`Kernel`, `convolve`) reused by
//! [`crate::filters::cascaded_sharpen`]'s unsharp-mask passes.

use std::collections::BTreeMap;

use vfx_core::bitmap::Bitmap;
use vfx_core::error::Result;
use vfx_compute::backend::{FilterOp, ProcessingBackend};

/// A named bag of parameters a [`Filter`] can serialize itself into, and
/// restore itself from.
///
/// Mirrors `FilterPreset`'s structural-equality value bag: separate maps
/// per value kind rather than one `enum`-valued map, so presets round-trip
/// through the textual `.bs` grammar ([`crate::preset`]) without a tagged
/// union.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPreset {
    /// Name of the filter type this preset applies to (`"BWAdaptiveMixer"`,
    /// `"Curves"`, ...).
    pub filter_name: String,
    /// Preset's own name (as distinct from the filter type it targets).
    pub name: String,
    /// Scalar float parameters.
    pub floats: BTreeMap<String, f32>,
    /// Scalar integer parameters.
    pub ints: BTreeMap<String, i64>,
    /// String parameters.
    pub strings: BTreeMap<String, String>,
    /// 2-D point parameters, e.g. vignette center.
    pub points: BTreeMap<String, (f32, f32)>,
    /// Curve tables: ordered list of `(x, y)` control points.
    pub curve_tables: BTreeMap<String, Vec<(f32, f32)>>,
}

impl FilterPreset {
    /// An empty preset naming `filter_name`/`name`.
    pub fn new(filter_name: impl Into<String>, name: impl Into<String>) -> Self {
        FilterPreset {
            filter_name: filter_name.into(),
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Polymorphic image filter: {BWAdaptiveMixer, Curves, CascadedSharpen,
/// Vignette, SplitTone, FilmGrain}.
///
/// `process` always receives CPU-resident bitmaps, so every filter must
/// implement this path regardless of which device `backend` names.
/// `backend` is passed through so a filter can key per-device cached state
/// (see `CascadedSharpen`'s blur-buffer cache) and so [`FilterStack::render`]
/// can try [`Filter::gpu_op`]'s on-device route first when `backend` isn't
/// the CPU backend.
///
/// [`FilterStack::render`]: crate::filter_stack::FilterStack::render
pub trait Filter: Send + Sync {
    /// Stable type name, used as `FilterPreset::filter_name` and in the
    /// textual preset grammar.
    fn type_name(&self) -> &'static str;

    /// Runs this filter, writing into `dst` (which must already be sized
    /// and formatted to match `src`). Returns `Ok(true)` on success,
    /// `Ok(false)` if the filter is a no-op at its current parameters
    /// (identity curve, zero strength, ...).
    fn process(&self, dst: &mut Bitmap, src: &Bitmap, backend: &dyn ProcessingBackend) -> Result<bool>;

    /// The on-device operation this filter's current parameters correspond
    /// to, if any. `None` (the default) means this filter has no on-device
    /// route and always runs through [`Filter::process`].
    fn gpu_op(&self) -> Option<FilterOp> {
        None
    }

    /// Deep-clones this filter's parameters into a fresh boxed instance.
    fn clone_box(&self) -> Box<dyn Filter>;

    /// Serializes this filter's current parameters into a preset named
    /// `name`.
    fn to_preset(&self, name: &str) -> FilterPreset;

    /// Restores this filter's parameters from `preset`. Fails with
    /// [`vfx_core::error::Error::PresetParse`] if `preset.filter_name`
    /// doesn't match [`Filter::type_name`] or a required key is missing.
    fn from_preset(&mut self, preset: &FilterPreset) -> Result<()>;
}

impl Clone for Box<dyn Filter> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Enumerated filter identity used to route presets to the right filter
/// instance, independent of a filter's position in the stack.
///
/// Backs the session's tag-based associate/enable/disable surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterTag {
    /// `BWAdaptiveMixer`.
    BwMixer,
    /// `Curves`.
    Curves,
    /// `CascadedSharpen`.
    CascadedSharpen,
    /// `Vignette`.
    Vignette,
    /// `SplitTone`.
    SplitTone,
    /// `FilmGrain`.
    FilmGrain,
    /// Any filter type not in the built-in taxonomy.
    Other,
}

impl FilterTag {
    /// Maps a [`Filter::type_name`] to its tag, falling back to
    /// [`FilterTag::Other`] for unrecognized names.
    pub fn from_type_name(name: &str) -> FilterTag {
        match name {
            "BWAdaptiveMixer" => FilterTag::BwMixer,
            "Curves" => FilterTag::Curves,
            "CascadedSharpen" => FilterTag::CascadedSharpen,
            "Vignette" => FilterTag::Vignette,
            "SplitTone" => FilterTag::SplitTone,
            "FilmGrain" => FilterTag::FilmGrain,
            _ => FilterTag::Other,
        }
    }
}

#[cfg(test)]
mod tag_tests {
    use super::*;

    #[test]
    fn known_names_map_to_their_tag() {
        assert_eq!(FilterTag::from_type_name("Vignette"), FilterTag::Vignette);
        assert_eq!(FilterTag::from_type_name("SplitTone"), FilterTag::SplitTone);
    }

    #[test]
    fn unknown_name_falls_back_to_other() {
        assert_eq!(FilterTag::from_type_name("SomeCustomFilter"), FilterTag::Other);
    }
}

pub(crate) fn require_float(preset: &FilterPreset, key: &str) -> Result<f32> {
    preset
        .floats
        .get(key)
        .copied()
        .ok_or_else(|| vfx_core::error::Error::preset_parse(format!("missing float '{key}' in preset '{}'", preset.name)))
}

pub(crate) fn require_point(preset: &FilterPreset, key: &str) -> Result<(f32, f32)> {
    preset
        .points
        .get(key)
        .copied()
        .ok_or_else(|| vfx_core::error::Error::preset_parse(format!("missing point '{key}' in preset '{}'", preset.name)))
}

pub(crate) fn require_int(preset: &FilterPreset, key: &str) -> Result<i64> {
    preset
        .ints
        .get(key)
        .copied()
        .ok_or_else(|| vfx_core::error::Error::preset_parse(format!("missing int '{key}' in preset '{}'", preset.name)))
}
