//! The six built-in filters.

pub mod bw_mixer;
pub mod cascaded_sharpen;
pub mod curves;
pub mod film_grain;
pub mod split_tone;
pub mod vignette;

pub use bw_mixer::BwAdaptiveMixer;
pub use cascaded_sharpen::CascadedSharpen;
pub use curves::Curves;
pub use film_grain::FilmGrain;
pub use split_tone::SplitTone;
pub use vignette::Vignette;

use crate::filter_kind::{Filter, FilterTag};

/// Builds a default-parameterized filter for every tag except
/// [`FilterTag::Other`], which has no single built-in type to construct.
/// Used to materialize a filter a preset names but that isn't yet present
/// in a session's stack.
pub fn default_for_tag(tag: FilterTag) -> Option<Box<dyn Filter>> {
    match tag {
        FilterTag::BwMixer => Some(Box::new(BwAdaptiveMixer::default())),
        FilterTag::Curves => Some(Box::new(Curves::default())),
        FilterTag::CascadedSharpen => Some(Box::new(CascadedSharpen::default())),
        FilterTag::Vignette => Some(Box::new(Vignette::default())),
        FilterTag::SplitTone => Some(Box::new(SplitTone::default())),
        FilterTag::FilmGrain => Some(Box::new(FilmGrain::default())),
        FilterTag::Other => None,
    }
}
