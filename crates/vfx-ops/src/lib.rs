//! # vfx-ops
//!
//! The filter operation library for the imaging runtime: the built-in
//! filters, the [`FilterStack`] ping-pong render protocol, and the
//! filter preset system.
//!
//! # Modules
//!
//! - [`filter_kind`] - the [`Filter`] capability trait and [`FilterTag`]
//!   enum presets route by
//! - [`filters`] - the six built-in filters (BW mixer, curves, cascaded
//!   sharpen, vignette, split-tone, film grain)
//! - [`filter_stack`] - [`FilterStack`]'s render order and ping-pong
//!   protocol
//! - [`preset`] - [`FilterPresetCollection`] and the `.bs` grammar
//!   parser/serializer
//! - [`filter`] - shared convolution/kernel helpers used by the cascaded
//!   sharpen and unsharp-mask filters
//! - [`pixel_buffer`] - per-pixel `f32` staging shared by every filter's
//!   CPU math
//!
//! # Example
//!
//! ```rust
//! use vfx_ops::{FilterStack, filters::Vignette};
//!
//! let mut stack = FilterStack::new();
//! stack.push(Box::new(Vignette::default()));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
pub mod filter;
pub mod pixel_buffer;
pub mod filter_kind;
pub mod filters;
pub mod filter_stack;
pub mod preset;

pub use error::{OpsError, OpsResult};
pub use filter_kind::{Filter, FilterPreset, FilterTag};
pub use filter_stack::{FilterStack, StackEntry};
pub use preset::FilterPresetCollection;
pub use filters::{BwAdaptiveMixer, CascadedSharpen, Curves, FilmGrain, SplitTone, Vignette};
