//! # vfx-core
//!
//! Core types for the imaging runtime: pixel formats, rectangles, the
//! pooled byte allocator, bitmaps, and the shared error type.
//!
//! - [`PixelFormat`] - runtime-tagged pixel layout (`family x channelDepth`)
//! - [`Bitmap`] - the CPU-resident pixel plane built on `PixelFormat`
//! - [`Rect`], [`Roi`] - region of interest types with signed coordinates
//! - [`Allocator`], [`Blob`] - pooled byte-buffer allocation
//! - [`Error`], [`Result`] - the error taxonomy shared by every crate
//!
//! ## Crate Structure
//!
//! `vfx-core` is the foundation of the workspace and has no internal
//! dependencies. All other crates depend on it:
//!
//! ```text
//! vfx-core (this crate)
//!    ^
//!    |
//!    +-- vfx-compute (GPU tile storage, image layers)
//!    +-- vfx-ops (filters, filter stack, presets)
//!    +-- vfx-io (import/export pipeline)
//!    +-- vfx-session (session/action model)
//!    +-- vfx-cli
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod allocator;
pub mod bitmap;
pub mod error;
pub mod pixel_format;
pub mod rect;

// Re-exports for convenience.
pub use allocator::{Allocator, Blob};
pub use bitmap::Bitmap;
pub use error::*;
pub use pixel_format::{ChannelDepth, Family, PixelFormat};
pub use rect::*;

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```
/// use vfx_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::allocator::{Allocator, Blob};
    pub use crate::bitmap::Bitmap;
    pub use crate::error::{Error, Result};
    pub use crate::pixel_format::{ChannelDepth, Family, PixelFormat};
    pub use crate::rect::{Rect, Roi};
}
