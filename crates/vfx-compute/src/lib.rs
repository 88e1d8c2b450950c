//! Multi-backend tiled image compute layer: the GPU tile image, the
//! [`ImageLayer`] multi-backend plane, and the [`Image`] layer list.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Image (ordered layer list)                      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │               ImageLayer (multi-backend plane)                   │
//! ├──────────────────────────────┬────────────────────────────────────┤
//! │   CPU backend object          │   GpuImageObject (tiled)           │
//! │   (vfx_core::Bitmap)           │   Full | Streamlined residency     │
//! └──────────────────────────────┴────────────────────────────────────┘
//! ```
//!
//! Backend selection and dispatch live in [`backend`]; [`ProcessingBackend`]
//! is the façade a [`vfx_session::Session`](../vfx_session/struct.Session.html)
//! owns per device.
//!
//! # Feature Flags
//!
//! - `wgpu` - Enable GPU acceleration via wgpu (Vulkan/Metal/DX12)

pub mod backend;
pub mod image_layer;
pub mod layered_image;
pub mod tile_image;

pub use backend::{Backend, ProcessingBackend};
pub use image_layer::{ImageLayer, MaskMode, SharedImageLayer};
pub use layered_image::{Image, Mask};
pub use tile_image::{
    GpuImageObject, Residency, TileCoord, TILE_SIZE, enumerate_tiles, tile_grid,
};

use thiserror::Error;

/// GPU operation errors
#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("Failed to create device: {0}")]
    DeviceCreation(String),

    #[error("Failed to create buffer: {0}")]
    BufferCreation(String),

    #[error("Failed to compile shader: {0}")]
    ShaderCompilation(String),

    #[error("Buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Image too large: {width}x{height} exceeds GPU limit {limit}")]
    ImageTooLarge { width: u32, height: u32, limit: u32 },

    #[error("Invalid dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),

    #[error("GPU operation failed: {0}")]
    OperationFailed(String),
}

pub type ComputeResult<T> = Result<T, ComputeError>;
