//! # vfx-io
//!
//! Image codec support for the imaging runtime's pipeline port.
//!
//! This crate provides the format-agnostic [`ImageData`] container and the
//! [`FormatReader`]/[`FormatWriter`] trait pair, plus a concrete PNG codec
//! ([`png`]) bridged into the runtime by `vfx_session::Pipeline`'s default
//! importer/exporter.
//!
//! # Metadata
//!
//! Formats extract metadata into [`Attrs`], a typed attribute container:
//!
//! ```ignore
//! use vfx_io::png;
//!
//! let image = png::read("photo.png")?;
//! if let Some(gamma) = image.metadata.attrs.get_f32("Gamma") {
//!     println!("Gamma: {}", gamma);
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
mod traits;

pub mod attrs;
pub mod png;

pub use error::{IoError, IoResult};
pub use traits::{FormatCapability, FormatReader, FormatWriter, ReadSeek, WriteSeek};
pub use attrs::{Attrs, AttrValue};

/// Image data container for I/O operations.
///
/// A format-agnostic container that holds pixel data along with metadata.
/// It can represent various bit depths and channel configurations.
///
/// # Example
///
/// ```
/// use vfx_io::{ImageData, PixelFormat};
///
/// let image = ImageData::new(1920, 1080, 3, PixelFormat::F32);
/// assert_eq!(image.pixel_count(), 1920 * 1080);
/// ```
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Number of channels (3 for RGB, 4 for RGBA).
    pub channels: u32,
    /// Pixel data format.
    pub format: PixelFormat,
    /// Raw pixel data.
    pub data: PixelData,
    /// Image metadata.
    pub metadata: Metadata,
}

/// Pixel data format.
///
/// Describes the numeric type and bit depth of pixel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit unsigned integer per channel (0-255).
    U8,
    /// 16-bit unsigned integer per channel (0-65535).
    U16,
    /// 16-bit float per channel (half precision).
    F16,
    /// 32-bit float per channel (full precision).
    F32,
}

/// Raw pixel data storage.
///
/// The variant matches the [`PixelFormat`].
#[derive(Debug, Clone)]
pub enum PixelData {
    /// 8-bit unsigned data.
    U8(Vec<u8>),
    /// 16-bit unsigned data.
    U16(Vec<u16>),
    /// 32-bit float data (also used for F16 after conversion).
    F32(Vec<f32>),
}

/// Image metadata container.
///
/// Stores both common metadata fields and format-specific attributes.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    /// Color space name (e.g., "sRGB", "linear").
    pub colorspace: Option<String>,
    /// Gamma value if applicable.
    pub gamma: Option<f32>,
    /// DPI/PPI for print.
    pub dpi: Option<f32>,
    /// Typed attributes (format-specific).
    pub attrs: Attrs,
}

impl ImageData {
    /// Creates a new ImageData with the given dimensions and format.
    ///
    /// Pixel data is initialized to zero.
    pub fn new(width: u32, height: u32, channels: u32, format: PixelFormat) -> Self {
        let size = (width * height * channels) as usize;
        let data = match format {
            PixelFormat::U8 => PixelData::U8(vec![0u8; size]),
            PixelFormat::U16 => PixelData::U16(vec![0u16; size]),
            PixelFormat::F16 | PixelFormat::F32 => PixelData::F32(vec![0.0f32; size]),
        };

        Self {
            width,
            height,
            channels,
            format,
            data,
            metadata: Metadata::default(),
        }
    }

    /// Creates ImageData from f32 pixel data.
    pub fn from_f32(width: u32, height: u32, channels: u32, data: Vec<f32>) -> Self {
        Self {
            width,
            height,
            channels,
            format: PixelFormat::F32,
            data: PixelData::F32(data),
            metadata: Metadata::default(),
        }
    }

    /// Creates ImageData from u8 pixel data.
    pub fn from_u8(width: u32, height: u32, channels: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels,
            format: PixelFormat::U8,
            data: PixelData::U8(data),
            metadata: Metadata::default(),
        }
    }

    /// Returns the total number of pixels.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    /// Returns the total number of samples (pixels * channels).
    #[inline]
    pub fn sample_count(&self) -> usize {
        (self.width * self.height * self.channels) as usize
    }

    /// Converts pixel data to f32 (for processing).
    ///
    /// Values are normalized to 0.0-1.0 range for integer formats.
    pub fn to_f32(&self) -> Vec<f32> {
        match &self.data {
            PixelData::U8(data) => data.iter().map(|&v| v as f32 / 255.0).collect(),
            PixelData::U16(data) => data.iter().map(|&v| v as f32 / 65535.0).collect(),
            PixelData::F32(data) => data.clone(),
        }
    }

    /// Converts pixel data to u8 (for display/saving).
    ///
    /// Float values are clamped to 0.0-1.0 and scaled to 0-255.
    pub fn to_u8(&self) -> Vec<u8> {
        match &self.data {
            PixelData::U8(data) => data.clone(),
            PixelData::U16(data) => data.iter().map(|&v| (v >> 8) as u8).collect(),
            PixelData::F32(data) => data.iter().map(|&v| (v.clamp(0.0, 1.0) * 255.0) as u8).collect(),
        }
    }

    /// Converts pixel data to u16 (for 16-bit output).
    ///
    /// Float values are clamped to 0.0-1.0 and scaled to 0-65535.
    pub fn to_u16(&self) -> Vec<u16> {
        match &self.data {
            PixelData::U8(data) => data.iter().map(|&v| (v as u16) << 8 | v as u16).collect(),
            PixelData::U16(data) => data.clone(),
            PixelData::F32(data) => data.iter().map(|&v| (v.clamp(0.0, 1.0) * 65535.0) as u16).collect(),
        }
    }
}

impl PixelFormat {
    /// Returns bytes per channel for this format.
    #[inline]
    pub fn bytes_per_channel(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 | Self::F16 => 2,
            Self::F32 => 4,
        }
    }

    /// Returns true if this is a floating-point format.
    #[inline]
    pub fn is_float(&self) -> bool {
        matches!(self, Self::F16 | Self::F32)
    }
}
