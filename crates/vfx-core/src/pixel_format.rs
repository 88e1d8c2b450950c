//! Runtime pixel format registry.
//!
//! Unlike a compile-time generic pixel type, [`PixelFormat`] is a plain
//! value: it travels inside [`crate::bitmap::Bitmap`] and
//! `ImageLayer`/`Image` so format can be inspected, stored in presets, and
//! round-tripped without monomorphizing every operation over a type
//! parameter.

use crate::error::{Error, Result};

/// Channel arrangement and semantic meaning of a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Single luminance/mask channel.
    Mono,
    /// Red, green, blue.
    Rgb,
    /// Red, green, blue, alpha.
    Rgba,
    /// Alpha, red, green, blue.
    Argb,
    /// Blue, green, red.
    Bgr,
    /// Blue, green, red, alpha.
    Bgra,
}

impl Family {
    /// Number of channels this family carries.
    pub const fn channel_count(self) -> u8 {
        match self {
            Family::Mono => 1,
            Family::Rgb | Family::Bgr => 3,
            Family::Rgba | Family::Argb | Family::Bgra => 4,
        }
    }

    /// `true` if this family has a dedicated alpha channel.
    pub const fn has_alpha(self) -> bool {
        matches!(self, Family::Rgba | Family::Argb | Family::Bgra)
    }

    /// Index of the alpha channel within a pixel, if any.
    pub const fn alpha_index(self) -> Option<usize> {
        match self {
            Family::Argb => Some(0),
            Family::Rgba | Family::Bgra => Some(3),
            _ => None,
        }
    }

    /// The family obtained by stripping this family's alpha channel.
    pub const fn without_alpha(self) -> Option<Family> {
        match self {
            Family::Argb | Family::Rgba => Some(Family::Rgb),
            Family::Bgra => Some(Family::Bgr),
            _ => None,
        }
    }
}

/// Per-channel storage representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelDepth {
    /// Unsigned 8-bit.
    U8,
    /// Unsigned 16-bit.
    U16,
    /// Signed 16-bit.
    S16,
    /// Unsigned 32-bit.
    U32,
    /// Signed 32-bit.
    S32,
    /// IEEE-754 single precision float.
    F32,
}

impl ChannelDepth {
    /// Size of one channel in bytes.
    pub const fn bytes(self) -> u32 {
        match self {
            ChannelDepth::U8 => 1,
            ChannelDepth::U16 | ChannelDepth::S16 => 2,
            ChannelDepth::U32 | ChannelDepth::S32 | ChannelDepth::F32 => 4,
        }
    }

    /// `true` for floating-point channels.
    pub const fn is_float(self) -> bool {
        matches!(self, ChannelDepth::F32)
    }

    /// Maximum representable value for integer depths, normalized to `1.0`
    /// for float depths.
    pub fn max_value(self) -> f32 {
        match self {
            ChannelDepth::U8 => u8::MAX as f32,
            ChannelDepth::U16 => u16::MAX as f32,
            ChannelDepth::S16 => i16::MAX as f32,
            ChannelDepth::U32 => u32::MAX as f32,
            ChannelDepth::S32 => i32::MAX as f32,
            ChannelDepth::F32 => 1.0,
        }
    }
}

/// A tagged pixel format: `family × channelDepth × channelCount`.
///
/// `channelCount` is derived from `family` (invariant: it always equals
/// `family.channel_count()`); it is not stored separately to make that
/// invariant unrepresentable-by-construction rather than checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelFormat {
    family: Family,
    channel_depth: ChannelDepth,
}

impl PixelFormat {
    /// 8-bit single channel, e.g. a mask or luma plane.
    pub const MONO8: PixelFormat = PixelFormat::new(Family::Mono, ChannelDepth::U8);
    /// 16-bit single channel.
    pub const MONO16: PixelFormat = PixelFormat::new(Family::Mono, ChannelDepth::U16);
    /// 8-bit RGB, no alpha.
    pub const RGB8: PixelFormat = PixelFormat::new(Family::Rgb, ChannelDepth::U8);
    /// 8-bit RGBA.
    pub const RGBA8: PixelFormat = PixelFormat::new(Family::Rgba, ChannelDepth::U8);
    /// 32-bit float RGBA, the canonical two-hop pivot format for
    /// [`crate::bitmap::Bitmap::transform_format`].
    pub const RGBA32F: PixelFormat = PixelFormat::new(Family::Rgba, ChannelDepth::F32);
    /// 32-bit float RGB.
    pub const RGB32F: PixelFormat = PixelFormat::new(Family::Rgb, ChannelDepth::F32);

    /// Construct a pixel format. `channelCount` is implied by `family` so
    /// there is no way to construct an inconsistent value.
    pub const fn new(family: Family, channel_depth: ChannelDepth) -> Self {
        PixelFormat {
            family,
            channel_depth,
        }
    }

    /// Pixel family.
    pub const fn family(self) -> Family {
        self.family
    }

    /// Per-channel storage depth.
    pub const fn channel_depth(self) -> ChannelDepth {
        self.channel_depth
    }

    /// Number of channels, derived from `family`.
    pub const fn channel_count(self) -> u8 {
        self.family.channel_count()
    }

    /// Bytes per channel.
    pub const fn channel_size(self) -> u32 {
        self.channel_depth.bytes()
    }

    /// Bytes per pixel: `channelCount * channelDepth.bytes`.
    pub const fn pixel_size(self) -> u32 {
        self.channel_count() as u32 * self.channel_size()
    }

    /// `true` if this format carries a dedicated alpha channel.
    pub const fn has_alpha(self) -> bool {
        self.family.has_alpha()
    }

    /// `true` if `family` is [`Family::Mono`] (restricted from use as a
    /// GPU render target).
    pub const fn is_mono(self) -> bool {
        matches!(self.family, Family::Mono)
    }

    /// The format obtained by stripping the alpha channel, if any.
    pub fn without_alpha(self) -> Result<PixelFormat> {
        let family = self
            .family
            .without_alpha()
            .ok_or_else(|| Error::unsupported_format(format!("{self:?} has no alpha channel")))?;
        Ok(PixelFormat::new(family, self.channel_depth))
    }

    /// The format obtained by adding a 4th alpha channel to a 3-channel
    /// family, keeping the same channel depth.
    pub fn with_alpha(self) -> Result<PixelFormat> {
        let family = match self.family {
            Family::Rgb => Family::Rgba,
            Family::Bgr => Family::Bgra,
            _ => {
                return Err(Error::unsupported_format(format!(
                    "{self:?} cannot have alpha added"
                )))
            }
        };
        Ok(PixelFormat::new(family, self.channel_depth))
    }

    /// Byte offset of channel `index` within one pixel. Used by
    /// `copyChannel`/`discardChannel`.
    pub fn channel_offset(self, index: u8) -> Result<u32> {
        if index >= self.channel_count() {
            return Err(Error::channel_mismatch(self.channel_count(), index));
        }
        Ok(index as u32 * self.channel_size())
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{}", self.family, self.channel_depth.bytes() * 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_count_matches_family() {
        assert_eq!(PixelFormat::RGBA8.channel_count(), 4);
        assert_eq!(PixelFormat::RGB8.channel_count(), 3);
        assert_eq!(PixelFormat::MONO8.channel_count(), 1);
    }

    #[test]
    fn pixel_size_derivation() {
        assert_eq!(PixelFormat::RGBA8.pixel_size(), 4);
        assert_eq!(PixelFormat::RGBA32F.pixel_size(), 16);
        assert_eq!(PixelFormat::MONO16.pixel_size(), 2);
    }

    #[test]
    fn alpha_round_trip() {
        let rgba = PixelFormat::RGB8.with_alpha().unwrap();
        assert_eq!(rgba, PixelFormat::RGBA8);
        let rgb = rgba.without_alpha().unwrap();
        assert_eq!(rgb, PixelFormat::RGB8);
    }

    #[test]
    fn mono_has_no_alpha() {
        assert!(PixelFormat::MONO8.without_alpha().is_err());
    }

    #[test]
    fn argb_alpha_index_is_zero() {
        assert_eq!(Family::Argb.alpha_index(), Some(0));
        assert_eq!(Family::Rgba.alpha_index(), Some(3));
        assert_eq!(Family::Bgra.alpha_index(), Some(3));
        assert_eq!(Family::Rgb.alpha_index(), None);
    }

    #[test]
    fn channel_offset_out_of_range() {
        assert!(PixelFormat::RGB8.channel_offset(3).is_err());
        assert!(PixelFormat::RGB8.channel_offset(2).is_ok());
    }
}
