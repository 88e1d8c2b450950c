//! The `Pipeline` port: the session-side surface of import/export
//! collaborators. Concrete file-format codecs beyond the reference PNG
//! implementation are left to callers — only the trait contract and
//! format registry live here, plus one reference implementation (PNG,
//! via `vfx-io`'s existing codec) so the port is exercisable end to end.

use std::collections::HashMap;
use std::path::Path;

use vfx_core::bitmap::Bitmap;
use vfx_core::error::{Error, Result};
use vfx_core::pixel_format::{ChannelDepth, Family, PixelFormat};
use vfx_core::rect::Rect;

/// File formats the pipeline can route to a registered importer/exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// Windows bitmap.
    Bmp,
    /// JPEG.
    Jpeg,
    /// TIFF.
    Tiff,
    /// Portable Network Graphics.
    Png,
    /// WebP.
    Webp,
}

impl ImageFormat {
    /// Guesses a format from a path's extension. `None` if unrecognized.
    pub fn from_path(path: &Path) -> Option<ImageFormat> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Some(match ext.as_str() {
            "bmp" => ImageFormat::Bmp,
            "jpg" | "jpeg" => ImageFormat::Jpeg,
            "tif" | "tiff" => ImageFormat::Tiff,
            "png" => ImageFormat::Png,
            "webp" => ImageFormat::Webp,
            _ => return None,
        })
    }
}

/// Result of a successful import: the pixel data plus any metadata the
/// importer captured (currently just the stripped alpha plane, for the
/// export re-attachment contract).
pub struct ImportResult {
    /// The imported plane.
    pub bitmap: Bitmap,
    /// The alpha plane, if the importer had to strip it to produce
    /// `bitmap` (e.g. an importer that only emits non-alpha families).
    pub stripped_alpha: Option<Bitmap>,
}

/// An import collaborator for one file format.
pub trait Importer: Send + Sync {
    /// The format this importer handles.
    fn format(&self) -> ImageFormat;
    /// Reads `path` into a [`Bitmap`]. Fails with a pipeline error on a
    /// missing path or malformed file; session state is left unchanged by
    /// the caller regardless of the error.
    fn import(&self, path: &Path) -> Result<ImportResult>;
}

/// An export collaborator for one file format.
pub trait Exporter: Send + Sync {
    /// The format this exporter handles.
    fn format(&self) -> ImageFormat;
    /// Writes `bitmap` to `path`, re-attaching `alpha_plane` if given.
    fn export(&self, path: &Path, bitmap: &Bitmap, alpha_plane: Option<&Bitmap>) -> Result<()>;
}

/// Registry of importers/exporters keyed by [`ImageFormat`], plus
/// extension-based format detection. A concrete plugin-discovery
/// protocol is out of scope here, so registration is a direct
/// `Box<dyn _>` insert rather than dynamic loading.
#[derive(Default)]
pub struct Pipeline {
    importers: HashMap<ImageFormat, Box<dyn Importer>>,
    exporters: HashMap<ImageFormat, Box<dyn Exporter>>,
}

impl Pipeline {
    /// An empty pipeline with no registered formats.
    pub fn new() -> Self {
        Pipeline::default()
    }

    /// A pipeline with the reference PNG importer/exporter registered.
    /// BMP/JPEG/TIFF/WEBP have no built-in implementation but can be
    /// registered by a caller via [`Pipeline::register_importer`]/
    /// [`Pipeline::register_exporter`].
    pub fn with_default_formats() -> Self {
        let mut pipeline = Pipeline::new();
        pipeline.register_importer(Box::new(PngImporter));
        pipeline.register_exporter(Box::new(PngExporter));
        pipeline
    }

    /// Registers an importer, replacing any previously registered for the
    /// same format.
    pub fn register_importer(&mut self, importer: Box<dyn Importer>) {
        self.importers.insert(importer.format(), importer);
    }

    /// Registers an exporter, replacing any previously registered for the
    /// same format.
    pub fn register_exporter(&mut self, exporter: Box<dyn Exporter>) {
        self.exporters.insert(exporter.format(), exporter);
    }

    /// Imports `path`, detecting format from its extension. Fails with
    /// [`Error::Pipeline`] if the format is unrecognized or unregistered.
    pub fn import_from_path(&self, path: &Path) -> Result<ImportResult> {
        let format = ImageFormat::from_path(path)
            .ok_or_else(|| Error::pipeline(format!("cannot detect image format from path {}", path.display())))?;
        let importer = self
            .importers
            .get(&format)
            .ok_or_else(|| Error::pipeline(format!("no importer registered for {format:?}")))?;
        importer.import(path)
    }

    /// Exports `bitmap` to `path` in `format`, re-attaching `alpha_plane`
    /// if present. Returns `Ok(true)` on success, matching the
    /// boolean-return convention at the session-API surface.
    pub fn export_to_path(
        &self,
        path: &Path,
        format: ImageFormat,
        bitmap: &Bitmap,
        alpha_plane: Option<&Bitmap>,
    ) -> Result<bool> {
        let exporter = self
            .exporters
            .get(&format)
            .ok_or_else(|| Error::pipeline(format!("no exporter registered for {format:?}")))?;
        exporter.export(path, bitmap, alpha_plane)?;
        Ok(true)
    }
}

/// Reference PNG importer, bridging through `vfx-io`'s PNG codec.
struct PngImporter;

impl Importer for PngImporter {
    fn format(&self) -> ImageFormat {
        ImageFormat::Png
    }

    fn import(&self, path: &Path) -> Result<ImportResult> {
        let image = vfx_io::png::read(path).map_err(|e| Error::pipeline(e.to_string()))?;
        let bitmap = image_data_to_bitmap(&image)?;
        Ok(ImportResult {
            bitmap,
            stripped_alpha: None,
        })
    }
}

/// Reference PNG exporter.
struct PngExporter;

impl Exporter for PngExporter {
    fn format(&self) -> ImageFormat {
        ImageFormat::Png
    }

    fn export(&self, path: &Path, bitmap: &Bitmap, alpha_plane: Option<&Bitmap>) -> Result<()> {
        let merged = reattach_alpha(bitmap, alpha_plane)?;
        let image = bitmap_to_image_data(&merged)?;
        vfx_io::png::write(path, &image).map_err(|e| Error::pipeline(e.to_string()))
    }
}

/// Re-attaches a previously-stripped alpha plane into `bitmap`'s format.
/// `None` alpha is a no-op.
fn reattach_alpha(bitmap: &Bitmap, alpha_plane: Option<&Bitmap>) -> Result<Bitmap> {
    let full_rect = Rect::from_size(bitmap.width(), bitmap.height());
    let Some(alpha) = alpha_plane else {
        return bitmap.to_format(bitmap.format(), full_rect);
    };
    if alpha.width() != bitmap.width() || alpha.height() != bitmap.height() {
        return Err(Error::dimension_mismatch(
            (bitmap.width(), bitmap.height()),
            (alpha.width(), alpha.height()),
        ));
    }
    let target_family = match bitmap.format().family() {
        Family::Rgb => Family::Rgba,
        Family::Bgr => Family::Bgra,
        other => other,
    };
    let mut merged = bitmap.to_format(bitmap.format(), full_rect)?;
    merged.transform_format(PixelFormat::new(target_family, ChannelDepth::U8))?;
    let channels = merged.format().channel_count() as usize;
    let alpha_idx = merged.format().family().alpha_index();
    if let Some(alpha_idx) = alpha_idx {
        for (pixel, &a) in merged.data_mut().chunks_mut(channels).zip(alpha.data()) {
            pixel[alpha_idx] = a;
        }
    }
    Ok(merged)
}

fn image_data_to_bitmap(image: &vfx_io::ImageData) -> Result<Bitmap> {
    let family = match image.channels {
        1 => Family::Mono,
        3 => Family::Rgb,
        4 => Family::Rgba,
        n => return Err(Error::invalid_argument(format!("unsupported channel count {n}"))),
    };
    let format = PixelFormat::new(family, ChannelDepth::U8);
    let mut bitmap = Bitmap::new(format, image.width, image.height)?;
    bitmap.data_mut().copy_from_slice(&image.to_u8());
    Ok(bitmap)
}

fn bitmap_to_image_data(bitmap: &Bitmap) -> Result<vfx_io::ImageData> {
    let full_rect = Rect::from_size(bitmap.width(), bitmap.height());
    let mut normalized = bitmap.to_format(bitmap.format(), full_rect)?;
    if normalized.format().channel_depth() != ChannelDepth::U8 {
        normalized.transform_format(PixelFormat::new(normalized.format().family(), ChannelDepth::U8))?;
    }
    let channels = normalized.format().channel_count() as u32;
    Ok(vfx_io::ImageData::from_u8(
        normalized.width(),
        normalized.height(),
        channels,
        normalized.data().to_vec(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn checkerboard() -> Bitmap {
        let mut bmp = Bitmap::new(PixelFormat::RGBA8, 4, 4).unwrap();
        for (i, px) in bmp.data_mut().chunks_mut(4).enumerate() {
            let v = if (i % 2) == 0 { 0 } else { 255 };
            px.copy_from_slice(&[v, v, v, 255]);
        }
        bmp
    }

    #[test]
    fn format_from_path_recognizes_extensions() {
        assert_eq!(ImageFormat::from_path(Path::new("a.PNG")), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_path(Path::new("a.jpeg")), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_path(Path::new("a.unknown")), None);
    }

    #[test]
    fn png_round_trip_preserves_pixels() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.png");
        let pipeline = Pipeline::with_default_formats();
        let src = checkerboard();

        pipeline.export_to_path(&path, ImageFormat::Png, &src, None).unwrap();
        let result = pipeline.import_from_path(&path).unwrap();

        assert_eq!(result.bitmap.width(), src.width());
        assert_eq!(result.bitmap.height(), src.height());
        assert_eq!(result.bitmap.data(), src.data());
    }

    #[test]
    fn unregistered_format_fails_cleanly() {
        let pipeline = Pipeline::new();
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.png");
        let src = checkerboard();
        assert!(pipeline.export_to_path(&path, ImageFormat::Png, &src, None).is_err());
    }

    #[test]
    fn missing_path_import_fails() {
        let pipeline = Pipeline::with_default_formats();
        assert!(pipeline.import_from_path(Path::new("/nonexistent/path/x.png")).is_err());
    }
}
