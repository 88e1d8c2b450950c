//! GPU-backed tiled image storage.
//!
//! Large images are not uploaded to the GPU as one texture: VRAM budgets
//! and texture dimension limits make that unreliable for the multi-gigapixel
//! plates this engine targets. Instead a [`GpuImageObject`] splits the plane
//! into a fixed grid of 1024x1024 tiles (the last row/column clipped to the
//! image edge) and lets a [`ProcessingBackend`](crate::backend::ProcessingBackend)
//! upload/process/download tiles independently.
//!
//! The tile edge is fixed at 1024 rather than computed from detected
//! VRAM: the engine always tiles at a known size so filter kernels (e.g.
//! the cascaded sharpen's halo) can reason about a fixed tile border.

use vfx_core::error::{Error, Result};
use vfx_core::pixel_format::PixelFormat;
use vfx_core::rect::Rect;

use crate::backend::ProcessingBackend;

/// Edge length of one GPU tile, in pixels. Fixed rather than derived from
/// detected VRAM.
pub const TILE_SIZE: u32 = 1024;

/// One tile's position within the full plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileCoord {
    /// Tile column index.
    pub col: u32,
    /// Tile row index.
    pub row: u32,
}

impl TileCoord {
    /// The region of the full plane this tile covers, clipped to
    /// `(plane_width, plane_height)`.
    pub fn region(&self, plane_width: u32, plane_height: u32) -> Rect {
        let x = self.col * TILE_SIZE;
        let y = self.row * TILE_SIZE;
        let w = TILE_SIZE.min(plane_width.saturating_sub(x));
        let h = TILE_SIZE.min(plane_height.saturating_sub(y));
        Rect::new(x as i32, y as i32, w, h)
    }
}

/// Computes the `(cols, rows)` tile grid dimensions for a plane of size
/// `width x height`.
pub fn tile_grid(width: u32, height: u32) -> (u32, u32) {
    let cols = width.div_ceil(TILE_SIZE).max(1);
    let rows = height.div_ceil(TILE_SIZE).max(1);
    (cols, rows)
}

/// Iterates every [`TileCoord`] in row-major order for a plane of size
/// `width x height`.
pub fn enumerate_tiles(width: u32, height: u32) -> impl Iterator<Item = TileCoord> {
    let (cols, rows) = tile_grid(width, height);
    (0..rows).flat_map(move |row| (0..cols).map(move |col| TileCoord { col, row }))
}

struct Tile {
    handle: Box<dyn crate::backend::ImageHandle>,
}

/// GPU-resident pixel storage for one plane, split into a fixed grid of
/// [`TILE_SIZE`] tiles.
///
/// `GpuImageObject` always stores data as `f32` per the backend's
/// [`ProcessingBackend::upload`]/`download` contract; callers convert to/from
/// [`vfx_core::bitmap::Bitmap`]'s native format at the boundary.
pub struct GpuImageObject {
    width: u32,
    height: u32,
    channels: u32,
    cols: u32,
    rows: u32,
    tiles: Vec<Tile>,
}

impl GpuImageObject {
    /// Uploads `data` (row-major, `width * height * channels` f32 values)
    /// to the GPU, splitting it into tiles.
    ///
    /// `as_render_target` marks whether this upload backs a layer a filter
    /// will write into (a render target) as opposed to a read-only source
    /// (e.g. a mask sampled but never written on the GPU side). Mono
    /// layers are rejected only in the former case: most backends can
    /// happily sample a single-channel texture but can't bind it as a
    /// color attachment.
    ///
    /// Fails with [`Error::InvalidArgument`] if `format` is
    /// [`vfx_core::pixel_format::Family::Mono`] and `as_render_target` is
    /// set, or [`Error::BackendFailure`] if any tile upload fails (per the
    /// engine's contract, a failed upload leaves this layer's GPU side
    /// absent — the caller falls back to CPU storage).
    pub fn upload(
        backend: &dyn ProcessingBackend,
        data: &[f32],
        width: u32,
        height: u32,
        format: PixelFormat,
        as_render_target: bool,
    ) -> Result<Self> {
        if as_render_target && format.is_mono() {
            return Err(Error::invalid_argument(
                "Mono pixel format cannot be used as a GPU render target",
            ));
        }
        let channels = format.channel_count() as u32;
        if data.len() != (width as usize * height as usize * channels as usize) {
            return Err(Error::invalid_dimensions(width, height, "upload buffer size mismatch"));
        }

        let (cols, rows) = tile_grid(width, height);
        let mut tiles = Vec::with_capacity((cols * rows) as usize);

        for coord in enumerate_tiles(width, height) {
            let region = coord.region(width, height);
            let tile_data = extract_region(data, width, channels, region);
            let handle = backend
                .upload(&tile_data, region.width, region.height, channels)
                .map_err(|e| Error::backend_failure(e.to_string()))?;
            tiles.push(Tile { handle });
        }

        Ok(GpuImageObject {
            width,
            height,
            channels,
            cols,
            rows,
            tiles,
        })
    }

    /// Plane width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Plane height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Channel count.
    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Number of tile columns.
    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Number of tile rows.
    pub fn rows(&self) -> u32 {
        self.rows
    }

    fn tile_index(&self, coord: TileCoord) -> usize {
        (coord.row * self.cols + coord.col) as usize
    }

    /// Downloads and reassembles the full plane as row-major `f32` data.
    pub fn download(&self, backend: &dyn ProcessingBackend) -> Result<Vec<f32>> {
        let mut out = vec![0f32; self.width as usize * self.height as usize * self.channels as usize];
        for coord in enumerate_tiles(self.width, self.height) {
            let region = coord.region(self.width, self.height);
            let idx = self.tile_index(coord);
            let tile_data = backend
                .download(self.tiles[idx].handle.as_ref())
                .map_err(|e| Error::backend_failure(e.to_string()))?;
            insert_region(&mut out, self.width, self.channels, region, &tile_data);
        }
        Ok(out)
    }

    /// Applies `op` to every tile independently. Each tile carries its own
    /// halo-free border; callers needing cross-tile context (e.g. a blur
    /// radius larger than the tile edge) must pad tiles before upload. Most
    /// of this engine's filters operate per-pixel or with small kernels
    /// well under one tile, so no halo exchange is implemented.
    pub fn for_each_tile_mut(
        &mut self,
        backend: &dyn ProcessingBackend,
        mut op: impl FnMut(&dyn ProcessingBackend, &mut dyn crate::backend::ImageHandle) -> Result<()>,
    ) -> Result<()> {
        for tile in &mut self.tiles {
            op(backend, tile.handle.as_mut())?;
        }
        Ok(())
    }
}

/// Single in-flight GPU tile plus a full CPU mirror at logical dimensions.
///
/// Used in place of [`GpuImageObject`]'s full tile residency on devices
/// where uploading every tile at once is infeasible: only one tile is ever
/// resident on the backend, and [`switch_tile`](Self::switch_tile) reflects
/// the outgoing tile into the mirror before bringing the next one in.
pub struct StreamlinedGpuImage {
    width: u32,
    height: u32,
    channels: u32,
    mirror: Vec<f32>,
    active: Tile,
    active_coord: TileCoord,
}

impl StreamlinedGpuImage {
    /// Uploads `data` to the mirror and brings tile `(0, 0)` resident.
    ///
    /// See [`GpuImageObject::upload`] for `as_render_target`'s meaning.
    pub fn upload(
        backend: &dyn ProcessingBackend,
        data: &[f32],
        width: u32,
        height: u32,
        format: PixelFormat,
        as_render_target: bool,
    ) -> Result<Self> {
        if as_render_target && format.is_mono() {
            return Err(Error::invalid_argument(
                "Mono pixel format cannot be used as a GPU render target",
            ));
        }
        let channels = format.channel_count() as u32;
        if data.len() != (width as usize * height as usize * channels as usize) {
            return Err(Error::invalid_dimensions(width, height, "upload buffer size mismatch"));
        }

        let coord = TileCoord { col: 0, row: 0 };
        let region = coord.region(width, height);
        let tile_data = extract_region(data, width, channels, region);
        let handle = backend
            .upload(&tile_data, region.width, region.height, channels)
            .map_err(|e| Error::backend_failure(e.to_string()))?;

        Ok(StreamlinedGpuImage {
            width,
            height,
            channels,
            mirror: data.to_vec(),
            active: Tile { handle },
            active_coord: coord,
        })
    }

    /// Plane width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Plane height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Channel count.
    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Tile currently resident on the backend.
    pub fn active_tile(&self) -> TileCoord {
        self.active_coord
    }

    /// Full CPU mirror, row-major at logical dimensions.
    pub fn mirror(&self) -> &[f32] {
        &self.mirror
    }

    /// Reflects the active tile into the mirror, then brings tile
    /// `(nx, ny)` resident in its place.
    pub fn switch_tile(&mut self, backend: &dyn ProcessingBackend, nx: u32, ny: u32) -> Result<()> {
        self.synchronize(backend)?;

        let coord = TileCoord { col: nx, row: ny };
        let region = coord.region(self.width, self.height);
        let tile_data = extract_region(&self.mirror, self.width, self.channels, region);
        let handle = backend
            .upload(&tile_data, region.width, region.height, self.channels)
            .map_err(|e| Error::backend_failure(e.to_string()))?;

        self.active = Tile { handle };
        self.active_coord = coord;
        Ok(())
    }

    /// Downloads the active tile and folds it back into the mirror without
    /// changing which tile is resident.
    pub fn synchronize(&mut self, backend: &dyn ProcessingBackend) -> Result<()> {
        let region = self.active_coord.region(self.width, self.height);
        let tile_data = backend
            .download(self.active.handle.as_ref())
            .map_err(|e| Error::backend_failure(e.to_string()))?;
        insert_region(&mut self.mirror, self.width, self.channels, region, &tile_data);
        Ok(())
    }
}

/// A [`GpuImageObject`]'s residency strategy: every tile resident on the
/// backend at once, or a single active tile backed by a full CPU mirror.
pub enum Residency {
    /// All tiles uploaded and resident simultaneously.
    Full(GpuImageObject),
    /// One active tile, reflected into a CPU mirror on [`StreamlinedGpuImage::switch_tile`].
    Streamlined(StreamlinedGpuImage),
}

impl Residency {
    /// Plane width in pixels.
    pub fn width(&self) -> u32 {
        match self {
            Residency::Full(g) => g.width(),
            Residency::Streamlined(s) => s.width(),
        }
    }

    /// Plane height in pixels.
    pub fn height(&self) -> u32 {
        match self {
            Residency::Full(g) => g.height(),
            Residency::Streamlined(s) => s.height(),
        }
    }
}

fn extract_region(data: &[f32], plane_width: u32, channels: u32, region: Rect) -> Vec<f32> {
    let mut out = Vec::with_capacity(region.width as usize * region.height as usize * channels as usize);
    for y in 0..region.height {
        let row = (region.y as u32 + y) as usize;
        let row_start = (row * plane_width as usize + region.x as usize) * channels as usize;
        let row_len = region.width as usize * channels as usize;
        out.extend_from_slice(&data[row_start..row_start + row_len]);
    }
    out
}

fn insert_region(out: &mut [f32], plane_width: u32, channels: u32, region: Rect, tile_data: &[f32]) {
    for y in 0..region.height {
        let row = (region.y as u32 + y) as usize;
        let row_start = (row * plane_width as usize + region.x as usize) * channels as usize;
        let row_len = region.width as usize * channels as usize;
        let src_start = y as usize * row_len;
        out[row_start..row_start + row_len].copy_from_slice(&tile_data[src_start..src_start + row_len]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{create_backend, Backend};
    use vfx_core::pixel_format::PixelFormat;

    fn cpu_backend() -> Box<dyn ProcessingBackend> {
        create_backend(Backend::Cpu).unwrap()
    }

    #[test]
    fn tile_grid_exact_multiple() {
        assert_eq!(tile_grid(2048, 1024), (2, 1));
    }

    #[test]
    fn tile_grid_clips_remainder() {
        assert_eq!(tile_grid(1025, 1), (2, 1));
    }

    #[test]
    fn tile_region_clips_to_plane_edge() {
        let coord = TileCoord { col: 1, row: 0 };
        let region = coord.region(1500, 600);
        assert_eq!(region, Rect::new(1024, 0, 476, 600));
    }

    #[test]
    fn enumerate_tiles_row_major_order() {
        let coords: Vec<_> = enumerate_tiles(2048, 2048).collect();
        assert_eq!(coords.len(), 4);
        assert_eq!(coords[0], TileCoord { col: 0, row: 0 });
        assert_eq!(coords[1], TileCoord { col: 1, row: 0 });
        assert_eq!(coords[3], TileCoord { col: 1, row: 1 });
    }

    #[test]
    fn extract_then_insert_round_trips() {
        let width = 4u32;
        let height = 4u32;
        let channels = 1u32;
        let data: Vec<f32> = (0..16).map(|i| i as f32).collect();
        let region = Rect::new(1, 1, 2, 2);
        let extracted = extract_region(&data, width, channels, region);
        assert_eq!(extracted, vec![5.0, 6.0, 9.0, 10.0]);

        let mut out = vec![0f32; 16];
        insert_region(&mut out, width, channels, region, &extracted);
        assert_eq!(out[5], 5.0);
        assert_eq!(out[6], 6.0);
        assert_eq!(out[9], 9.0);
        assert_eq!(out[10], 10.0);
    }

    #[test]
    fn streamlined_upload_brings_first_tile_resident() {
        let backend = cpu_backend();
        let width = 1500u32;
        let height = 600u32;
        let channels = PixelFormat::RGBA8.channel_count() as u32;
        let data = vec![0.25f32; (width * height * channels) as usize];

        let streamlined =
            StreamlinedGpuImage::upload(backend.as_ref(), &data, width, height, PixelFormat::RGBA8, true).unwrap();

        assert_eq!(streamlined.active_tile(), TileCoord { col: 0, row: 0 });
        assert_eq!(streamlined.mirror().len(), data.len());
    }

    #[test]
    fn streamlined_switch_tile_reflects_edits_into_mirror() {
        let backend = cpu_backend();
        let width = 1500u32;
        let height = 600u32;
        let channels = PixelFormat::RGBA8.channel_count() as u32;
        let data = vec![0.0f32; (width * height * channels) as usize];

        let mut streamlined =
            StreamlinedGpuImage::upload(backend.as_ref(), &data, width, height, PixelFormat::RGBA8, true).unwrap();

        // Switching away from (0,0) must synchronize it into the mirror first.
        streamlined.switch_tile(backend.as_ref(), 1, 0).unwrap();
        assert_eq!(streamlined.active_tile(), TileCoord { col: 1, row: 0 });

        // The mirror still reflects the original all-zero upload since no
        // tile contents changed, only which tile is resident.
        assert!(streamlined.mirror().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn residency_width_height_delegate_to_variant() {
        let backend = cpu_backend();
        let width = 1024u32;
        let height = 1024u32;
        let channels = PixelFormat::RGBA8.channel_count() as u32;
        let data = vec![0.0f32; (width * height * channels) as usize];

        let full = GpuImageObject::upload(backend.as_ref(), &data, width, height, PixelFormat::RGBA8, true).unwrap();
        let residency = Residency::Full(full);
        assert_eq!(residency.width(), width);
        assert_eq!(residency.height(), height);

        let streamlined =
            StreamlinedGpuImage::upload(backend.as_ref(), &data, width, height, PixelFormat::RGBA8, true).unwrap();
        let residency = Residency::Streamlined(streamlined);
        assert_eq!(residency.width(), width);
        assert_eq!(residency.height(), height);
    }
}
