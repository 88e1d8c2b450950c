//! [`Session`]: the application core that owns the backend façade, the
//! original/preview images, the filter stack and its presets, and the
//! thread pool actions run on.
//!
//! Built around CPU [`Bitmap`]s directly rather than a full GPU-backed
//! `ImageLayer`/`Image` graph: every built-in filter still processes
//! `Bitmap`s on the CPU, but [`Session::set_backend`]/[`Session::set_preview_backend`]
//! let a caller switch either render path onto a GPU
//! [`vfx_compute::backend::ProcessingBackend`], which
//! [`vfx_ops::filter_stack::FilterStack::render`] (by way of
//! [`vfx_ops::filter_kind::Filter::gpu_op`]) dispatches to for filters
//! that support it, falling back to the CPU path otherwise.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use tracing::{info, instrument, warn};

use vfx_core::bitmap::Bitmap;
use vfx_core::error::{Error, Result};
use vfx_core::pixel_format::PixelFormat;
use vfx_core::rect::Rect;
use vfx_compute::backend::{create_backend, Backend as ComputeBackend, ProcessingBackend};
use vfx_ops::filter_kind::{Filter, FilterPreset, FilterTag};
use vfx_ops::filters::default_for_tag;
use vfx_ops::filter_stack::FilterStack;
use vfx_ops::preset::FilterPresetCollection;

use crate::action::{Action, ActionKind};
use crate::pipeline::{ImageFormat, ImportResult, Pipeline};
use crate::preview::PreviewController;

const DEFAULT_MAX_THREADS: usize = 4;

/// Per-stack-entry bookkeeping that isn't already tracked by
/// [`vfx_ops::filter_stack::StackEntry`]: the filter's tag (for
/// preset-by-tag lookup) and its dirty bit.
///
/// Invariant maintained by every [`Session`] mutator: `filter_meta.len() ==
/// filter_stack.len()`, index-for-index.
#[derive(Debug, Clone, Copy)]
struct FilterMeta {
    tag: FilterTag,
    dirty: bool,
}

/// A read-only, `serde`-serializable view of a session's shape. This is a
/// one-way introspection snapshot, not a round-trippable save format (the
/// `.bs` preset grammar already owns filter-parameter persistence).
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    /// Session name.
    pub name: String,
    /// One entry per stack position, bottom-to-top.
    pub filters: Vec<FilterSnapshot>,
    /// `true` if the current preview is a downsampled copy of the
    /// original.
    pub preview_scaled_down: bool,
    /// The preview's scale factor (1.0 if not scaled down).
    pub preview_scale_factor: f32,
    /// Configured worker thread count.
    pub max_threads: usize,
}

/// One filter's snapshot entry.
#[derive(Debug, Clone, Serialize)]
pub struct FilterSnapshot {
    /// `Filter::type_name`.
    pub type_name: String,
    /// Tag used for preset routing.
    pub tag: String,
    /// User-toggled enable state.
    pub enabled: bool,
    /// `true` if this filter always renders regardless of `enabled`.
    pub mandatory: bool,
    /// `true` if this filter needs to re-render before its output is
    /// trusted.
    pub dirty: bool,
}

/// The application core: owns images, the filter stack, presets, and the
/// thread pool that actions run on.
pub struct Session {
    name: String,
    backend: Box<dyn ProcessingBackend>,
    preview_backend: Box<dyn ProcessingBackend>,
    original_image: Option<Bitmap>,
    preview_image: Option<Bitmap>,
    pipeline: Pipeline,
    filter_stack: FilterStack,
    filter_meta: Vec<FilterMeta>,
    filter_preset_collection: FilterPresetCollection,
    active_preset_collection: Option<FilterPresetCollection>,
    thread_pool: rayon::ThreadPool,
    max_threads: usize,
    image_path: Option<PathBuf>,
    session_path: Option<PathBuf>,
    preview: PreviewController,
    alpha_plane: Option<Bitmap>,
    cached_alpha_plane: bool,
    mutation_lock: Mutex<()>,
}

impl Session {
    /// Creates a new, empty session named `name`, instantiating the CPU
    /// backend on both render paths. Call [`Session::set_backend`] and/or
    /// [`Session::set_preview_backend`] to switch either path onto a GPU
    /// backend; a device isn't created at construction so this workspace
    /// never forces a `wgpu` instance on a headless caller.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Self::with_thread_count(name, DEFAULT_MAX_THREADS)
    }

    /// Like [`Session::new`] but with an explicit worker-pool size.
    pub fn with_thread_count(name: impl Into<String>, max_threads: usize) -> Result<Self> {
        let max_threads = max_threads.max(1);
        let backend = create_backend(ComputeBackend::Cpu).map_err(|e| Error::backend_failure(e.to_string()))?;
        let preview_backend = create_backend(ComputeBackend::Cpu).map_err(|e| Error::backend_failure(e.to_string()))?;
        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_threads)
            .build()
            .map_err(|e| Error::backend_failure(format!("failed to build thread pool: {e}")))?;

        Ok(Session {
            name: name.into(),
            backend,
            preview_backend,
            original_image: None,
            preview_image: None,
            pipeline: Pipeline::with_default_formats(),
            filter_stack: FilterStack::new(),
            filter_meta: Vec::new(),
            filter_preset_collection: FilterPresetCollection::new(),
            active_preset_collection: None,
            thread_pool,
            max_threads,
            image_path: None,
            session_path: None,
            preview: PreviewController::default(),
            alpha_plane: None,
            cached_alpha_plane: false,
            mutation_lock: Mutex::new(()),
        })
    }

    /// Session name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read access to the backend façade.
    pub fn backend(&self) -> &dyn ProcessingBackend {
        self.backend.as_ref()
    }

    /// Read access to the preview-render backend façade.
    pub fn preview_backend(&self) -> &dyn ProcessingBackend {
        self.preview_backend.as_ref()
    }

    /// Switches the export-render backend to `kind`, constructing it fresh.
    /// Leaves the preview backend untouched; use [`Session::set_preview_backend`]
    /// to switch that one too.
    pub fn set_backend(&mut self, kind: ComputeBackend) -> Result<()> {
        let _guard = self.lock_mutation()?;
        self.backend = create_backend(kind).map_err(|e| Error::backend_failure(e.to_string()))?;
        Ok(())
    }

    /// Switches the preview-render backend to `kind`, constructing it fresh.
    pub fn set_preview_backend(&mut self, kind: ComputeBackend) -> Result<()> {
        let _guard = self.lock_mutation()?;
        self.preview_backend = create_backend(kind).map_err(|e| Error::backend_failure(e.to_string()))?;
        Ok(())
    }

    /// The original (full-resolution) image, if one has been imported.
    pub fn original_image(&self) -> Option<&Bitmap> {
        self.original_image.as_ref()
    }

    /// The current preview image, if one has been rendered.
    pub fn preview_image(&self) -> Option<&Bitmap> {
        self.preview_image.as_ref()
    }

    /// Read access to the preview controller (budget, scale state).
    pub fn preview_controller(&self) -> &PreviewController {
        &self.preview
    }

    /// Mutable access to the preview controller, for adjusting budget,
    /// quality, or max-FPS before the first import.
    pub fn preview_controller_mut(&mut self) -> &mut PreviewController {
        &mut self.preview
    }

    /// The session's filter stack.
    pub fn filter_stack(&self) -> &FilterStack {
        &self.filter_stack
    }

    /// The currently loaded preset library (distinct from the session's
    /// *active state*, which [`Session::current_active_state_to_preset_collection`]
    /// computes on demand).
    pub fn filter_preset_collection(&self) -> &FilterPresetCollection {
        &self.filter_preset_collection
    }

    /// Configured maximum worker thread count.
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    // ---- Filter stack mutation ------------------------------------------------

    /// Appends `filter` to the stack, tagged [`FilterTag::Other`],
    /// disabled and non-mandatory by default.
    #[instrument(skip(self, filter), fields(session = %self.name))]
    pub fn add_filter(&mut self, filter: Box<dyn Filter>) -> Result<usize> {
        let _guard = self.lock_mutation()?;
        let tag = FilterTag::from_type_name(filter.type_name());
        self.filter_stack.push(filter);
        self.filter_meta.push(FilterMeta { tag, dirty: false });
        let index = self.filter_stack.len() - 1;
        if let Some(entry) = self.filter_stack.entry_mut(index) {
            entry.enabled = false;
        }
        info!(index, "filter added");
        Ok(index)
    }

    /// Adds every preset in `collection` as a freshly-constructed default
    /// filter for its tag, applying the preset's parameters immediately.
    /// Presets naming an unrecognized filter type are skipped with a
    /// warning rather than failing the whole call.
    pub fn add_filters_from_collection(&mut self, collection: &FilterPresetCollection) -> Result<Vec<usize>> {
        let mut added = Vec::new();
        for preset in collection.presets() {
            let tag = FilterTag::from_type_name(&preset.filter_name);
            let Some(mut filter) = default_for_tag(tag) else {
                warn!(filter_name = %preset.filter_name, "no built-in filter for preset; skipping");
                continue;
            };
            filter.from_preset(preset)?;
            added.push(self.add_filter(filter)?);
        }
        Ok(added)
    }

    /// Removes the filter at `index`, shifting later indices down.
    #[instrument(skip(self), fields(session = %self.name))]
    pub fn remove_filter(&mut self, index: usize) -> Result<()> {
        let _guard = self.lock_mutation()?;
        if self.filter_stack.remove(index).is_none() {
            return Err(Error::invalid_argument(format!("no filter at index {index}")));
        }
        self.filter_meta.remove(index);
        info!(index, "filter removed");
        Ok(())
    }

    /// Attaches an enumerated tag to the filter at `index`, used by
    /// preset lookup.
    pub fn associate_filter_with_tag(&mut self, index: usize, tag: FilterTag) -> Result<()> {
        let meta = self
            .filter_meta
            .get_mut(index)
            .ok_or_else(|| Error::invalid_argument(format!("no filter at index {index}")))?;
        meta.tag = tag;
        Ok(())
    }

    /// Enables the filter at `index` (renders on the next preview/export
    /// unless already mandatory-only).
    pub fn enable_filter(&mut self, index: usize) -> Result<()> {
        self.set_enabled(index, true)
    }

    /// Disables the filter at `index`.
    pub fn disable_filter(&mut self, index: usize) -> Result<()> {
        self.set_enabled(index, false)
    }

    fn set_enabled(&mut self, index: usize, enabled: bool) -> Result<()> {
        let entry = self
            .filter_stack
            .entry_mut(index)
            .ok_or_else(|| Error::invalid_argument(format!("no filter at index {index}")))?;
        entry.enabled = enabled;
        self.mark_dirty(index);
        Ok(())
    }

    /// Marks the filter at `index` as always-rendering regardless of
    /// `enabled`.
    pub fn set_mandatory_filter(&mut self, index: usize) -> Result<()> {
        let entry = self
            .filter_stack
            .entry_mut(index)
            .ok_or_else(|| Error::invalid_argument(format!("no filter at index {index}")))?;
        entry.mandatory = true;
        self.mark_dirty(index);
        Ok(())
    }

    /// Clears the mandatory flag set by [`Session::set_mandatory_filter`].
    pub fn unset_mandatory_filter(&mut self, index: usize) -> Result<()> {
        let entry = self
            .filter_stack
            .entry_mut(index)
            .ok_or_else(|| Error::invalid_argument(format!("no filter at index {index}")))?;
        entry.mandatory = false;
        self.mark_dirty(index);
        Ok(())
    }

    /// `true` if the filter at `index` would participate in the next
    /// render.
    pub fn should_render_filter(&self, index: usize) -> bool {
        self.filter_stack
            .entry(index)
            .map(|e| e.enabled || e.mandatory)
            .unwrap_or(false)
    }

    fn mark_dirty(&mut self, index: usize) {
        if let Some(meta) = self.filter_meta.get_mut(index) {
            meta.dirty = true;
        }
    }

    fn mark_all_dirty(&mut self) {
        for meta in &mut self.filter_meta {
            meta.dirty = true;
        }
    }

    fn lock_mutation(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.mutation_lock.lock().map_err(|_| Error::other("session mutation lock poisoned"))
    }

    // ---- Import / export --------------------------------------------------

    /// Imports an image from `path` via the registered [`Pipeline`],
    /// replacing the original image, resetting the preview, and marking
    /// every filter dirty.
    #[instrument(skip(self), fields(session = %self.name))]
    pub fn import_image_from_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let action: Action<ImportResult> = Action::new(ActionKind::Import);
        action.process(|| self.pipeline.import_from_path(path))?;
        let result = action.commit()?;
        self.adopt_imported(result, Some(path.to_path_buf()))
    }

    /// Imports an image already decoded into a [`Bitmap`], bypassing the
    /// pipeline entirely.
    pub fn import_image_from_bitmap(&mut self, bitmap: Bitmap) -> Result<()> {
        self.adopt_imported(
            ImportResult {
                bitmap,
                stripped_alpha: None,
            },
            None,
        )
    }

    fn adopt_imported(&mut self, result: ImportResult, path: Option<PathBuf>) -> Result<()> {
        self.original_image = Some(result.bitmap);
        self.alpha_plane = result.stripped_alpha;
        self.cached_alpha_plane = self.alpha_plane.is_some();
        self.image_path = path;
        self.preview_image = None;
        self.mark_all_dirty();
        info!("image imported");
        self.update_preview(true)
    }

    /// Re-renders the preview image from the filter stack, honoring the
    /// preview controller's rate limit unless `force`.
    #[instrument(skip(self), fields(session = %self.name))]
    pub fn update_preview(&mut self, force: bool) -> Result<()> {
        let Some(original) = self.original_image.as_ref() else {
            return Err(Error::invalid_argument("no image imported"));
        };
        if force {
            self.mark_all_dirty();
        }
        if !self.preview.should_render(force) {
            return Ok(());
        }

        let base = self.preview.compute_preview(original)?;

        let action: Action<Bitmap> = Action::new(ActionKind::RenderPreview);
        let stack = &self.filter_stack;
        let backend = self.preview_backend.as_ref();
        action.process(|| {
            let mut rendered = Bitmap::new(base.format(), base.width(), base.height())?;
            stack.render(&mut rendered, &base, backend)?;
            Ok(rendered)
        })?;
        let rendered = action.commit()?;

        self.preview_image = Some(rendered);
        self.preview.mark_rendered();
        for meta in &mut self.filter_meta {
            meta.dirty = false;
        }
        Ok(())
    }

    /// Exports the current result: the preview's content when
    /// `from_preview` is set and the preview isn't scaled down (a speed
    /// optimization), otherwise a fresh full-resolution render of the
    /// original image. Re-attaches a previously-stripped alpha plane into
    /// the export buffer.
    #[instrument(skip(self), fields(session = %self.name))]
    pub fn export_image(&mut self, path: impl AsRef<Path>, format: ImageFormat, from_preview: bool) -> Result<bool> {
        let path = path.as_ref();
        let source = self.render_export_source(from_preview)?;

        let action: Action<bool> = Action::new(ActionKind::Export);
        let alpha = self.alpha_plane.as_ref();
        action.process(|| self.pipeline.export_to_path(path, format, &source, alpha))?;
        action.commit()
    }

    fn render_export_source(&mut self, from_preview: bool) -> Result<Bitmap> {
        let use_preview_directly = from_preview && !self.preview.is_scaled_down();
        if use_preview_directly {
            if let Some(preview) = &self.preview_image {
                return preview.to_format(preview.format(), Rect::from_size(preview.width(), preview.height()));
            }
        }
        let Some(original) = self.original_image.as_ref() else {
            return Err(Error::invalid_argument("no image imported"));
        };
        let mut rendered = Bitmap::new(original.format(), original.width(), original.height())?;
        self.filter_stack.render(&mut rendered, original, self.backend.as_ref())?;
        Ok(rendered)
    }

    // ---- Presets ------------------------------------------------------------

    /// Loads a preset library from `path` into
    /// [`Session::filter_preset_collection`], without applying it. Use
    /// [`Session::use_presets`] to make a loaded collection active.
    pub fn load_preset_from_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.filter_preset_collection = FilterPresetCollection::load_from_path(path)?;
        Ok(())
    }

    /// Serializes the current active-state preset collection and writes
    /// it to `path`.
    pub fn save_preset_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        self.current_active_state_to_preset_collection().save_to_path(path)
    }

    /// Applies `collection`: idempotent against the session's current
    /// active-state collection. For each recognized filter tag with a
    /// preset, applies entry 0 and enables the filter; tags with no entry
    /// are disabled rather than removed.
    #[instrument(skip(self, collection), fields(session = %self.name))]
    pub fn use_presets(&mut self, collection: &FilterPresetCollection) -> Result<()> {
        if self.active_preset_collection.as_ref() == Some(collection) {
            return Ok(());
        }

        for index in 0..self.filter_stack.len() {
            let tag = self.filter_meta[index].tag;
            let type_name = self.filter_stack.entry(index).unwrap().filter().type_name().to_string();
            let entries = collection.collection_for_filter(&type_name);
            match entries.first() {
                Some(preset) => {
                    let preset = (*preset).clone();
                    let entry = self.filter_stack.entry_mut(index).unwrap();
                    entry.filter_mut().from_preset(&preset)?;
                    entry.enabled = true;
                }
                None => {
                    let entry = self.filter_stack.entry_mut(index).unwrap();
                    entry.enabled = false;
                    let _ = tag;
                }
            }
            self.mark_dirty(index);
        }

        self.active_preset_collection = Some(collection.clone());
        self.update_preview(true)
    }

    /// Emits `to_preset` for every filter currently in the stack,
    /// regardless of enabled state.
    pub fn current_state_to_preset_collection(&self) -> FilterPresetCollection {
        let mut collection = FilterPresetCollection::new();
        for preset in self.filter_stack.to_presets() {
            collection.push(preset);
        }
        collection
    }

    /// Like [`Session::current_state_to_preset_collection`] but only for
    /// filters that [`Session::should_render_filter`].
    pub fn current_active_state_to_preset_collection(&self) -> FilterPresetCollection {
        let mut collection = FilterPresetCollection::new();
        for index in 0..self.filter_stack.len() {
            if self.should_render_filter(index) {
                let preset = self.filter_stack.entry(index).unwrap().filter().to_preset(&format!("stack[{index}]"));
                collection.push(preset);
            }
        }
        collection
    }

    /// Looks up `presets.collection_for_filter(tag)`, takes entry `i`,
    /// finds the matching filter by tag in the session, and applies it.
    pub fn set_preset_by_index(&mut self, presets: &FilterPresetCollection, tag: FilterTag, i: usize) -> Result<()> {
        let index = self
            .filter_meta
            .iter()
            .position(|m| m.tag == tag)
            .ok_or_else(|| Error::invalid_argument(format!("no filter tagged {tag:?} in session")))?;
        let type_name = self.filter_stack.entry(index).unwrap().filter().type_name().to_string();
        let entries = presets.collection_for_filter(&type_name);
        let preset = entries
            .get(i)
            .ok_or_else(|| Error::invalid_argument(format!("no preset at index {i} for {type_name}")))?;
        let preset = (*preset).clone();
        self.filter_stack.entry_mut(index).unwrap().filter_mut().from_preset(&preset)?;
        self.mark_dirty(index);
        Ok(())
    }

    // ---- Lifecycle ------------------------------------------------------------

    /// Sets the worker pool size, rebuilding the pool. Fails if a
    /// render/export action is still in flight (callers should
    /// `synchronize()` first).
    pub fn set_thread_count(&mut self, max_threads: usize) -> Result<()> {
        let max_threads = max_threads.max(1);
        self.thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_threads)
            .build()
            .map_err(|e| Error::backend_failure(format!("failed to build thread pool: {e}")))?;
        self.max_threads = max_threads;
        Ok(())
    }

    /// Blocks until every action currently queued on this session's
    /// thread pool has completed.
    pub fn synchronize(&self) {
        self.thread_pool.join(|| (), || ());
    }

    /// Drops the stacks, collections, images, and preview state, leaving
    /// the session as if freshly constructed (other than its name and
    /// thread count).
    #[instrument(skip(self), fields(session = %self.name))]
    pub fn reset(&mut self) -> Result<()> {
        self.synchronize();
        self.filter_stack = FilterStack::new();
        self.filter_meta.clear();
        self.filter_preset_collection = FilterPresetCollection::new();
        self.active_preset_collection = None;
        self.original_image = None;
        self.preview_image = None;
        self.preview = PreviewController::default();
        self.alpha_plane = None;
        self.cached_alpha_plane = false;
        self.image_path = None;
        info!("session reset");
        Ok(())
    }

    /// Produces a deep-enough copy: every filter is a fresh
    /// `Filter::clone_box()`, but images are duplicated as independent
    /// bitmaps (no backend object sharing exists at the `Bitmap` level,
    /// so "shared" here means "same pixel content", keeping cloning cheap
    /// relative to re-importing).
    pub fn clone_session(&self, new_name: impl Into<String>) -> Result<Session> {
        let mut cloned = Session::with_thread_count(new_name, self.max_threads)?;
        for index in 0..self.filter_stack.len() {
            let entry = self.filter_stack.entry(index).unwrap();
            let filter = entry.filter().clone_box();
            let new_index = cloned.add_filter(filter)?;
            let new_entry = cloned.filter_stack.entry_mut(new_index).unwrap();
            new_entry.enabled = entry.enabled;
            new_entry.mandatory = entry.mandatory;
            cloned.filter_meta[new_index].tag = self.filter_meta[index].tag;
        }
        cloned.filter_preset_collection = self.filter_preset_collection.clone();
        if let Some(original) = &self.original_image {
            let copy = original.to_format(original.format(), Rect::from_size(original.width(), original.height()))?;
            cloned.original_image = Some(copy);
        }
        if let Some(preview) = &self.preview_image {
            let copy = preview.to_format(preview.format(), Rect::from_size(preview.width(), preview.height()))?;
            cloned.preview_image = Some(copy);
        }
        cloned.image_path = self.image_path.clone();
        Ok(cloned)
    }

    /// A read-only snapshot of this session's current shape.
    pub fn snapshot(&self) -> SessionSnapshot {
        let filters = (0..self.filter_stack.len())
            .map(|i| {
                let entry = self.filter_stack.entry(i).unwrap();
                let meta = self.filter_meta[i];
                FilterSnapshot {
                    type_name: entry.filter().type_name().to_string(),
                    tag: format!("{:?}", meta.tag),
                    enabled: entry.enabled,
                    mandatory: entry.mandatory,
                    dirty: meta.dirty,
                }
            })
            .collect();
        SessionSnapshot {
            name: self.name.clone(),
            filters,
            preview_scaled_down: self.preview.is_scaled_down(),
            preview_scale_factor: self.preview.scale_factor(),
            max_threads: self.max_threads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use vfx_ops::filters::Vignette;

    fn solid_rgba(value: u8, size: u32) -> Bitmap {
        let mut bmp = Bitmap::new(PixelFormat::RGBA8, size, size).unwrap();
        bmp.data_mut().fill(value);
        bmp
    }

    #[test]
    fn import_from_bitmap_creates_preview() {
        let mut session = Session::new("t").unwrap();
        session.import_image_from_bitmap(solid_rgba(128, 8)).unwrap();
        assert!(session.preview_image().is_some());
    }

    #[test]
    fn add_filter_defaults_disabled() {
        let mut session = Session::new("t").unwrap();
        let index = session.add_filter(Box::new(Vignette::default())).unwrap();
        assert!(!session.should_render_filter(index));
    }

    #[test]
    fn enable_filter_participates_in_render() {
        let mut session = Session::new("t").unwrap();
        session.import_image_from_bitmap(solid_rgba(200, 8)).unwrap();
        let index = session.add_filter(Box::new(Vignette::default())).unwrap();
        session.enable_filter(index).unwrap();
        session.update_preview(true).unwrap();
        let preview = session.preview_image().unwrap();
        assert_ne!(preview.data(), solid_rgba(200, 8).data());
    }

    #[test]
    fn export_without_import_fails() {
        let mut session = Session::new("t").unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.png");
        assert!(session.export_image(&path, ImageFormat::Png, true).is_err());
    }

    #[test]
    fn export_then_import_round_trips_dimensions() {
        let mut session = Session::new("t").unwrap();
        session.import_image_from_bitmap(solid_rgba(64, 8)).unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.png");
        assert!(session.export_image(&path, ImageFormat::Png, true).unwrap());

        let mut reader = Session::new("reader").unwrap();
        reader.import_image_from_path(&path).unwrap();
        assert_eq!(reader.original_image().unwrap().width(), 8);
    }

    #[test]
    fn reset_clears_images_and_filters() {
        let mut session = Session::new("t").unwrap();
        session.import_image_from_bitmap(solid_rgba(10, 4)).unwrap();
        session.add_filter(Box::new(Vignette::default())).unwrap();
        session.reset().unwrap();
        assert!(session.original_image().is_none());
        assert_eq!(session.filter_stack().len(), 0);
    }

    #[test]
    fn clone_session_copies_filters_and_images() {
        let mut session = Session::new("t").unwrap();
        session.import_image_from_bitmap(solid_rgba(50, 4)).unwrap();
        let index = session.add_filter(Box::new(Vignette::default())).unwrap();
        session.enable_filter(index).unwrap();

        let cloned = session.clone_session("t2").unwrap();
        assert_eq!(cloned.filter_stack().len(), 1);
        assert!(cloned.should_render_filter(0));
        assert!(cloned.original_image().is_some());
    }

    #[test]
    fn snapshot_reflects_filter_state() {
        let mut session = Session::new("t").unwrap();
        let index = session.add_filter(Box::new(Vignette::default())).unwrap();
        session.enable_filter(index).unwrap();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.filters.len(), 1);
        assert!(snapshot.filters[0].enabled);
        assert_eq!(snapshot.filters[0].tag, "Vignette");
    }

    #[test]
    fn preset_round_trip_via_use_presets() {
        let mut session = Session::new("t").unwrap();
        session.import_image_from_bitmap(solid_rgba(90, 4)).unwrap();
        session.add_filter(Box::new(Vignette::default())).unwrap();

        let mut collection = FilterPresetCollection::new();
        let mut preset = FilterPreset::new("Vignette", "custom");
        preset.floats.insert("strength".into(), 0.9);
        preset.floats.insert("radius".into(), 0.5);
        preset.points.insert("center".into(), (0.5, 0.5));
        collection.push(preset);

        session.use_presets(&collection).unwrap();
        assert!(session.should_render_filter(0));
    }
}
