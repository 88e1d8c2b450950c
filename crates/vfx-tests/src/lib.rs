//! End-to-end scenario tests for the imaging runtime: session import/export,
//! the filter stack's ping-pong render protocol, preview scaling, preset
//! round-trips, GPU-layer coherence, and thread-pool action draining.
//!
//! These exercise the crates together the way `vfx-cli` does, rather than
//! one module in isolation: each test stands for one concrete workflow a
//! user of the runtime would actually run.

#![cfg(test)]

use rayon::ThreadPoolBuilder;
use tempfile::tempdir;

use vfx_compute::backend::{create_backend, Backend};
use vfx_compute::image_layer::ImageLayer;
use vfx_core::bitmap::Bitmap;
use vfx_core::error::Result;
use vfx_core::pixel_format::PixelFormat;
use vfx_core::rect::Rect;
use vfx_ops::filter_kind::{Filter, FilterPreset};
use vfx_ops::filter_stack::FilterStack;
use vfx_ops::filters::cascaded_sharpen::Cascade;
use vfx_ops::filters::{CascadedSharpen, Vignette};
use vfx_ops::preset::FilterPresetCollection;
use vfx_session::action::{Action, ActionKind};
use vfx_session::preview::PreviewController;
use vfx_session::{ImageFormat, Session};

fn solid_bitmap(format: PixelFormat, size: u32, value: u8) -> Bitmap {
    let mut bmp = Bitmap::new(format, size, size).unwrap();
    bmp.data_mut().fill(value);
    bmp
}

/// Bitwise channel negation, used only to exercise the stack's ping-pong
/// protocol with a filter that is never a no-op.
#[derive(Debug, Clone, Default)]
struct Negate;

impl Filter for Negate {
    fn type_name(&self) -> &'static str {
        "Negate"
    }

    fn process(&self, dst: &mut Bitmap, src: &Bitmap) -> Result<bool> {
        for (d, s) in dst.data_mut().iter_mut().zip(src.data().iter()) {
            *d = 255 - s;
        }
        Ok(true)
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }

    fn to_preset(&self, name: &str) -> FilterPreset {
        FilterPreset::new(self.type_name(), name)
    }

    fn from_preset(&mut self, _preset: &FilterPreset) -> Result<()> {
        Ok(())
    }
}

// ---- Scenario 1: import then identity export round-trips pixels ---------

#[test]
fn scenario_import_then_identity_export_round_trips_pixels() {
    let mut session = Session::new("identity-export").unwrap();
    let original = solid_bitmap(PixelFormat::RGBA8, 16, 77);
    session.import_image_from_bitmap(original.clone()).unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("out.png");
    assert!(session.export_image(&path, ImageFormat::Png, true).unwrap());

    let mut reader = Session::new("reader").unwrap();
    reader.import_image_from_path(&path).unwrap();
    let reimported = reader.original_image().unwrap();
    assert_eq!(reimported.width(), original.width());
    assert_eq!(reimported.height(), original.height());
    assert_eq!(reimported.data(), original.data());
}

// ---- Scenario 2: ping-pong parity with chained negations -----------------

#[test]
fn scenario_three_negations_ping_pong_to_odd_parity() {
    let src = solid_bitmap(PixelFormat::MONO8, 64, 40);
    let mut stack = FilterStack::new();
    for _ in 0..3 {
        stack.push(Box::new(Negate));
    }
    for i in 0..3 {
        stack.entry_mut(i).unwrap().enabled = true;
    }

    let mut dst = Bitmap::new(src.format(), src.width(), src.height()).unwrap();
    stack.render(&mut dst, &src).unwrap();

    // An odd number of negations differs from the source; negating twice
    // is the identity, so the final pass alone determines the result.
    let expected = 255 - 40u8;
    assert!(dst.data().iter().all(|&b| b == expected));
}

#[test]
fn scenario_even_negations_parity_blit_restores_source() {
    let src = solid_bitmap(PixelFormat::MONO8, 32, 200);
    let mut stack = FilterStack::new();
    for _ in 0..4 {
        stack.push(Box::new(Negate));
    }
    for i in 0..4 {
        stack.entry_mut(i).unwrap().enabled = true;
    }

    let mut dst = Bitmap::new(src.format(), src.width(), src.height()).unwrap();
    stack.render(&mut dst, &src).unwrap();

    assert_eq!(dst.data(), src.data());
}

// ---- Scenario 3: preview scaling boundary at the megapixel budget --------

#[test]
fn scenario_preview_at_exact_budget_is_not_scaled_down() {
    let mut controller = PreviewController::new(12.0, 1.0, 30.0);
    let bitmap = Bitmap::new(PixelFormat::RGB8, 4000, 3000).unwrap();
    assert_eq!(bitmap.width() as f64 * bitmap.height() as f64 / 1_000_000.0, 12.0);

    let preview = controller.compute_preview(&bitmap).unwrap();
    assert_eq!((preview.width(), preview.height()), (4000, 3000));
    assert!(!controller.is_scaled_down());
}

#[test]
fn scenario_preview_just_over_budget_scales_down() {
    let mut controller = PreviewController::new(12.0, 1.0, 30.0);
    let bitmap = Bitmap::new(PixelFormat::RGB8, 4001, 3000).unwrap();

    let preview = controller.compute_preview(&bitmap).unwrap();
    assert!(preview.width() < bitmap.width());
    assert!(controller.is_scaled_down());
    assert!(controller.scale_factor() < 1.0);
}

// ---- Scenario 4: preset round-trip for a four-cascade sharpen -----------

#[test]
fn scenario_cascaded_sharpen_preset_round_trip_with_four_cascades() {
    let cascades = vec![
        Cascade { blur_radius: 1.0, strength: 0.2 },
        Cascade { blur_radius: 2.0, strength: 0.4 },
        Cascade { blur_radius: 4.0, strength: 0.1 },
        Cascade { blur_radius: 8.0, strength: 0.05 },
    ];
    let original = CascadedSharpen::new(cascades).unwrap();
    let preset = original.to_preset("four-pass");

    let mut restored = CascadedSharpen::default();
    restored.from_preset(&preset).unwrap();

    assert_eq!(restored.cascades().len(), 4);
    for (a, b) in original.cascades().iter().zip(restored.cascades()) {
        assert_eq!(a.blur_radius, b.blur_radius);
        assert_eq!(a.strength, b.strength);
    }
}

// ---- Scenario 5: cross-backend retrieve without a CPU mirror -------------

#[test]
fn scenario_gpu_layer_round_trips_without_cpu_mirror() {
    let backend = create_backend(Backend::Cpu).unwrap();
    let original = solid_bitmap(PixelFormat::RGBA8, 12, 163);
    let mut layer = ImageLayer::from_bitmap("plate", original.clone());

    // Force the layer onto the GPU side only, discarding the CPU mirror.
    {
        let _gpu = layer.gpu_image_mut(backend.as_ref()).unwrap();
    }

    // Retrieving the bitmap must pull the data back down from the GPU
    // tile image with no CPU copy available to fall back on.
    let retrieved = layer.bitmap(backend.as_ref()).unwrap();
    assert_eq!(retrieved.width(), original.width());
    assert_eq!(retrieved.height(), original.height());
    assert_eq!(retrieved.data(), original.data());
}

// ---- Scenario 6: thread pool drains sixteen concurrent render actions ---

#[test]
fn scenario_sixteen_concurrent_render_actions_drain_on_four_threads() {
    let pool = ThreadPoolBuilder::new().num_threads(4).build().unwrap();
    let src = solid_bitmap(PixelFormat::RGB8, 24, 50);

    let actions: Vec<Action<Bitmap>> = (0..16).map(|_| Action::new(ActionKind::RenderPreview)).collect();

    pool.scope(|scope| {
        for action in &actions {
            let src = &src;
            scope.spawn(move |_| {
                action
                    .process(|| {
                        let mut stack = FilterStack::new();
                        stack.push(Box::new(Negate));
                        stack.entry_mut(0).unwrap().enabled = true;
                        let mut dst = Bitmap::new(src.format(), src.width(), src.height())?;
                        stack.render(&mut dst, src)?;
                        Ok(dst)
                    })
                    .unwrap();
            });
        }
    });

    assert!(actions.iter().all(|a| a.finished()));
    for action in &actions {
        let rendered = action.commit().unwrap();
        assert!(rendered.data().iter().all(|&b| b == 255 - 50));
    }
}

// ---- Universal invariants --------------------------------------------------

#[test]
fn invariant_preset_collection_parse_of_serialize_is_identity() {
    let mut collection = FilterPresetCollection::new();
    let mut preset = FilterPreset::new("Vignette", "warm-edge");
    preset.floats.insert("strength".into(), 0.6);
    preset.floats.insert("radius".into(), 0.8);
    preset.points.insert("center".into(), (0.5, 0.45));
    collection.push(preset);

    let text = collection.serialize();
    let parsed = FilterPresetCollection::parse(&text).unwrap();
    assert_eq!(parsed, collection);
}

#[test]
fn invariant_from_preset_of_to_preset_is_identity() {
    let original = Vignette {
        center: (0.4, 0.6),
        radius: 0.33,
        strength: 0.81,
    };
    let preset = original.to_preset("custom");

    let mut restored = Vignette::default();
    restored.from_preset(&preset).unwrap();

    assert_eq!(restored.center, original.center);
    assert_eq!(restored.radius, original.radius);
    assert_eq!(restored.strength, original.strength);
}

#[test]
fn invariant_transform_format_to_same_format_is_identity() {
    let mut bitmap = solid_bitmap(PixelFormat::RGBA8, 8, 91);
    let before = bitmap.data().to_vec();
    bitmap.transform_format(PixelFormat::RGBA8).unwrap();
    assert_eq!(bitmap.data(), before.as_slice());
}

#[test]
fn invariant_add_then_remove_alpha_channel_round_trips_rgb() {
    let rgb = solid_bitmap(PixelFormat::RGB8, 6, 120);
    let mut with_alpha = rgb
        .to_format(PixelFormat::RGBA8, Rect::from_size(rgb.width(), rgb.height()))
        .unwrap();
    with_alpha.discard_alpha_channel().unwrap();
    assert_eq!(with_alpha.format(), PixelFormat::RGB8);
    assert_eq!(with_alpha.data(), rgb.data());
}

#[test]
fn invariant_use_presets_is_idempotent_against_active_collection() {
    let mut session = Session::new("idempotent-presets").unwrap();
    session
        .import_image_from_bitmap(solid_bitmap(PixelFormat::RGBA8, 8, 10))
        .unwrap();
    session.add_filter(Box::new(Vignette::default())).unwrap();

    let mut collection = FilterPresetCollection::new();
    let mut preset = FilterPreset::new("Vignette", "preset-a");
    preset.floats.insert("strength".into(), 0.5);
    preset.floats.insert("radius".into(), 0.5);
    preset.points.insert("center".into(), (0.5, 0.5));
    collection.push(preset);

    session.use_presets(&collection).unwrap();
    let first = session.current_active_state_to_preset_collection();

    // Re-applying the same collection is a documented no-op.
    session.use_presets(&collection).unwrap();
    let second = session.current_active_state_to_preset_collection();

    assert_eq!(first, second);
}
