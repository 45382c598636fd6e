use std::fs::OpenOptions;
use std::io::Write;

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

use super::Engine;
use crate::command::{BlitTransform, CommandKind, ToolSettings};
use crate::config::EngineConfig;
use crate::error::{DecodeError, Error, InvariantViolation};
use crate::journal::JournalEntries;
use crate::layer::{Canvas, LayerStore};
use crate::rect::SizePx;
use crate::store::{Checkpoint, DocumentStreams};

pub(crate) fn rgba(r: u8, g: u8, b: u8, a: u8) -> Rgba<u8> {
    Rgba([r, g, b, a])
}

fn streams_in(dir: &TempDir) -> DocumentStreams {
    DocumentStreams::new(
        dir.path().join("journal.bin"),
        dir.path().join("blobs.bin"),
        Checkpoint::default(),
    )
}

pub(crate) fn engine_with(
    layer_count: u32,
    width: u32,
    height: u32,
    config: &EngineConfig,
) -> (TempDir, Engine<Canvas>) {
    let dir = tempfile::tempdir().unwrap();
    let canvas = Canvas::new(layer_count, SizePx::new(width, height));
    let mut engine = Engine::new(canvas, streams_in(&dir), config);
    engine.open_streams().unwrap();
    (dir, engine)
}

pub(crate) fn engine(layer_count: u32, width: u32, height: u32) -> (TempDir, Engine<Canvas>) {
    engine_with(layer_count, width, height, &EngineConfig::new())
}

fn layer(engine: &Engine<Canvas>, index: u32) -> RgbaImage {
    engine.layers().layer_image(index).clone()
}

fn solid(engine: &Engine<Canvas>, index: u32, pixel: Rgba<u8>) -> bool {
    engine.layers().layer_image(index).pixels().all(|p| *p == pixel)
}

fn journal_kinds(engine: &Engine<Canvas>) -> Vec<CommandKind> {
    let bytes = std::fs::read(engine.streams().journal().path()).unwrap();
    JournalEntries::new(&bytes)
        .map(|entry| entry.unwrap().1.kind())
        .collect()
}

fn paint_stroke(engine: &mut Engine<Canvas>) {
    engine.stroke_begin(0, false, false, 8.0, 8.0).unwrap();
    for (x, y) in [(16.0, 10.0), (24.0, 14.0), (30.0, 22.0), (34.0, 30.0), (36.0, 40.0)] {
        engine.stroke_move(x, y).unwrap();
    }
    engine.stroke_end().unwrap();
}

// ============================================================================
// Single edits
// ============================================================================

#[test]
fn clear_undo_redo() {
    let (_dir, mut engine) = engine(1, 4, 4);
    engine.clear_layer(0, 1.0, 0.0, 0.0, 1.0).unwrap();
    let end = engine.checkpoint();

    assert!(solid(&engine, 0, rgba(255, 0, 0, 255)));
    assert!(end.journal > 0);
    assert!(engine.has_undo());

    assert!(engine.undo().unwrap());
    assert!(solid(&engine, 0, rgba(0, 0, 0, 0)));
    assert_eq!(engine.checkpoint().journal, 0);
    assert!(!engine.has_undo());
    assert!(engine.has_redo());

    assert!(engine.redo().unwrap());
    assert!(solid(&engine, 0, rgba(255, 0, 0, 255)));
    assert_eq!(engine.checkpoint(), end);
    assert_eq!(engine.layers().editing_surface(), Some(engine.layers().layer_image(0)));
}

#[test]
fn nothing_to_undo_or_redo() {
    let (_dir, mut engine) = engine(1, 4, 4);
    assert!(!engine.undo().unwrap());
    assert!(!engine.redo().unwrap());
}

#[test]
fn stroke_is_journaled_with_its_context() {
    let (_dir, mut engine) = engine(1, 96, 96);
    engine.clear_layer(0, 1.0, 1.0, 1.0, 1.0).unwrap();
    engine.color_select(0.0, 0.0, 1.0, 1.0).unwrap();
    paint_stroke(&mut engine);

    let kinds = journal_kinds(&engine);
    assert_eq!(
        kinds,
        vec![
            CommandKind::LayerClear,
            CommandKind::ColorSelect,
            CommandKind::ColorSelect,
            CommandKind::ToolSoftBrush,
            CommandKind::StrokeBegin,
            CommandKind::StrokeMove,
            CommandKind::StrokeMove,
            CommandKind::StrokeMove,
            CommandKind::StrokeMove,
            CommandKind::StrokeMove,
            CommandKind::StrokeEnd,
        ]
    );
    assert_eq!(engine.pending_len(), 0);
    assert_eq!(engine.undo_ring().len(), 2);
}

#[test]
fn stroke_redo_replays_identical_pixels() {
    let (_dir, mut engine) = engine(1, 96, 96);
    engine.clear_layer(0, 1.0, 1.0, 1.0, 1.0).unwrap();
    let blank = layer(&engine, 0);

    engine.color_select(0.0, 0.0, 1.0, 1.0).unwrap();
    paint_stroke(&mut engine);
    let painted = layer(&engine, 0);
    let end = engine.checkpoint();
    assert_ne!(painted, blank);

    // only the stroke's bounds are kept for undo
    let buffer = engine.undo_ring().undo_buffer().unwrap();
    assert_eq!(buffer.before.patches().len(), 1);
    assert!(buffer.before.patches()[0].rect.area() < 96 * 96);
    assert!(buffer.after.patches().is_empty());
    assert!(buffer.after.is_replay());

    engine.undo().unwrap();
    assert_eq!(layer(&engine, 0), blank);
    assert_eq!(engine.layers().editing_surface(), Some(&blank));

    engine.redo().unwrap();
    assert_eq!(layer(&engine, 0), painted);
    assert_eq!(engine.checkpoint(), end);
    assert!(engine.undo_enabled());
    assert!(engine.write_enabled());
}

#[test]
fn cancelled_stroke_leaves_no_trace() {
    let (_dir, mut engine) = engine(1, 32, 32);
    let before = layer(&engine, 0);

    engine.color_select(0.0, 1.0, 0.0, 1.0).unwrap();
    engine.stroke_begin(0, false, false, 4.0, 4.0).unwrap();
    engine.stroke_move(20.0, 20.0).unwrap();
    engine.stroke_cancel().unwrap();

    assert_eq!(layer(&engine, 0), before);
    assert_eq!(engine.layers().editing_surface(), Some(&before));
    assert!(!engine.is_stroke_active());
    assert_eq!(engine.pending_len(), 0);
    assert_eq!(engine.checkpoint().journal, 0);
    assert!(!engine.has_undo());
    // the selection itself stays in effect
    assert_eq!(engine.color().green, 1.0);
}

#[test]
fn stroke_end_without_stroke() {
    let (_dir, mut engine) = engine(1, 4, 4);
    assert!(matches!(
        engine.stroke_end().unwrap_err(),
        Error::Invariant(InvariantViolation::NoStroke)
    ));
    assert!(matches!(
        engine.stroke_cancel().unwrap_err(),
        Error::Invariant(InvariantViolation::NoStroke)
    ));
}

#[test]
fn merge_undo_restores_both_layers() {
    let (_dir, mut engine) = engine(2, 4, 4);
    engine.clear_layer(0, 0.0, 0.0, 0.0, 1.0).unwrap();
    engine.clear_layer(1, 1.0, 1.0, 1.0, 1.0).unwrap();

    engine.merge_layers(1, 0).unwrap();
    assert!(solid(&engine, 0, rgba(255, 255, 255, 255)));
    assert!(solid(&engine, 1, rgba(0, 0, 0, 0)));

    engine.undo().unwrap();
    assert!(solid(&engine, 0, rgba(0, 0, 0, 255)));
    assert!(solid(&engine, 1, rgba(255, 255, 255, 255)));

    engine.redo().unwrap();
    assert!(solid(&engine, 0, rgba(255, 255, 255, 255)));
    assert!(solid(&engine, 1, rgba(0, 0, 0, 0)));
}

#[test]
fn merge_into_self_is_rejected() {
    let (_dir, mut engine) = engine(2, 4, 4);
    assert!(matches!(
        engine.merge_layers(1, 1).unwrap_err(),
        Error::Invariant(InvariantViolation::MergeIntoSelf(1))
    ));
    assert!(!engine.has_undo());
}

#[test]
fn blit_undo_redo() {
    let (_dir, mut engine) = engine(1, 8, 8);
    engine.clear_layer(0, 1.0, 1.0, 1.0, 1.0).unwrap();
    let white = layer(&engine, 0);
    let start = engine.checkpoint();

    let image = RgbaImage::from_pixel(2, 2, rgba(255, 0, 0, 255));
    engine.blit_layer(0, &image, BlitTransform::translate(3.0, 3.0)).unwrap();
    let blitted = layer(&engine, 0);
    let end = engine.checkpoint();

    assert_eq!(blitted.get_pixel(3, 3), &rgba(255, 0, 0, 255));
    assert_eq!(blitted.get_pixel(4, 4), &rgba(255, 0, 0, 255));
    // the layer is replaced, not composited over
    assert_eq!(blitted.get_pixel(0, 0), &rgba(0, 0, 0, 0));
    assert_eq!(blitted.get_pixel(5, 5), &rgba(0, 0, 0, 0));
    assert!(end.blob > start.blob);

    engine.undo().unwrap();
    assert_eq!(layer(&engine, 0), white);
    assert_eq!(engine.checkpoint(), start);

    engine.redo().unwrap();
    assert_eq!(layer(&engine, 0), blitted);
    assert_eq!(engine.checkpoint(), end);
}

#[test]
fn layer_state_undo_redo() {
    let (_dir, mut engine) = engine(3, 4, 4);
    engine.set_layer_opacity(1, 0.25).unwrap();
    engine.set_layer_order(&[2, 0, 1]).unwrap();
    engine.set_layer_visibility(0, false).unwrap();
    engine.select_layer(2).unwrap();

    assert_eq!(engine.layers().active_layer(), 2);
    engine.undo().unwrap();
    assert_eq!(engine.layers().active_layer(), 0);
    engine.undo().unwrap();
    assert!(engine.layers().layer_visible(0));
    engine.undo().unwrap();
    assert_eq!(engine.layers().layer_order(), vec![0, 1, 2]);
    engine.undo().unwrap();
    assert_eq!(engine.layers().layer_opacity(1), 1.0);
    assert_eq!(engine.checkpoint().journal, 0);

    while engine.redo().unwrap() {}
    assert_eq!(engine.layers().layer_opacity(1), 0.25);
    assert_eq!(engine.layers().layer_order(), vec![2, 0, 1]);
    assert!(!engine.layers().layer_visible(0));
    assert_eq!(engine.layers().active_layer(), 2);
}

#[test]
fn opacity_is_clamped_before_recording() {
    let (_dir, mut engine) = engine(1, 4, 4);
    engine.set_layer_opacity(0, 3.0).unwrap();
    assert_eq!(engine.layers().layer_opacity(0), 1.0);
    let buffer = engine.undo_ring().undo_buffer().unwrap();
    assert_eq!(buffer.after.opacity(), Some((0, 1.0)));
}

#[test]
fn invalid_order_records_nothing() {
    let (_dir, mut engine) = engine(3, 4, 4);
    assert!(matches!(
        engine.set_layer_order(&[0, 0, 1]).unwrap_err(),
        Error::Invariant(InvariantViolation::InvalidLayerOrder(_))
    ));
    assert!(!engine.has_undo());
    assert_eq!(engine.pending_len(), 0);
    assert_eq!(engine.checkpoint().journal, 0);
    assert_eq!(engine.layers().layer_order(), vec![0, 1, 2]);
}

// ============================================================================
// History
// ============================================================================

#[test]
fn new_edit_after_undo_truncates_history_and_journal() {
    let (_dir, mut engine) = engine(1, 4, 4);
    engine.clear_layer(0, 1.0, 0.0, 0.0, 1.0).unwrap();
    let first = engine.checkpoint();
    engine.clear_layer(0, 0.0, 1.0, 0.0, 1.0).unwrap();
    engine.clear_layer(0, 0.0, 0.0, 1.0, 1.0).unwrap();
    assert_eq!(engine.undo_ring().len(), 3);

    engine.undo().unwrap();
    engine.undo().unwrap();
    assert!(solid(&engine, 0, rgba(255, 0, 0, 255)));
    assert_eq!(engine.checkpoint(), first);

    engine.clear_layer(0, 1.0, 1.0, 1.0, 1.0).unwrap();
    assert_eq!(engine.undo_ring().len(), 2);
    assert!(!engine.has_redo());
    assert_eq!(
        journal_kinds(&engine),
        vec![CommandKind::LayerClear, CommandKind::LayerClear]
    );
    let length = std::fs::metadata(engine.streams().journal().path()).unwrap().len();
    assert_eq!(length, engine.checkpoint().journal);

    engine.undo().unwrap();
    assert!(solid(&engine, 0, rgba(255, 0, 0, 255)));
}

#[test]
fn resize_clears_history() {
    let (_dir, mut engine) = engine(1, 4, 4);
    engine.clear_layer(0, 1.0, 0.0, 0.0, 1.0).unwrap();
    engine.resize_canvas(2, 6, 5).unwrap();

    assert!(!engine.has_undo());
    assert_eq!(engine.layers().layer_count(), 2);
    assert_eq!(engine.layers().size(), SizePx::new(6, 5));
    assert_eq!(
        journal_kinds(&engine),
        vec![CommandKind::LayerClear, CommandKind::CanvasResize]
    );
}

#[test]
fn busy_engine_refuses_intents() {
    let (_dir, mut engine) = engine(1, 16, 16);
    let handle = engine.begin_edit(false, &[]).unwrap();
    assert!(matches!(
        engine.clear_layer(0, 1.0, 1.0, 1.0, 1.0).unwrap_err(),
        Error::Invariant(InvariantViolation::ReentrantEdit)
    ));
    assert!(matches!(
        engine.stroke_begin(0, false, false, 1.0, 1.0).unwrap_err(),
        Error::Invariant(InvariantViolation::ReentrantEdit)
    ));
    assert!(matches!(
        engine.undo().unwrap_err(),
        Error::Invariant(InvariantViolation::ReentrantEdit)
    ));
    engine.discard_edit(handle).unwrap();

    engine.stroke_begin(0, false, false, 1.0, 1.0).unwrap();
    assert!(matches!(
        engine.undo().unwrap_err(),
        Error::Invariant(InvariantViolation::StrokeActive)
    ));
    assert!(matches!(
        engine.select_layer(0).unwrap_err(),
        Error::Invariant(InvariantViolation::StrokeActive)
    ));
    assert!(matches!(
        engine.stroke_begin(0, false, false, 1.0, 1.0).unwrap_err(),
        Error::Invariant(InvariantViolation::StrokeActive)
    ));
    engine.stroke_end().unwrap();
}

#[test]
fn write_disabled_keeps_after_pixels() {
    let (_dir, mut engine) = engine(1, 32, 32);
    engine.set_write_enabled(false);

    engine.clear_layer(0, 1.0, 0.0, 0.0, 1.0).unwrap();
    paint_stroke(&mut engine);
    let painted = layer(&engine, 0);
    assert_eq!(engine.checkpoint(), Checkpoint::default());

    let buffer = engine.undo_ring().undo_buffer().unwrap();
    assert_eq!(buffer.after.patches().len(), 1);
    assert_eq!(buffer.after.journal(), None);

    engine.undo().unwrap();
    engine.undo().unwrap();
    assert!(solid(&engine, 0, rgba(0, 0, 0, 0)));

    engine.redo().unwrap();
    assert!(solid(&engine, 0, rgba(255, 0, 0, 255)));
    engine.redo().unwrap();
    assert_eq!(layer(&engine, 0), painted);
}

#[test]
fn small_budget_evicts_oldest_edits() {
    let (_sample_dir, mut sample) = engine(1, 8, 8);
    sample.clear_layer(0, 1.0, 0.0, 0.0, 1.0).unwrap();
    let one = sample.undo_ring().total_bytes();

    let config = EngineConfig::new().with_undo_max_bytes(one * 2 + one / 2);
    let (_dir, mut engine) = engine_with(1, 8, 8, &config);
    engine.clear_layer(0, 1.0, 0.0, 0.0, 1.0).unwrap();
    engine.clear_layer(0, 0.0, 1.0, 0.0, 1.0).unwrap();
    engine.clear_layer(0, 0.0, 0.0, 1.0, 1.0).unwrap();

    assert_eq!(engine.undo_ring().len(), 2);
    assert!(engine.undo_ring().total_bytes() <= one * 2 + one / 2);
    assert!(engine.undo().unwrap());
    assert!(engine.undo().unwrap());
    assert!(!engine.undo().unwrap());
    assert!(solid(&engine, 0, rgba(255, 0, 0, 255)));
}

#[test]
fn disabled_undo_still_journals() {
    let config = EngineConfig::new().with_undo_enabled(false);
    let (_dir, mut engine) = engine_with(1, 4, 4, &config);
    engine.clear_layer(0, 1.0, 0.0, 0.0, 1.0).unwrap();
    assert!(!engine.has_undo());
    assert_eq!(journal_kinds(&engine), vec![CommandKind::LayerClear]);
}

#[test]
fn replay_rebuilds_a_fresh_canvas() {
    let (dir, mut engine) = engine(2, 32, 32);
    engine.clear_layer(1, 1.0, 1.0, 1.0, 1.0).unwrap();
    let image = RgbaImage::from_pixel(4, 4, rgba(0, 0, 255, 255));
    engine.blit_layer(1, &image, BlitTransform::translate(2.0, 2.0)).unwrap();
    engine.select_layer(1).unwrap();
    engine.color_select(1.0, 0.0, 0.0, 1.0).unwrap();
    engine.stroke_begin(1, false, true, 4.0, 20.0).unwrap();
    engine.stroke_move(12.0, 24.0).unwrap();
    engine.stroke_end().unwrap();
    engine.set_layer_opacity(0, 0.5).unwrap();
    let until = engine.checkpoint();
    engine.close_streams().unwrap();

    let canvas = Canvas::new(2, SizePx::new(32, 32));
    let mut fresh = Engine::new(canvas, streams_in(&dir), &EngineConfig::new());
    fresh.open_streams().unwrap();
    fresh.replay_until(until).unwrap();

    assert_eq!(fresh.checkpoint(), until);
    assert_eq!(layer(&fresh, 1), layer(&engine, 1));
    assert_eq!(layer(&fresh, 0), layer(&engine, 0));
    assert_eq!(fresh.layers().layer_opacity(0), 0.5);
    assert_eq!(fresh.layers().active_layer(), 1);
    assert!(!fresh.has_undo());
    assert!(fresh.write_enabled());
}

#[test]
fn default_history_keeps_ten_steps() {
    let (_dir, mut engine) = engine(1, 4, 4);
    for step in 0..12 {
        engine.set_layer_opacity(0, step as f32 / 20.0).unwrap();
    }
    assert_eq!(engine.undo_ring().len(), 10);

    let mut undone = 0;
    while engine.undo().unwrap() {
        undone += 1;
    }
    assert_eq!(undone, 10);
    // the two oldest steps were dropped
    assert_eq!(engine.layers().layer_opacity(0), 1.0 / 20.0);
}

// ============================================================================
// Far-off strokes and damaged journals
// ============================================================================

#[test]
fn stroke_far_off_canvas_paints_nothing() {
    let (_dir, mut engine) = engine(1, 16, 16);
    engine.tool_select(ToolSettings::soft_brush(1024, 1.0, 0.1)).unwrap();
    engine.stroke_begin(0, false, false, 4_294_967_000.0, 10.0).unwrap();
    engine.stroke_move(4_294_967_000.0, 20.0).unwrap();
    engine.stroke_end().unwrap();

    assert!(solid(&engine, 0, rgba(0, 0, 0, 0)));
    assert!(engine.undo().unwrap());
    assert!(engine.redo().unwrap());
    assert!(solid(&engine, 0, rgba(0, 0, 0, 0)));
}

#[test]
fn long_stroke_segment_finishes() {
    let (_dir, mut engine) = engine(1, 16, 16);
    engine.color_select(0.0, 1.0, 0.0, 1.0).unwrap();
    engine.stroke_begin(0, false, true, 8.0, 8.0).unwrap();
    engine.stroke_move(2.0e7, 0.0).unwrap();
    engine.stroke_end().unwrap();

    assert_eq!(engine.layers().layer_image(0).get_pixel(8, 8), &rgba(0, 255, 0, 255));
    let painted = layer(&engine, 0);

    assert!(engine.undo().unwrap());
    assert!(solid(&engine, 0, rgba(0, 0, 0, 0)));
    assert!(engine.redo().unwrap());
    assert_eq!(layer(&engine, 0), painted);
}

#[test]
fn stroke_on_another_layer_records_the_switch() {
    let (_dir, mut engine) = engine(2, 16, 16);
    assert_eq!(engine.layers().active_layer(), 0);
    engine.stroke_begin(1, false, false, 4.0, 4.0).unwrap();
    engine.stroke_move(12.0, 12.0).unwrap();
    engine.stroke_end().unwrap();
    assert_eq!(engine.layers().active_layer(), 1);
    let painted = layer(&engine, 1);
    assert!(!solid(&engine, 1, rgba(0, 0, 0, 0)));

    assert!(engine.undo().unwrap());
    assert_eq!(engine.layers().active_layer(), 0);
    assert!(solid(&engine, 1, rgba(0, 0, 0, 0)));

    assert!(engine.redo().unwrap());
    assert_eq!(engine.layers().active_layer(), 1);
    assert_eq!(layer(&engine, 1), painted);
}

#[test]
fn cancelled_stroke_switches_the_layer_back() {
    let (_dir, mut engine) = engine(2, 16, 16);
    engine.stroke_begin(1, false, false, 4.0, 4.0).unwrap();
    assert_eq!(engine.layers().active_layer(), 1);
    engine.stroke_cancel().unwrap();
    assert_eq!(engine.layers().active_layer(), 0);
    assert!(solid(&engine, 1, rgba(0, 0, 0, 0)));
}

#[test]
fn replay_stops_cleanly_at_a_bad_command() {
    let (dir, mut engine) = engine(1, 8, 8);
    engine.clear_layer(0, 1.0, 0.0, 0.0, 1.0).unwrap();
    let cleared = engine.checkpoint();
    engine.close_streams().unwrap();
    drop(engine);

    let journal = dir.path().join("journal.bin");
    OpenOptions::new()
        .append(true)
        .open(&journal)
        .unwrap()
        .write_all(&[99, 1, 0, 0])
        .unwrap();
    let end = std::fs::metadata(&journal).unwrap().len();

    let canvas = Canvas::new(1, SizePx::new(8, 8));
    let mut fresh = Engine::new(canvas, streams_in(&dir), &EngineConfig::new());
    fresh.open_streams().unwrap();
    let err = fresh
        .replay_until(Checkpoint { journal: end, blob: 0 })
        .unwrap_err();
    assert!(matches!(err, Error::Decode(DecodeError::UnknownKind(99))));

    assert!(fresh.undo_enabled());
    assert!(fresh.write_enabled());
    assert_eq!(fresh.checkpoint().journal, cleared.journal);
    assert!(solid(&fresh, 0, rgba(255, 0, 0, 255)));

    fresh.set_layer_opacity(0, 0.5).unwrap();
    assert_eq!(
        journal_kinds(&fresh),
        vec![CommandKind::LayerClear, CommandKind::LayerOpacity]
    );
}

#[test]
fn failed_redo_keeps_the_history_position() {
    let (_dir, mut engine) = engine(1, 4, 4);
    engine.clear_layer(0, 1.0, 0.0, 0.0, 1.0).unwrap();
    assert!(engine.undo().unwrap());

    // damage the journaled clear so redo cannot replay it
    let mut file = OpenOptions::new()
        .write(true)
        .open(engine.streams().journal().path())
        .unwrap();
    file.write_all(&[99]).unwrap();
    drop(file);

    let err = engine.redo().unwrap_err();
    assert!(matches!(err, Error::Decode(DecodeError::UnknownKind(99))));
    assert!(engine.has_redo());
    assert!(!engine.has_undo());
    assert_eq!(engine.checkpoint().journal, 0);
    assert!(engine.undo_enabled());
    assert!(engine.write_enabled());
    assert!(solid(&engine, 0, rgba(0, 0, 0, 0)));

    engine.clear_layer(0, 0.0, 0.0, 1.0, 1.0).unwrap();
    assert!(!engine.has_redo());
    assert!(solid(&engine, 0, rgba(0, 0, 255, 255)));
    assert_eq!(journal_kinds(&engine), vec![CommandKind::LayerClear]);
}
