use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};
use scrollplot::core::{Axis, CoordinateRange, PixelRect, Viewport, ZoomFrame};
use scrollplot::interaction::AnimationStep;
use scrollplot::render::{Argb, ColorMap, PixelSurface, ScratchArena};
use scrollplot::{PlotConfig, PlotError, PlotWidget, WaterfallWidget};

const LOUD: f32 = 0.0;
const QUIET: f32 = -120.0;

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn waterfall(bins: u32, width: u32, height: u32) -> WaterfallWidget {
    WaterfallWidget::new(
        CoordinateRange::new(0.0, f64::from(bins)).expect("x limits"),
        bins,
        Viewport::new(width, height),
        ColorMap::default(),
        PlotConfig::default(),
    )
    .expect("waterfall")
}

fn render(widget: &WaterfallWidget, width: u32, height: u32) -> PixelSurface {
    let mut target = PixelSurface::new(width, height, Argb::WHITE);
    let mut scratch = ScratchArena::new();
    widget.render_into(&mut target, PixelRect::new(0, 0, width, height), &mut scratch);
    target
}

fn half_loud(bins: usize) -> Vec<f32> {
    (0..bins)
        .map(|bin| if bin < bins / 2 { QUIET } else { LOUD })
        .collect()
}

#[test]
fn new_lines_enter_at_the_bottom() {
    let widget = waterfall(4, 4, 3);
    let colors = ColorMap::default();
    widget
        .push_line(start_time(), &[LOUD; 4])
        .expect("first line");
    widget
        .push_line(start_time() + Duration::seconds(1), &[QUIET; 4])
        .expect("second line");

    let image = widget.amplitude_image().expect("sized image");
    assert!(image.row(2).iter().all(|pixel| *pixel == colors.color_for(-120.0)));
    assert!(image.row(1).iter().all(|pixel| *pixel == colors.color_for(0.0)));
    assert_eq!(widget.history_len(), 2);
}

#[test]
fn timestamps_follow_row_age() {
    let widget = waterfall(4, 4, 3);
    let first = start_time();
    let second = first + Duration::milliseconds(250);
    widget.push_line(first, &[LOUD; 4]).expect("first");
    widget.push_line(second, &[LOUD; 4]).expect("second");

    assert_eq!(widget.timestamp_at_row(2), Some(second));
    assert_eq!(widget.timestamp_at_row(1), Some(first));
    assert_eq!(widget.timestamp_at_row(0), None);
    assert_eq!(widget.timestamp_at_row(3), None);
}

#[test]
fn history_is_bounded_by_the_height() {
    let widget = waterfall(4, 4, 3);
    for second in 0..10 {
        widget
            .push_line(start_time() + Duration::seconds(second), &[LOUD; 4])
            .expect("line");
    }
    assert_eq!(widget.history_len(), 3);
    assert_eq!(
        widget.timestamp_at_row(0),
        Some(start_time() + Duration::seconds(7))
    );
}

#[test]
fn invalid_lines_are_rejected() {
    let widget = waterfall(4, 4, 3);
    assert!(matches!(
        widget.push_line(start_time(), &[]),
        Err(PlotError::InvalidData(_))
    ));
    assert_eq!(widget.history_len(), 0);
    assert!(!widget.take_redraw_request());
}

#[test]
fn bin_count_change_is_adopted() {
    let widget = waterfall(4, 4, 3);
    widget.push_line(start_time(), &[LOUD; 8]).expect("wider line");
    assert_eq!(widget.bins(), 8);
}

#[test]
fn redraw_request_is_raised_once_per_change() {
    let widget = waterfall(4, 4, 3);
    assert!(!widget.take_redraw_request());
    widget.push_line(start_time(), &[LOUD; 4]).expect("line");
    assert!(widget.take_redraw_request());
    assert!(!widget.take_redraw_request());
    widget.mark_detection(1, Argb::YELLOW);
    assert!(widget.take_redraw_request());
}

#[test]
fn render_is_skipped_when_the_clip_does_not_match() {
    let widget = waterfall(4, 4, 3);
    widget.push_line(start_time(), &[LOUD; 4]).expect("line");

    let mut target = PixelSurface::new(10, 10, Argb::WHITE);
    let mut scratch = ScratchArena::new();
    widget.render_into(&mut target, PixelRect::new(0, 0, 8, 8), &mut scratch);
    assert!(target.pixels().iter().all(|pixel| *pixel == Argb::WHITE));

    widget.render_into(&mut target, PixelRect::new(2, 3, 4, 3), &mut scratch);
    assert_eq!(target.pixel(2, 5), Some(ColorMap::default().color_for(0.0)));
    assert_eq!(target.pixel(1, 5), Some(Argb::WHITE));
}

#[test]
fn detection_marks_are_drawn_over_the_image() {
    let widget = waterfall(100, 100, 10);
    widget.push_line(start_time(), &[QUIET; 100]).expect("line");
    widget.mark_detection(42, Argb::YELLOW);

    let image = render(&widget, 100, 10);
    assert_eq!(image.pixel(42, 9), Some(Argb::YELLOW));
    assert_eq!(image.pixel(41, 9), Some(ColorMap::default().color_for(-120.0)));

    widget.push_line(start_time(), &[QUIET; 100]).expect("line");
    let image = render(&widget, 100, 10);
    assert_eq!(image.pixel(42, 8), Some(Argb::YELLOW));
    assert_eq!(image.pixel(42, 9), Some(ColorMap::default().color_for(-120.0)));
}

#[test]
fn detection_marks_survive_resize() {
    let widget = waterfall(100, 100, 10);
    widget.push_line(start_time(), &[QUIET; 100]).expect("line");
    widget.mark_detection(42, Argb::YELLOW);

    widget.resize(50, 10);
    let image = render(&widget, 50, 10);
    assert_eq!(image.pixel(21, 9), Some(Argb::YELLOW));
    let marked = image
        .pixels()
        .iter()
        .filter(|pixel| **pixel == Argb::YELLOW)
        .count();
    assert_eq!(marked, 1);
}

#[test]
fn zoomed_image_is_rendered_when_the_animation_settles() {
    let widget = waterfall(100, 100, 10);
    let settled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&settled);
    widget.add_zoom_listener(Box::new(move |_: &ZoomFrame| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    widget.push_line(start_time(), &half_loud(100)).expect("line");
    let loud = ColorMap::default().color_for(0.0);
    let quiet = ColorMap::default().color_for(-120.0);

    assert_eq!(widget.zoom_to(50.0, 100.0, 0.0, 9.0), Ok(true));
    let before = widget.amplitude_image().expect("image");
    assert_eq!(before.pixel(0, 9), Some(quiet));

    assert!(matches!(widget.tick(1.0), AnimationStep::Settled(_)));
    assert_eq!(settled.load(Ordering::SeqCst), 1);
    let after = widget.amplitude_image().expect("image");
    assert!(after.row(9).iter().all(|pixel| *pixel == loud));
    assert!(widget.is_zoomed());

    assert_eq!(widget.reset_zoom(), Ok(true));
    widget.tick(1.0);
    let reset = widget.amplitude_image().expect("image");
    assert_eq!(reset.pixel(0, 9), Some(quiet));
    assert_eq!(reset.pixel(99, 9), Some(loud));
}

#[test]
fn wheel_zoom_rerenders_immediately() {
    let widget = waterfall(100, 100, 10);
    widget.push_line(start_time(), &half_loud(100)).expect("line");
    assert!(widget.wheel_zoom(-3, 99.0));
    let frame = widget.zoom_frame();
    assert!(frame.x.span() < 100.0);
    assert_eq!(frame.y, CoordinateRange::new(0.0, 9.0).expect("rows"));

    let image = widget.amplitude_image().expect("image");
    assert_eq!(image.pixel(99, 9), Some(ColorMap::default().color_for(0.0)));
}

#[test]
fn only_the_horizontal_axis_zooms() {
    let widget = waterfall(100, 100, 10);
    assert_eq!(widget.set_visible_range(Axis::Y, 2.0, 4.0), Ok(false));
    assert_eq!(widget.set_visible_range(Axis::X, 20.0, 40.0), Ok(true));
    assert_eq!(widget.unit_to_pixel(Axis::X, 20.0), 0);
    assert_eq!(widget.unit_to_pixel(Axis::X, 40.0), 99);
}

fn spike(bins: usize, at: usize) -> Vec<f32> {
    (0..bins)
        .map(|bin| if bin == at { LOUD } else { QUIET })
        .collect()
}

fn columns_with(row: &[Argb], color: Argb) -> Vec<usize> {
    row.iter()
        .enumerate()
        .filter(|(_, pixel)| **pixel == color)
        .map(|(column, _)| column)
        .collect()
}

#[test]
fn marks_stay_on_the_image_when_the_bin_count_changes_while_zoomed() {
    let widget = waterfall(100, 100, 10);
    assert_eq!(widget.set_visible_range(Axis::X, 50.0, 100.0), Ok(true));

    widget.push_line(start_time(), &spike(200, 150)).expect("wider line");
    widget.mark_detection(150, Argb::YELLOW);

    let loud = ColorMap::default().color_for(0.0);
    let amplitude = widget.amplitude_image().expect("image");
    assert_eq!(columns_with(amplitude.row(9), loud), vec![50]);

    let image = render(&widget, 100, 10);
    assert_eq!(columns_with(image.row(9), Argb::YELLOW), vec![50]);
}

#[test]
fn lines_pushed_during_an_animation_use_the_destination_window() {
    let widget = waterfall(100, 100, 10);
    assert_eq!(widget.zoom_to(50.0, 100.0, 0.0, 9.0), Ok(true));

    widget.push_line(start_time(), &spike(100, 75)).expect("line");
    let loud = ColorMap::default().color_for(0.0);
    let image = widget.amplitude_image().expect("image");
    assert_eq!(columns_with(image.row(9), loud), vec![50, 51]);

    assert!(matches!(widget.tick(1.0), AnimationStep::Settled(_)));
    let settled = widget.amplitude_image().expect("image");
    assert_eq!(settled.row(9), image.row(9));
}
