use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration as WallDuration;

use chrono::{TimeZone, Utc};
use scrollplot::api::PRIMARY_SERIES_KEY;
use scrollplot::core::{Axis, PixelRect, SampleSeries, UniformSeries, Viewport, XySeries, ZoomFrame};
use scrollplot::render::{Argb, PixelSurface, ScratchArena};
use scrollplot::{LineGraphWidget, PlotConfig, PlotError, PlotWidget};

fn limits() -> ZoomFrame {
    ZoomFrame::from_bounds(0.0, 99.0, -1.0, 1.0).expect("limits")
}

fn graph() -> LineGraphWidget {
    LineGraphWidget::new(limits(), Viewport::new(100, 50), PlotConfig::default()).expect("graph")
}

fn flat(level: f32) -> Arc<dyn SampleSeries> {
    Arc::new(UniformSeries::new(0.0, 1.0, vec![level; 100]).expect("series"))
}

fn render(widget: &LineGraphWidget) -> PixelSurface {
    let mut target = PixelSurface::new(100, 50, Argb::WHITE);
    let mut scratch = ScratchArena::new();
    widget.render_into(&mut target, PixelRect::new(0, 0, 100, 50), &mut scratch);
    target
}

fn count(image: &PixelSurface, color: Argb) -> usize {
    image.pixels().iter().filter(|pixel| **pixel == color).count()
}

#[test]
fn series_keep_insertion_order_on_replace() {
    let widget = graph();
    widget.set_series("a", flat(0.0), Argb::RED);
    widget.set_series("b", flat(0.5), Argb::GREEN);
    widget.set_series("a", flat(-0.5), Argb::BLUE);
    assert_eq!(widget.series_keys(), vec!["a".to_owned(), "b".to_owned()]);
}

#[test]
fn unknown_series_are_reported() {
    let widget = graph();
    assert_eq!(
        widget.remove_series("missing"),
        Err(PlotError::UnknownSeries("missing".to_owned()))
    );
    assert!(matches!(
        widget.cache_stats("missing"),
        Err(PlotError::UnknownSeries(_))
    ));
    assert!(widget.invalidate_series("missing").is_err());
}

#[test]
fn batch_removal_validates_before_removing() {
    let widget = graph();
    for key in ["a", "b", "c", "d"] {
        widget.set_series(key, flat(0.0), Argb::RED);
    }

    assert!(matches!(
        widget.remove_series_batch(&[2, 1]),
        Err(PlotError::InvalidBatch(_))
    ));
    assert!(matches!(
        widget.remove_series_batch(&[1, 1]),
        Err(PlotError::InvalidBatch(_))
    ));
    assert!(matches!(
        widget.remove_series_batch(&[0, 4]),
        Err(PlotError::InvalidBatch(_))
    ));
    assert_eq!(widget.series_keys().len(), 4);

    assert_eq!(widget.remove_series_batch(&[0, 2]), Ok(2));
    assert_eq!(widget.series_keys(), vec!["b".to_owned(), "d".to_owned()]);
    assert_eq!(widget.remove_series_batch(&[]), Ok(0));
}

#[test]
fn push_line_replaces_the_primary_trace() {
    let widget = graph().with_primary_color(Argb::YELLOW);
    let stamp = Utc
        .with_ymd_and_hms(2024, 5, 1, 8, 30, 0)
        .single()
        .expect("timestamp");
    widget.push_line(stamp, &[0.0; 10]).expect("line");
    widget.push_line(stamp, &[0.5; 20]).expect("line");

    assert_eq!(widget.series_keys(), vec![PRIMARY_SERIES_KEY.to_owned()]);
    assert_eq!(widget.last_update(), Some(stamp));
    assert!(widget.push_line(stamp, &[]).is_err());

    let image = render(&widget);
    let y = widget.unit_to_pixel(Axis::Y, 0.5);
    assert_eq!(image.pixel(0, y), Some(Argb::YELLOW));
    assert_eq!(image.pixel(99, y), Some(Argb::YELLOW));
}

#[test]
fn rendering_draws_each_series_in_its_colour() {
    let widget = graph();
    widget.set_series("low", flat(-0.5), Argb::RED);
    widget.set_series("high", flat(0.5), Argb::GREEN);
    let image = render(&widget);

    let low = widget.unit_to_pixel(Axis::Y, -0.5);
    let high = widget.unit_to_pixel(Axis::Y, 0.5);
    assert!(low > high);
    assert_eq!(image.pixel(50, low), Some(Argb::RED));
    assert_eq!(image.pixel(50, high), Some(Argb::GREEN));
    assert_eq!(count(&image, Argb::RED), 100);
}

#[test]
fn unchanged_frames_hit_the_cache() {
    let widget = graph();
    widget.set_series("trace", flat(0.0), Argb::RED);
    render(&widget);
    render(&widget);
    let stats = widget.cache_stats("trace").expect("stats");
    assert_eq!(stats.rebuilds, 1);
    assert_eq!(stats.hits, 1);

    widget
        .set_visible_range(Axis::Y, -0.5, 0.5)
        .expect("y range");
    render(&widget);
    assert_eq!(widget.cache_stats("trace").expect("stats").y_recomputes, 1);

    widget.invalidate_series("trace").expect("invalidate");
    render(&widget);
    assert_eq!(widget.cache_stats("trace").expect("stats").rebuilds, 2);
}

#[test]
fn zoom_round_trip_restores_the_limits() {
    let widget = graph();
    assert_eq!(widget.zoom_to(10.0, 20.0, -0.5, 0.5), Ok(true));
    assert!(widget.is_zoomed());
    widget.tick(1.0);
    assert_eq!(widget.zoom_frame(), ZoomFrame::from_bounds(10.0, 20.0, -0.5, 0.5).expect("frame"));

    assert_eq!(widget.zoom_out(), Ok(true));
    widget.tick(1.0);
    assert_eq!(widget.zoom_frame(), limits());
    assert!(!widget.is_zoomed());
    assert_eq!(widget.zoom_out(), Ok(false));
}

#[test]
fn zoomed_view_draws_segments_crossing_the_edges() {
    let widget = graph();
    let ramp: Vec<f32> = vec![-1.0, 1.0];
    let series = XySeries::new(vec![0.0, 99.0], ramp).expect("series");
    widget.set_series("ramp", Arc::new(series), Argb::RED);
    widget
        .set_visible_range(Axis::X, 40.0, 60.0)
        .expect("x range");
    let image = render(&widget);
    assert!(count(&image, Argb::RED) >= 20);
    assert!((0..50).any(|y| image.pixel(0, y) == Some(Argb::RED)));
    assert!((0..50).any(|y| image.pixel(99, y) == Some(Argb::RED)));
}

type ReadHook = Box<dyn FnOnce() + Send>;

/// Flat series that runs a hook the first time one of its samples is read.
struct HookedSeries {
    inner: UniformSeries,
    hook: Mutex<Option<ReadHook>>,
}

impl SampleSeries for HookedSeries {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn x(&self, index: usize) -> f64 {
        self.inner.x(index)
    }

    fn y(&self, index: usize) -> f64 {
        let hook = self.hook.lock().expect("hook").take();
        if let Some(hook) = hook {
            hook();
        }
        self.inner.y(index)
    }
}

#[test]
fn producers_can_push_while_series_are_painting() {
    let widget = Arc::new(graph());
    let series = Arc::new(HookedSeries {
        inner: UniformSeries::new(0.0, 1.0, vec![0.25; 100]).expect("series"),
        hook: Mutex::new(None),
    });
    widget.set_series("hooked", Arc::clone(&series) as Arc<dyn SampleSeries>, Argb::RED);

    let stamp = Utc
        .with_ymd_and_hms(2024, 5, 1, 9, 0, 0)
        .single()
        .expect("timestamp");
    let (result_tx, result_rx) = mpsc::channel();
    let producer = Arc::clone(&widget);
    *series.hook.lock().expect("hook") = Some(Box::new(move || {
        let (done_tx, done_rx) = mpsc::channel();
        thread::spawn(move || {
            let pushed = producer.push_line(stamp, &[0.0; 10]).is_ok();
            let _ = done_tx.send(pushed);
        });
        let pushed = done_rx
            .recv_timeout(WallDuration::from_millis(500))
            .unwrap_or(false);
        let _ = result_tx.send(pushed);
    }));

    render(&widget);
    assert_eq!(result_rx.recv_timeout(WallDuration::from_secs(5)), Ok(true));
    assert_eq!(
        widget.series_keys(),
        vec!["hooked".to_owned(), PRIMARY_SERIES_KEY.to_owned()]
    );
    assert_eq!(widget.last_update(), Some(stamp));
}
