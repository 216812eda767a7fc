use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration as WallDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use scrollplot::api::PRIMARY_SERIES_KEY;
use scrollplot::core::{CoordinateRange, PixelRect, SampleSeries, UniformSeries, Viewport, ZoomFrame};
use scrollplot::render::{Argb, ColorMap, PixelSurface, ScratchArena};
use scrollplot::{LineGraphWidget, PlotConfig, PlotWidget, WaterfallWidget};

const PRODUCERS: usize = 3;
const LINES_PER_PRODUCER: usize = 60;
const RENDER_PASSES: usize = 120;
const DEADLINE: WallDuration = WallDuration::from_secs(20);

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Runs every job on its own thread and fails if any of them is still
/// running after `DEADLINE`.
fn run_within_deadline(jobs: Vec<Box<dyn FnOnce() + Send>>) {
    let (done_tx, done_rx) = mpsc::channel();
    let count = jobs.len();
    let handles: Vec<_> = jobs
        .into_iter()
        .map(|job| {
            let done = done_tx.clone();
            thread::spawn(move || {
                job();
                let _ = done.send(());
            })
        })
        .collect();
    for finished in 0..count {
        assert!(
            done_rx.recv_timeout(DEADLINE).is_ok(),
            "only {finished} of {count} threads finished before the deadline"
        );
    }
    for handle in handles {
        handle.join().expect("worker thread panicked");
    }
}

fn render_loop<W: PlotWidget + 'static>(
    widget: Arc<W>,
    width: u32,
    height: u32,
    zoom: impl Fn(&W, usize) + Send + 'static,
) -> Box<dyn FnOnce() + Send> {
    Box::new(move || {
        let mut target = PixelSurface::new(width, height, Argb::BLACK);
        let mut scratch = ScratchArena::new();
        let clip = PixelRect::new(0, 0, width, height);
        for pass in 0..RENDER_PASSES {
            zoom(&widget, pass);
            widget.tick(0.02);
            widget.render_into(&mut target, clip, &mut scratch);
            let _ = widget.take_redraw_request();
        }
    })
}

#[test]
fn waterfall_producers_and_renderer_share_the_widget() {
    let widget = Arc::new(
        WaterfallWidget::new(
            CoordinateRange::new(0.0, 64.0).expect("x limits"),
            64,
            Viewport::new(64, 32),
            ColorMap::default(),
            PlotConfig::default(),
        )
        .expect("waterfall"),
    );

    let mut jobs: Vec<Box<dyn FnOnce() + Send>> = (0..PRODUCERS)
        .map(|producer| {
            let widget = Arc::clone(&widget);
            Box::new(move || {
                for line in 0..LINES_PER_PRODUCER {
                    let offset = Duration::milliseconds((producer * LINES_PER_PRODUCER + line) as i64);
                    let samples: Vec<f32> = (0..64).map(|bin| -100.0 + (bin + line) as f32).collect();
                    widget
                        .push_line(start_time() + offset, &samples)
                        .expect("push should succeed");
                    widget.mark_detection((line % 64) as u32, Argb::YELLOW);
                }
            }) as Box<dyn FnOnce() + Send>
        })
        .collect();
    jobs.push(render_loop(Arc::clone(&widget), 64, 32, |widget: &WaterfallWidget, pass| {
        match pass % 30 {
            0 => {
                let _ = widget.zoom_to(16.0, 48.0, 0.0, 31.0);
            }
            10 => {
                let _ = widget.wheel_zoom(-1, 20.0);
            }
            20 => {
                let _ = widget.reset_zoom();
            }
            _ => {}
        }
    }));

    run_within_deadline(jobs);

    assert_eq!(widget.history_len(), 32);
    assert_eq!(widget.bins(), 64);
    assert!(widget.timestamp_at_row(0).is_some());
    assert!(widget.timestamp_at_row(31).is_some());
}

#[test]
fn line_graph_producers_and_renderer_share_the_widget() {
    let limits = ZoomFrame::from_bounds(0.0, 99.0, -1.0, 1.0).expect("limits");
    let widget = Arc::new(
        LineGraphWidget::new(limits, Viewport::new(100, 50), PlotConfig::default())
            .expect("graph"),
    );

    let mut jobs: Vec<Box<dyn FnOnce() + Send>> = (0..PRODUCERS)
        .map(|producer| {
            let widget = Arc::clone(&widget);
            Box::new(move || {
                for line in 0..LINES_PER_PRODUCER {
                    let level = (line as f32 / LINES_PER_PRODUCER as f32) - 0.5;
                    let series: Arc<dyn SampleSeries> = Arc::new(
                        UniformSeries::new(0.0, 1.0, vec![level; 100]).expect("series"),
                    );
                    widget.set_series(format!("producer-{producer}"), series, Argb::RED);
                    widget
                        .push_line(start_time(), &vec![level; 50])
                        .expect("push should succeed");
                }
            }) as Box<dyn FnOnce() + Send>
        })
        .collect();
    jobs.push(render_loop(Arc::clone(&widget), 100, 50, |widget: &LineGraphWidget, pass| {
        match pass % 30 {
            0 => {
                let _ = widget.zoom_to(10.0, 60.0, -0.5, 0.5);
            }
            10 => {
                let _ = widget.pan_by_pixels(5.0, 0.0);
            }
            20 => {
                let _ = widget.zoom_out();
            }
            _ => {}
        }
    }));

    run_within_deadline(jobs);

    let keys = widget.series_keys();
    assert_eq!(keys.len(), PRODUCERS + 1);
    assert!(keys.iter().any(|key| key == PRIMARY_SERIES_KEY));
    assert_eq!(widget.last_update(), Some(start_time()));
}
