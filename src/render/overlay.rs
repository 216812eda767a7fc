//! Sparse mark layer kept registered with a primary scrolling image.
//!
//! Marks (detections) are recorded twice: once in a reference buffer at the
//! data's natural resolution and once in a display buffer at screen
//! resolution. Both buffers share the height and the cursor, so every scroll
//! is applied to both in lock-step. The display buffer is only rebuilt from
//! the reference when its width or the visible reference window changes.

#[cfg(feature = "parallel-rebuild")]
use rayon::prelude::*;
use tracing::debug;

use crate::core::PixelRect;
use crate::error::{PlotError, PlotResult};
use crate::render::circular_buffer::CircularPixelBuffer;
use crate::render::surface::{Argb, BlendMode, PixelSurface};

/// Linear map from reference pixel cells to display pixel spans.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpanMapping {
    window_start: f64,
    scale: f64,
    display_width: u32,
}

impl SpanMapping {
    #[must_use]
    pub fn new(window_start: f64, window_end: f64, display_width: u32) -> Self {
        let window = window_end - window_start;
        let scale = if window > 0.0 {
            f64::from(display_width) / window
        } else {
            0.0
        };
        Self {
            window_start,
            scale,
            display_width,
        }
    }

    /// Display columns covered by reference cells `x_start..=x_end`.
    ///
    /// A reference pixel `x` is the cell centred on `x + 0.5`, half a
    /// reference pixel on each side. The span is never empty, so a single
    /// mark survives when the display is narrower than the reference.
    /// Returns `None` when the cells lie outside the visible window.
    #[must_use]
    pub fn display_span(&self, x_start: i32, x_end: i32) -> Option<(i32, i32)> {
        if self.scale <= 0.0 || self.display_width == 0 {
            return None;
        }
        let (first, last) = if x_start <= x_end {
            (x_start, x_end)
        } else {
            (x_end, x_start)
        };
        let lo = (f64::from(first) - self.window_start) * self.scale;
        let hi = (f64::from(last) + 1.0 - self.window_start) * self.scale;
        let start = lo.floor();
        let end = (hi.ceil() - 1.0).max(start);
        let max_column = f64::from(self.display_width - 1);
        if end < 0.0 || start > max_column {
            return None;
        }
        Some((start.max(0.0) as i32, end.min(max_column) as i32))
    }
}

#[derive(Debug, Clone)]
pub struct OverlayAlignmentLayer {
    reference: CircularPixelBuffer,
    display: CircularPixelBuffer,
    window: Option<(f64, f64)>,
}

impl OverlayAlignmentLayer {
    /// Creates an unsized layer; `background` marks "no detection" pixels.
    #[must_use]
    pub fn new(background: Argb) -> Self {
        Self {
            reference: CircularPixelBuffer::new(background),
            display: CircularPixelBuffer::new(background),
            window: None,
        }
    }

    #[must_use]
    pub fn reference(&self) -> &CircularPixelBuffer {
        &self.reference
    }

    #[must_use]
    pub fn display(&self) -> &CircularPixelBuffer {
        &self.display
    }

    #[must_use]
    pub fn is_sized(&self) -> bool {
        self.reference.is_sized()
    }

    /// Visible reference window `[start, end)` in reference pixels.
    #[must_use]
    pub fn visible_reference_window(&self) -> (f64, f64) {
        self.window
            .unwrap_or((0.0, f64::from(self.reference.width())))
    }

    #[must_use]
    pub fn span_mapping(&self) -> SpanMapping {
        let (start, end) = self.visible_reference_window();
        SpanMapping::new(start, end, self.display.width())
    }

    pub fn set_size_and_clear(&mut self, reference_width: u32, display_width: u32, height: u32) {
        self.reference.set_size_and_clear(reference_width, height);
        self.display.set_size_and_clear(display_width, height);
    }

    /// Resizes the display side, keeping every recorded mark.
    ///
    /// The reference keeps its width and is resized in height with its
    /// content; the display is rebuilt from it.
    pub fn resize(&mut self, display_width: u32, height: u32) {
        if !self.reference.is_sized() {
            let reference_width = display_width;
            self.set_size_and_clear(reference_width, display_width, height);
            return;
        }
        let reference_width = self.reference.width();
        self.reference.resize_existing(reference_width, height);
        self.rebuild_display(display_width);
    }

    /// Changes the reference (data) width, resampling the recorded marks.
    pub fn set_reference_width(&mut self, reference_width: u32) {
        if !self.reference.is_sized() {
            return;
        }
        let height = self.reference.height();
        self.reference.resize_existing(reference_width, height);
        self.window = None;
        let display_width = self.display.width();
        self.rebuild_display(display_width);
    }

    /// Registers the layer with a horizontally zoomed primary image.
    ///
    /// `None` shows the whole reference width again.
    pub fn set_visible_reference_window(&mut self, window: Option<(f64, f64)>) -> PlotResult<()> {
        if let Some((start, end)) = window {
            if !start.is_finite() || !end.is_finite() || start >= end {
                return Err(PlotError::InvalidRange {
                    axis: "x",
                    min: start,
                    max: end,
                });
            }
        }
        if self.window == window {
            return Ok(());
        }
        self.window = window;
        let display_width = self.display.width();
        self.rebuild_display(display_width);
        Ok(())
    }

    pub fn scroll_up(&mut self) {
        self.reference.scroll_up();
        self.display.scroll_up();
    }

    pub fn scroll_down(&mut self) {
        self.reference.scroll_down();
        self.display.scroll_down();
    }

    pub fn draw_pixel_bottom(&mut self, x: i32, color: Argb) {
        self.draw_line_bottom_relative(x, x, 0, color);
    }

    pub fn draw_pixel_bottom_relative(&mut self, x: i32, relative_y: u32, color: Argb) {
        self.draw_line_bottom_relative(x, x, relative_y, color);
    }

    pub fn draw_line_bottom(&mut self, x_start: i32, x_end: i32, color: Argb) {
        self.draw_line_bottom_relative(x_start, x_end, 0, color);
    }

    pub fn draw_line_bottom_relative(&mut self, x_start: i32, x_end: i32, relative_y: u32, color: Argb) {
        self.reference
            .draw_line_bottom_relative(x_start, x_end, relative_y, color);
        if let Some((start, end)) = self.span_mapping().display_span(x_start, x_end) {
            self.display
                .draw_line_bottom_relative(start, end, relative_y, color);
        }
    }

    /// Composites the display image over `target`, leaving unmarked pixels untouched.
    pub fn draw_image_to(&self, target: &mut PixelSurface, dest_x: i32, dest_y: i32, clip: PixelRect) {
        self.display
            .draw_image_clipped(target, dest_x, dest_y, clip, BlendMode::SourceOver);
    }

    /// Replays every reference row into a fresh display buffer.
    fn rebuild_display(&mut self, display_width: u32) {
        let height = self.reference.height();
        self.display.set_size_and_clear(display_width, height);
        self.display.set_write_index(self.reference.write_index());

        let mapping = self.span_mapping();
        let background = self.reference.background();
        let width = self.display.width() as usize;
        let reference = &self.reference;
        let Some(pixels) = self.display.pixels_mut() else {
            return;
        };

        #[cfg(feature = "parallel-rebuild")]
        pixels
            .par_chunks_exact_mut(width)
            .enumerate()
            .for_each(|(row, out)| replay_row(reference.storage_row(row), out, mapping, background));

        #[cfg(not(feature = "parallel-rebuild"))]
        pixels
            .chunks_exact_mut(width)
            .enumerate()
            .for_each(|(row, out)| replay_row(reference.storage_row(row), out, mapping, background));

        debug!(
            reference_width = reference.width(),
            display_width = width,
            height,
            "overlay display rebuilt from reference"
        );
    }
}

/// Maps every run of equal, non-background reference pixels onto `out`.
fn replay_row(reference_row: Option<&[Argb]>, out: &mut [Argb], mapping: SpanMapping, background: Argb) {
    let Some(reference_row) = reference_row else {
        return;
    };
    let mut x = 0usize;
    while x < reference_row.len() {
        let color = reference_row[x];
        if color == background {
            x += 1;
            continue;
        }
        let run_start = x;
        while x + 1 < reference_row.len() && reference_row[x + 1] == color {
            x += 1;
        }
        if let Some((start, end)) = mapping.display_span(run_start as i32, x as i32) {
            out[start as usize..=end as usize].fill(color);
        }
        x += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::{OverlayAlignmentLayer, SpanMapping};
    use crate::render::surface::{Argb, PixelSurface};

    fn displayed(layer: &OverlayAlignmentLayer) -> PixelSurface {
        let display = layer.display();
        let mut target = PixelSurface::new(display.width(), display.height(), Argb::BLACK);
        let clip = target.bounds();
        layer.draw_image_to(&mut target, 0, 0, clip);
        target
    }

    #[test]
    fn span_mapping_never_loses_a_single_pixel_mark() {
        let narrow = SpanMapping::new(0.0, 1_000.0, 100);
        for x in 0..1_000 {
            let (start, end) = narrow.display_span(x, x).expect("inside window");
            assert!(start <= end);
            assert_eq!(start, x / 10);
        }

        let wide = SpanMapping::new(0.0, 100.0, 400);
        assert_eq!(wide.display_span(10, 10), Some((40, 43)));
        assert_eq!(wide.display_span(10, 11), Some((40, 47)));
    }

    #[test]
    fn span_mapping_honours_the_visible_window() {
        let zoomed = SpanMapping::new(50.0, 100.0, 100);
        assert_eq!(zoomed.display_span(10, 10), None);
        assert_eq!(zoomed.display_span(60, 60), Some((20, 21)));
        assert_eq!(zoomed.display_span(120, 130), None);
    }

    #[test]
    fn marks_survive_display_shrinking() {
        let mut layer = OverlayAlignmentLayer::new(Argb::TRANSPARENT);
        layer.set_size_and_clear(1_000, 800, 20);
        layer.draw_pixel_bottom(997, Argb::RED);
        layer.scroll_up();
        layer.draw_pixel_bottom(3, Argb::GREEN);

        layer.resize(37, 20);
        let image = displayed(&layer);
        assert_eq!(image.pixel(36, 18), Some(Argb::RED));
        assert_eq!(image.pixel(0, 19), Some(Argb::GREEN));
        let marked = image
            .pixels()
            .iter()
            .filter(|pixel| **pixel != Argb::BLACK)
            .count();
        assert_eq!(marked, 2);
    }

    #[test]
    fn scrolling_keeps_both_buffers_in_lock_step() {
        let mut layer = OverlayAlignmentLayer::new(Argb::TRANSPARENT);
        layer.set_size_and_clear(200, 100, 10);
        layer.draw_line_bottom(20, 39, Argb::YELLOW);
        for _ in 0..4 {
            layer.scroll_up();
        }
        assert_eq!(
            layer.reference().write_index(),
            layer.display().write_index()
        );

        let image = displayed(&layer);
        for x in 10..20 {
            assert_eq!(image.pixel(x, 5), Some(Argb::YELLOW));
        }
        assert_eq!(image.pixel(9, 5), Some(Argb::BLACK));
        assert_eq!(image.pixel(20, 5), Some(Argb::BLACK));
    }

    #[test]
    fn zoom_window_rebuild_registers_marks_with_the_zoomed_image() {
        let mut layer = OverlayAlignmentLayer::new(Argb::TRANSPARENT);
        layer.set_size_and_clear(100, 100, 4);
        layer.draw_pixel_bottom(75, Argb::RED);

        layer
            .set_visible_reference_window(Some((50.0, 100.0)))
            .expect("valid window");
        let image = displayed(&layer);
        assert_eq!(image.pixel(50, 3), Some(Argb::RED));
        assert_eq!(image.pixel(51, 3), Some(Argb::RED));
        assert_eq!(image.pixel(49, 3), Some(Argb::BLACK));

        assert!(layer.set_visible_reference_window(Some((5.0, 5.0))).is_err());
    }
}
