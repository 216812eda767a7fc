//! Wrap-around pixel surface for continuously scrolling images.
//!
//! Rows are stored in a ring addressed by `write_index`, the row holding the
//! newest line. Scrolling moves the cursor and rewrites a single row, so the
//! cost of a scroll is independent of the image height. The logical image
//! (oldest line at the top, newest at the bottom) is only materialized when it
//! is blitted, using at most two copies split at the wrap point.

use tracing::{debug, warn};

use crate::core::PixelRect;
use crate::render::surface::{Argb, BlendMode, PixelSurface};

/// Consecutive mismatched bulk writes tolerated before the mismatch is reported.
pub const SIZE_MISMATCH_REPORT_THRESHOLD: u32 = 3;

/// Lifecycle of a buffer. There is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// No surface allocated yet; draws are ignored.
    Unsized,
    Sized,
}

#[derive(Debug, Clone)]
pub struct CircularPixelBuffer {
    background: Argb,
    surface: Option<PixelSurface>,
    write_index: usize,
    mismatch_streak: u32,
    mismatch_reported: bool,
}

impl CircularPixelBuffer {
    #[must_use]
    pub fn new(background: Argb) -> Self {
        Self {
            background,
            surface: None,
            write_index: 0,
            mismatch_streak: 0,
            mismatch_reported: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> BufferState {
        if self.surface.is_some() {
            BufferState::Sized
        } else {
            BufferState::Unsized
        }
    }

    #[must_use]
    pub fn is_sized(&self) -> bool {
        self.surface.is_some()
    }

    #[must_use]
    pub fn background(&self) -> Argb {
        self.background
    }

    /// Changes the colour used for rows cleared from now on.
    pub fn set_background(&mut self, background: Argb) {
        self.background = background;
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.surface.as_ref().map_or(0, PixelSurface::width)
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.surface.as_ref().map_or(0, PixelSurface::height)
    }

    /// Storage row holding the newest line.
    #[must_use]
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// Whether a persistent bulk-write size mismatch has been reported.
    #[must_use]
    pub fn size_mismatch_reported(&self) -> bool {
        self.mismatch_reported
    }

    /// Allocates a fresh background-filled surface and resets the cursor.
    pub fn set_size_and_clear(&mut self, width: u32, height: u32) {
        let surface = PixelSurface::new(width, height, self.background);
        debug!(
            width = surface.width(),
            height = surface.height(),
            "circular buffer sized and cleared"
        );
        self.surface = Some(surface);
        self.write_index = 0;
        self.reset_mismatch_tracking();
    }

    /// Reallocates the surface while keeping the visible content.
    ///
    /// The newest line lands on the new bottom row. Rows beyond the new height
    /// are dropped oldest-first and rows are resampled when widths differ.
    pub fn resize_existing(&mut self, width: u32, height: u32) {
        let Some(old) = self.surface.take() else {
            self.set_size_and_clear(width, height);
            return;
        };

        let mut resized = PixelSurface::new(width, height, self.background);
        let old_height = old.height() as usize;
        let new_height = resized.height() as usize;
        let kept = old_height.min(new_height);
        for age in 0..kept {
            let source_row = (self.write_index + old_height - age) % old_height;
            resample_row(old.row(source_row), resized.row_mut(new_height - 1 - age));
        }

        debug!(
            old_width = old.width(),
            old_height,
            width = resized.width(),
            height = new_height,
            kept_rows = kept,
            "circular buffer resized with content"
        );
        self.surface = Some(resized);
        self.write_index = new_height - 1;
        self.reset_mismatch_tracking();
    }

    /// Advances the cursor one row and clears the new newest row.
    pub fn scroll_up(&mut self) {
        if let Some(row) = self.advance_cursor() {
            let background = self.background;
            if let Some(surface) = self.surface.as_mut() {
                surface.row_mut(row).fill(background);
            }
        }
    }

    /// Advances the cursor one row and writes `line` as the newest row.
    pub fn scroll_up_with(&mut self, line: &[Argb]) {
        if let Some(row) = self.advance_cursor() {
            self.write_row(row, line);
        }
    }

    /// Moves the cursor back one row and clears the row that became the top.
    pub fn scroll_down(&mut self) {
        if let Some(row) = self.retreat_cursor() {
            let background = self.background;
            if let Some(surface) = self.surface.as_mut() {
                surface.row_mut(row).fill(background);
            }
        }
    }

    /// Moves the cursor back one row and writes `line` into the new top row.
    pub fn scroll_down_with(&mut self, line: &[Argb]) {
        if let Some(row) = self.retreat_cursor() {
            self.write_row(row, line);
        }
    }

    /// Overwrites the newest row, resampling when `line` has the wrong width.
    pub fn draw_rgb_bottom(&mut self, line: &[Argb]) {
        if self.surface.is_some() {
            self.write_row(self.write_index, line);
        }
    }

    pub fn draw_pixel_bottom(&mut self, x: i32, color: Argb) {
        self.draw_pixel_bottom_relative(x, 0, color);
    }

    /// Draws into the row `relative_y` lines older than the newest one.
    ///
    /// Rows that have already scrolled out of the buffer are ignored.
    pub fn draw_pixel_bottom_relative(&mut self, x: i32, relative_y: u32, color: Argb) {
        let Some(row) = self.row_for_age(relative_y) else {
            return;
        };
        if let Some(surface) = self.surface.as_mut() {
            surface.set_pixel(x, row as i32, color);
        }
    }

    pub fn draw_line_bottom(&mut self, x_start: i32, x_end: i32, color: Argb) {
        self.draw_line_bottom_relative(x_start, x_end, 0, color);
    }

    /// Horizontal run `x_start..=x_end` in the row `relative_y` lines older than the newest.
    pub fn draw_line_bottom_relative(&mut self, x_start: i32, x_end: i32, relative_y: u32, color: Argb) {
        let Some(row) = self.row_for_age(relative_y) else {
            return;
        };
        if let Some(surface) = self.surface.as_mut() {
            let clip = surface.bounds();
            surface.draw_hline(x_start, x_end, row as i32, color, clip);
        }
    }

    /// Composites the logical image with its top-left at `(dest_x, dest_y)`.
    pub fn draw_image_to(&self, target: &mut PixelSurface, dest_x: i32, dest_y: i32) {
        let clip = target.bounds();
        self.draw_image_clipped(target, dest_x, dest_y, clip, BlendMode::Copy);
    }

    /// Logical-image blit restricted to `clip`; at most two copies.
    pub fn draw_image_clipped(
        &self,
        target: &mut PixelSurface,
        dest_x: i32,
        dest_y: i32,
        clip: PixelRect,
        mode: BlendMode,
    ) {
        let Some(surface) = self.surface.as_ref() else {
            return;
        };
        let width = surface.width();
        let height = surface.height() as usize;
        let oldest = self.write_index + 1;

        // Rows after the cursor hold the older part of the image.
        let upper_rows = height - oldest;
        if upper_rows > 0 {
            let source = PixelRect::new(0, oldest as i32, width, upper_rows as u32);
            target.blit_with(surface, source, dest_x, dest_y, clip, mode);
        }
        let source = PixelRect::new(0, 0, width, oldest as u32);
        target.blit_with(surface, source, dest_x, dest_y + upper_rows as i32, clip, mode);
    }

    /// Copies a region of the logical image into a new surface.
    ///
    /// `region` is clipped to the buffer first, so the copy is the size of the
    /// overlap. Returns `None` before the buffer is sized or when `region`
    /// misses it.
    #[must_use]
    pub fn copy_region(&self, region: PixelRect) -> Option<PixelSurface> {
        let surface = self.surface.as_ref()?;
        let visible = region.intersect(surface.bounds());
        if visible.is_empty() {
            return None;
        }
        let mut copy = PixelSurface::new(visible.width, visible.height, self.background);
        let left = visible.x as usize;
        let right = visible.right() as usize;
        for (dest_row, y) in (visible.y..visible.bottom()).enumerate() {
            let source = &self.logical_row_unchecked(surface, y as usize)[left..right];
            copy.row_mut(dest_row).copy_from_slice(source);
        }
        Some(copy)
    }

    /// Row `y` of the logical image, `0` being the oldest (top) line.
    #[must_use]
    pub fn logical_row(&self, y: usize) -> Option<&[Argb]> {
        let surface = self.surface.as_ref()?;
        (y < surface.height() as usize).then(|| self.logical_row_unchecked(surface, y))
    }

    pub(crate) fn storage_row(&self, row: usize) -> Option<&[Argb]> {
        let surface = self.surface.as_ref()?;
        (row < surface.height() as usize).then(|| surface.row(row))
    }

    pub(crate) fn pixels_mut(&mut self) -> Option<&mut [Argb]> {
        self.surface.as_mut().map(PixelSurface::pixels_mut)
    }

    pub(crate) fn set_write_index(&mut self, write_index: usize) {
        let height = self.height() as usize;
        if height > 0 {
            self.write_index = write_index % height;
        }
    }

    /// Storage row of the line `age` scrolls older than the newest one.
    pub(crate) fn row_for_age(&self, age: u32) -> Option<usize> {
        let height = self.height() as usize;
        let age = age as usize;
        (age < height).then(|| (self.write_index + height - age) % height)
    }

    fn logical_row_unchecked<'a>(&self, surface: &'a PixelSurface, y: usize) -> &'a [Argb] {
        let height = surface.height() as usize;
        surface.row((self.write_index + 1 + y) % height)
    }

    fn advance_cursor(&mut self) -> Option<usize> {
        let height = self.height() as usize;
        if height == 0 {
            return None;
        }
        self.write_index = (self.write_index + 1) % height;
        Some(self.write_index)
    }

    fn retreat_cursor(&mut self) -> Option<usize> {
        let height = self.height() as usize;
        if height == 0 {
            return None;
        }
        self.write_index = (self.write_index + height - 1) % height;
        Some((self.write_index + 1) % height)
    }

    fn write_row(&mut self, row: usize, line: &[Argb]) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let width = surface.width() as usize;
        let target = surface.row_mut(row);
        if line.len() == width {
            target.copy_from_slice(line);
            self.mismatch_streak = 0;
            return;
        }

        if line.is_empty() {
            target.fill(self.background);
        } else {
            resample_row(line, target);
        }
        self.mismatch_streak = self.mismatch_streak.saturating_add(1);
        if self.mismatch_streak > SIZE_MISMATCH_REPORT_THRESHOLD && !self.mismatch_reported {
            self.mismatch_reported = true;
            warn!(
                line_len = line.len(),
                buffer_width = width,
                consecutive = self.mismatch_streak,
                "bulk line width keeps differing from buffer width; resampling every frame"
            );
        }
    }

    fn reset_mismatch_tracking(&mut self) {
        self.mismatch_streak = 0;
        self.mismatch_reported = false;
    }
}

/// Nearest-neighbour resample of `source` into `target`.
pub(crate) fn resample_row(source: &[Argb], target: &mut [Argb]) {
    if source.len() == target.len() {
        target.copy_from_slice(source);
        return;
    }
    if source.is_empty() {
        return;
    }
    let source_len = source.len();
    let target_len = target.len();
    for (index, pixel) in target.iter_mut().enumerate() {
        let source_index = ((2 * index + 1) * source_len) / (2 * target_len);
        *pixel = source[source_index.min(source_len - 1)];
    }
}

#[cfg(test)]
mod tests {
    use super::{BufferState, CircularPixelBuffer, SIZE_MISMATCH_REPORT_THRESHOLD, resample_row};
    use crate::core::PixelRect;
    use crate::render::surface::{Argb, PixelSurface};

    fn composite(buffer: &CircularPixelBuffer) -> PixelSurface {
        let mut target = PixelSurface::new(buffer.width(), buffer.height(), Argb::TRANSPARENT);
        buffer.draw_image_to(&mut target, 0, 0);
        target
    }

    #[test]
    fn unsized_buffer_ignores_draws() {
        let mut buffer = CircularPixelBuffer::new(Argb::BLACK);
        buffer.scroll_up();
        buffer.draw_pixel_bottom(3, Argb::RED);
        buffer.draw_rgb_bottom(&[Argb::RED; 4]);
        assert_eq!(buffer.state(), BufferState::Unsized);
        assert!(buffer.copy_region(PixelRect::new(0, 0, 1, 1)).is_none());
    }

    #[test]
    fn zero_size_is_clamped_to_one_pixel() {
        let mut buffer = CircularPixelBuffer::new(Argb::BLACK);
        buffer.set_size_and_clear(0, 0);
        assert_eq!((buffer.width(), buffer.height()), (1, 1));
        buffer.scroll_up_with(&[Argb::RED]);
        assert_eq!(composite(&buffer).pixel(0, 0), Some(Argb::RED));
    }

    #[test]
    fn scrolled_pixel_moves_up_and_new_rows_are_background() {
        let mut buffer = CircularPixelBuffer::new(Argb::BLACK);
        buffer.set_size_and_clear(100, 50);
        buffer.draw_pixel_bottom(10, Argb::RED);
        for _ in 0..3 {
            buffer.scroll_up();
        }

        let image = composite(&buffer);
        assert_eq!(image.pixel(10, 49 - 3), Some(Argb::RED));
        for y in 47..50 {
            assert!(image.row(y).iter().all(|pixel| *pixel == Argb::BLACK));
        }
    }

    #[test]
    fn scroll_down_writes_the_new_top_row() {
        let mut buffer = CircularPixelBuffer::new(Argb::BLACK);
        buffer.set_size_and_clear(2, 3);
        buffer.scroll_down_with(&[Argb::RED, Argb::RED]);
        buffer.scroll_down_with(&[Argb::GREEN, Argb::GREEN]);

        let image = composite(&buffer);
        assert_eq!(image.row(0), &[Argb::GREEN, Argb::GREEN]);
        assert_eq!(image.row(1), &[Argb::RED, Argb::RED]);
        assert_eq!(image.row(2), &[Argb::BLACK, Argb::BLACK]);
    }

    #[test]
    fn relative_draw_targets_older_rows_and_ignores_expired_ones() {
        let mut buffer = CircularPixelBuffer::new(Argb::BLACK);
        buffer.set_size_and_clear(4, 4);
        buffer.scroll_up();
        buffer.draw_line_bottom_relative(0, 10, 2, Argb::BLUE);
        buffer.draw_pixel_bottom_relative(0, 4, Argb::RED);

        let image = composite(&buffer);
        assert!(image.row(1).iter().all(|pixel| *pixel == Argb::BLUE));
        assert!(image.pixels().iter().all(|pixel| *pixel != Argb::RED));
    }

    #[test]
    fn mismatched_bulk_writes_are_reported_once_after_threshold() {
        let mut buffer = CircularPixelBuffer::new(Argb::BLACK);
        buffer.set_size_and_clear(8, 4);
        for _ in 0..SIZE_MISMATCH_REPORT_THRESHOLD {
            buffer.draw_rgb_bottom(&[Argb::RED; 4]);
        }
        assert!(!buffer.size_mismatch_reported());
        buffer.draw_rgb_bottom(&[Argb::RED; 4]);
        assert!(buffer.size_mismatch_reported());

        let image = composite(&buffer);
        assert!(image.row(3).iter().all(|pixel| *pixel == Argb::RED));

        buffer.set_size_and_clear(8, 4);
        assert!(!buffer.size_mismatch_reported());
    }

    #[test]
    fn matching_write_resets_the_mismatch_streak() {
        let mut buffer = CircularPixelBuffer::new(Argb::BLACK);
        buffer.set_size_and_clear(8, 4);
        for _ in 0..10 {
            buffer.draw_rgb_bottom(&[Argb::RED; 4]);
            buffer.draw_rgb_bottom(&[Argb::RED; 8]);
        }
        assert!(!buffer.size_mismatch_reported());
    }

    #[test]
    fn resize_keeps_newest_rows_at_the_bottom() {
        let mut buffer = CircularPixelBuffer::new(Argb::BLACK);
        buffer.set_size_and_clear(3, 4);
        let colors = [Argb::RED, Argb::GREEN, Argb::BLUE, Argb::YELLOW, Argb::WHITE];
        for color in colors {
            buffer.scroll_up_with(&[color; 3]);
        }

        buffer.resize_existing(6, 2);
        assert_eq!(buffer.write_index(), 1);
        let image = composite(&buffer);
        assert!(image.row(1).iter().all(|pixel| *pixel == Argb::WHITE));
        assert!(image.row(0).iter().all(|pixel| *pixel == Argb::YELLOW));

        buffer.resize_existing(6, 5);
        let image = composite(&buffer);
        assert!(image.row(4).iter().all(|pixel| *pixel == Argb::WHITE));
        assert!(image.row(0).iter().all(|pixel| *pixel == Argb::BLACK));
    }

    #[test]
    fn copy_region_reads_the_unwrapped_image() {
        let mut buffer = CircularPixelBuffer::new(Argb::BLACK);
        buffer.set_size_and_clear(2, 3);
        buffer.scroll_up_with(&[Argb::RED, Argb::GREEN]);
        buffer.scroll_up_with(&[Argb::BLUE, Argb::WHITE]);

        let region = buffer
            .copy_region(PixelRect::new(1, 1, 1, 2))
            .expect("region inside buffer");
        assert_eq!(region.pixels(), &[Argb::GREEN, Argb::WHITE]);
    }

    #[test]
    fn resample_picks_nearest_source_pixel() {
        let source = [Argb::RED, Argb::GREEN];
        let mut target = [Argb::BLACK; 4];
        resample_row(&source, &mut target);
        assert_eq!(target, [Argb::RED, Argb::RED, Argb::GREEN, Argb::GREEN]);

        let source = [Argb::RED, Argb::GREEN, Argb::BLUE, Argb::WHITE];
        let mut target = [Argb::BLACK; 2];
        resample_row(&source, &mut target);
        assert_eq!(target, [Argb::GREEN, Argb::WHITE]);
    }
}
