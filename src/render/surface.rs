use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::PixelRect;

/// Packed `0xAARRGGBB` pixel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Argb(pub u32);

impl Argb {
    pub const TRANSPARENT: Self = Self(0x0000_0000);
    pub const BLACK: Self = Self(0xFF00_0000);
    pub const WHITE: Self = Self(0xFFFF_FFFF);
    pub const RED: Self = Self(0xFFFF_0000);
    pub const GREEN: Self = Self(0xFF00_FF00);
    pub const BLUE: Self = Self(0xFF00_00FF);
    pub const YELLOW: Self = Self(0xFFFF_FF00);

    #[must_use]
    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self::argb(0xFF, red, green, blue)
    }

    #[must_use]
    pub const fn argb(alpha: u8, red: u8, green: u8, blue: u8) -> Self {
        Self(
            ((alpha as u32) << 24) | ((red as u32) << 16) | ((green as u32) << 8) | blue as u32,
        )
    }

    #[must_use]
    pub const fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    #[must_use]
    pub const fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[must_use]
    pub const fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[must_use]
    pub const fn blue(self) -> u8 {
        self.0 as u8
    }

    #[must_use]
    pub const fn with_alpha(self, alpha: u8) -> Self {
        Self((self.0 & 0x00FF_FFFF) | ((alpha as u32) << 24))
    }

    /// Linear interpolation per channel, `t` clamped to `[0, 1]`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let mix = |a: u8, b: u8| -> u8 {
            (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8
        };
        Self::argb(
            mix(self.alpha(), other.alpha()),
            mix(self.red(), other.red()),
            mix(self.green(), other.green()),
            mix(self.blue(), other.blue()),
        )
    }

    /// Composites `self` over an opaque `destination`.
    #[must_use]
    pub fn over(self, destination: Self) -> Self {
        match self.alpha() {
            0 => destination,
            0xFF => self,
            alpha => {
                let t = f64::from(alpha) / 255.0;
                destination.lerp(self.with_alpha(destination.alpha()), t)
            }
        }
    }
}

impl fmt::Debug for Argb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08X}", self.0)
    }
}

/// How source pixels combine with destination pixels during a blit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendMode {
    Copy,
    SourceOver,
}

/// Fixed-size grid of ARGB pixels, row-major.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelSurface {
    width: u32,
    height: u32,
    pixels: Vec<Argb>,
}

impl fmt::Debug for PixelSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelSurface")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl PixelSurface {
    /// Allocates a surface filled with `fill`; zero dimensions become one.
    #[must_use]
    pub fn new(width: u32, height: u32, fill: Argb) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            pixels: vec![fill; width as usize * height as usize],
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn bounds(&self) -> PixelRect {
        PixelRect::new(0, 0, self.width, self.height)
    }

    #[must_use]
    pub fn pixels(&self) -> &[Argb] {
        &self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [Argb] {
        &mut self.pixels
    }

    #[must_use]
    pub fn pixel(&self, x: i32, y: i32) -> Option<Argb> {
        self.index_of(x, y).map(|index| self.pixels[index])
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, color: Argb) {
        if let Some(index) = self.index_of(x, y) {
            self.pixels[index] = color;
        }
    }

    /// Row `y`; panics when `y >= height` like slice indexing.
    #[must_use]
    pub fn row(&self, y: usize) -> &[Argb] {
        let width = self.width as usize;
        &self.pixels[y * width..(y + 1) * width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [Argb] {
        let width = self.width as usize;
        &mut self.pixels[y * width..(y + 1) * width]
    }

    pub fn fill(&mut self, color: Argb) {
        self.pixels.fill(color);
    }

    pub fn fill_rect(&mut self, rect: PixelRect, color: Argb) {
        let rect = rect.intersect(self.bounds());
        if rect.is_empty() {
            return;
        }
        let left = rect.x as usize;
        let right = rect.right() as usize;
        for y in rect.y..rect.bottom() {
            self.row_mut(y as usize)[left..right].fill(color);
        }
    }

    /// Copies `source_rect` of `source` so its top-left lands at `(dest_x, dest_y)`.
    pub fn blit(&mut self, source: &PixelSurface, source_rect: PixelRect, dest_x: i32, dest_y: i32) {
        self.blit_with(source, source_rect, dest_x, dest_y, self.bounds(), BlendMode::Copy);
    }

    /// Blit restricted to `clip`, combining pixels with `mode`.
    pub fn blit_with(
        &mut self,
        source: &PixelSurface,
        source_rect: PixelRect,
        dest_x: i32,
        dest_y: i32,
        clip: PixelRect,
        mode: BlendMode,
    ) {
        let shift_x = dest_x - source_rect.x;
        let shift_y = dest_y - source_rect.y;
        let visible_source = source_rect.intersect(source.bounds());
        let dest = PixelRect::new(
            visible_source.x + shift_x,
            visible_source.y + shift_y,
            visible_source.width,
            visible_source.height,
        )
        .intersect(self.bounds())
        .intersect(clip);
        if dest.is_empty() {
            return;
        }

        let span = dest.width as usize;
        let dest_left = dest.x as usize;
        let source_left = (dest.x - shift_x) as usize;
        for dest_row in dest.y..dest.bottom() {
            let source_row = (dest_row - shift_y) as usize;
            let from = &source.row(source_row)[source_left..source_left + span];
            let to = &mut self.row_mut(dest_row as usize)[dest_left..dest_left + span];
            match mode {
                BlendMode::Copy => to.copy_from_slice(from),
                BlendMode::SourceOver => {
                    for (dst, src) in to.iter_mut().zip(from) {
                        *dst = src.over(*dst);
                    }
                }
            }
        }
    }

    /// Horizontal run `x0..=x1` on row `y`, clipped.
    pub fn draw_hline(&mut self, x0: i32, x1: i32, y: i32, color: Argb, clip: PixelRect) {
        let clip = clip.intersect(self.bounds());
        if y < clip.y || y >= clip.bottom() {
            return;
        }
        let (left, right) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
        let left = left.max(clip.x);
        let right = right.min(clip.right() - 1);
        if left > right {
            return;
        }
        self.row_mut(y as usize)[left as usize..=right as usize].fill(color);
    }

    /// Vertical run `y0..=y1` on column `x`, clipped.
    pub fn draw_vline(&mut self, x: i32, y0: i32, y1: i32, color: Argb, clip: PixelRect) {
        let clip = clip.intersect(self.bounds());
        if x < clip.x || x >= clip.right() {
            return;
        }
        let (top, bottom) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        for y in top.max(clip.y)..=bottom.min(clip.bottom() - 1) {
            self.set_pixel(x, y, color);
        }
    }

    /// One-pixel line, clipped to `clip` before rasterizing.
    pub fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Argb, clip: PixelRect) {
        if x0 == x1 {
            self.draw_vline(x0, y0, y1, color, clip);
            return;
        }
        if y0 == y1 {
            self.draw_hline(x0, x1, y0, color, clip);
            return;
        }
        let clip = clip.intersect(self.bounds());
        let Some((x0, y0, x1, y1)) = clip_segment(x0, y0, x1, y1, clip) else {
            return;
        };

        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let step_x = if x0 < x1 { 1 } else { -1 };
        let step_y = if y0 < y1 { 1 } else { -1 };
        let mut error = dx + dy;
        let (mut x, mut y) = (x0, y0);
        loop {
            if clip.contains(x, y) {
                self.set_pixel(x, y, color);
            }
            if x == x1 && y == y1 {
                break;
            }
            let doubled = 2 * error;
            if doubled >= dy {
                error += dy;
                x += step_x;
            }
            if doubled <= dx {
                error += dx;
                y += step_y;
            }
        }
    }

    /// Strokes consecutive points as connected one-pixel segments.
    pub fn draw_polyline(&mut self, xs: &[i32], ys: &[i32], color: Argb, clip: PixelRect) {
        let count = xs.len().min(ys.len());
        if count == 1 {
            if clip.contains(xs[0], ys[0]) {
                self.set_pixel(xs[0], ys[0], color);
            }
            return;
        }
        for index in 1..count {
            self.draw_line(xs[index - 1], ys[index - 1], xs[index], ys[index], color, clip);
        }
    }

    /// One-pixel rectangle outline.
    pub fn stroke_rect(&mut self, rect: PixelRect, color: Argb, clip: PixelRect) {
        if rect.is_empty() {
            return;
        }
        let right = rect.right() - 1;
        let bottom = rect.bottom() - 1;
        self.draw_hline(rect.x, right, rect.y, color, clip);
        self.draw_hline(rect.x, right, bottom, color, clip);
        self.draw_vline(rect.x, rect.y, bottom, color, clip);
        self.draw_vline(right, rect.y, bottom, color, clip);
    }

    fn index_of(&self, x: i32, y: i32) -> Option<usize> {
        let x = usize::try_from(x).ok()?;
        let y = usize::try_from(y).ok()?;
        (x < self.width as usize && y < self.height as usize).then(|| y * self.width as usize + x)
    }
}

/// Liang-Barsky clip of a segment against `clip`, endpoints rounded back to pixels.
fn clip_segment(x0: i32, y0: i32, x1: i32, y1: i32, clip: PixelRect) -> Option<(i32, i32, i32, i32)> {
    if clip.is_empty() {
        return None;
    }
    let (fx0, fy0) = (f64::from(x0), f64::from(y0));
    let dx = f64::from(x1) - fx0;
    let dy = f64::from(y1) - fy0;
    let edges = [
        (-dx, fx0 - f64::from(clip.x)),
        (dx, f64::from(clip.right() - 1) - fx0),
        (-dy, fy0 - f64::from(clip.y)),
        (dy, f64::from(clip.bottom() - 1) - fy0),
    ];

    let mut enter = 0.0f64;
    let mut exit = 1.0f64;
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            enter = enter.max(t);
        } else {
            exit = exit.min(t);
        }
        if enter > exit {
            return None;
        }
    }

    Some((
        (fx0 + enter * dx).round() as i32,
        (fy0 + enter * dy).round() as i32,
        (fx0 + exit * dx).round() as i32,
        (fy0 + exit * dy).round() as i32,
    ))
}
