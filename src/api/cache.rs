use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use smallvec::SmallVec;
use tracing::trace;

use crate::core::decimation::{
    DEFAULT_DECIMATION_THRESHOLD, clip_point_range, project_decimated, project_normal, remap_y,
    select_path, visible_index_range,
};
use crate::core::{
    AxisMapper, CoordinateRange, PixelRect, ProjectedPolyline, ProjectionPath, SampleSeries,
    Viewport,
};
use crate::error::{PlotError, PlotResult};
use crate::render::{Argb, PixelSurface};

static NEXT_CACHE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static ACTIVE_REBUILDS: RefCell<SmallVec<[u64; 4]>> = RefCell::new(SmallVec::new());
}

/// Marks a cache as being prepared on the current thread.
struct RebuildGuard {
    cache_id: u64,
}

impl RebuildGuard {
    fn enter(cache_id: u64) -> PlotResult<Self> {
        ACTIVE_REBUILDS.with(|active| {
            let mut active = active.borrow_mut();
            if active.contains(&cache_id) {
                return Err(PlotError::ReentrantRebuild);
            }
            active.push(cache_id);
            Ok(Self { cache_id })
        })
    }
}

impl Drop for RebuildGuard {
    fn drop(&mut self) {
        ACTIVE_REBUILDS.with(|active| {
            let mut active = active.borrow_mut();
            if let Some(position) = active.iter().position(|id| *id == self.cache_id) {
                active.remove(position);
            }
        });
    }
}

/// What `prepare` had to do to bring the cache up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareOutcome {
    Hit,
    /// Only the vertical mapping changed; `y` pixels were recomputed.
    RecomputedY,
    Rebuilt,
}

/// Runtime metrics exposed by a decimation cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub y_recomputes: u64,
    pub rebuilds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CacheKey {
    width: u32,
    height: u32,
    x_range: CoordinateRange,
    y_range: CoordinateRange,
    generation: u64,
}

impl CacheKey {
    fn same_horizontal(&self, other: &Self) -> bool {
        self.width == other.width && self.x_range == other.x_range && self.generation == other.generation
    }
}

#[derive(Debug, Default)]
struct CacheState {
    key: Option<CacheKey>,
    path: Option<ProjectionPath>,
    polyline: ProjectedPolyline,
    stats: CacheStats,
}

/// Screen-space polyline of one series, rebuilt only when its inputs change.
///
/// Mutation and rendering share one lock, held for a single projection or a
/// single stroke pass.
#[derive(Debug)]
pub struct SeriesDecimationCache {
    id: u64,
    threshold: f64,
    generation: AtomicU64,
    state: Mutex<CacheState>,
}

impl Default for SeriesDecimationCache {
    fn default() -> Self {
        Self::new(DEFAULT_DECIMATION_THRESHOLD)
    }
}

impl SeriesDecimationCache {
    /// Creates an empty cache decimating above `threshold` points per pixel.
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        let threshold = if threshold.is_finite() && threshold > 0.0 {
            threshold
        } else {
            DEFAULT_DECIMATION_THRESHOLD
        };
        Self {
            id: NEXT_CACHE_ID.fetch_add(1, Ordering::Relaxed),
            threshold,
            generation: AtomicU64::new(0),
            state: Mutex::new(CacheState::default()),
        }
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Marks the cached projection stale after the series data changed.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Brings the projection up to date for the given viewport and ranges.
    ///
    /// Fails with [`PlotError::ReentrantRebuild`] when called again for the
    /// same cache while a `prepare` is running on this thread (for instance
    /// from inside a series accessor); nothing is mutated in that case.
    pub fn prepare(
        &self,
        series: &dyn SampleSeries,
        viewport: Viewport,
        x_range: CoordinateRange,
        y_range: CoordinateRange,
    ) -> PlotResult<PrepareOutcome> {
        let _guard = RebuildGuard::enter(self.id)?;
        let viewport = viewport.clamped();
        let key = CacheKey {
            width: viewport.width,
            height: viewport.height,
            x_range,
            y_range,
            generation: self.generation.load(Ordering::Acquire),
        };

        let mut guard = self.lock();
        let state = &mut *guard;
        let y_mapper = AxisMapper::vertical(key.height, y_range);
        let outcome = match state.key {
            Some(cached) if cached == key => {
                state.stats.hits = state.stats.hits.saturating_add(1);
                PrepareOutcome::Hit
            }
            Some(cached) if cached.same_horizontal(&key) => {
                remap_y(&mut state.polyline, &y_mapper);
                state.stats.y_recomputes = state.stats.y_recomputes.saturating_add(1);
                PrepareOutcome::RecomputedY
            }
            _ => {
                let x_mapper = AxisMapper::horizontal(key.width, x_range);
                let indices = visible_index_range(series, x_range);
                let path = select_path(&indices, key.width, self.threshold);
                let sample_count = indices.len();
                match path {
                    ProjectionPath::Normal => {
                        project_normal(series, indices, &x_mapper, &y_mapper, &mut state.polyline);
                    }
                    ProjectionPath::Decimated => {
                        project_decimated(series, indices, &x_mapper, &y_mapper, &mut state.polyline);
                    }
                }
                state.path = Some(path);
                state.stats.rebuilds = state.stats.rebuilds.saturating_add(1);
                trace!(
                    cache_id = self.id,
                    ?path,
                    samples = sample_count,
                    points = state.polyline.len(),
                    "decimation cache rebuilt"
                );
                PrepareOutcome::Rebuilt
            }
        };
        state.key = Some(key);
        Ok(outcome)
    }

    /// Strokes the cached polyline with the plot area's origin at the clip's
    /// top-left corner. Returns `false` when nothing has been prepared.
    pub fn render(&self, target: &mut PixelSurface, clip: PixelRect, color: Argb) -> bool {
        let state = self.lock();
        if state.key.is_none() {
            return false;
        }
        let polyline = &state.polyline;
        let visible = clip_point_range(&polyline.x_pixels, 0, clip.width as i32);
        let xs = &polyline.x_pixels[visible.clone()];
        let ys = &polyline.y_pixels[visible];
        if xs.len() == 1 {
            target.set_pixel(clip.x + xs[0], clip.y + ys[0], color);
            return true;
        }
        for index in 1..xs.len() {
            target.draw_line(
                clip.x + xs[index - 1],
                clip.y + ys[index - 1],
                clip.x + xs[index],
                clip.y + ys[index],
                color,
                clip,
            );
        }
        true
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    /// Path used by the last rebuild.
    #[must_use]
    pub fn path(&self) -> Option<ProjectionPath> {
        self.lock().path
    }

    /// Copy of the cached polyline, in plot-area pixels.
    #[must_use]
    pub fn polyline(&self) -> ProjectedPolyline {
        self.lock().polyline.clone()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
