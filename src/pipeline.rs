//! Orchestration: owns the image, sample points, palette and cached frames,
//! and decides how much work each change needs.
//!
//! Two levels of recomputation exist. A *resample* walks the grid over the
//! processed image (cost grows with image pixels); a *requantize* only re-maps
//! the cached block colors onto the palette (cost grows with cells × palette
//! size). Parameter changes are coalesced through a [`Debouncer`]; dragging a
//! sample point requantizes immediately.

use std::time::Duration;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::color::{DistanceMetric, Rgb};
use crate::error::{PixelArtError, Result};
use crate::grid::GridGeometry;
use crate::quantize::{QuantizedFrame, quantize};
use crate::sampler::{BlockColor, SampleMethod, compute_blocks, sample_palette_color};
use crate::source::{DEFAULT_MAX_DIMENSION, SourceImage};
use crate::swatches::{Palette, SamplePoint, SamplePoints, SortMode, sorted_palette};

/// Quiet period after the last change before scheduled work runs.
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(150);

/// User-tunable parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Number of cells across the image width.
    pub cells_across: u32,
    pub offset_x: i32,
    pub offset_y: i32,
    pub sample_method: SampleMethod,
    pub metric: DistanceMetric,
    /// Gaussian blur sigma applied before sampling, in pixels.
    pub blur_radius: f32,
    pub sort_mode: SortMode,
    /// Larger images are scaled down to fit this many pixels per side.
    pub max_dimension: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cells_across: 32,
            offset_x: 0,
            offset_y: 0,
            sample_method: SampleMethod::default(),
            metric: DistanceMetric::default(),
            blur_radius: 0.0,
            sort_mode: SortMode::default(),
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

/// Something the user changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    GridSize,
    Offset,
    SampleMethod,
    Blur,
    SourceImage,
    PaletteMembership,
    PaletteContent,
    PalettePreview,
    DistanceMetric,
}

/// Amount of work a change requires. A resample always ends in a requantize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Trigger {
    Requantize,
    Resample,
}

/// Classify a change into the work it requires.
pub fn should_recompute(change: ChangeKind) -> Trigger {
    match change {
        ChangeKind::GridSize
        | ChangeKind::Offset
        | ChangeKind::SampleMethod
        | ChangeKind::Blur
        | ChangeKind::SourceImage
        | ChangeKind::PaletteMembership => Trigger::Resample,
        ChangeKind::PaletteContent | ChangeKind::PalettePreview | ChangeKind::DistanceMetric => {
            Trigger::Requantize
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Pending {
    deadline: Duration,
    trigger: Trigger,
}

/// Single-slot delayed task.
///
/// Scheduling replaces the pending deadline, so at most one run happens per
/// quiet period. The pending trigger is merged with the new one, never
/// downgraded: a resample requested earlier in the burst still happens.
/// Time is whatever monotonic clock the caller reads, as a `Duration` since
/// its own epoch.
#[derive(Clone, Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<Pending>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE_DELAY)
    }
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn schedule(&mut self, now: Duration, trigger: Trigger) {
        let trigger = match self.pending {
            Some(p) => p.trigger.max(trigger),
            None => trigger,
        };
        let deadline = now.saturating_add(self.delay);
        trace!(?trigger, ?deadline, "rescheduled pipeline run");
        self.pending = Some(Pending { deadline, trigger });
    }

    pub fn cancel(&mut self) -> Option<Trigger> {
        self.pending.take().map(|p| p.trigger)
    }

    pub fn pending(&self) -> Option<Trigger> {
        self.pending.map(|p| p.trigger)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.pending.map(|p| p.deadline)
    }

    /// Take the pending trigger if its deadline has passed.
    pub fn poll(&mut self, now: Duration) -> Option<Trigger> {
        match self.pending {
            Some(p) if now >= p.deadline => {
                self.pending = None;
                Some(p.trigger)
            }
            _ => None,
        }
    }
}

/// Pixel-art pipeline state for one image.
#[derive(Debug)]
pub struct Pipeline {
    settings: Settings,
    source: SourceImage,
    geometry: GridGeometry,
    points: SamplePoints,
    palette: Palette,
    blocks: Vec<BlockColor>,
    frame: QuantizedFrame,
    debouncer: Debouncer,
}

impl Pipeline {
    /// Load `image`, seed one sample point at its center and render once.
    pub fn new(image: RgbImage, settings: Settings) -> Result<Self> {
        let source = SourceImage::new(image, settings.max_dimension, settings.blur_radius)?;
        let geometry = geometry_for(&source, &settings)?;

        let mut pipeline = Self {
            settings,
            source,
            geometry,
            points: SamplePoints::new(),
            palette: Palette::new(),
            blocks: Vec::new(),
            frame: QuantizedFrame::default(),
            debouncer: Debouncer::default(),
        };
        pipeline.seed_center_point()?;
        pipeline.run(Trigger::Resample)?;
        Ok(pipeline)
    }

    fn seed_center_point(&mut self) -> Result<()> {
        let (w, h) = self.source.dimensions();
        let (x, y) = (w / 2, h / 2);
        let color = sample_palette_color(x, y, self.source.processed())?;
        self.points.add(x, y, color);
        self.sync_palette();
        Ok(())
    }

    fn sync_palette(&mut self) {
        self.palette = Palette::from_points(&self.points);
    }

    fn schedule(&mut self, change: ChangeKind, now: Duration) -> Trigger {
        let trigger = should_recompute(change);
        self.debouncer.schedule(now, trigger);
        trigger
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn source(&self) -> &SourceImage {
        &self.source
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn sample_points(&self) -> &SamplePoints {
        &self.points
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// The cached sampled frame.
    pub fn blocks(&self) -> &[BlockColor] {
        &self.blocks
    }

    /// The last rendered frame.
    pub fn frame(&self) -> &QuantizedFrame {
        &self.frame
    }

    pub fn pending(&self) -> Option<Trigger> {
        self.debouncer.pending()
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.debouncer.deadline()
    }

    /// Palette colors in the current presentation order.
    pub fn sorted_palette(&self) -> Vec<Rgb> {
        sorted_palette(self.palette.colors(), self.settings.sort_mode)
    }

    /// Replace the source image. Sample points are reset to a single point
    /// at the new image's center.
    pub fn load_image(&mut self, image: RgbImage, now: Duration) -> Result<Trigger> {
        let source = SourceImage::new(image, self.settings.max_dimension, self.settings.blur_radius)?;
        self.geometry = geometry_for(&source, &self.settings)?;
        self.source = source;
        self.points.clear();
        self.seed_center_point()?;
        Ok(self.schedule(ChangeKind::SourceImage, now))
    }

    pub fn set_cells_across(&mut self, cells_across: u32, now: Duration) -> Result<Trigger> {
        let (w, h) = self.source.dimensions();
        self.geometry = GridGeometry::new(
            w,
            h,
            cells_across,
            self.settings.offset_x,
            self.settings.offset_y,
        )?;
        self.settings.cells_across = cells_across;
        Ok(self.schedule(ChangeKind::GridSize, now))
    }

    pub fn set_offset(&mut self, offset_x: i32, offset_y: i32, now: Duration) -> Result<Trigger> {
        let (w, h) = self.source.dimensions();
        self.geometry = GridGeometry::new(w, h, self.settings.cells_across, offset_x, offset_y)?;
        self.settings.offset_x = offset_x;
        self.settings.offset_y = offset_y;
        Ok(self.schedule(ChangeKind::Offset, now))
    }

    pub fn set_sample_method(&mut self, method: SampleMethod, now: Duration) -> Trigger {
        self.settings.sample_method = method;
        self.schedule(ChangeKind::SampleMethod, now)
    }

    pub fn set_metric(&mut self, metric: DistanceMetric, now: Duration) -> Trigger {
        self.settings.metric = metric;
        self.schedule(ChangeKind::DistanceMetric, now)
    }

    /// Change the blur radius. Every sample point re-reads its color from the
    /// new processed image right away; the grid is resampled on the next run.
    pub fn set_blur(&mut self, blur_radius: f32, now: Duration) -> Result<Trigger> {
        self.source.set_blur(blur_radius)?;
        self.settings.blur_radius = blur_radius;
        let processed = self.source.processed();
        for point in self.points.iter_mut() {
            point.color = sample_palette_color(point.x, point.y, processed)?;
        }
        self.sync_palette();
        Ok(self.schedule(ChangeKind::Blur, now))
    }

    pub fn set_sort_mode(&mut self, mode: SortMode) {
        self.settings.sort_mode = mode;
    }

    /// Advance to the next sort mode. Presentation only, nothing reruns.
    pub fn cycle_sort_mode(&mut self) -> SortMode {
        self.settings.sort_mode = self.settings.sort_mode.next();
        self.settings.sort_mode
    }

    pub fn add_sample_point(&mut self, x: u32, y: u32, now: Duration) -> Result<SamplePoint> {
        let color = sample_palette_color(x, y, self.source.processed())?;
        let point = self.points.add(x, y, color);
        self.sync_palette();
        self.schedule(ChangeKind::PaletteMembership, now);
        Ok(point)
    }

    /// Drag a sample point. Coordinates are clamped into the image, the color
    /// is re-read and the frame is requantized immediately.
    pub fn move_sample_point(&mut self, id: u64, x: i64, y: i64) -> Result<&QuantizedFrame> {
        let (w, h) = self.source.dimensions();
        let x = x.clamp(0, w as i64 - 1) as u32;
        let y = y.clamp(0, h as i64 - 1) as u32;
        let color = sample_palette_color(x, y, self.source.processed())?;

        let point = self
            .points
            .get_mut(id)
            .ok_or(PixelArtError::UnknownSamplePoint(id))?;
        point.x = x;
        point.y = y;
        point.color = color;
        self.sync_palette();

        self.run(should_recompute(ChangeKind::PaletteContent))
    }

    /// Delete a sample point by identity.
    pub fn remove_sample_point(&mut self, id: u64, now: Duration) -> Result<SamplePoint> {
        let point = self
            .points
            .remove(id)
            .ok_or(PixelArtError::UnknownSamplePoint(id))?;
        self.sync_palette();
        self.schedule(ChangeKind::PaletteMembership, now);
        Ok(point)
    }

    /// Delete a palette swatch. Matching is by color value: the first palette
    /// entry and the first sample point with this color go away.
    pub fn remove_swatch(&mut self, color: Rgb, now: Duration) -> Option<SamplePoint> {
        let removed_entry = self.palette.remove(color);
        let point = self.points.remove_by_color(color);
        debug_assert_eq!(removed_entry, point.is_some());
        debug_assert_eq!(self.palette, Palette::from_points(&self.points));
        if removed_entry {
            self.schedule(ChangeKind::PaletteMembership, now);
        }
        point
    }

    /// Render against the palette plus a transient `preview` color.
    ///
    /// Neither the palette nor the cached frame is modified.
    pub fn preview(&self, preview: Rgb) -> QuantizedFrame {
        let colors = self.palette.with_preview(Some(preview));
        quantize(&self.blocks, &colors, self.settings.metric)
    }

    /// Run whatever is pending once its quiet period is over.
    pub fn tick(&mut self, now: Duration) -> Result<Option<Trigger>> {
        match self.debouncer.poll(now) {
            Some(trigger) => {
                self.run(trigger)?;
                Ok(Some(trigger))
            }
            None => Ok(None),
        }
    }

    /// Run pending work immediately, ignoring its deadline.
    pub fn flush(&mut self) -> Result<Option<Trigger>> {
        match self.debouncer.cancel() {
            Some(trigger) => {
                self.run(trigger)?;
                Ok(Some(trigger))
            }
            None => Ok(None),
        }
    }

    /// Do the work for `trigger` now. A resample is followed by a requantize.
    pub fn run(&mut self, trigger: Trigger) -> Result<&QuantizedFrame> {
        if trigger == Trigger::Resample {
            self.blocks = compute_blocks(
                self.source.processed(),
                &self.geometry,
                self.settings.sample_method,
            )?;
        }
        self.frame = quantize(&self.blocks, self.palette.colors(), self.settings.metric);
        debug!(
            ?trigger,
            blocks = self.blocks.len(),
            palette = self.palette.len(),
            resolution = ?self.frame.resolution(),
            "pipeline run"
        );
        Ok(&self.frame)
    }
}

fn geometry_for(source: &SourceImage, settings: &Settings) -> Result<GridGeometry> {
    let (w, h) = source.dimensions();
    GridGeometry::new(
        w,
        h,
        settings.cells_across,
        settings.offset_x,
        settings.offset_y,
    )
}
