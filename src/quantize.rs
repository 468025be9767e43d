//! Nearest-palette quantization of a sampled frame.

use std::collections::BTreeMap;

use image::{Rgba, RgbaImage};
use palette::Srgb;
use tracing::debug;

use crate::color::{DistanceMetric, Rgb};
use crate::sampler::BlockColor;

/// Fallback returned when there is nothing to match against.
pub const EMPTY_PALETTE_COLOR: Rgb = Srgb::new(0, 0, 0);

/// Closest palette entry to `color` under `metric`.
///
/// Linear scan; only a strictly smaller distance replaces the current best,
/// so the earliest entry wins ties. An empty palette yields black.
pub fn nearest(color: Rgb, palette: &[Rgb], metric: DistanceMetric) -> Rgb {
    let mut best = match palette.first() {
        Some(&first) => first,
        None => return EMPTY_PALETTE_COLOR,
    };
    let mut best_dist = f64::INFINITY;
    for &candidate in palette {
        let dist = metric.distance(color, candidate);
        if dist < best_dist {
            best_dist = dist;
            best = candidate;
        }
    }
    best
}

/// Inclusive block-coordinate bounds of a quantized frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_bx: i32,
    pub max_bx: i32,
    pub min_by: i32,
    pub max_by: i32,
}

impl BoundingBox {
    fn point(bx: i32, by: i32) -> Self {
        Self {
            min_bx: bx,
            max_bx: bx,
            min_by: by,
            max_by: by,
        }
    }

    fn include(&mut self, bx: i32, by: i32) {
        self.min_bx = self.min_bx.min(bx);
        self.max_bx = self.max_bx.max(bx);
        self.min_by = self.min_by.min(by);
        self.max_by = self.max_by.max(by);
    }

    pub fn width(&self) -> u32 {
        (self.max_bx - self.min_bx + 1) as u32
    }

    pub fn height(&self) -> u32 {
        (self.max_by - self.min_by + 1) as u32
    }
}

/// Sparse map from block coordinates to palette colors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuantizedFrame {
    cells: BTreeMap<(i32, i32), Rgb>,
    bounds: Option<BoundingBox>,
}

impl QuantizedFrame {
    pub fn get(&self, bx: i32, by: i32) -> Option<Rgb> {
        self.cells.get(&(bx, by)).copied()
    }

    /// Cells keyed by `(bx, by)`.
    pub fn cells(&self) -> &BTreeMap<(i32, i32), Rgb> {
        &self.cells
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        self.bounds
    }

    /// Logical output resolution, `None` for an empty frame.
    pub fn resolution(&self) -> Option<(u32, u32)> {
        self.bounds.map(|b| (b.width(), b.height()))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// One pixel per block at the logical resolution. Positions without a
    /// cell stay fully transparent.
    pub fn to_image(&self) -> RgbaImage {
        let Some(bounds) = self.bounds else {
            return RgbaImage::new(0, 0);
        };
        let mut img = RgbaImage::new(bounds.width(), bounds.height());
        for (&(bx, by), c) in &self.cells {
            let x = (bx - bounds.min_bx) as u32;
            let y = (by - bounds.min_by) as u32;
            img.put_pixel(x, y, Rgba([c.red, c.green, c.blue, 255]));
        }
        img
    }
}

/// Map every sampled block to its nearest palette color.
pub fn quantize(blocks: &[BlockColor], palette: &[Rgb], metric: DistanceMetric) -> QuantizedFrame {
    if palette.is_empty() {
        debug!("quantizing against an empty palette, all cells fall back to black");
    }

    let mut frame = QuantizedFrame::default();
    for block in blocks {
        let color = nearest(block.color, palette, metric);
        frame.cells.insert((block.bx, block.by), color);
        frame.bounds = Some(match frame.bounds {
            Some(mut bounds) => {
                bounds.include(block.bx, block.by);
                bounds
            }
            None => BoundingBox::point(block.bx, block.by),
        });
    }

    debug!(
        ?metric,
        cells = frame.len(),
        palette = palette.len(),
        "quantized frame"
    );
    frame
}
