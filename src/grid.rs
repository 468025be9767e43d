//! Grid geometry: which cells of an offset square grid touch the image, and
//! which pixels each of them covers.

use crate::error::{PixelArtError, Result};

/// Square grid laid over a `width × height` image.
///
/// Cells are `width / cells_across` pixels on a side (a real number), shifted
/// by `(offset_x, offset_y)`. Cell boundaries are resolved to pixels by
/// flooring, so neighbouring cells share their edge exactly and the clamped
/// rectangles partition the image. With more cells than pixels across, some
/// cells floor to an empty rectangle and are skipped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridGeometry {
    width: u32,
    height: u32,
    cells_across: u32,
    offset_x: i32,
    offset_y: i32,
    size: f64,
}

/// One grid cell that overlaps the image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridCell {
    pub bx: i32,
    pub by: i32,
    /// Unclamped top-left corner in pixel space.
    pub origin_x: f64,
    pub origin_y: f64,
    /// Clamped pixel rectangle `[start_x, end_x) × [start_y, end_y)`.
    pub start_x: u32,
    pub start_y: u32,
    pub end_x: u32,
    pub end_y: u32,
}

impl GridCell {
    pub fn pixel_count(&self) -> u64 {
        (self.end_x - self.start_x) as u64 * (self.end_y - self.start_y) as u64
    }
}

impl GridGeometry {
    pub fn new(
        width: u32,
        height: u32,
        cells_across: u32,
        offset_x: i32,
        offset_y: i32,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PixelArtError::invalid(
                "image dimensions",
                format!("{width}x{height} has a zero side"),
            ));
        }
        if cells_across == 0 {
            return Err(PixelArtError::invalid("cells_across", "must be at least 1"));
        }

        Ok(Self {
            width,
            height,
            cells_across,
            offset_x,
            offset_y,
            size: width as f64 / cells_across as f64,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn cells_across(&self) -> u32 {
        self.cells_across
    }

    pub fn offset(&self) -> (i32, i32) {
        (self.offset_x, self.offset_y)
    }

    /// Side length of one cell in pixels.
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Candidate block index range along one axis, end exclusive.
    ///
    /// One cell of slack on each side keeps extreme offsets from losing an
    /// edge cell to rounding. Indices outside `i32` are dropped, and the end
    /// stays below `i32::MAX` so `index + 1` never overflows.
    fn index_range(&self, offset: i32, extent: u32) -> std::ops::Range<i32> {
        let offset = offset as f64;
        let min = ((-offset / self.size).floor() as i64).saturating_sub(1);
        let max = (((extent as f64 - offset) / self.size).ceil() as i64).saturating_add(1);
        let clamp = |i: i64| i.clamp(i32::MIN as i64, i32::MAX as i64 - 1) as i32;
        clamp(min)..clamp(max)
    }

    fn edge(&self, offset: i32, index: i32) -> f64 {
        offset as f64 + index as f64 * self.size
    }

    /// Clamp `[floor(edge(index)), floor(edge(index + 1)))` to `[0, extent)`.
    ///
    /// Both ends come from the same expression so adjacent cells agree on
    /// their shared boundary.
    fn clamp_span(&self, offset: i32, index: i32, extent: u32) -> Option<(u32, u32)> {
        let start = (self.edge(offset, index).floor() as i64).max(0);
        let end = (self.edge(offset, index + 1).floor() as i64).min(extent as i64);
        if start >= end {
            return None;
        }
        Some((start as u32, end as u32))
    }

    /// Cell at block coordinates `(bx, by)`, or `None` if it covers no pixel.
    pub fn cell(&self, bx: i32, by: i32) -> Option<GridCell> {
        let (start_x, end_x) = self.clamp_span(self.offset_x, bx, self.width)?;
        let (start_y, end_y) = self.clamp_span(self.offset_y, by, self.height)?;
        let origin_x = self.edge(self.offset_x, bx);
        let origin_y = self.edge(self.offset_y, by);
        Some(GridCell {
            bx,
            by,
            origin_x,
            origin_y,
            start_x,
            start_y,
            end_x,
            end_y,
        })
    }

    /// Every cell that overlaps the image, row-major (`by`, then `bx`).
    pub fn cells(&self) -> impl Iterator<Item = GridCell> + use<> {
        let geometry = *self;
        let xs = geometry.index_range(geometry.offset_x, geometry.width);
        geometry
            .index_range(geometry.offset_y, geometry.height)
            .flat_map(move |by| xs.clone().map(move |bx| (bx, by)))
            .filter_map(move |(bx, by)| geometry.cell(bx, by))
    }
}
