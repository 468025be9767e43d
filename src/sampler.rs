//! Block sampling: one representative color per grid cell.

use std::collections::HashMap;

use image::RgbImage;
use palette::Srgb;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::color::Rgb;
use crate::error::{PixelArtError, Result};
use crate::grid::{GridCell, GridGeometry};

/// How a cell's pixels are reduced to one color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum SampleMethod {
    /// The single pixel under the cell's center point.
    #[default]
    Center,
    /// Per-channel mean of every covered pixel, rounded half up.
    Average,
    /// Most frequent color, with near-duplicates merged into one bucket.
    Dominant,
}

/// Sampled color of one grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockColor {
    pub bx: i32,
    pub by: i32,
    pub color: Rgb,
}

#[inline(always)]
fn rgb_at(pixels: &RgbImage, x: u32, y: u32) -> Rgb {
    let [r, g, b] = pixels.get_pixel(x, y).0;
    Srgb::new(r, g, b)
}

fn sample_center(pixels: &RgbImage, cell: &GridCell, size: f64) -> Option<Rgb> {
    let cx = (cell.origin_x + size / 2.0).floor();
    let cy = (cell.origin_y + size / 2.0).floor();
    if cx < 0.0 || cy < 0.0 || cx >= pixels.width() as f64 || cy >= pixels.height() as f64 {
        return None;
    }
    Some(rgb_at(pixels, cx as u32, cy as u32))
}

fn sample_average(pixels: &RgbImage, cell: &GridCell) -> Option<Rgb> {
    let mut sum = [0u64; 3];
    let mut count = 0u64;
    for y in cell.start_y..cell.end_y {
        for x in cell.start_x..cell.end_x {
            let p = pixels.get_pixel(x, y).0;
            sum[0] += p[0] as u64;
            sum[1] += p[1] as u64;
            sum[2] += p[2] as u64;
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    // floor(sum / count + 0.5) in integer arithmetic.
    let mean = |s: u64| ((2 * s + count) / (2 * count)) as u8;
    Some(Srgb::new(mean(sum[0]), mean(sum[1]), mean(sum[2])))
}

/// Histogram key with every channel divided by 4 and rounded half up.
#[inline(always)]
fn bucket_key(p: [u8; 3]) -> u32 {
    let q = |c: u8| (c as u32 + 2) / 4;
    (q(p[0]) << 16) | (q(p[1]) << 8) | q(p[2])
}

fn sample_dominant(pixels: &RgbImage, cell: &GridCell) -> Option<Rgb> {
    let mut counts: HashMap<u32, u32> = HashMap::new();
    let mut best_count = 0u32;
    let mut best = None;

    // The winner is tracked while scanning: only a strictly greater count
    // replaces it, so the first bucket to reach the top count keeps the
    // exact pixel that pushed it there.
    for y in cell.start_y..cell.end_y {
        for x in cell.start_x..cell.end_x {
            let p = pixels.get_pixel(x, y).0;
            let count = counts.entry(bucket_key(p)).or_insert(0);
            *count += 1;
            if *count > best_count {
                best_count = *count;
                best = Some(Srgb::new(p[0], p[1], p[2]));
            }
        }
    }
    best
}

/// Sample every cell of `geometry` from `pixels`.
///
/// Cells that yield no color (a CENTER point off the image) are dropped;
/// the rest come back in cell enumeration order.
pub fn compute_blocks(
    pixels: &RgbImage,
    geometry: &GridGeometry,
    method: SampleMethod,
) -> Result<Vec<BlockColor>> {
    if pixels.dimensions() != (geometry.width(), geometry.height()) {
        return Err(PixelArtError::invalid(
            "geometry",
            format!(
                "grid is laid out for {}x{} but the buffer is {}x{}",
                geometry.width(),
                geometry.height(),
                pixels.width(),
                pixels.height()
            ),
        ));
    }

    let size = geometry.size();
    let blocks: Vec<BlockColor> = geometry
        .cells()
        .filter_map(|cell| {
            let color = match method {
                SampleMethod::Center => sample_center(pixels, &cell, size),
                SampleMethod::Average => sample_average(pixels, &cell),
                SampleMethod::Dominant => sample_dominant(pixels, &cell),
            }?;
            Some(BlockColor {
                bx: cell.bx,
                by: cell.by,
                color,
            })
        })
        .collect();

    debug!(
        ?method,
        cells_across = geometry.cells_across(),
        blocks = blocks.len(),
        "sampled grid"
    );
    Ok(blocks)
}

/// Color of the pixel at `(x, y)`, used to seed a palette entry.
pub fn sample_palette_color(x: u32, y: u32, pixels: &RgbImage) -> Result<Rgb> {
    if x >= pixels.width() || y >= pixels.height() {
        return Err(PixelArtError::PointOutOfBounds {
            x,
            y,
            width: pixels.width(),
            height: pixels.height(),
        });
    }
    Ok(rgb_at(pixels, x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb as Px;

    fn solid(w: u32, h: u32, c: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(w, h, Px(c))
    }

    #[test]
    fn center_on_uniform_red() {
        let img = solid(4, 4, [255, 0, 0]);
        let geometry = GridGeometry::new(4, 4, 2, 0, 0).unwrap();
        let blocks = compute_blocks(&img, &geometry, SampleMethod::Center).unwrap();
        assert_eq!(blocks.len(), 4);
        assert!(blocks.iter().all(|b| b.color == Srgb::new(255, 0, 0)));
        let coords: Vec<_> = blocks.iter().map(|b| (b.bx, b.by)).collect();
        assert_eq!(coords, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
    }

    #[test]
    fn center_reads_the_middle_pixel() {
        let img = RgbImage::from_fn(4, 4, |x, y| Px([x as u8 * 10, y as u8 * 10, 0]));
        let geometry = GridGeometry::new(4, 4, 2, 0, 0).unwrap();
        let blocks = compute_blocks(&img, &geometry, SampleMethod::Center).unwrap();
        // Centers at (1,1), (3,1), (1,3), (3,3).
        assert_eq!(blocks[0].color, Srgb::new(10, 10, 0));
        assert_eq!(blocks[3].color, Srgb::new(30, 30, 0));
    }

    #[test]
    fn center_drops_cells_whose_center_is_off_image() {
        // Cell size 4, shifted 3 px left: column -1 covers x in [0,1) but
        // its center x = floor(-3 + 2) = -1 lies outside.
        let img = solid(8, 4, [1, 2, 3]);
        let geometry = GridGeometry::new(8, 4, 2, 1, 0).unwrap();
        let centers = compute_blocks(&img, &geometry, SampleMethod::Center).unwrap();
        let averages = compute_blocks(&img, &geometry, SampleMethod::Average).unwrap();
        assert!(centers.len() < averages.len());
        assert!(centers.iter().all(|b| b.bx >= 0));
    }

    #[test]
    fn average_rounds_half_up() {
        let img = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Px([0, 0, 0]) } else { Px([255, 255, 255]) });
        let geometry = GridGeometry::new(2, 1, 1, 0, 0).unwrap();
        let blocks = compute_blocks(&img, &geometry, SampleMethod::Average).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].color, Srgb::new(128, 128, 128));
    }

    #[test]
    fn dominant_on_uniform_cell() {
        let img = solid(6, 6, [17, 99, 201]);
        let geometry = GridGeometry::new(6, 6, 2, 0, 0).unwrap();
        let blocks = compute_blocks(&img, &geometry, SampleMethod::Dominant).unwrap();
        assert_eq!(blocks.len(), 4);
        assert!(blocks.iter().all(|b| b.color == Srgb::new(17, 99, 201)));
    }

    #[test]
    fn dominant_merges_near_duplicates_and_keeps_pixel_that_took_the_lead() {
        // 99, 100 and 101 share red bucket 25 and outnumber the two greys.
        // The reported color is the pixel that last raised the leading count.
        let row = [[100, 0, 0], [50, 50, 50], [101, 0, 0], [50, 50, 50], [99, 0, 0]];
        let img = RgbImage::from_fn(5, 1, |x, _| Px(row[x as usize]));
        let geometry = GridGeometry::new(5, 1, 1, 0, 0).unwrap();
        let blocks = compute_blocks(&img, &geometry, SampleMethod::Dominant).unwrap();
        // Counts: red bucket 1 (lead, 100), grey 1, red 2 (lead, 101),
        // grey 2 (tie, no change), red 3 (lead, 99).
        assert_eq!(blocks[0].color, Srgb::new(99, 0, 0));
    }

    #[test]
    fn dominant_tie_goes_to_first_bucket_to_lead() {
        let row = [[10, 10, 10], [200, 0, 0], [200, 0, 0], [10, 10, 10]];
        let img = RgbImage::from_fn(4, 1, |x, _| Px(row[x as usize]));
        let geometry = GridGeometry::new(4, 1, 1, 0, 0).unwrap();
        let blocks = compute_blocks(&img, &geometry, SampleMethod::Dominant).unwrap();
        assert_eq!(blocks[0].color, Srgb::new(200, 0, 0));
    }

    #[test]
    fn bucket_key_rounds_half_up() {
        assert_eq!(bucket_key([2, 0, 0]), 1 << 16);
        assert_eq!(bucket_key([1, 0, 0]), 0);
        assert_eq!(bucket_key([255, 255, 255]), (64 << 16) | (64 << 8) | 64);
    }

    #[test]
    fn rejects_mismatched_buffer() {
        let img = solid(4, 4, [0, 0, 0]);
        let geometry = GridGeometry::new(5, 4, 2, 0, 0).unwrap();
        assert!(compute_blocks(&img, &geometry, SampleMethod::Average).is_err());
    }

    #[test]
    fn palette_color_pick() {
        let img = RgbImage::from_fn(3, 3, |x, y| Px([x as u8, y as u8, 7]));
        assert_eq!(sample_palette_color(2, 1, &img).unwrap(), Srgb::new(2, 1, 7));
        assert!(matches!(
            sample_palette_color(3, 0, &img),
            Err(PixelArtError::PointOutOfBounds { .. })
        ));
    }
}
