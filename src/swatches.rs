//! Sample points and the palette they seed.
//!
//! Every live sample point contributes exactly one palette entry, in the
//! order the points were placed.

use std::borrow::Cow;
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::color::{Rgb, luma, rgb_to_hsv};

/// A user-placed pick location and the color read there.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplePoint {
    pub id: u64,
    pub x: u32,
    pub y: u32,
    pub color: Rgb,
}

/// Live sample points in placement order. Ids are never reused.
#[derive(Clone, Debug, Default)]
pub struct SamplePoints {
    points: Vec<SamplePoint>,
    next_id: u64,
}

impl SamplePoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, x: u32, y: u32, color: Rgb) -> SamplePoint {
        let point = SamplePoint {
            id: self.next_id,
            x,
            y,
            color,
        };
        self.next_id += 1;
        self.points.push(point);
        point
    }

    pub fn get(&self, id: u64) -> Option<&SamplePoint> {
        self.points.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut SamplePoint> {
        self.points.iter_mut().find(|p| p.id == id)
    }

    pub fn remove(&mut self, id: u64) -> Option<SamplePoint> {
        let idx = self.points.iter().position(|p| p.id == id)?;
        Some(self.points.remove(idx))
    }

    /// Remove the first point whose color equals `color`.
    pub fn remove_by_color(&mut self, color: Rgb) -> Option<SamplePoint> {
        let idx = self.points.iter().position(|p| p.color == color)?;
        Some(self.points.remove(idx))
    }

    /// Drop every point and restart ids from zero.
    pub fn clear(&mut self) {
        self.points.clear();
        self.next_id = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &SamplePoint> {
        self.points.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SamplePoint> {
        self.points.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Ordered palette colors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgb>,
}

impl Palette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: &SamplePoints) -> Self {
        Self {
            colors: points.iter().map(|p| p.color).collect(),
        }
    }

    pub fn add(&mut self, color: Rgb) {
        self.colors.push(color);
    }

    /// Remove the first entry equal to `color`. Returns whether one was found.
    pub fn remove(&mut self, color: Rgb) -> bool {
        match self.colors.iter().position(|&c| c == color) {
            Some(idx) => {
                self.colors.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// The palette as seen by a preview render: the persisted colors plus
    /// `preview` appended, without touching `self`.
    pub fn with_preview(&self, preview: Option<Rgb>) -> Cow<'_, [Rgb]> {
        match preview {
            None => Cow::Borrowed(&self.colors),
            Some(extra) => {
                let mut colors = Vec::with_capacity(self.colors.len() + 1);
                colors.extend_from_slice(&self.colors);
                colors.push(extra);
                Cow::Owned(colors)
            }
        }
    }
}

/// Presentation order for palette listings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum SortMode {
    /// Hue in 24 steps, then brighter first, then more saturated first.
    #[default]
    Hsv,
    /// Brightest first.
    Luma,
    /// Largest `0xRRGGBB` value first.
    Rgb,
}

impl SortMode {
    /// The mode the sort toggle advances to.
    pub fn next(self) -> Self {
        match self {
            SortMode::Hsv => SortMode::Luma,
            SortMode::Luma => SortMode::Rgb,
            SortMode::Rgb => SortMode::Hsv,
        }
    }
}

fn hsv_order(a: Rgb, b: Rgb) -> Ordering {
    let ha = rgb_to_hsv(a);
    let hb = rgb_to_hsv(b);
    let bucket_a = (ha.h * 24.0).round() as i32;
    let bucket_b = (hb.h * 24.0).round() as i32;
    if bucket_a != bucket_b {
        return bucket_a.cmp(&bucket_b);
    }
    if (ha.v - hb.v).abs() > 0.1 {
        return hb.v.total_cmp(&ha.v);
    }
    hb.s.total_cmp(&ha.s)
}

#[inline]
fn packed(c: Rgb) -> u32 {
    ((c.red as u32) << 16) | ((c.green as u32) << 8) | c.blue as u32
}

/// A reordered copy of `colors` for display. The input is left untouched.
pub fn sorted_palette(colors: &[Rgb], mode: SortMode) -> Vec<Rgb> {
    let mut sorted = colors.to_vec();
    match mode {
        SortMode::Hsv => {
            // The value threshold makes this comparison intransitive, which
            // the std sorts may reject; a stable insertion sort accepts it.
            for i in 1..sorted.len() {
                let mut j = i;
                while j > 0 && hsv_order(sorted[j - 1], sorted[j]) == Ordering::Greater {
                    sorted.swap(j - 1, j);
                    j -= 1;
                }
            }
        }
        SortMode::Luma => sorted.sort_by(|a, b| luma(*b).total_cmp(&luma(*a))),
        SortMode::Rgb => sorted.sort_by_key(|&c| std::cmp::Reverse(packed(c))),
    }
    sorted
}
