//! Color-space helpers: RGB⇄HSV conversion and the distance metrics used for
//! palette matching.
//!
//! All metrics return squared-style scores. Nearest-color search only needs
//! relative ordering, so no square roots are taken.

use palette::Srgb;
use serde::{Deserialize, Serialize};

use crate::error::{PixelArtError, Result};

/// An opaque 8-bit sRGB color.
pub type Rgb = Srgb<u8>;

/// Hue, saturation and value, each normalized to `[0, 1]` (hue to `[0, 1)`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsv {
    pub h: f64,
    pub s: f64,
    pub v: f64,
}

/// Convert an sRGB color to HSV using the max/min/delta formulation.
///
/// Achromatic colors (`max == min`) get a hue of exactly `0.0`.
pub fn rgb_to_hsv(color: Rgb) -> Hsv {
    let r = color.red as f64 / 255.0;
    let g = color.green as f64 / 255.0;
    let b = color.blue as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let d = max - min;

    let s = if max == 0.0 { 0.0 } else { d / max };
    let h = if max == min {
        0.0
    } else if max == r {
        ((g - b) / d + if g < b { 6.0 } else { 0.0 }) / 6.0
    } else if max == g {
        ((b - r) / d + 2.0) / 6.0
    } else {
        ((r - g) / d + 4.0) / 6.0
    };

    Hsv { h, s, v: max }
}

/// Convert HSV back to sRGB, rounding every channel to the nearest integer.
pub fn hsv_to_rgb(hsv: Hsv) -> Rgb {
    let h = hsv.h.rem_euclid(1.0) * 6.0;
    let sector = h.floor();
    let f = h - sector;
    let v = hsv.v;
    let p = v * (1.0 - hsv.s);
    let q = v * (1.0 - f * hsv.s);
    let t = v * (1.0 - (1.0 - f) * hsv.s);

    let (r, g, b) = match sector as u8 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    let to_u8 = |c: f64| (c * 255.0).round().clamp(0.0, 255.0) as u8;
    Srgb::new(to_u8(r), to_u8(g), to_u8(b))
}

/// Distance metric used when matching a block color against the palette.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum DistanceMetric {
    /// Squared Euclidean distance over raw channel differences.
    Rgb,
    /// Squared channel differences weighted `(0.3, 0.59, 0.11)`.
    #[default]
    Perceptual,
    /// Hue-aware distance on the HSV cylinder.
    ///
    /// The hue difference wraps around (shortest arc) and is damped by
    /// `sqrt(s1 * s2)`, never below `0.1`, so greys mostly ignore hue.
    Hsv,
}

impl DistanceMetric {
    pub fn distance(self, a: Rgb, b: Rgb) -> f64 {
        match self {
            DistanceMetric::Rgb => {
                let (dr, dg, db) = channel_deltas(a, b);
                dr * dr + dg * dg + db * db
            }
            DistanceMetric::Perceptual => {
                let (dr, dg, db) = channel_deltas(a, b);
                dr * dr * 0.3 + dg * dg * 0.59 + db * db * 0.11
            }
            DistanceMetric::Hsv => hsv_distance(a, b),
        }
    }
}

/// Shorthand for [`DistanceMetric::distance`].
#[inline]
pub fn distance(metric: DistanceMetric, a: Rgb, b: Rgb) -> f64 {
    metric.distance(a, b)
}

#[inline(always)]
fn channel_deltas(a: Rgb, b: Rgb) -> (f64, f64, f64) {
    (
        a.red as f64 - b.red as f64,
        a.green as f64 - b.green as f64,
        a.blue as f64 - b.blue as f64,
    )
}

fn hsv_distance(a: Rgb, b: Rgb) -> f64 {
    let hsv1 = rgb_to_hsv(a);
    let hsv2 = rgb_to_hsv(b);

    let mut dh = (hsv1.h - hsv2.h).abs();
    if dh > 0.5 {
        dh = 1.0 - dh;
    }
    let ds = hsv1.s - hsv2.s;
    let dv = hsv1.v - hsv2.v;

    let weight = (hsv1.s * hsv2.s).sqrt().max(0.1);
    dh * dh * weight * 400.0 + ds * ds * 100.0 + dv * dv * 100.0
}

/// Rec. 601 luma, used for brightness ordering.
#[inline]
pub fn luma(color: Rgb) -> f64 {
    0.299 * color.red as f64 + 0.587 * color.green as f64 + 0.114 * color.blue as f64
}

/// `#rrggbb` in lowercase.
pub fn to_hex(color: Rgb) -> String {
    format!("#{:02x}{:02x}{:02x}", color.red, color.green, color.blue)
}

/// Parse `#rrggbb` or `rrggbb`.
pub fn parse_hex(s: &str) -> Result<Rgb> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(PixelArtError::InvalidColor(s.to_string()));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|_| PixelArtError::InvalidColor(s.to_string()))
    };
    Ok(Srgb::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}
