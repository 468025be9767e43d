//! The working copy of the source image: fitted to the working size and,
//! optionally, blurred before sampling.

use image::{DynamicImage, GenericImageView, RgbImage, imageops, imageops::FilterType};
use tracing::debug;

use crate::error::{PixelArtError, Result};

/// Longest side, in pixels, of the working copy by default.
pub const DEFAULT_MAX_DIMENSION: u32 = 800;

#[derive(Clone, Debug)]
pub struct SourceImage {
    raw: RgbImage,
    processed: RgbImage,
    blur_radius: f32,
}

/// Working-size dimensions: unchanged when both sides fit, otherwise scaled
/// by `min(max / w, max / h)` and floored.
pub fn fit_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }
    let ratio = (max_dimension as f64 / width as f64).min(max_dimension as f64 / height as f64);
    let w = ((width as f64 * ratio).floor() as u32).max(1);
    let h = ((height as f64 * ratio).floor() as u32).max(1);
    (w, h)
}

fn validate_blur(blur_radius: f32) -> Result<()> {
    if !blur_radius.is_finite() || blur_radius < 0.0 {
        return Err(PixelArtError::invalid(
            "blur_radius",
            format!("{blur_radius} is not a finite, non-negative radius"),
        ));
    }
    Ok(())
}

fn preprocess(raw: &RgbImage, blur_radius: f32) -> RgbImage {
    if blur_radius > 0.0 {
        imageops::blur(raw, blur_radius)
    } else {
        raw.clone()
    }
}

impl SourceImage {
    pub fn new(image: RgbImage, max_dimension: u32, blur_radius: f32) -> Result<Self> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(PixelArtError::invalid(
                "image dimensions",
                format!("{w}x{h} has a zero side"),
            ));
        }
        if max_dimension == 0 {
            return Err(PixelArtError::invalid("max_dimension", "must be at least 1"));
        }
        validate_blur(blur_radius)?;

        let (fw, fh) = fit_dimensions(w, h, max_dimension);
        let raw = if (fw, fh) == (w, h) {
            image
        } else {
            debug!(from = ?(w, h), to = ?(fw, fh), "fitting source to working size");
            imageops::resize(&image, fw, fh, FilterType::Triangle)
        };
        let processed = preprocess(&raw, blur_radius);

        Ok(Self {
            raw,
            processed,
            blur_radius,
        })
    }

    /// Decoded images of any pixel format; alpha is discarded.
    pub fn from_dynamic(image: &DynamicImage, max_dimension: u32, blur_radius: f32) -> Result<Self> {
        if image.dimensions().0 == 0 || image.dimensions().1 == 0 {
            return Err(PixelArtError::invalid("image dimensions", "image is empty"));
        }
        Self::new(image.to_rgb8(), max_dimension, blur_radius)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.raw.dimensions()
    }

    /// Full-fidelity working copy, before blurring.
    pub fn raw(&self) -> &RgbImage {
        &self.raw
    }

    /// Buffer that sampling and palette picks read from.
    pub fn processed(&self) -> &RgbImage {
        &self.processed
    }

    pub fn blur_radius(&self) -> f32 {
        self.blur_radius
    }

    /// Re-run preprocessing with a new blur radius. Returns `false` if the
    /// radius is unchanged and nothing was recomputed.
    pub fn set_blur(&mut self, blur_radius: f32) -> Result<bool> {
        validate_blur(blur_radius)?;
        if blur_radius == self.blur_radius {
            return Ok(false);
        }
        self.blur_radius = blur_radius;
        self.processed = preprocess(&self.raw, blur_radius);
        Ok(true)
    }
}
