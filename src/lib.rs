use std::time::Duration;

use image::{DynamicImage, RgbaImage};
use js_sys::{Array, Object, Reflect, Uint8Array};
use wasm_bindgen::prelude::*;

pub mod color;
pub mod error;
pub mod grid;
pub mod pipeline;
pub mod quantize;
pub mod sampler;
pub mod source;
pub mod swatches;

pub use color::{DistanceMetric, Hsv, Rgb, distance, parse_hex, rgb_to_hsv, to_hex};
pub use error::{PixelArtError, Result};
pub use grid::{GridCell, GridGeometry};
pub use pipeline::{
    ChangeKind, DEBOUNCE_DELAY, Debouncer, Pipeline, Settings, Trigger, should_recompute,
};
pub use quantize::{BoundingBox, QuantizedFrame, nearest, quantize};
pub use sampler::{BlockColor, SampleMethod, compute_blocks, sample_palette_color};
pub use source::SourceImage;
pub use swatches::{Palette, SamplePoint, SamplePoints, SortMode, sorted_palette};

// ------------------------------------------------------------
// Browser surface
// ------------------------------------------------------------

fn js_err(err: PixelArtError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Host timestamp to `Duration`. Negative or NaN clamps to zero, overflow to
/// `Duration::MAX`.
fn js_time(now_ms: f64) -> Duration {
    Duration::try_from_secs_f64(now_ms.max(0.0) / 1000.0).unwrap_or(Duration::MAX)
}

fn parse_method(name: &str) -> Result<SampleMethod, JsValue> {
    match name {
        "center" => Ok(SampleMethod::Center),
        "average" => Ok(SampleMethod::Average),
        "dominant" => Ok(SampleMethod::Dominant),
        other => Err(JsValue::from_str(&format!("Unknown sample method: {other}"))),
    }
}

fn parse_metric(name: &str) -> Result<DistanceMetric, JsValue> {
    match name {
        "rgb" => Ok(DistanceMetric::Rgb),
        "perceptual" => Ok(DistanceMetric::Perceptual),
        "hsv" => Ok(DistanceMetric::Hsv),
        other => Err(JsValue::from_str(&format!("Unknown distance metric: {other}"))),
    }
}

fn sort_mode_name(mode: SortMode) -> &'static str {
    match mode {
        SortMode::Hsv => "hsv",
        SortMode::Luma => "luma",
        SortMode::Rgb => "rgb",
    }
}

fn hex_array(colors: &[Rgb]) -> Array {
    let out = Array::new();
    for &c in colors {
        out.push(&JsValue::from_str(&to_hex(c)));
    }
    out
}

/// `{ width, height, pixels }`, where `pixels` is RGBA at the logical
/// resolution (one pixel per cell).
fn frame_to_js(frame: &QuantizedFrame) -> Result<Object, JsValue> {
    let img = frame.to_image();
    let result = Object::new();
    Reflect::set(&result, &JsValue::from_str("width"), &JsValue::from(img.width()))?;
    Reflect::set(&result, &JsValue::from_str("height"), &JsValue::from(img.height()))?;
    let pixels = Uint8Array::from(img.as_raw().as_slice());
    Reflect::set(&result, &JsValue::from_str("pixels"), &pixels)?;
    Ok(result)
}

/// Interactive pixel-art session over one image, driven by a browser host.
///
/// Setters schedule work; the host calls [`tick`](Self::tick) with
/// `performance.now()` and redraws whenever a frame comes back.
#[wasm_bindgen]
pub struct PixelArtSession {
    pipeline: Pipeline,
}

#[wasm_bindgen]
impl PixelArtSession {
    /// Start a session from canvas `ImageData` bytes (RGBA, alpha ignored).
    #[wasm_bindgen(constructor)]
    pub fn new(
        rgba: Vec<u8>,
        width: u32,
        height: u32,
        cells_across: u32,
    ) -> Result<PixelArtSession, JsValue> {
        let img = RgbaImage::from_raw(width, height, rgba)
            .ok_or_else(|| JsValue::from_str("Pixel buffer does not match dimensions"))?;
        let settings = Settings {
            cells_across,
            ..Settings::default()
        };
        let pipeline =
            Pipeline::new(DynamicImage::ImageRgba8(img).to_rgb8(), settings).map_err(js_err)?;
        Ok(Self { pipeline })
    }

    pub fn set_cells_across(&mut self, cells_across: u32, now_ms: f64) -> Result<(), JsValue> {
        self.pipeline
            .set_cells_across(cells_across, js_time(now_ms))
            .map_err(js_err)?;
        Ok(())
    }

    pub fn set_offset(&mut self, offset_x: i32, offset_y: i32, now_ms: f64) -> Result<(), JsValue> {
        self.pipeline
            .set_offset(offset_x, offset_y, js_time(now_ms))
            .map_err(js_err)?;
        Ok(())
    }

    pub fn set_sample_method(&mut self, method: &str, now_ms: f64) -> Result<(), JsValue> {
        self.pipeline
            .set_sample_method(parse_method(method)?, js_time(now_ms));
        Ok(())
    }

    pub fn set_metric(&mut self, metric: &str, now_ms: f64) -> Result<(), JsValue> {
        self.pipeline.set_metric(parse_metric(metric)?, js_time(now_ms));
        Ok(())
    }

    pub fn set_blur(&mut self, blur_radius: f32, now_ms: f64) -> Result<(), JsValue> {
        self.pipeline
            .set_blur(blur_radius, js_time(now_ms))
            .map_err(js_err)?;
        Ok(())
    }

    /// Returns the new point's id.
    pub fn add_sample_point(&mut self, x: u32, y: u32, now_ms: f64) -> Result<f64, JsValue> {
        let point = self
            .pipeline
            .add_sample_point(x, y, js_time(now_ms))
            .map_err(js_err)?;
        Ok(point.id as f64)
    }

    /// Drag a point and get the requantized frame back right away.
    pub fn move_sample_point(&mut self, id: f64, x: i32, y: i32) -> Result<Object, JsValue> {
        let frame = self
            .pipeline
            .move_sample_point(id as u64, x as i64, y as i64)
            .map_err(js_err)?;
        frame_to_js(frame)
    }

    pub fn remove_sample_point(&mut self, id: f64, now_ms: f64) -> Result<(), JsValue> {
        self.pipeline
            .remove_sample_point(id as u64, js_time(now_ms))
            .map_err(js_err)?;
        Ok(())
    }

    /// Delete the swatch with this hex color. Returns whether one matched.
    pub fn remove_swatch(&mut self, hex: &str, now_ms: f64) -> Result<bool, JsValue> {
        let color = parse_hex(hex).map_err(js_err)?;
        Ok(self.pipeline.remove_swatch(color, js_time(now_ms)).is_some())
    }

    /// Render with `hex` temporarily added to the palette.
    pub fn preview(&self, hex: &str) -> Result<Object, JsValue> {
        let color = parse_hex(hex).map_err(js_err)?;
        frame_to_js(&self.pipeline.preview(color))
    }

    /// Run due work. Returns the new frame, or `undefined` if nothing ran.
    pub fn tick(&mut self, now_ms: f64) -> Result<Option<Object>, JsValue> {
        match self.pipeline.tick(js_time(now_ms)).map_err(js_err)? {
            Some(_) => Ok(Some(frame_to_js(self.pipeline.frame())?)),
            None => Ok(None),
        }
    }

    pub fn frame(&self) -> Result<Object, JsValue> {
        frame_to_js(self.pipeline.frame())
    }

    /// Hex colors in the current presentation order.
    pub fn sorted_palette(&self) -> Array {
        hex_array(&self.pipeline.sorted_palette())
    }

    /// Advance the sort toggle and return the new mode's name.
    pub fn cycle_sort_mode(&mut self) -> String {
        sort_mode_name(self.pipeline.cycle_sort_mode()).to_string()
    }
}

// ------------------------------------------------------------
// Native surface
// ------------------------------------------------------------

/// Longest-side rescale, keeping the aspect ratio and at least one pixel.
#[cfg(not(target_arch = "wasm32"))]
fn scaled_to_longest_side(width: u32, height: u32, longest: u32) -> (u32, u32) {
    let ratio = longest as f32 / width.max(height) as f32;
    (
        ((width as f32) * ratio).round().max(1.0) as u32,
        ((height as f32) * ratio).round().max(1.0) as u32,
    )
}

/// Result of [`render_bytes`].
#[cfg(not(target_arch = "wasm32"))]
#[derive(Clone, Debug)]
pub struct RenderOutput {
    pub png: Vec<u8>,
    /// Palette as `#rrggbb`, in presentation order.
    pub palette: Vec<String>,
    /// Cells across and down, before any upscale.
    pub resolution: (u32, u32),
}

/// Decode `input`, run the full pipeline and PNG-encode the result.
///
/// `sample_points` are in working-size pixel coordinates (after fitting to
/// `settings.max_dimension`); when empty the image center seeds the palette.
/// With `output_size`, the one-pixel-per-cell raster is scaled up
/// (nearest-neighbour) so its longest side has that many pixels.
#[cfg(not(target_arch = "wasm32"))]
pub fn render_bytes(
    input: &[u8],
    settings: &Settings,
    sample_points: &[(u32, u32)],
    output_size: Option<u32>,
) -> Result<RenderOutput> {
    use image::{ImageFormat, imageops::FilterType};

    let img = image::load_from_memory(input)?;
    let mut pipeline = Pipeline::new(img.to_rgb8(), settings.clone())?;

    if !sample_points.is_empty() {
        let seeded: Vec<u64> = pipeline.sample_points().iter().map(|p| p.id).collect();
        for id in seeded {
            pipeline.remove_sample_point(id, Duration::ZERO)?;
        }
        for &(x, y) in sample_points {
            pipeline.add_sample_point(x, y, Duration::ZERO)?;
        }
        pipeline.flush()?;
    }

    let frame = pipeline.frame();
    let (w, h) = frame
        .resolution()
        .ok_or_else(|| PixelArtError::invalid("settings", "the grid produced no cells"))?;
    let mut raster = frame.to_image();
    if let Some(size) = output_size {
        let (up_w, up_h) = scaled_to_longest_side(w, h, size);
        raster = image::imageops::resize(&raster, up_w, up_h, FilterType::Nearest);
    }

    let mut buf = Vec::new();
    {
        let mut cursor = std::io::Cursor::new(&mut buf);
        DynamicImage::ImageRgba8(raster).write_to(&mut cursor, ImageFormat::Png)?;
    }

    Ok(RenderOutput {
        png: buf,
        palette: pipeline.sorted_palette().into_iter().map(to_hex).collect(),
        resolution: (w, h),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn host_timestamps_never_panic() {
        assert_eq!(js_time(1500.0), Duration::from_millis(1500));
        assert_eq!(js_time(-3.0), Duration::ZERO);
        assert_eq!(js_time(f64::NAN), Duration::ZERO);
        assert_eq!(js_time(f64::INFINITY), Duration::MAX);
        assert_eq!(js_time(f64::MAX), Duration::MAX);
    }

    #[test]
    fn longest_side_scaling() {
        assert_eq!(scaled_to_longest_side(32, 16, 512), (512, 256));
        assert_eq!(scaled_to_longest_side(3, 300, 30), (1, 30));
    }

    #[test]
    fn render_bytes_produces_png() {
        let img = RgbImage::from_fn(16, 8, |x, _| {
            if x < 8 {
                image::Rgb([250, 10, 10])
            } else {
                image::Rgb([10, 10, 250])
            }
        });
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let settings = Settings {
            cells_across: 4,
            ..Settings::default()
        };
        let out = render_bytes(&png, &settings, &[(1, 1), (14, 6)], Some(8)).unwrap();
        assert_eq!(out.palette.len(), 2);
        assert_eq!(out.resolution, (4, 2));

        let decoded = image::load_from_memory(&out.png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (8, 4));
        assert_eq!(decoded.get_pixel(0, 0).0, [250, 10, 10, 255]);
        assert_eq!(decoded.get_pixel(7, 3).0, [10, 10, 250, 255]);
    }
}
