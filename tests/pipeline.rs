use std::time::Duration;

use image::{Rgb as Px, RgbImage};
use palette::Srgb;
use pixel_palette_art::{
    DistanceMetric, Pipeline, PixelArtError, SampleMethod, Settings, SortMode, Trigger,
};
use pretty_assertions::assert_eq;

const RED: Srgb<u8> = Srgb::new(255, 0, 0);
const BLUE: Srgb<u8> = Srgb::new(0, 0, 255);
const BLACK: Srgb<u8> = Srgb::new(0, 0, 0);

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// 8×4, red on the left half, blue on the right.
fn split_image() -> RgbImage {
    RgbImage::from_fn(8, 4, |x, _| if x < 4 { Px([255, 0, 0]) } else { Px([0, 0, 255]) })
}

fn settings(cells_across: u32) -> Settings {
    Settings {
        cells_across,
        ..Settings::default()
    }
}

#[test]
fn uniform_red_image_center_sampling() {
    let img = RgbImage::from_pixel(4, 4, Px([255, 0, 0]));
    let pipeline = Pipeline::new(img, settings(2)).unwrap();

    let blocks = pipeline.blocks();
    assert_eq!(blocks.len(), 4);
    assert!(blocks.iter().all(|b| b.color == RED));
    assert_eq!(pipeline.palette().colors(), &[RED]);
    assert_eq!(pipeline.frame().resolution(), Some((2, 2)));
}

#[test]
fn new_pipeline_seeds_center_point() {
    let pipeline = Pipeline::new(split_image(), settings(2)).unwrap();
    let points: Vec<_> = pipeline.sample_points().iter().copied().collect();
    assert_eq!(points.len(), 1);
    assert_eq!((points[0].x, points[0].y, points[0].color), (4, 2, BLUE));
    // Single blue swatch: every cell maps to it.
    assert!(pipeline.frame().cells().values().all(|&c| c == BLUE));
}

#[test]
fn empty_palette_renders_black() {
    let mut pipeline = Pipeline::new(split_image(), settings(2)).unwrap();
    let id = pipeline.sample_points().iter().next().unwrap().id;
    pipeline.remove_sample_point(id, ms(0)).unwrap();
    assert!(pipeline.palette().is_empty());

    assert_eq!(pipeline.flush().unwrap(), Some(Trigger::Resample));
    let frame = pipeline.frame();
    assert_eq!(frame.len(), 2);
    assert!(frame.cells().values().all(|&c| c == BLACK));
}

#[test]
fn parameter_changes_are_debounced_and_merged() {
    let mut pipeline = Pipeline::new(split_image(), settings(2)).unwrap();
    assert_eq!(pipeline.blocks().len(), 2);

    pipeline.set_cells_across(4, ms(0)).unwrap();
    pipeline.set_metric(DistanceMetric::Hsv, ms(50));
    assert_eq!(pipeline.pending(), Some(Trigger::Resample));
    assert_eq!(pipeline.deadline(), Some(ms(200)));

    assert_eq!(pipeline.tick(ms(150)).unwrap(), None);
    assert_eq!(pipeline.blocks().len(), 2);

    assert_eq!(pipeline.tick(ms(200)).unwrap(), Some(Trigger::Resample));
    assert_eq!(pipeline.blocks().len(), 8);
    assert_eq!(pipeline.frame().resolution(), Some((4, 2)));
    assert_eq!(pipeline.pending(), None);
}

#[test]
fn metric_change_only_requantizes() {
    let mut pipeline = Pipeline::new(split_image(), settings(2)).unwrap();
    assert_eq!(pipeline.set_metric(DistanceMetric::Rgb, ms(0)), Trigger::Requantize);
    assert_eq!(pipeline.tick(ms(150)).unwrap(), Some(Trigger::Requantize));
}

#[test]
fn dragging_requantizes_synchronously() {
    let mut pipeline = Pipeline::new(split_image(), settings(2)).unwrap();
    pipeline.add_sample_point(5, 1, ms(0)).unwrap();
    let id = pipeline.sample_points().iter().next().unwrap().id;

    // Drag the first point onto the red half; the pending run is untouched.
    let frame = pipeline.move_sample_point(id, -10, 99).unwrap();
    assert_eq!(frame.get(0, 0), Some(RED));
    assert_eq!(frame.get(1, 0), Some(BLUE));

    let moved = pipeline.sample_points().iter().next().unwrap();
    assert_eq!((moved.x, moved.y, moved.color), (0, 3, RED));
    assert_eq!(pipeline.palette().colors(), &[RED, BLUE]);
    assert_eq!(pipeline.pending(), Some(Trigger::Resample));
}

#[test]
fn moving_unknown_point_fails() {
    let mut pipeline = Pipeline::new(split_image(), settings(2)).unwrap();
    assert!(matches!(
        pipeline.move_sample_point(999, 0, 0),
        Err(PixelArtError::UnknownSamplePoint(999))
    ));
}

#[test]
fn preview_is_transient() {
    let pipeline = Pipeline::new(split_image(), settings(2)).unwrap();
    let preview = pipeline.preview(RED);
    assert_eq!(preview.get(0, 0), Some(RED));
    assert_eq!(preview.get(1, 0), Some(BLUE));

    assert_eq!(pipeline.palette().colors(), &[BLUE]);
    assert_eq!(pipeline.frame().get(0, 0), Some(BLUE));
}

#[test]
fn swatch_deletion_matches_by_color() {
    let mut pipeline = Pipeline::new(split_image(), settings(2)).unwrap();
    let extra = pipeline.add_sample_point(6, 0, ms(0)).unwrap();
    assert_eq!(pipeline.palette().colors(), &[BLUE, BLUE]);

    let removed = pipeline.remove_swatch(BLUE, ms(10)).unwrap();
    assert_ne!(removed.id, extra.id);
    assert_eq!(pipeline.sample_points().len(), 1);
    assert_eq!(pipeline.palette().colors(), &[BLUE]);

    assert!(pipeline.remove_swatch(RED, ms(20)).is_none());
}

#[test]
fn blur_resamples_point_colors() {
    let mut pipeline = Pipeline::new(split_image(), settings(2)).unwrap();
    pipeline.add_sample_point(3, 2, ms(0)).unwrap();
    assert_eq!(pipeline.palette().colors()[1], RED);

    assert_eq!(pipeline.set_blur(2.0, ms(10)).unwrap(), Trigger::Resample);
    let blurred = pipeline.palette().colors()[1];
    assert_ne!(blurred, RED);
    assert!(blurred.blue > 0);
    assert_eq!(pipeline.settings().blur_radius, 2.0);
}

#[test]
fn invalid_grid_is_rejected_at_the_boundary() {
    let mut pipeline = Pipeline::new(split_image(), settings(2)).unwrap();
    assert!(matches!(
        pipeline.set_cells_across(0, ms(0)),
        Err(PixelArtError::InvalidParameter { .. })
    ));
    assert_eq!(pipeline.settings().cells_across, 2);
    assert_eq!(pipeline.pending(), None);

    assert!(Pipeline::new(split_image(), settings(0)).is_err());
    assert!(Pipeline::new(RgbImage::new(0, 0), settings(1)).is_err());
}

#[test]
fn default_grid_works_on_images_narrower_than_it() {
    let img = RgbImage::from_pixel(20, 20, Px([0, 255, 0]));
    let mut pipeline = Pipeline::new(img, Settings::default()).unwrap();
    assert_eq!(pipeline.settings().cells_across, 32);
    assert_eq!(pipeline.blocks().len(), 400);
    assert_eq!(pipeline.frame().len(), 400);

    // Half-pixel cells: every other cell floors to an empty rectangle.
    assert_eq!(pipeline.set_cells_across(8, ms(0)).unwrap(), Trigger::Resample);
    let tiny = RgbImage::from_pixel(4, 2, Px([0, 255, 0]));
    pipeline.load_image(tiny, ms(5)).unwrap();
    pipeline.flush().unwrap();
    assert_eq!(pipeline.blocks().len(), 8);
}

#[test]
fn out_of_bounds_pick_is_rejected() {
    let mut pipeline = Pipeline::new(split_image(), settings(2)).unwrap();
    assert!(matches!(
        pipeline.add_sample_point(8, 0, ms(0)),
        Err(PixelArtError::PointOutOfBounds { .. })
    ));
}

#[test]
fn offsets_shift_the_grid() {
    let mut pipeline = Pipeline::new(split_image(), settings(2)).unwrap();
    pipeline.set_sample_method(SampleMethod::Average, ms(0));
    pipeline.set_offset(2, 0, ms(10)).unwrap();
    pipeline.flush().unwrap();

    // Columns [0,2) [2,6) [6,8).
    let coords: Vec<_> = pipeline.blocks().iter().map(|b| (b.bx, b.by)).collect();
    assert_eq!(coords, vec![(-1, 0), (0, 0), (1, 0)]);
    // The middle cell straddles the split: two red and two blue columns.
    assert_eq!(pipeline.blocks()[1].color, Srgb::new(128, 0, 128));
    assert_eq!(pipeline.frame().resolution(), Some((3, 1)));
}

#[test]
fn sort_mode_is_presentation_only() {
    let mut pipeline = Pipeline::new(split_image(), settings(2)).unwrap();
    pipeline.add_sample_point(0, 0, ms(0)).unwrap();
    assert_eq!(pipeline.palette().colors(), &[BLUE, RED]);

    assert_eq!(pipeline.cycle_sort_mode(), SortMode::Luma);
    // Luma: red (76.2) is brighter than blue (29.1).
    assert_eq!(pipeline.sorted_palette(), vec![RED, BLUE]);
    assert_eq!(pipeline.palette().colors(), &[BLUE, RED]);
}

#[test]
fn loading_a_new_image_resets_points() {
    let mut pipeline = Pipeline::new(split_image(), settings(2)).unwrap();
    pipeline.add_sample_point(0, 0, ms(0)).unwrap();

    let green = RgbImage::from_pixel(6, 6, Px([0, 255, 0]));
    assert_eq!(pipeline.load_image(green, ms(5)).unwrap(), Trigger::Resample);
    assert_eq!(pipeline.sample_points().len(), 1);
    assert_eq!(pipeline.palette().colors(), &[Srgb::new(0, 255, 0)]);

    pipeline.flush().unwrap();
    assert_eq!(pipeline.frame().resolution(), Some((2, 2)));
}

#[test]
fn large_images_are_fitted_to_working_size() {
    let img = RgbImage::from_pixel(1600, 400, Px([9, 9, 9]));
    let pipeline = Pipeline::new(img, settings(40)).unwrap();
    assert_eq!(pipeline.source().dimensions(), (800, 200));
    assert_eq!(pipeline.frame().resolution(), Some((40, 10)));
}
