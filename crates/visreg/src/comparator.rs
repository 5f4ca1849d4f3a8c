//! Screenshot comparison with perceptual similarity metrics.
//!
//! Each pair of screenshots is reduced to three numbers:
//!
//! - structural similarity (MSSIM, `image-compare`)
//! - normalised grayscale histogram correlation (`image-compare`)
//! - percentage of pixels whose grayscale intensity differs
//!
//! The SSIM similarity map is written as a grayscale image on every
//! comparison. When more than a fifth of the pixels differ, the changed
//! regions are outlined on a copy of the first image (`imageproc` Otsu
//! threshold + contour tracing).

use crate::result::{VisregError, VisregResult};
use image::{imageops::FilterType, GrayImage, Luma, Rgb, RgbImage};
use image_compare::{Algorithm, Metric};
use imageproc::contours::{find_contours, BorderType};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::geometry::contour_area;
use imageproc::point::Point;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Structural similarity below this marks a pair as different
pub const DEFAULT_SSIM_THRESHOLD: f64 = 0.99;

/// Histogram correlation below this marks a pair as different
pub const DEFAULT_HISTOGRAM_THRESHOLD: f64 = 0.95;

/// Pixel difference (percent) above this marks a pair as different
pub const DEFAULT_PIXEL_DIFF_THRESHOLD: f64 = 5.0;

/// Pixel difference (percent) above which changed regions are outlined
pub const HIGHLIGHT_TRIGGER_PERCENT: f64 = 20.0;

/// Contours enclosing less area than this are ignored
pub const MIN_REGION_AREA: f64 = 10.0;

/// File name of the grayscale difference map
pub const DIFF_IMAGE_NAME: &str = "diff_image.png";

/// File name of the outlined-regions artifact
pub const HIGHLIGHT_IMAGE_NAME: &str = "highlighted_Diff_img.png";

const HIGHLIGHT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Fixed decision thresholds for the "different" verdict
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonThresholds {
    /// Minimum structural similarity
    pub ssim: f64,
    /// Minimum histogram correlation
    pub histogram_correlation: f64,
    /// Maximum pixel difference percentage
    pub pixel_diff_percent: f64,
}

impl Default for ComparisonThresholds {
    fn default() -> Self {
        Self {
            ssim: DEFAULT_SSIM_THRESHOLD,
            histogram_correlation: DEFAULT_HISTOGRAM_THRESHOLD,
            pixel_diff_percent: DEFAULT_PIXEL_DIFF_THRESHOLD,
        }
    }
}

impl ComparisonThresholds {
    /// Classify a comparison result
    #[must_use]
    pub fn classify(&self, result: &ComparisonResult) -> Verdict {
        if result.structural_similarity < self.ssim
            || result.histogram_correlation < self.histogram_correlation
            || result.pixel_diff_percent > self.pixel_diff_percent
        {
            Verdict::Different
        } else {
            Verdict::Match
        }
    }
}

/// Outcome of applying [`ComparisonThresholds`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// No significant difference
    Match,
    /// At least one metric crossed its threshold
    Different,
}

impl Verdict {
    /// Check if the verdict is a match
    #[must_use]
    pub const fn is_match(self) -> bool {
        matches!(self, Self::Match)
    }
}

/// Axis-aligned box around a changed region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// X coordinate of top-left corner
    pub x: u32,
    /// Y coordinate of top-left corner
    pub y: u32,
    /// Width of the region
    pub width: u32,
    /// Height of the region
    pub height: u32,
}

impl Region {
    /// Create a new region
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Check whether two regions share at least one pixel
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Similarity metrics for one pair of screenshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Structural similarity index in [-1, 1]
    pub structural_similarity: f64,
    /// Histogram correlation in [-1, 1]
    pub histogram_correlation: f64,
    /// Percentage of differing pixels in [0, 100]
    pub pixel_diff_percent: f64,
    /// Outlined-regions artifact, written when the difference is large
    pub diff_image_path: Option<PathBuf>,
    /// Boxes drawn on the artifact
    pub changed_regions: Vec<Region>,
}

impl ComparisonResult {
    /// Difference percentage formatted for reports (`"NN.NN%"`)
    #[must_use]
    pub fn difference_label(&self) -> String {
        format!("{:.2}%", self.pixel_diff_percent)
    }
}

/// Comparator configuration
#[derive(Debug, Clone)]
pub struct ComparatorConfig {
    /// Directory receiving the diff map and highlight artifact
    pub artifact_dir: PathBuf,
    /// Pixel difference (percent) above which regions are outlined
    pub highlight_trigger_percent: f64,
    /// Minimum contour area kept when outlining
    pub min_region_area: f64,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("."),
            highlight_trigger_percent: HIGHLIGHT_TRIGGER_PERCENT,
            min_region_area: MIN_REGION_AREA,
        }
    }
}

impl ComparatorConfig {
    /// Set the artifact directory
    #[must_use]
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Path of the grayscale difference map
    #[must_use]
    pub fn diff_image_path(&self) -> PathBuf {
        self.artifact_dir.join(DIFF_IMAGE_NAME)
    }

    /// Path of the outlined-regions artifact
    #[must_use]
    pub fn highlight_image_path(&self) -> PathBuf {
        self.artifact_dir.join(HIGHLIGHT_IMAGE_NAME)
    }
}

/// Metrics plus the intermediate difference map
#[derive(Debug, Clone)]
pub struct Measurement {
    /// Structural similarity index
    pub structural_similarity: f64,
    /// Histogram correlation
    pub histogram_correlation: f64,
    /// Percentage of differing pixels
    pub pixel_diff_percent: f64,
    /// SSIM similarity map scaled to 0..=255, 255 where the images agree
    pub diff_map: GrayImage,
}

/// Screenshot comparator
#[derive(Debug, Clone, Default)]
pub struct ImageComparator {
    config: ComparatorConfig,
}

impl ImageComparator {
    /// Create a comparator with configuration
    #[must_use]
    pub const fn new(config: ComparatorConfig) -> Self {
        Self { config }
    }

    /// Get configuration
    #[must_use]
    pub const fn config(&self) -> &ComparatorConfig {
        &self.config
    }

    /// Compare two image files
    ///
    /// The second image is resized to the first's dimensions when they differ.
    pub fn compare(&self, path_a: &Path, path_b: &Path) -> VisregResult<ComparisonResult> {
        let first = load_gray(path_a)?;
        let mut second = load_gray(path_b)?;

        if first.dimensions() != second.dimensions() {
            tracing::debug!(
                first = ?first.dimensions(),
                second = ?second.dimensions(),
                "resizing second image to match first"
            );
            second = image::imageops::resize(
                &second,
                first.width(),
                first.height(),
                FilterType::Triangle,
            );
        }

        let measurement = measure(&first, &second)?;
        tracing::debug!(
            ssim = measurement.structural_similarity,
            histogram = measurement.histogram_correlation,
            pixel_diff = measurement.pixel_diff_percent,
            "compared {} against {}",
            path_a.display(),
            path_b.display()
        );

        std::fs::create_dir_all(&self.config.artifact_dir)?;
        measurement
            .diff_map
            .save(self.config.diff_image_path())
            .map_err(|e| {
                VisregError::image_processing(format!("Failed to write diff map: {e}"))
            })?;

        let (diff_image_path, changed_regions) =
            if measurement.pixel_diff_percent > self.config.highlight_trigger_percent {
                let (highlighted, regions) =
                    highlight_regions(&first, &measurement.diff_map, self.config.min_region_area);
                let path = self.config.highlight_image_path();
                highlighted.save(&path).map_err(|e| {
                    VisregError::image_processing(format!(
                        "Failed to write highlighted diff: {e}"
                    ))
                })?;
                tracing::info!(
                    regions = regions.len(),
                    "highlighted diff written to {}",
                    path.display()
                );
                (Some(path), regions)
            } else {
                (None, Vec::new())
            };

        Ok(ComparisonResult {
            structural_similarity: measurement.structural_similarity,
            histogram_correlation: measurement.histogram_correlation,
            pixel_diff_percent: measurement.pixel_diff_percent,
            diff_image_path,
            changed_regions,
        })
    }
}

fn load_gray(path: &Path) -> VisregResult<GrayImage> {
    image::open(path)
        .map(|img| img.to_luma8())
        .map_err(|e| VisregError::image_load(path, e))
}

/// Compute metrics for two grayscale images of equal dimensions
pub fn measure(first: &GrayImage, second: &GrayImage) -> VisregResult<Measurement> {
    if first.dimensions() != second.dimensions() {
        return Err(VisregError::image_processing(format!(
            "Image dimensions differ: {:?} vs {:?}",
            first.dimensions(),
            second.dimensions()
        )));
    }

    let similarity =
        image_compare::gray_similarity_structure(&Algorithm::MSSIMSimple, first, second)
            .map_err(|e| VisregError::image_processing(format!("SSIM failed: {e:?}")))?;
    // SSIM scores clamped to [0, 1] and scaled to 0..=255
    let diff_map = similarity.image.to_color_map().into_luma8();

    let correlation = image_compare::gray_similarity_histogram(Metric::Correlation, first, second)
        .map_err(|e| VisregError::image_processing(format!("Histogram comparison failed: {e:?}")))?;
    // Flat histograms have zero variance and no defined correlation
    let histogram_correlation = if correlation.is_nan() {
        if first.as_raw() == second.as_raw() {
            1.0
        } else {
            0.0
        }
    } else {
        correlation
    };

    let total_pixels = first.as_raw().len();
    let diff_pixels = first
        .as_raw()
        .iter()
        .zip(second.as_raw())
        .filter(|(a, b)| a != b)
        .count();
    let pixel_diff_percent = if total_pixels > 0 {
        diff_pixels as f64 / total_pixels as f64 * 100.0
    } else {
        0.0
    };

    Ok(Measurement {
        structural_similarity: similarity.score,
        histogram_correlation,
        pixel_diff_percent,
        diff_map,
    })
}

/// Inverted Otsu mask of the similarity map, padded with one background pixel
///
/// Contour tracing only closes a border around regions surrounded by
/// background, so the padding lets regions touching the image edge be found.
/// A flat map gives Otsu nothing to split: it is all changed unless it is all
/// 255.
fn changed_mask(diff_map: &GrayImage) -> GrayImage {
    let level = imageproc::contrast::otsu_level(diff_map);
    let raw = diff_map.as_raw();
    let flat = raw.iter().min() == raw.iter().max();
    let changed = |v: u8| if flat { v < u8::MAX } else { v <= level };

    let (width, height) = diff_map.dimensions();
    GrayImage::from_fn(width + 2, height + 2, |x, y| {
        let inside = x >= 1 && y >= 1 && x <= width && y <= height;
        if inside && changed(diff_map.get_pixel(x - 1, y - 1)[0]) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Outline changed regions of `base` using the similarity map
pub fn highlight_regions(
    base: &GrayImage,
    diff_map: &GrayImage,
    min_area: f64,
) -> (RgbImage, Vec<Region>) {
    let mask = changed_mask(diff_map);

    let mut regions = Vec::new();
    for contour in find_contours::<i32>(&mask) {
        if contour.border_type != BorderType::Outer {
            continue;
        }
        let points: Vec<Point<i32>> = contour
            .points
            .iter()
            .map(|p| {
                Point::new(
                    (p.x - 1).clamp(0, diff_map.width() as i32 - 1),
                    (p.y - 1).clamp(0, diff_map.height() as i32 - 1),
                )
            })
            .collect();
        if contour_area(&points) <= min_area {
            continue;
        }
        if let Some(region) = bounding_region(&points) {
            regions.push(region);
        }
    }

    let mut highlighted = RgbImage::from_fn(base.width(), base.height(), |x, y| {
        let v = base.get_pixel(x, y)[0];
        Rgb([v, v, v])
    });
    for region in &regions {
        draw_region(&mut highlighted, region);
    }

    (highlighted, regions)
}

fn draw_region(image: &mut RgbImage, region: &Region) {
    let outer = Rect::at(region.x as i32, region.y as i32).of_size(region.width, region.height);
    draw_hollow_rect_mut(image, outer, HIGHLIGHT_COLOR);
    if region.width > 2 && region.height > 2 {
        let inner = Rect::at(region.x as i32 + 1, region.y as i32 + 1)
            .of_size(region.width - 2, region.height - 2);
        draw_hollow_rect_mut(image, inner, HIGHLIGHT_COLOR);
    }
}

fn bounding_region(points: &[Point<i32>]) -> Option<Region> {
    let min_x = points.iter().map(|p| p.x).min()?;
    let max_x = points.iter().map(|p| p.x).max()?;
    let min_y = points.iter().map(|p| p.y).min()?;
    let max_y = points.iter().map(|p| p.y).max()?;
    Some(Region::new(
        min_x.max(0) as u32,
        min_y.max(0) as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    ))
}
