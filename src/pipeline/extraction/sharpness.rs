//! Blur gate: Laplacian variance sharpness scoring.
//!
//! Higher variance means more edge detail. Scores below the threshold are
//! classified as blurry; a score exactly at the threshold is not blurry.

use std::path::Path;

use image::GrayImage;
use tracing::info;

use super::loader::DocumentImage;
use super::types::{BlurReport, BlurVerdict};
use super::ExtractionError;

/// Default variance threshold for upload photos.
///
/// Chosen empirically on phone captures of paper forms; tune it per
/// deployment rather than treating it as derived.
pub const DEFAULT_BLUR_THRESHOLD: f64 = 300.0;

/// Stateless apart from its threshold, safe to share across threads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharpnessScorer {
    threshold: f64,
}

impl Default for SharpnessScorer {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_BLUR_THRESHOLD,
        }
    }
}

impl SharpnessScorer {
    /// Fails with `Config` on a NaN, infinite, or negative threshold.
    pub fn new(threshold: f64) -> Result<Self, ExtractionError> {
        validate_blur_threshold(threshold).map(|threshold| Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Load the file and score it.
    pub fn analyse(&self, path: &Path) -> Result<BlurReport, ExtractionError> {
        let image = DocumentImage::load(path)?;
        let report = self.score_image(&image);

        info!(
            path = %path.display(),
            score = report.score,
            threshold = self.threshold,
            is_blurry = report.is_blurry,
            "Blur check complete"
        );

        Ok(report)
    }

    /// Score an already-loaded image.
    pub fn score_image(&self, image: &DocumentImage) -> BlurReport {
        let score = compute_laplacian_variance(&image.to_gray());
        BlurReport {
            image_path: image.source().to_path_buf(),
            score,
            is_blurry: self.is_blurry(score),
        }
    }

    pub fn is_blurry(&self, score: f64) -> bool {
        score < self.threshold
    }

    /// Load, score, and classify in one step.
    pub fn check(&self, path: &Path) -> Result<BlurVerdict, ExtractionError> {
        self.analyse(path).map(BlurVerdict::from_report)
    }
}

/// A threshold must be finite and non-negative; `score < NaN` would accept
/// every image.
pub fn validate_blur_threshold(threshold: f64) -> Result<f64, ExtractionError> {
    if threshold.is_finite() && threshold >= 0.0 {
        Ok(threshold)
    } else {
        Err(ExtractionError::Config(format!(
            "blur threshold must be a finite, non-negative number, got {threshold}"
        )))
    }
}

/// Compute Laplacian variance over the interior pixels.
///
/// Uses a 3x3 Laplacian kernel: `[0,1,0; 1,-4,1; 0,1,0]`.
/// Images narrower or shorter than 3 pixels score 0.
pub fn compute_laplacian_variance(img: &GrayImage) -> f64 {
    let (w, h) = (img.width(), img.height());
    if w < 3 || h < 3 {
        return 0.0;
    }

    let px = |x: u32, y: u32| img.get_pixel(x, y).0[0] as f64;

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let laplacian =
                px(x, y - 1) + px(x, y + 1) + px(x - 1, y) + px(x + 1, y) - 4.0 * px(x, y);
            sum += laplacian;
            sum_sq += laplacian * laplacian;
            count += 1;
        }
    }

    let mean = sum / count as f64;
    let variance = (sum_sq / count as f64) - (mean * mean);
    variance.max(0.0)
}
