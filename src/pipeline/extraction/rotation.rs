//! Rotation-search OCR.
//!
//! Scans and phone photos arrive in any of the four cardinal orientations.
//! Instead of requiring upright input, every orientation is recognized and
//! the attempt with the best confidence wins.
//!
//! Selection rules:
//! - attempts are recorded in search order (0, 90, 180, 270) whatever happens
//! - highest confidence wins; ties go to the lowest angle (so 0 first)
//! - a failure at some angles becomes an empty, zero-confidence attempt
//! - failure at every angle is `OcrUnavailable`
//! - near-empty output everywhere still yields the least-bad attempt

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::confidence::{
    attempt_confidence, is_near_empty, text_char_count, DEFAULT_MIN_TEXT_CHARS,
};
use super::loader::DocumentImage;
use super::types::{OcrEngine, ProcessedRotatedImagesResult, Rotation, RotationAttempt};
use super::ExtractionError;

/// Drives an `OcrEngine` across the four cardinal rotations.
#[derive(Clone)]
pub struct RotationSearch {
    engine: Arc<dyn OcrEngine>,
    min_text_chars: usize,
}

impl RotationSearch {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            engine,
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
        }
    }

    /// Floor (non-whitespace chars) below which a result counts as near-empty.
    pub fn with_min_text_chars(mut self, min_text_chars: usize) -> Self {
        self.min_text_chars = min_text_chars;
        self
    }

    /// True when `text` falls below this search's near-empty floor.
    pub fn is_near_empty(&self, text: &str) -> bool {
        is_near_empty(text, self.min_text_chars)
    }

    /// Recognize `image` at every rotation and pick the best attempt.
    pub fn process_document(
        &self,
        image: &DocumentImage,
    ) -> Result<ProcessedRotatedImagesResult, ExtractionError> {
        let mut attempts = Vec::with_capacity(Rotation::ALL.len());
        let mut last_error = None;

        for angle in Rotation::ALL {
            let rotated = image.rotate(angle);
            match self.engine.recognize(&rotated) {
                Ok(result) => {
                    let confidence = attempt_confidence(&result);
                    debug!(
                        path = %image.source().display(),
                        angle = angle.degrees(),
                        confidence,
                        chars = text_char_count(&result.text),
                        "Rotation attempt recognized"
                    );
                    attempts.push(RotationAttempt {
                        angle,
                        extracted_text: result.text,
                        confidence,
                        error: None,
                    });
                }
                Err(e) => {
                    warn!(
                        path = %image.source().display(),
                        angle = angle.degrees(),
                        error = %e,
                        "Rotation attempt failed"
                    );
                    attempts.push(RotationAttempt {
                        angle,
                        extracted_text: String::new(),
                        confidence: 0.0,
                        error: Some(e.to_string()),
                    });
                    last_error = Some(e);
                }
            }
        }

        if attempts.iter().all(|a| a.error.is_some()) {
            let reason = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no rotation attempts ran".into());
            return Err(ExtractionError::OcrUnavailable(reason));
        }

        let best = select_best(&attempts);

        if self.is_near_empty(&best.extracted_text) {
            warn!(
                path = %image.source().display(),
                angle = best.angle.degrees(),
                min_chars = self.min_text_chars,
                "Best rotation produced near-empty text; returning best effort"
            );
        }

        info!(
            path = %image.source().display(),
            best_angle = best.angle.degrees(),
            confidence = best.confidence,
            "Rotation search complete"
        );

        Ok(ProcessedRotatedImagesResult {
            image_path: image.source().to_path_buf(),
            best_angle: best.angle,
            best_text: best.extracted_text.clone(),
            attempts,
        })
    }

    /// Load `path` and run the rotation search on it.
    pub fn process_path(
        &self,
        path: &std::path::Path,
    ) -> Result<ProcessedRotatedImagesResult, ExtractionError> {
        let image = DocumentImage::load(path)?;
        self.process_document(&image)
    }
}

/// Highest confidence, ties broken toward the lowest angle.
///
/// Operates on the complete attempt set, which is never empty.
fn select_best(attempts: &[RotationAttempt]) -> &RotationAttempt {
    let mut best = &attempts[0];
    for attempt in &attempts[1..] {
        let better = attempt.confidence > best.confidence
            || (attempt.confidence == best.confidence && attempt.angle < best.angle);
        if better {
            best = attempt;
        }
    }
    best
}

/// Attempts ordered best-first, using the same tie rule as selection.
pub fn rank_attempts(attempts: &[RotationAttempt]) -> Vec<Rotation> {
    let mut ranked: Vec<&RotationAttempt> = attempts.iter().collect();
    ranked.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.angle.cmp(&b.angle))
    });
    ranked.into_iter().map(|a| a.angle).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::ocr::MockOcrEngine;
    use crate::pipeline::extraction::types::{OcrPageResult, Rotation};
    use image::{Rgb, RgbImage};

    const W2_TEXT: &str = "Form W-2 Wage and Tax Statement\n\
        b Employer identification number (EIN) 12-3456789\n\
        1 Wages, tips, other compensation 52,340.18";

    fn page() -> DocumentImage {
        DocumentImage::from_rgb("w2.png", RgbImage::from_pixel(20, 10, Rgb([255, 255, 255])))
    }

    fn search(engine: MockOcrEngine) -> RotationSearch {
        RotationSearch::new(Arc::new(engine))
    }

    #[test]
    fn attempts_are_recorded_in_search_order() {
        let result = search(MockOcrEngine::new("text", 0.5))
            .process_document(&page())
            .unwrap();
        let angles: Vec<u16> = result.attempts.iter().map(|a| a.angle.degrees()).collect();
        assert_eq!(angles, vec![0, 90, 180, 270]);
    }

    #[test]
    fn picks_highest_confidence() {
        let engine = MockOcrEngine::new("garbled", 0.2)
            .with_rotation(Rotation::Deg270, W2_TEXT, Some(0.91));
        let result = search(engine).process_document(&page()).unwrap();
        assert_eq!(result.best_angle, Rotation::Deg270);
        assert_eq!(result.best_text, W2_TEXT);
        assert_eq!(result.best_attempt().unwrap().confidence, 0.91);
    }

    #[test]
    fn upside_down_w2_selects_180_with_proxy_confidence() {
        let engine = MockOcrEngine::without_confidence("~|^ ~")
            .with_rotation(Rotation::Deg180, W2_TEXT, None);
        let result = search(engine).process_document(&page()).unwrap();
        assert_eq!(result.best_angle, Rotation::Deg180);
        assert!(result.best_text.contains("Employer identification number"));
    }

    #[test]
    fn ties_prefer_angle_zero() {
        let result = search(MockOcrEngine::new("same", 0.6))
            .process_document(&page())
            .unwrap();
        assert_eq!(result.best_angle, Rotation::Deg0);
    }

    #[test]
    fn ties_without_zero_prefer_lowest_angle() {
        let engine = MockOcrEngine::new("", 0.1)
            .with_rotation(Rotation::Deg270, "b", Some(0.8))
            .with_rotation(Rotation::Deg90, "a", Some(0.8));
        let result = search(engine).process_document(&page()).unwrap();
        assert_eq!(result.best_angle, Rotation::Deg90);
    }

    #[test]
    fn all_empty_returns_best_effort() {
        let result = search(MockOcrEngine::without_confidence(""))
            .process_document(&page())
            .unwrap();
        assert_eq!(result.best_angle, Rotation::Deg0);
        assert!(result.best_text.is_empty());
        assert_eq!(result.attempts.len(), 4);
    }

    #[test]
    fn partial_failure_is_absorbed() {
        let engine = MockOcrEngine::new("fine", 0.4)
            .failing_at(Rotation::Deg0)
            .failing_at(Rotation::Deg180);
        let result = search(engine).process_document(&page()).unwrap();

        assert_eq!(result.attempts.len(), 4);
        let failed = &result.attempts[0];
        assert!(failed.extracted_text.is_empty());
        assert_eq!(failed.confidence, 0.0);
        assert!(failed.error.is_some());
        assert_eq!(result.best_angle, Rotation::Deg90);
    }

    #[test]
    fn total_failure_is_unavailable() {
        let result = search(MockOcrEngine::failing()).process_document(&page());
        assert!(matches!(result, Err(ExtractionError::OcrUnavailable(_))));
    }

    #[test]
    fn selection_is_deterministic() {
        let build = || {
            search(
                MockOcrEngine::new("x", 0.3)
                    .with_rotation(Rotation::Deg90, "y", Some(0.7))
                    .with_rotation(Rotation::Deg180, "z", Some(0.7)),
            )
        };
        let first = build().process_document(&page()).unwrap();
        let second = build().process_document(&page()).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            rank_attempts(&first.attempts),
            vec![Rotation::Deg90, Rotation::Deg180, Rotation::Deg0, Rotation::Deg270]
        );
    }

    #[test]
    fn attempts_see_rotated_pixels() {
        /// Reads text only when the red marker sits in the top-left corner.
        struct MarkerEngine;

        impl OcrEngine for MarkerEngine {
            fn recognize(&self, image: &DocumentImage) -> Result<OcrPageResult, ExtractionError> {
                let upright = image.pixels().get_pixel(0, 0).0 == [255, 0, 0];
                Ok(OcrPageResult {
                    text: if upright { W2_TEXT.into() } else { String::new() },
                    confidence: None,
                })
            }
        }

        // Marker at bottom-right: the document was photographed upside down.
        let mut img = RgbImage::from_pixel(12, 8, Rgb([255, 255, 255]));
        img.put_pixel(11, 7, Rgb([255, 0, 0]));
        let doc = DocumentImage::from_rgb("flipped.png", img);

        let result = RotationSearch::new(Arc::new(MarkerEngine))
            .process_document(&doc)
            .unwrap();
        assert_eq!(result.best_angle, Rotation::Deg180);
        assert_eq!(result.image_path, std::path::PathBuf::from("flipped.png"));
    }

    #[test]
    fn process_path_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = search(MockOcrEngine::new("x", 0.5)).process_path(&dir.path().join("nope.jpg"));
        assert!(matches!(result, Err(ExtractionError::FileNotFound(_))));
    }

    #[test]
    fn min_text_chars_moves_the_near_empty_floor() {
        // 10 non-whitespace chars, spread across whitespace.
        let text = "EIN 12-345 6";
        let default = search(MockOcrEngine::new(text, 0.5));
        let lenient = search(MockOcrEngine::new(text, 0.5)).with_min_text_chars(10);
        let strict = search(MockOcrEngine::new(text, 0.5)).with_min_text_chars(11);

        assert!(default.is_near_empty(text));
        assert!(!lenient.is_near_empty(text));
        assert!(strict.is_near_empty(text));

        let result = lenient.process_document(&page()).unwrap();
        assert!(!lenient.is_near_empty(&result.best_text));
    }

    #[test]
    fn zero_floor_never_near_empty() {
        let search = search(MockOcrEngine::new("", 0.0)).with_min_text_chars(0);
        assert!(!search.is_near_empty(""));
    }
}
