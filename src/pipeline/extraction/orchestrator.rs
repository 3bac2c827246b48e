use std::path::Path;
use std::sync::Arc;

use super::loader::DocumentImage;
use super::parser::parse;
use super::patterns::MatcherRegistry;
use super::rotation::RotationSearch;
use super::sharpness::SharpnessScorer;
use super::types::{
    BlurReport, BlurVerdict, ExtractedFields, OcrEngine, ParsedData, ProcessedRotatedImagesResult,
};
use super::ExtractionError;
use crate::config::ScanConfig;

/// Entry point used by the upload collaborator.
///
/// Holds only read-only state (threshold, OCR engine handle, registry), so one
/// instance can serve any number of concurrent files.
#[derive(Clone)]
pub struct DocumentPipeline {
    scorer: SharpnessScorer,
    rotation: RotationSearch,
    registry: Arc<MatcherRegistry>,
}

impl DocumentPipeline {
    pub fn new(
        scorer: SharpnessScorer,
        ocr_engine: Arc<dyn OcrEngine>,
        registry: Arc<MatcherRegistry>,
    ) -> Self {
        Self {
            scorer,
            rotation: RotationSearch::new(ocr_engine),
            registry,
        }
    }

    /// Build from configuration: threshold, text floor, and registry
    /// (built-ins plus any configured definitions file).
    ///
    /// An invalid threshold is a `Config` error, whichever source set it.
    pub fn from_config(
        config: &ScanConfig,
        ocr_engine: Arc<dyn OcrEngine>,
    ) -> Result<Self, ExtractionError> {
        let scorer = SharpnessScorer::new(config.blur_threshold)?;
        let mut registry = MatcherRegistry::builtin()?;
        if let Some(path) = config.matchers_file() {
            registry = registry.with_definitions_file(&path)?;
        }

        Ok(Self {
            scorer,
            rotation: RotationSearch::new(ocr_engine).with_min_text_chars(config.min_text_chars),
            registry: Arc::new(registry),
        })
    }

    pub fn registry(&self) -> &MatcherRegistry {
        &self.registry
    }

    pub fn scorer(&self) -> &SharpnessScorer {
        &self.scorer
    }

    /// Blur mode: load and score.
    pub fn run_blur_check(&self, path: &Path) -> Result<BlurReport, ExtractionError> {
        self.scorer.analyse(path)
    }

    /// Blur mode with the report classified as accepted or rejected.
    pub fn run_blur_gate(&self, path: &Path) -> Result<BlurVerdict, ExtractionError> {
        self.scorer.check(path)
    }

    /// OCR mode: load and run the rotation search.
    pub fn run_ocr_extraction(
        &self,
        path: &Path,
    ) -> Result<ProcessedRotatedImagesResult, ExtractionError> {
        tracing::info!(path = %path.display(), "Starting OCR extraction");
        let image = DocumentImage::load(path)?;
        self.rotation.process_document(&image)
    }

    /// Run every registered matcher over `text`.
    pub fn extract_fields(&self, text: &str) -> ExtractedFields {
        parse(text, self.registry.matchers())
    }

    /// OCR plus field extraction, with the typed W-2 projection.
    pub fn run_full_extraction(
        &self,
        path: &Path,
    ) -> Result<(ProcessedRotatedImagesResult, ExtractedFields, ParsedData), ExtractionError> {
        let result = self.run_ocr_extraction(path)?;
        let fields = self.extract_fields(&result.best_text);
        let parsed = ParsedData::from_fields(&fields);
        Ok((result, fields, parsed))
    }
}
