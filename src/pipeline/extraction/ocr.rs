use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use super::loader::DocumentImage;
use super::types::{OcrEngine, OcrPageResult, Rotation};
use super::ExtractionError;

/// Reusable engine handles, one per concurrent caller.
///
/// A caller checks out an idle handle, or builds a fresh one when none is
/// idle, and returns it afterwards. Concurrent files never wait on each other.
#[cfg_attr(not(feature = "tesseract"), allow(dead_code))]
pub(crate) struct HandlePool<T> {
    idle: Mutex<Vec<T>>,
}

#[cfg_attr(not(feature = "tesseract"), allow(dead_code))]
impl<T> HandlePool<T> {
    pub(crate) fn new() -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Seed the pool with an already-built handle.
    pub(crate) fn put(&self, handle: T) {
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(handle);
        }
    }

    pub(crate) fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    /// Run `work` on a pooled handle. The handle goes back to the pool only
    /// when `work` succeeds.
    pub(crate) fn with_handle<R>(
        &self,
        create: impl FnOnce() -> Result<T, ExtractionError>,
        work: impl FnOnce(&mut T) -> Result<R, ExtractionError>,
    ) -> Result<R, ExtractionError> {
        let pooled = self
            .idle
            .lock()
            .map_err(|_| ExtractionError::OcrUnavailable("OCR handle pool poisoned".into()))?
            .pop();
        let mut handle = match pooled {
            Some(handle) => handle,
            None => create()?,
        };

        let result = work(&mut handle)?;
        self.put(handle);
        Ok(result)
    }
}

/// Local Tesseract OCR engine.
/// Only available when compiled with the `tesseract` feature flag.
#[cfg(feature = "tesseract")]
pub struct TesseractEngine {
    handles: HandlePool<leptess::LepTess>,
    languages: String,
}

#[cfg(feature = "tesseract")]
impl TesseractEngine {
    /// Initialize with Tesseract language codes (e.g., "eng", "eng+spa").
    ///
    /// One handle is built eagerly so a missing install fails here, not on
    /// the first document.
    pub fn new(languages: &str) -> Result<Self, ExtractionError> {
        let handles = HandlePool::new();
        handles.put(Self::open(languages)?);
        info!(languages, "Tesseract OCR initialized");
        Ok(Self {
            handles,
            languages: languages.to_string(),
        })
    }

    fn open(languages: &str) -> Result<leptess::LepTess, ExtractionError> {
        leptess::LepTess::new(None, languages)
            .map_err(|e| ExtractionError::OcrUnavailable(format!("Tesseract init failed: {e}")))
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }
}

#[cfg(feature = "tesseract")]
impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &DocumentImage) -> Result<OcrPageResult, ExtractionError> {
        let png = image.to_png()?;

        self.handles.with_handle(
            || Self::open(&self.languages),
            |tess| {
                tess.set_image_from_mem(&png).map_err(|e| {
                    ExtractionError::OcrProcessing(format!("Failed to set image: {e}"))
                })?;
                let text = tess.get_utf8_text().map_err(|e| {
                    ExtractionError::OcrProcessing(format!("Failed to extract text: {e}"))
                })?;
                let confidence = tess.mean_text_conf().max(0) as f32 / 100.0;

                Ok(OcrPageResult {
                    text,
                    confidence: Some(confidence),
                })
            },
        )
    }
}

/// Placeholder used when no OCR backend could be initialized.
pub struct UnavailableOcrEngine {
    reason: String,
}

impl UnavailableOcrEngine {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl OcrEngine for UnavailableOcrEngine {
    fn recognize(&self, _image: &DocumentImage) -> Result<OcrPageResult, ExtractionError> {
        Err(ExtractionError::OcrUnavailable(self.reason.clone()))
    }
}

/// Build the best OCR engine this binary supports.
///
/// Falls back to `UnavailableOcrEngine` so blur checks keep working without OCR.
pub fn default_engine(languages: &str) -> Arc<dyn OcrEngine> {
    #[cfg(feature = "tesseract")]
    {
        match TesseractEngine::new(languages) {
            Ok(engine) => Arc::new(engine) as Arc<dyn OcrEngine>,
            Err(e) => {
                warn!(error = %e, "Tesseract not available");
                Arc::new(UnavailableOcrEngine::new(e.to_string()))
            }
        }
    }

    #[cfg(not(feature = "tesseract"))]
    {
        warn!(languages, "Built without the `tesseract` feature; OCR disabled");
        info!("Rebuild with `--features tesseract` to enable OCR extraction");
        Arc::new(UnavailableOcrEngine::new(
            "compiled without the `tesseract` feature",
        ))
    }
}

/// Mock OCR engine for unit testing without Tesseract.
///
/// Answers per rotation of the image it is given; rotations without a scripted
/// response get the default response.
pub struct MockOcrEngine {
    default: OcrPageResult,
    by_rotation: HashMap<Rotation, OcrPageResult>,
    failing: HashSet<Rotation>,
}

impl MockOcrEngine {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self::from_result(OcrPageResult {
            text: text.to_string(),
            confidence: Some(confidence),
        })
    }

    /// Engine that reports no confidence, forcing the proxy score.
    pub fn without_confidence(text: &str) -> Self {
        Self::from_result(OcrPageResult {
            text: text.to_string(),
            confidence: None,
        })
    }

    /// Engine that fails at every rotation.
    pub fn failing() -> Self {
        let mut engine = Self::new("", 0.0);
        engine.failing.extend(Rotation::ALL);
        engine
    }

    fn from_result(default: OcrPageResult) -> Self {
        Self {
            default,
            by_rotation: HashMap::new(),
            failing: HashSet::new(),
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation, text: &str, confidence: Option<f32>) -> Self {
        self.by_rotation.insert(
            rotation,
            OcrPageResult {
                text: text.to_string(),
                confidence,
            },
        );
        self
    }

    pub fn failing_at(mut self, rotation: Rotation) -> Self {
        self.failing.insert(rotation);
        self
    }
}

impl OcrEngine for MockOcrEngine {
    fn recognize(&self, image: &DocumentImage) -> Result<OcrPageResult, ExtractionError> {
        let rotation = image.rotation();
        if self.failing.contains(&rotation) {
            return Err(ExtractionError::OcrProcessing(format!(
                "mock failure at {rotation}"
            )));
        }
        Ok(self
            .by_rotation
            .get(&rotation)
            .cloned()
            .unwrap_or_else(|| self.default.clone()))
    }
}
