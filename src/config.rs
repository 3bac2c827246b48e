use std::env;
use std::path::PathBuf;

use crate::pipeline::extraction::confidence::DEFAULT_MIN_TEXT_CHARS;
use crate::pipeline::extraction::sharpness::{validate_blur_threshold, DEFAULT_BLUR_THRESHOLD};

/// Application-level constants
pub const APP_NAME: &str = "taxscan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const ENV_BLUR_THRESHOLD: &str = "TAXSCAN_BLUR_THRESHOLD";
pub const ENV_MIN_TEXT_CHARS: &str = "TAXSCAN_MIN_TEXT_CHARS";
pub const ENV_OCR_LANGUAGES: &str = "TAXSCAN_OCR_LANGUAGES";
pub const ENV_MATCHERS: &str = "TAXSCAN_MATCHERS";

const MATCHERS_FILE_NAME: &str = "matchers.json";

/// Application data directory: ~/.taxscan/
///
/// `None` when the home directory cannot be determined.
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(format!(".{APP_NAME}")))
}

/// Default location of user-supplied matcher definitions.
pub fn default_matchers_path() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(MATCHERS_FILE_NAME))
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "taxscan=debug,info"
    } else {
        "taxscan=info,warn"
    }
}

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

/// Runtime settings for blur scoring, rotation search and matchers.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// Laplacian variance below which an image is blurry. Empirical.
    pub blur_threshold: f64,
    /// Non-whitespace chars below which OCR output counts as near-empty.
    pub min_text_chars: usize,
    /// Tesseract language codes, e.g. "eng" or "eng+spa".
    pub ocr_languages: String,
    /// Extra matcher definitions (JSON).
    pub matchers_path: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            blur_threshold: DEFAULT_BLUR_THRESHOLD,
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
            ocr_languages: "eng".to_string(),
            matchers_path: None,
        }
    }
}

impl ScanConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let blur_threshold = validate_blur_threshold(parse_env_or(
            ENV_BLUR_THRESHOLD,
            defaults.blur_threshold,
        ))
        .unwrap_or_else(|e| {
            tracing::warn!("{}. Using default.", e);
            defaults.blur_threshold
        });

        let ocr_languages = env::var(ENV_OCR_LANGUAGES)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.ocr_languages);

        Self {
            blur_threshold,
            min_text_chars: parse_env_or(ENV_MIN_TEXT_CHARS, defaults.min_text_chars),
            ocr_languages,
            matchers_path: env::var(ENV_MATCHERS).ok().map(PathBuf::from),
        }
    }

    /// Matcher file to load, if any.
    ///
    /// An explicit path is always returned so a missing file fails loudly;
    /// the default location is only used when it exists.
    pub fn matchers_file(&self) -> Option<PathBuf> {
        match &self.matchers_path {
            Some(path) => Some(path.clone()),
            None => default_matchers_path().filter(|p| p.is_file()),
        }
    }
}
