use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::loader::DocumentImage;
use super::ExtractionError;

/// Sparse overlay of extracted fields: matcher id -> field name -> captured text.
///
/// Fields without a match are absent. `BTreeMap` keeps serialization stable.
pub type ExtractedFields = BTreeMap<String, BTreeMap<String, String>>;

/// Processing mode requested by the upload collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    Blur,
    Ocr,
}

impl FromStr for Engine {
    type Err = ExtractionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blur" => Ok(Engine::Blur),
            "ocr" => Ok(Engine::Ocr),
            other => Err(ExtractionError::Config(format!(
                "unknown engine '{other}', expected 'blur' or 'ocr'"
            ))),
        }
    }
}

/// One of the four cardinal orientations, clockwise from upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Search order for rotation attempts.
    pub const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    /// Normalize any multiple of 90 degrees (negative allowed) to a cardinal rotation.
    pub fn from_degrees(degrees: i32) -> Result<Self, ExtractionError> {
        if degrees % 90 != 0 {
            return Err(ExtractionError::Config(format!(
                "rotation must be a multiple of 90 degrees, got {degrees}"
            )));
        }
        Ok(Self::from_quarter_turns(degrees / 90))
    }

    fn from_quarter_turns(turns: i32) -> Self {
        match turns.rem_euclid(4) {
            0 => Rotation::Deg0,
            1 => Rotation::Deg90,
            2 => Rotation::Deg180,
            _ => Rotation::Deg270,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    fn quarter_turns(self) -> i32 {
        i32::from(self.degrees() / 90)
    }

    /// Compose two rotations (mod 360).
    pub fn then(self, other: Rotation) -> Rotation {
        Self::from_quarter_turns(self.quarter_turns() + other.quarter_turns())
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

impl Serialize for Rotation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.degrees())
    }
}

impl<'de> Deserialize<'de> for Rotation {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let degrees = i32::deserialize(deserializer)?;
        Rotation::from_degrees(degrees).map_err(serde::de::Error::custom)
    }
}

/// Sharpness measurement for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlurReport {
    pub image_path: PathBuf,
    pub score: f64,
    pub is_blurry: bool,
}

/// Outcome of the blur gate. Both variants carry the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "report", rename_all = "snake_case")]
pub enum BlurVerdict {
    Accepted(BlurReport),
    Rejected(BlurReport),
}

impl BlurVerdict {
    pub fn from_report(report: BlurReport) -> Self {
        if report.is_blurry {
            BlurVerdict::Rejected(report)
        } else {
            BlurVerdict::Accepted(report)
        }
    }

    pub fn report(&self) -> &BlurReport {
        match self {
            BlurVerdict::Accepted(r) | BlurVerdict::Rejected(r) => r,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, BlurVerdict::Accepted(_))
    }
}

/// Raw OCR result from the engine.
#[derive(Debug, Clone, Default)]
pub struct OcrPageResult {
    pub text: String,
    /// Engine-reported confidence in 0.0-1.0, when the engine has one.
    pub confidence: Option<f32>,
}

/// OCR engine abstraction (allows mocking for tests).
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &DocumentImage) -> Result<OcrPageResult, ExtractionError>;
}

/// A single OCR pass at one orientation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationAttempt {
    pub angle: Rotation,
    pub extracted_text: String,
    pub confidence: f32,
    /// Engine error absorbed for this angle, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of the rotation search for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedRotatedImagesResult {
    pub image_path: PathBuf,
    pub best_angle: Rotation,
    pub best_text: String,
    /// Always in search order: 0, 90, 180, 270.
    pub attempts: Vec<RotationAttempt>,
}

impl ProcessedRotatedImagesResult {
    pub fn best_attempt(&self) -> Option<&RotationAttempt> {
        self.attempts.iter().find(|a| a.angle == self.best_angle)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployerData {
    pub employer_identification_number: Option<String>,
    pub wages_tips_others: Option<String>,
    pub federal_income_tax_withheld: Option<String>,
}

/// Typed view over the W-2 overlay. Values stay raw strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedData {
    pub employer: EmployerData,
    pub employee_address: Option<String>,
    pub ssn: Option<String>,
    pub bottom_lines: Option<String>,
}

impl ParsedData {
    /// Project the `w2` entry of an overlay into the typed record.
    pub fn from_fields(fields: &ExtractedFields) -> Self {
        let Some(w2) = fields.get(super::patterns::DocumentType::W2.id()) else {
            return Self::default();
        };
        let get = |key: &str| w2.get(key).cloned();

        Self {
            employer: EmployerData {
                employer_identification_number: get("employerIdentificationNumber"),
                wages_tips_others: get("wagesTipsOthers"),
                federal_income_tax_withheld: get("federalIncomeTaxWithheld"),
            },
            employee_address: get("employeeAddress"),
            ssn: get("ssn"),
            bottom_lines: get("bottomLines"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_is_mod_360() {
        assert_eq!(Rotation::from_degrees(0).unwrap(), Rotation::Deg0);
        assert_eq!(Rotation::from_degrees(360).unwrap(), Rotation::Deg0);
        assert_eq!(Rotation::from_degrees(450).unwrap(), Rotation::Deg90);
        assert_eq!(Rotation::from_degrees(-90).unwrap(), Rotation::Deg270);
    }

    #[test]
    fn rotation_rejects_non_cardinal() {
        assert!(matches!(
            Rotation::from_degrees(45),
            Err(ExtractionError::Config(_))
        ));
    }

    #[test]
    fn rotation_composes() {
        assert_eq!(Rotation::Deg90.then(Rotation::Deg270), Rotation::Deg0);
        assert_eq!(Rotation::Deg180.then(Rotation::Deg180), Rotation::Deg0);
        assert_eq!(Rotation::Deg270.then(Rotation::Deg180), Rotation::Deg90);
    }

    #[test]
    fn rotation_serializes_as_degrees() {
        let json = serde_json::to_string(&Rotation::Deg180).unwrap();
        assert_eq!(json, "180");
        let back: Rotation = serde_json::from_str("270").unwrap();
        assert_eq!(back, Rotation::Deg270);
    }

    #[test]
    fn engine_parses_case_insensitively() {
        assert_eq!("blur".parse::<Engine>().unwrap(), Engine::Blur);
        assert_eq!(" OCR ".parse::<Engine>().unwrap(), Engine::Ocr);
        assert!("fax".parse::<Engine>().is_err());
    }

    #[test]
    fn verdict_follows_is_blurry() {
        let report = BlurReport {
            image_path: "a.png".into(),
            score: 12.0,
            is_blurry: true,
        };
        let verdict = BlurVerdict::from_report(report.clone());
        assert!(!verdict.is_accepted());
        assert_eq!(verdict.report(), &report);

        let sharp = BlurReport {
            is_blurry: false,
            ..report
        };
        assert!(BlurVerdict::from_report(sharp).is_accepted());
    }

    #[test]
    fn parsed_data_from_sparse_overlay() {
        let mut fields = ExtractedFields::new();
        fields
            .entry("w2".into())
            .or_default()
            .insert("employerIdentificationNumber".into(), "12-3456789".into());
        fields
            .entry("w2".into())
            .or_default()
            .insert("ssn".into(), "123-45-6789".into());

        let parsed = ParsedData::from_fields(&fields);
        assert_eq!(
            parsed.employer.employer_identification_number.as_deref(),
            Some("12-3456789")
        );
        assert_eq!(parsed.ssn.as_deref(), Some("123-45-6789"));
        assert!(parsed.employer.wages_tips_others.is_none());
        assert!(parsed.bottom_lines.is_none());
    }

    #[test]
    fn parsed_data_without_w2_is_empty() {
        let mut fields = ExtractedFields::new();
        fields
            .entry("adp".into())
            .or_default()
            .insert("netPay".into(), "1,234.56".into());
        assert_eq!(ParsedData::from_fields(&fields), ParsedData::default());
    }
}
