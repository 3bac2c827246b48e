//! Per-document-type field patterns.
//!
//! Each supported document type owns a static table of field name -> regex.
//! Every pattern must have exactly one capture group; the group is the
//! extracted value. Tables are compiled and validated once when the registry
//! is built, so a bad pattern stops startup instead of mis-extracting later.
//!
//! Adding a document type means adding a table (or a JSON definition), never
//! touching the parser.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ExtractionError;

/// Form W-2 (Wage and Tax Statement).
const W2_PATTERNS: &[(&str, &str)] = &[
    (
        "employerIdentificationNumber",
        r"(?i)employer\s+identification\s+number[^\d]{0,40}(\d{2}-?\d{7})",
    ),
    (
        "wagesTipsOthers",
        r"(?i)wages,?\s+tips,?\s+other\s+comp(?:ensation)?[^\d]{0,40}([\d,]+\.\d{2})",
    ),
    (
        "federalIncomeTaxWithheld",
        r"(?i)federal\s+income\s+tax\s+withheld[^\d]{0,40}([\d,]+\.\d{2})",
    ),
    (
        "ssn",
        r"(?i)(?:SSN|social\s+security\s+number)[^\d]{0,20}(\d{3}-\d{2}-\d{4}|\d{9})",
    ),
    (
        "employeeAddress",
        r"(?i)employee'?s\s+address(?:\s+and\s+zip\s+code)?[\s:]*([^\n]+\n[^\n]*\b\d{5}(?:-\d{4})?)",
    ),
    (
        "bottomLines",
        r"(?im)^([^\n]*wage\s+and\s+tax\s+statement[^\n]*)$",
    ),
];

/// ADP earnings statement (pay stub).
const ADP_PATTERNS: &[(&str, &str)] = &[
    ("companyCode", r"(?i)company\s+code[\s:]*([A-Z0-9]{2,}(?:/[A-Z0-9]+)*)"),
    ("periodEnding", r"(?i)period\s+ending[\s:]*(\d{1,2}/\d{1,2}/\d{2,4})"),
    ("payDate", r"(?i)pay\s+date[\s:]*(\d{1,2}/\d{1,2}/\d{2,4})"),
    ("grossPay", r"(?i)gross\s+pay[\s:$]*([\d,]+\.\d{2})"),
    (
        "federalIncomeTax",
        r"(?i)federal\s+income(?:\s+tax)?[\s:$]*(-?[\d,]+\.\d{2})",
    ),
    (
        "socialSecurityTax",
        r"(?i)social\s+security(?:\s+tax)?[\s:$]*(-?[\d,]+\.\d{2})",
    ),
    ("medicareTax", r"(?i)medicare(?:\s+tax)?[\s:$]*(-?[\d,]+\.\d{2})"),
    ("netPay", r"(?i)net\s+pay[\s:$]*([\d,]+\.\d{2})"),
];

/// Built-in document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    W2,
    AdpEarningsStatement,
}

impl DocumentType {
    pub const ALL: [DocumentType; 2] = [DocumentType::W2, DocumentType::AdpEarningsStatement];

    /// Matcher id used as the first key of the extraction overlay.
    pub fn id(self) -> &'static str {
        match self {
            DocumentType::W2 => "w2",
            DocumentType::AdpEarningsStatement => "adp",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }

    fn patterns(self) -> &'static [(&'static str, &'static str)] {
        match self {
            DocumentType::W2 => W2_PATTERNS,
            DocumentType::AdpEarningsStatement => ADP_PATTERNS,
        }
    }
}

/// One compiled field pattern.
#[derive(Debug, Clone)]
pub struct FieldPattern {
    field: String,
    regex: Regex,
}

impl FieldPattern {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// Named set of field patterns for one document type.
#[derive(Debug, Clone)]
pub struct DocumentMatcher {
    id: String,
    patterns: Vec<FieldPattern>,
}

impl DocumentMatcher {
    /// Compile and validate a matcher. Field order is preserved.
    pub fn new<I, F, P>(id: &str, patterns: I) -> Result<Self, ExtractionError>
    where
        I: IntoIterator<Item = (F, P)>,
        F: AsRef<str>,
        P: AsRef<str>,
    {
        if id.trim().is_empty() {
            return Err(ExtractionError::MatcherConfig {
                matcher: id.to_string(),
                field: String::new(),
                reason: "matcher id must not be empty".into(),
            });
        }

        let mut seen = HashSet::new();
        let mut compiled = Vec::new();
        for (field, pattern) in patterns {
            let field = field.as_ref();
            let config_error = |reason: String| ExtractionError::MatcherConfig {
                matcher: id.to_string(),
                field: field.to_string(),
                reason,
            };

            if field.trim().is_empty() {
                return Err(config_error("field name must not be empty".into()));
            }
            if !seen.insert(field.to_string()) {
                return Err(config_error("duplicate field name".into()));
            }

            let regex = Regex::new(pattern.as_ref()).map_err(|e| config_error(e.to_string()))?;
            let groups = regex.captures_len() - 1;
            if groups != 1 {
                return Err(config_error(format!(
                    "expected exactly one capture group, found {groups}"
                )));
            }

            compiled.push(FieldPattern {
                field: field.to_string(),
                regex,
            });
        }

        Ok(Self {
            id: id.to_string(),
            patterns: compiled,
        })
    }

    pub fn builtin(document_type: DocumentType) -> Result<Self, ExtractionError> {
        Self::new(document_type.id(), document_type.patterns().iter().copied())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn patterns(&self) -> &[FieldPattern] {
        &self.patterns
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.field())
    }
}

/// Serialized form of a matcher, for matchers supplied at deploy time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherDefinition {
    pub id: String,
    pub patterns: BTreeMap<String, String>,
}

/// Read-only set of matchers, built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct MatcherRegistry {
    matchers: Vec<DocumentMatcher>,
}

impl MatcherRegistry {
    /// Registry with every built-in document type.
    pub fn builtin() -> Result<Self, ExtractionError> {
        let matchers = DocumentType::ALL
            .into_iter()
            .map(DocumentMatcher::builtin)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { matchers })
    }

    /// Build from explicit matchers, rejecting duplicate ids.
    pub fn from_matchers(matchers: Vec<DocumentMatcher>) -> Result<Self, ExtractionError> {
        let mut registry = Self { matchers: Vec::new() };
        for matcher in matchers {
            registry.register(matcher)?;
        }
        Ok(registry)
    }

    /// Add matchers compiled from definitions.
    pub fn with_definitions(
        mut self,
        definitions: Vec<MatcherDefinition>,
    ) -> Result<Self, ExtractionError> {
        for def in definitions {
            let matcher = DocumentMatcher::new(&def.id, &def.patterns)?;
            self.register(matcher)?;
        }
        Ok(self)
    }

    /// Add matchers from a JSON file holding an array of definitions.
    pub fn with_definitions_file(self, path: &Path) -> Result<Self, ExtractionError> {
        let content = std::fs::read_to_string(path)?;
        let definitions: Vec<MatcherDefinition> = serde_json::from_str(&content)?;
        info!(
            path = %path.display(),
            count = definitions.len(),
            "Loading matcher definitions"
        );
        self.with_definitions(definitions)
    }

    fn register(&mut self, matcher: DocumentMatcher) -> Result<(), ExtractionError> {
        if self.matchers.iter().any(|m| m.id() == matcher.id()) {
            return Err(ExtractionError::MatcherConfig {
                matcher: matcher.id().to_string(),
                field: String::new(),
                reason: "duplicate matcher id".into(),
            });
        }
        self.matchers.push(matcher);
        Ok(())
    }

    pub fn patterns_for(&self, id: &str) -> Result<&DocumentMatcher, ExtractionError> {
        self.matchers
            .iter()
            .find(|m| m.id() == id)
            .ok_or_else(|| ExtractionError::UnknownDocumentType(id.to_string()))
    }

    /// Every registered matcher, in registration order.
    pub fn matchers(&self) -> &[DocumentMatcher] {
        &self.matchers
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.matchers.iter().map(|m| m.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_w2_and_adp() {
        let registry = MatcherRegistry::builtin().unwrap();
        let ids: Vec<&str> = registry.ids().collect();
        assert_eq!(ids, vec!["w2", "adp"]);
    }

    #[test]
    fn builtin_tables_compile_with_one_group_each() {
        for document_type in DocumentType::ALL {
            let matcher = DocumentMatcher::builtin(document_type).unwrap();
            assert_eq!(matcher.patterns().len(), document_type.patterns().len());
            for pattern in matcher.patterns() {
                assert_eq!(pattern.regex().captures_len(), 2, "{}", pattern.field());
            }
        }
    }

    #[test]
    fn w2_fields_are_declared_in_order() {
        let registry = MatcherRegistry::builtin().unwrap();
        let fields: Vec<&str> = registry.patterns_for("w2").unwrap().field_names().collect();
        assert_eq!(
            fields,
            vec![
                "employerIdentificationNumber",
                "wagesTipsOthers",
                "federalIncomeTaxWithheld",
                "ssn",
                "employeeAddress",
                "bottomLines",
            ]
        );
    }

    #[test]
    fn unknown_document_type() {
        let registry = MatcherRegistry::builtin().unwrap();
        assert!(matches!(
            registry.patterns_for("1099"),
            Err(ExtractionError::UnknownDocumentType(id)) if id == "1099"
        ));
    }

    #[test]
    fn document_type_ids_round_trip() {
        for document_type in DocumentType::ALL {
            assert_eq!(DocumentType::from_id(document_type.id()), Some(document_type));
        }
        assert_eq!(DocumentType::from_id("1040"), None);
    }

    #[test]
    fn zero_groups_rejected() {
        let err = DocumentMatcher::new("w2", [("ssn", r"SSN:\s*\d+")]).unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::MatcherConfig { ref field, ref reason, .. }
                if field == "ssn" && reason.contains("found 0")
        ));
    }

    #[test]
    fn two_groups_rejected() {
        let err = DocumentMatcher::new("w2", [("ssn", r"(SSN):\s*(\d+)")]).unwrap_err();
        assert!(matches!(err, ExtractionError::MatcherConfig { .. }));
    }

    #[test]
    fn non_capturing_groups_are_fine() {
        let matcher =
            DocumentMatcher::new("w2", [("ssn", r"(?:SSN|Social):\s*(\d{3}-\d{2}-\d{4})")]).unwrap();
        assert_eq!(matcher.patterns().len(), 1);
    }

    #[test]
    fn invalid_regex_rejected() {
        let err = DocumentMatcher::new("w2", [("ssn", r"SSN:\s*(\d+")]).unwrap_err();
        assert!(matches!(err, ExtractionError::MatcherConfig { .. }));
    }

    #[test]
    fn duplicate_field_rejected() {
        let err = DocumentMatcher::new("w2", [("ssn", r"(\d)"), ("ssn", r"(\w)")]).unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::MatcherConfig { ref reason, .. } if reason == "duplicate field name"
        ));
    }

    #[test]
    fn duplicate_matcher_id_rejected() {
        let defs = vec![MatcherDefinition {
            id: "w2".into(),
            patterns: BTreeMap::from([("box12".to_string(), r"12a\s+(\S+)".to_string())]),
        }];
        let err = MatcherRegistry::builtin()
            .unwrap()
            .with_definitions(defs)
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::MatcherConfig { ref reason, .. } if reason == "duplicate matcher id"
        ));
    }

    #[test]
    fn definitions_file_adds_matcher() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matchers.json");
        std::fs::write(
            &path,
            r#"[{"id": "1099-int", "patterns": {"interestIncome": "(?i)interest\\s+income\\s*\\$?([\\d,]+\\.\\d{2})"}}]"#,
        )
        .unwrap();

        let registry = MatcherRegistry::builtin()
            .unwrap()
            .with_definitions_file(&path)
            .unwrap();
        assert_eq!(registry.matchers().len(), 3);
        let matcher = registry.patterns_for("1099-int").unwrap();
        assert_eq!(matcher.field_names().collect::<Vec<_>>(), vec!["interestIncome"]);
    }

    #[test]
    fn bad_definitions_file_refuses_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matchers.json");
        std::fs::write(&path, r#"[{"id": "bad", "patterns": {"x": "no groups"}}]"#).unwrap();

        let result = MatcherRegistry::builtin().unwrap().with_definitions_file(&path);
        assert!(matches!(result, Err(ExtractionError::MatcherConfig { .. })));
    }

    #[test]
    fn from_matchers_rejects_duplicates() {
        let a = DocumentMatcher::new("paystub", [("net", r"Net\s+(\S+)")]).unwrap();
        let b = a.clone();
        assert!(MatcherRegistry::from_matchers(vec![a, b]).is_err());
    }
}
