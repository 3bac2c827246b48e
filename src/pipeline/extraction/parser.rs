use tracing::info;

use super::patterns::DocumentMatcher;
use super::types::ExtractedFields;

/// Logged in place of a value when a field pattern does not match.
pub const NO_MATCH_MARKER: &str = "null";

/// Apply every matcher's patterns to the full text.
///
/// Matched fields land under `result[matcher.id][field]` as the first capture
/// group. Unmatched fields are absent, and a matcher with no matches has no
/// entry at all. Every attempt is logged. No cross-field validation is done,
/// and overlapping matchers each get their own entry.
pub fn parse(document_text: &str, matchers: &[DocumentMatcher]) -> ExtractedFields {
    let mut results = ExtractedFields::new();

    for matcher in matchers {
        for pattern in matcher.patterns() {
            let captured = pattern
                .regex()
                .captures(document_text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string());

            info!(
                matcher = matcher.id(),
                field = pattern.field(),
                value = captured.as_deref().unwrap_or(NO_MATCH_MARKER),
                "Field match attempt"
            );

            if let Some(value) = captured {
                results
                    .entry(matcher.id().to_string())
                    .or_default()
                    .insert(pattern.field().to_string(), value);
            }
        }
    }

    results
}
