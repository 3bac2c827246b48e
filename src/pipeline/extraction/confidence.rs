use super::types::OcrPageResult;

/// Non-whitespace character count at which the length factor saturates.
pub const LENGTH_SATURATION_CHARS: usize = 200;

/// Default floor below which OCR output counts as near-empty.
pub const DEFAULT_MIN_TEXT_CHARS: usize = 16;

/// Characters Tesseract emits for glyphs it could not place.
const REPLACEMENT_GLYPHS: &[char] = &['\u{FFFD}', '\u{25A1}', '\u{2022}', '~', '|', '^', '`'];

/// Confidence for an OCR attempt.
///
/// Uses the engine-reported value when present (clamped to 0.0-1.0, NaN as 0),
/// otherwise falls back to `proxy_confidence`.
pub fn attempt_confidence(result: &OcrPageResult) -> f32 {
    match result.confidence {
        Some(c) if c.is_nan() => 0.0,
        Some(c) => c.clamp(0.0, 1.0),
        None => proxy_confidence(&result.text),
    }
}

/// Heuristic confidence from the text alone.
///
/// `recognized_ratio * length_factor`, where the ratio counts glyphs that look
/// like form text (alphanumerics and ordinary punctuation) and the length
/// factor grows linearly to 1.0 at `LENGTH_SATURATION_CHARS`.
pub fn proxy_confidence(text: &str) -> f32 {
    let (recognized, total) = glyph_counts(text);
    if total == 0 {
        return 0.0;
    }

    let ratio = recognized as f32 / total as f32;
    let length_factor = (total as f32 / LENGTH_SATURATION_CHARS as f32).min(1.0);
    ratio * length_factor
}

/// Count of non-whitespace characters.
pub fn text_char_count(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// True when the text has fewer than `min_chars` non-whitespace characters.
pub fn is_near_empty(text: &str, min_chars: usize) -> bool {
    text_char_count(text) < min_chars
}

fn glyph_counts(text: &str) -> (usize, usize) {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .fold((0, 0), |(recognized, total), c| {
            (recognized + usize::from(is_recognized_glyph(c)), total + 1)
        })
}

fn is_recognized_glyph(c: char) -> bool {
    if REPLACEMENT_GLYPHS.contains(&c) {
        return false;
    }
    c.is_alphanumeric() || ".,:;-/$%#()&'\"".contains(c)
}
