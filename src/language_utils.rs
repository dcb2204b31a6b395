//! Language utilities for language tag handling
//!
//! Tags coming from clients and upstream sources mix ISO 639-1 codes (`en`),
//! ISO 639-2 codes (`eng`, `fre`) and region-qualified tags (`pt-BR`). Only the
//! primary subtag is validated against ISO 639; the region is kept as given.

use anyhow::{Result, anyhow};
use isolang::Language;

/// Target languages offered by the manifest, as (tag, English name)
pub const SUPPORTED_TARGET_LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("zh-CN", "Chinese (Simplified)"),
    ("hi", "Hindi"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("ar", "Arabic"),
    ("bn", "Bengali"),
    ("pt-BR", "Portuguese (Brazil)"),
    ("ru", "Russian"),
    ("ur", "Urdu"),
    ("id", "Indonesian"),
    ("de", "German"),
    ("ja", "Japanese"),
    ("sw", "Swahili"),
    ("mr", "Marathi"),
    ("te", "Telugu"),
    ("tr", "Turkish"),
    ("ta", "Tamil"),
    ("it", "Italian"),
    ("fa", "Persian"),
];

// ISO 639-2/B codes that differ from their 639-2/T form
const BIBLIOGRAPHIC_CODES: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Lowercased primary subtag: `pt-BR` -> `pt`, `en_US` -> `en`
pub fn primary_subtag(tag: &str) -> String {
    tag.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Resolve a tag's primary subtag to an isolang language
fn resolve_language(tag: &str) -> Option<Language> {
    let primary = primary_subtag(tag);
    match primary.len() {
        2 => Language::from_639_1(&primary),
        3 => {
            let part2t = BIBLIOGRAPHIC_CODES
                .iter()
                .find(|(b, _)| *b == primary)
                .map(|(_, t)| *t)
                .unwrap_or(primary.as_str());
            Language::from_639_3(part2t)
        },
        _ => None,
    }
}

/// Normalize a language tag to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(tag: &str) -> Result<String> {
    resolve_language(tag)
        .map(|lang| lang.to_639_3().to_string())
        .ok_or_else(|| anyhow!("Cannot normalize invalid language code: {}", tag))
}

/// Check if two language tags name the same language
///
/// Regions are ignored: `en`, `eng` and `en-US` all match.
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (normalize_to_part2t(code1), normalize_to_part2t(code2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Get the English language name for a tag
pub fn get_language_name(tag: &str) -> Result<String> {
    resolve_language(tag)
        .map(|lang| lang.to_name().to_string())
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", tag))
}

/// Validate a target tag and put it in canonical case (`pt-br` -> `pt-BR`)
pub fn normalize_language_tag(tag: &str) -> Result<String> {
    let trimmed = tag.trim();
    if resolve_language(trimmed).is_none() {
        return Err(anyhow!("Invalid language code: {}", tag));
    }

    let mut parts = trimmed.split(['-', '_']);
    let mut canonical = parts.next().unwrap_or_default().to_lowercase();
    for part in parts.filter(|p| !p.is_empty()) {
        canonical.push('-');
        match part.len() {
            // Region subtag
            2 | 3 => canonical.push_str(&part.to_uppercase()),
            // Script subtag, title case
            4 => {
                let lower = part.to_lowercase();
                let mut chars = lower.chars();
                if let Some(first) = chars.next() {
                    canonical.extend(first.to_uppercase());
                    canonical.push_str(chars.as_str());
                }
            },
            _ => canonical.push_str(part),
        }
    }

    Ok(canonical)
}

/// Code to send to the translation endpoint for a user-facing tag
///
/// Portuguese variants collapse to `pt` and simplified Chinese to `zh`. Any
/// other tag becomes its primary subtag, preferring the two-letter form.
pub fn endpoint_language_code(tag: &str) -> String {
    let primary = primary_subtag(tag);
    match primary.as_str() {
        "pt" => "pt".to_string(),
        "zh" => "zh".to_string(),
        _ => resolve_language(&primary)
            .and_then(|lang| lang.to_639_1())
            .map(str::to_string)
            .unwrap_or(primary),
    }
}

/// Whether the manifest offers this tag
pub fn is_supported_target(tag: &str) -> bool {
    SUPPORTED_TARGET_LANGUAGES
        .iter()
        .any(|(supported, _)| supported.eq_ignore_ascii_case(tag.trim()))
}
