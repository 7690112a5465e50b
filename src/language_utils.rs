use anyhow::{Result, anyhow};
use isolang::Language;

/// Language utilities for ISO language code handling
///
/// Subtitle sources tag their files with ISO 639-2/B codes ("fre", "ger",
/// "pob"), while translation providers and viewers use ISO 639-1 ("fr", "de",
/// "pt"). Everything here maps both onto ISO 639-3 so they can be compared.

// ISO 639-2/B codes that differ from their 639-2/T form, plus the regional
// variants OpenSubtitles uses
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
    ("pob", "por"),
    ("zhs", "zho"),
    ("zht", "zho"),
];

/// Normalize a language code to ISO 639-3 (3-letter) format.
///
/// Region suffixes such as `pt-BR` or `zh_CN` are ignored.
pub fn normalize_to_part3(code: &str) -> Result<String> {
    let lowered = code.trim().to_lowercase();
    let base = lowered
        .split(['-', '_'])
        .next()
        .unwrap_or_default();

    let language = match base.len() {
        2 => Language::from_639_1(base),
        3 => {
            let part2t = BIBLIOGRAPHIC_CODES
                .iter()
                .find(|(b, _)| *b == base)
                .map_or(base, |(_, t)| *t);
            Language::from_639_3(part2t)
        }
        _ => None,
    };

    language
        .map(|lang| lang.to_639_3().to_string())
        .ok_or_else(|| anyhow!("Invalid language code: {}", code))
}

/// Normalize a language code to ISO 639-1 where one exists, else ISO 639-3
pub fn normalize_to_part1_or_part3(code: &str) -> Result<String> {
    let part3 = normalize_to_part3(code)?;
    let language = Language::from_639_3(&part3)
        .ok_or_else(|| anyhow!("Invalid language code: {}", code))?;

    Ok(language
        .to_639_1()
        .map_or(part3.clone(), |c| c.to_string()))
}

/// Check if two language codes represent the same language
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (normalize_to_part3(code1), normalize_to_part3(code2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Get the English language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let normalized = normalize_to_part3(code)?;
    let lang = Language::from_639_3(&normalized)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;

    Ok(lang.to_name().to_string())
}

/// Name shown to viewers, falling back to the raw code for unknown languages
pub fn display_name(code: &str) -> String {
    get_language_name(code).unwrap_or_else(|_| code.to_string())
}
