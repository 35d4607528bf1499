//! Unified hint extractor.
//!
//! A single pass over the transcript performs the relevance check and pulls
//! out the crop, location, and date hints plus a derived retrieval query.
//! Everything here is pattern/heuristic matching — no model call — and the
//! functions are pure: the reference date is injected so relative
//! expressions resolve deterministically.
//!
//! Tie-break policy: when several candidates exist for the same field, the
//! match nearest the start of the text wins. Farm-log transcripts
//! front-load the subject, so the leftmost mention is the topical one.

use std::sync::LazyLock;

use chrono::{Duration, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::lexicon::{is_domain_relevant, Lexicon};

/// Structured hints for one transcript. Immutable once returned.
#[derive(Debug, Clone, Serialize)]
pub struct Hints {
    pub is_relevant: bool,
    pub crop: Option<String>,
    pub location: Option<String>,
    pub date: Option<NaiveDate>,
    /// Retrieval query: crop and location joined when present, otherwise
    /// the full input text. Non-empty whenever `is_relevant` is true.
    pub query: String,
    /// Topic-specific follow-up queries (pest/disease/foliar feed),
    /// instantiated with the crop.
    pub search_queries: Vec<String>,
}

/// Caller-supplied field overrides. Merged last; an override always beats
/// the extracted value for the same field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HintOverrides {
    pub date: Option<NaiveDate>,
    pub crop: Option<String>,
    pub location: Option<String>,
}

/// Representative crops. Aliases map to their canonical name and are
/// listed first so the longer surface form wins at equal offsets.
const CROP_RULES: &[(&str, &str)] = &[
    ("샤인머스켓", "포도"),
    ("사과나무", "사과"),
    ("포도나무", "포도"),
    ("배추", "배추"),
    ("고추", "고추"),
    ("사과", "사과"),
    ("토마토", "토마토"),
    ("감자", "감자"),
    ("상추", "상추"),
    ("딸기", "딸기"),
    ("파프리카", "파프리카"),
    ("오이", "오이"),
    ("참외", "참외"),
    ("포도", "포도"),
    ("복숭아", "복숭아"),
];

static LOC_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"포장[- ]?\d+",
        r"하우스[- ]?\d+",
        r"[A-Z가-힣]블록",
        r"밭\s?\d+",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Full date (year month day) and short date (month day). The short form
/// requires the trailing day marker so it cannot fire on loose numbers.
static DATE_FULL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})[.\-/년]\s?(\d{1,2})[.\-/월]\s?(\d{1,2})일?").unwrap());
static DATE_SHORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})[.\-/월]\s?(\d{1,2})일").unwrap());

/// Keyword-to-query templates: when the pattern fires and a crop is known,
/// emit `"<crop> <suffix>"`.
static TOPIC_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"진딧물", "진딧물 방제 요령"),
        (r"총채", "총채벌레 방제"),
        (r"역병", "역병 예방"),
        (r"탄저", "탄저병 예방"),
        (r"요소.*엽면|엽면시비", "요소 엽면시비 농도"),
        (r"칼슘", "칼슘 엽면시비 농도"),
    ]
    .iter()
    .map(|(p, s)| (Regex::new(p).unwrap(), *s))
    .collect()
});

/// Collapse newlines and runs of whitespace. STT output arrives with
/// arbitrary line breaks and doubled spaces.
pub fn clean_stt(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Single-pass analysis: relevance verdict plus hint extraction.
///
/// The gate short-circuits extraction for irrelevant text, but overrides
/// are merged in every case so a supplied field is always echoed back.
/// Never fails on malformed input; a missing hint is an absent field.
pub fn analyse(
    text: &str,
    lexicon: &Lexicon,
    overrides: &HintOverrides,
    today: NaiveDate,
) -> Hints {
    let cleaned = clean_stt(text);
    let is_relevant = is_domain_relevant(&cleaned, lexicon);

    let (crop, location, date) = if is_relevant {
        (
            overrides.crop.clone().or_else(|| extract_crop(&cleaned)),
            overrides
                .location
                .clone()
                .or_else(|| extract_location(&cleaned)),
            overrides.date.or_else(|| extract_date(&cleaned, today)),
        )
    } else {
        (
            overrides.crop.clone(),
            overrides.location.clone(),
            overrides.date,
        )
    };

    let query = match (&crop, &location) {
        (Some(c), Some(l)) => format!("{} {}", c, l),
        (Some(c), None) => c.clone(),
        (None, Some(l)) => l.clone(),
        (None, None) => cleaned.clone(),
    };

    let search_queries = match (&crop, is_relevant) {
        (Some(c), true) => topic_queries(&cleaned, c),
        _ => Vec::new(),
    };

    Hints {
        is_relevant,
        crop,
        location,
        date,
        query,
        search_queries,
    }
}

/// Leftmost crop mention, alias-normalized.
fn extract_crop(text: &str) -> Option<String> {
    CROP_RULES
        .iter()
        .filter_map(|(surface, canonical)| text.find(surface).map(|pos| (pos, *canonical)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, canonical)| canonical.to_string())
}

/// Leftmost location phrase across all patterns, with internal spaces
/// dropped ("포장 2" and "포장-2" normalize identically).
fn extract_location(text: &str) -> Option<String> {
    LOC_PATTERNS
        .iter()
        .filter_map(|pat| pat.find(text))
        .min_by_key(|m| m.start())
        .map(|m| m.as_str().replace(' ', ""))
}

/// Leftmost parseable date expression; relative expressions as fallback.
///
/// Candidates that do not form a valid calendar date (month 13, day 40)
/// are skipped in favour of the next one. A short-form date borrows the
/// reference year.
fn extract_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    use chrono::Datelike;

    let mut candidates: Vec<(usize, NaiveDate)> = Vec::new();

    for caps in DATE_FULL.captures_iter(text) {
        let m = caps.get(0).expect("full-match group");
        let parsed = (
            caps[1].parse::<i32>(),
            caps[2].parse::<u32>(),
            caps[3].parse::<u32>(),
        );
        if let (Ok(y), Ok(mo), Ok(d)) = parsed {
            if let Some(date) = NaiveDate::from_ymd_opt(y, mo, d) {
                candidates.push((m.start(), date));
            }
        }
    }
    for caps in DATE_SHORT.captures_iter(text) {
        let m = caps.get(0).expect("full-match group");
        // Skip short matches sitting inside a full date's tail.
        if DATE_FULL
            .find_iter(text)
            .any(|f| f.start() <= m.start() && m.end() <= f.end())
        {
            continue;
        }
        let parsed = (caps[1].parse::<u32>(), caps[2].parse::<u32>());
        if let (Ok(mo), Ok(d)) = parsed {
            if let Some(date) = NaiveDate::from_ymd_opt(today.year(), mo, d) {
                candidates.push((m.start(), date));
            }
        }
    }

    if let Some((_, date)) = candidates.into_iter().min_by_key(|(pos, _)| *pos) {
        return Some(date);
    }

    if text.contains("오늘") {
        Some(today)
    } else if text.contains("어제") {
        Some(today - Duration::days(1))
    } else {
        None
    }
}

fn topic_queries(text: &str, crop: &str) -> Vec<String> {
    let mut queries: Vec<String> = TOPIC_RULES
        .iter()
        .filter(|(pat, _)| pat.is_match(text))
        .map(|(_, suffix)| format!("{} {}", crop, suffix))
        .collect();
    queries.sort();
    queries.dedup();
    queries
}
