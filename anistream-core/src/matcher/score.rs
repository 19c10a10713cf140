//! Four-layer confidence scorer.
//!
//! Compares one catalog record against one scraped candidate and decides
//! whether they are the same title. The weights and thresholds are the
//! empirically tuned values from the production matcher and are kept
//! verbatim for behavioral compatibility.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::models::{CatalogRecord, ScrapedCandidate, TitleKind};

use super::slug::season_ordinal;

/// Accept threshold during the normal scan.
pub const ACCEPT_CONFIDENCE: f64 = 75.0;
/// Accept threshold for fallback (fuzzy-listing) probes.
pub const FALLBACK_ACCEPT_CONFIDENCE: f64 = 80.0;
/// Early-stop threshold: no further candidates are probed past this.
pub const EARLY_STOP_CONFIDENCE: f64 = 95.0;

static SUFFIX_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\s+(season|s)\s*\d+$",
        r"(?i)\s+(part|cour)\s*\d+$",
        r"(?i)\s+\d+(st|nd|rd|th)\s+season$",
        r"(?i)\s+(tv|ova|ona|special)$",
        r"(?i)\s+sub\s+indo$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("regex"))
    .collect()
});

const SPECIAL_KEYWORDS: &[&str] = &[
    "ova", "oad", "special", "movie", "film", "episode of", "recap", "summary",
    "picture drama",
];

/// Outcome of scoring one candidate slug.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub slug: String,
    pub is_match: bool,
    pub confidence: f64,
    pub quick_filters_passed: bool,
    pub title_similarity: f64,
    pub metadata_score: f64,
    pub season_valid: bool,
}

fn normalize(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_space = true;
    for c in title.to_lowercase().chars() {
        if c.is_alphanumeric() {
            out.push(c);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim().to_string()
}

fn strip_suffixes(title: &str) -> String {
    let mut out = title.to_string();
    for re in SUFFIX_RES.iter() {
        out = re.replace(&out, "").to_string();
    }
    out.trim().to_string()
}

/// Dice coefficient over character bigrams, 0.0-1.0. Order-insensitive and
/// robust against small spelling drift, which makes it a better phrase
/// comparator than plain edit distance here.
#[must_use]
pub fn dice_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.len() < 2 || b.len() < 2 {
        return 0.0;
    }

    let bigrams = |s: &str| -> Vec<(char, char)> {
        let chars: Vec<char> = s.chars().collect();
        chars.windows(2).map(|w| (w[0], w[1])).collect()
    };

    let a_grams = bigrams(a);
    let mut b_grams = bigrams(b);
    let total = a_grams.len() + b_grams.len();

    let mut matches = 0usize;
    for gram in a_grams {
        if let Some(pos) = b_grams.iter().position(|&g| g == gram) {
            b_grams.swap_remove(pos);
            matches += 1;
        }
    }

    2.0 * matches as f64 / total as f64
}

fn title_variants(primary: &str, english: Option<&str>, japanese: Option<&str>, synonyms: &[String]) -> Vec<String> {
    let mut set = HashSet::new();
    let mut out = Vec::new();
    let mut push = |t: String| {
        if !t.is_empty() && set.insert(t.clone()) {
            out.push(t);
        }
    };

    push(normalize(primary));
    push(normalize(&strip_suffixes(primary)));
    if let Some(e) = english {
        push(normalize(e));
        push(normalize(&strip_suffixes(e)));
    }
    if let Some(j) = japanese {
        push(normalize(j));
    }
    for syn in synonyms {
        push(normalize(syn));
        push(normalize(&strip_suffixes(syn)));
    }
    out
}

/// L1: type class must match and years must be within one of each other.
/// Either side lacking a year passes the year check.
fn quick_filters(catalog: &CatalogRecord, scraped: &ScrapedCandidate) -> bool {
    let type_match = match (catalog.kind, TitleKind::from_scraped(&scraped.kind)) {
        (Some(c), Some(s)) => c == s,
        _ => false,
    };

    let year_match = match (catalog.year, scraped.year) {
        (Some(c), Some(s)) => (c - s).abs() <= 1,
        _ => true,
    };

    type_match && year_match
}

/// L2: best pairwise similarity across both full title-variant sets, 0-100.
fn title_similarity(catalog: &CatalogRecord, scraped: &ScrapedCandidate) -> f64 {
    let catalog_titles = title_variants(
        &catalog.title,
        catalog.title_english.as_deref(),
        catalog.title_japanese.as_deref(),
        &catalog.title_synonyms,
    );
    let scraped_titles = title_variants(
        &scraped.title,
        scraped.title_english.as_deref(),
        scraped.title_japanese.as_deref(),
        &scraped.title_synonyms,
    );

    let mut best = 0.0f64;
    for c in &catalog_titles {
        for s in &scraped_titles {
            best = best.max(dice_similarity(c, s));
        }
    }
    best * 100.0
}

/// L3: +15 for a studio substring match, +10 for an exact source match.
fn metadata_score(catalog: &CatalogRecord, scraped: &ScrapedCandidate) -> f64 {
    let mut score = 0.0;

    if let Some(studio) = scraped.studio.as_deref().filter(|s| !s.is_empty()) {
        let scraped_norm = normalize(studio);
        let matched = catalog.studios.iter().any(|s| {
            let catalog_norm = normalize(s);
            catalog_norm == scraped_norm
                || catalog_norm.contains(&scraped_norm)
                || scraped_norm.contains(&catalog_norm)
        });
        if matched {
            score += 15.0;
        }
    }

    if let (Some(c), Some(s)) = (catalog.source.as_deref(), scraped.source.as_deref()) {
        if !c.is_empty() && !s.is_empty() && normalize(c) == normalize(s) {
            score += 10.0;
        }
    }

    score
}

fn is_special_content(title: &str, kind: &str) -> bool {
    let title = title.to_lowercase();
    let kind = kind.to_lowercase();

    let keyword_hit = SPECIAL_KEYWORDS.iter().any(|k| title.contains(k));
    let non_tv_type =
        !kind.is_empty() && kind != "tv" && !kind.contains("tv") && !kind.contains("serial");

    keyword_hit || non_tv_type
}

/// L4: explicit season ordinals must agree when both titles carry one, and
/// both sides must agree on whether this is special content (OVA/movie vs
/// a TV series).
fn season_valid(catalog: &CatalogRecord, scraped: &ScrapedCandidate) -> bool {
    if let (Some(c), Some(s)) = (
        season_ordinal(&catalog.title),
        season_ordinal(&scraped.title),
    ) {
        if c != s {
            return false;
        }
    }

    let catalog_kind = catalog.kind.map(|k| k.to_string()).unwrap_or_default();
    let catalog_special = is_special_content(&catalog.title, &catalog_kind);
    let scraped_special = is_special_content(&scraped.title, &scraped.kind);

    catalog_special == scraped_special
}

/// Score one scraped candidate against the catalog record.
#[must_use]
pub fn score_candidate(catalog: &CatalogRecord, scraped: &ScrapedCandidate, slug: &str) -> MatchOutcome {
    let quick = quick_filters(catalog, scraped);
    let similarity = title_similarity(catalog, scraped);
    let metadata = metadata_score(catalog, scraped);
    let season_ok = season_valid(catalog, scraped);

    let mut confidence = 0.0;
    if quick {
        confidence += 25.0;
        confidence += similarity * 0.5;
        confidence += metadata;

        if similarity >= 95.0 {
            confidence += 10.0;
        }
        if !season_ok {
            confidence -= 30.0;
        }

        confidence = confidence.clamp(0.0, 100.0);
    }

    let is_match = quick && season_ok && confidence >= ACCEPT_CONFIDENCE;

    MatchOutcome {
        slug: slug.to_string(),
        is_match,
        confidence,
        quick_filters_passed: quick,
        title_similarity: similarity,
        metadata_score: metadata,
        season_valid: season_ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(title: &str, kind: TitleKind, year: i32) -> CatalogRecord {
        CatalogRecord {
            id: 1,
            title: title.to_string(),
            title_english: None,
            title_japanese: None,
            title_synonyms: Vec::new(),
            kind: Some(kind),
            year: Some(year),
            season: None,
            studios: vec!["Studio Foo".to_string()],
            source: Some("Manga".to_string()),
            status: None,
            score: None,
            synopsis: None,
            genres: Vec::new(),
            cover_url: None,
        }
    }

    fn scraped(title: &str, kind: &str, year: i32) -> ScrapedCandidate {
        ScrapedCandidate {
            provider: "samehadaku".to_string(),
            slug: "x".to_string(),
            title: title.to_string(),
            title_english: None,
            title_japanese: None,
            title_synonyms: Vec::new(),
            kind: kind.to_string(),
            year: Some(year),
            season: None,
            studio: Some("Studio Foo".to_string()),
            source: Some("Manga".to_string()),
            episodes: Vec::new(),
        }
    }

    #[test]
    fn identical_titles_match_with_high_confidence() {
        let outcome = score_candidate(
            &catalog("Example Title", TitleKind::Tv, 2023),
            &scraped("Example Title", "TV", 2023),
            "example-title",
        );
        assert!(outcome.is_match);
        // 25 + 50 + 15 + 10 + 10 bonus = 100 (clamped)
        assert!((outcome.confidence - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn type_mismatch_vetoes_even_perfect_titles() {
        let outcome = score_candidate(
            &catalog("Example Title", TitleKind::Movie, 2023),
            &scraped("Example Title", "TV", 2023),
            "example-title",
        );
        assert!(!outcome.is_match);
        assert!(outcome.confidence.abs() < f64::EPSILON);
    }

    #[test]
    fn year_gap_beyond_one_vetoes() {
        let outcome = score_candidate(
            &catalog("Example Title", TitleKind::Tv, 2020),
            &scraped("Example Title", "TV", 2023),
            "example-title",
        );
        assert!(!outcome.quick_filters_passed);
        assert!(!outcome.is_match);
    }

    #[test]
    fn season_ordinal_mismatch_always_rejects() {
        let outcome = score_candidate(
            &catalog("Show Season 2", TitleKind::Tv, 2023),
            &scraped("Show Season 3", "TV", 2023),
            "show-season-3",
        );
        assert!(!outcome.season_valid);
        assert!(!outcome.is_match);
    }

    #[test]
    fn bare_trailing_number_ordinal_mismatch_rejects() {
        let outcome = score_candidate(
            &catalog("Show 2", TitleKind::Tv, 2023),
            &scraped("Show 3", "TV", 2023),
            "show-3",
        );
        assert!(!outcome.season_valid);
        assert!(!outcome.is_match);
    }

    #[test]
    fn compact_s_form_ordinal_mismatch_rejects() {
        let outcome = score_candidate(
            &catalog("Show S2", TitleKind::Tv, 2023),
            &scraped("Show S3", "TV", 2023),
            "show-s3",
        );
        assert!(!outcome.season_valid);
        assert!(!outcome.is_match);
    }

    #[test]
    fn ordinal_agreement_across_marker_spellings_passes() {
        let outcome = score_candidate(
            &catalog("Show Season 2", TitleKind::Tv, 2023),
            &scraped("Show 2", "TV", 2023),
            "show-2",
        );
        assert!(outcome.season_valid);
    }

    #[test]
    fn special_vs_tv_mismatch_rejects() {
        let outcome = score_candidate(
            &catalog("Show: The Movie", TitleKind::Tv, 2023),
            &scraped("Show", "TV", 2023),
            "show",
        );
        assert!(!outcome.season_valid);
        assert!(!outcome.is_match);
    }

    #[test]
    fn confidence_monotonic_in_title_similarity() {
        let base = catalog("Example Title", TitleKind::Tv, 2023);
        let close = score_candidate(&base, &scraped("Example Title", "TV", 2023), "a");
        let far = score_candidate(&base, &scraped("Examble Titling", "TV", 2023), "b");
        let farther = score_candidate(&base, &scraped("Completely Other", "TV", 2023), "c");

        assert!(close.title_similarity > far.title_similarity);
        assert!(far.title_similarity > farther.title_similarity);
        assert!(close.confidence >= far.confidence);
        assert!(far.confidence >= farther.confidence);
    }

    #[test]
    fn dice_similarity_bounds() {
        assert!((dice_similarity("night", "night") - 1.0).abs() < f64::EPSILON);
        assert!(dice_similarity("night", "nacht") > 0.0);
        assert!(dice_similarity("night", "nacht") < 1.0);
        assert!(dice_similarity("ab", "xy").abs() < f64::EPSILON);
    }

    #[test]
    fn missing_year_passes_quick_filter() {
        let mut c = catalog("Example Title", TitleKind::Tv, 2023);
        c.year = None;
        let outcome = score_candidate(&c, &scraped("Example Title", "TV", 2023), "x");
        assert!(outcome.quick_filters_passed);
    }
}
