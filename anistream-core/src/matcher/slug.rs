//! Candidate slug generation.
//!
//! Providers address titles by URL slug, but a catalog title like
//! "Example Season 2" may live at `example-season-2`, `example-s2`,
//! `example-part-2`, or just `example`. This module turns the catalog
//! titles into the candidate set the resolver probes.

use once_cell::sync::Lazy;
use regex::Regex;

static PART_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bpart\s+(\d+)").expect("regex"));
static ORDINAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d+)(?:st|nd|rd|th)\s+season").expect("regex"));
static SEASON_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bseason\s+(\d+)").expect("regex"));
static COUR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bcour\s+(\d+)").expect("regex"));
static ROMAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(I{1,3}|IV|V|VI{1,3}|IX|X)\s*$").expect("regex"));
static SHORT_SEASON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bs(\d+)\s*$").expect("regex"));
static TRAILING_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+(\d+)\s*$").expect("regex"));

static STRIP_SEQUENCE_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\s+part\s+\d+",
        r"(?i)\s+\d+(?:st|nd|rd|th)\s+season",
        r"(?i)\s+season\s+\d+",
        r"(?i)\s+cour\s+\d+",
        r"\s+[IVXivx]+$",
        r"\s+\d+$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("regex"))
    .collect()
});

/// Convert a title to its URL slug form.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;
    for c in text.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if (c.is_whitespace() || c == '-' || c == '_') && !last_dash {
            slug.push('-');
            last_dash = true;
        }
        // other punctuation is dropped entirely
    }
    slug.trim_matches('-').to_string()
}

fn roman_to_number(s: &str) -> Option<u32> {
    match s.to_uppercase().as_str() {
        "I" => Some(1),
        "II" => Some(2),
        "III" => Some(3),
        "IV" => Some(4),
        "V" => Some(5),
        "VI" => Some(6),
        "VII" => Some(7),
        "VIII" => Some(8),
        "IX" => Some(9),
        "X" => Some(10),
        _ => None,
    }
}

/// Extract an explicit sequence marker (part/season/cour number, ordinal
/// season, or a trailing roman numeral I-X) from a title.
#[must_use]
pub fn sequence_number(title: &str) -> Option<u32> {
    for re in [&*PART_RE, &*ORDINAL_RE, &*SEASON_RE, &*COUR_RE] {
        if let Some(caps) = re.captures(title) {
            if let Ok(n) = caps[1].parse() {
                return Some(n);
            }
        }
    }

    ROMAN_RE
        .captures(title)
        .and_then(|caps| roman_to_number(&caps[1]))
}

/// Season ordinal for match validation: everything [`sequence_number`]
/// recognizes plus the compact `S2` form and a bare trailing number.
/// Too aggressive for slug generation, where "Title 100" must stay as-is.
#[must_use]
pub fn season_ordinal(title: &str) -> Option<u32> {
    sequence_number(title)
        .or_else(|| {
            SHORT_SEASON_RE
                .captures(title)
                .and_then(|caps| caps[1].parse().ok())
        })
        .or_else(|| {
            TRAILING_NUMBER_RE
                .captures(title)
                .and_then(|caps| caps[1].parse().ok())
        })
}

/// Title with all sequence markers stripped.
#[must_use]
pub fn base_title(title: &str) -> String {
    let mut out = title.to_string();
    for re in STRIP_SEQUENCE_RES.iter() {
        out = re.replace_all(&out, "").to_string();
    }
    out.trim().to_string()
}

/// Generate the de-duplicated candidate slug list for a catalog record's
/// primary and english titles.
///
/// When either title carries a sequence marker > 1, the base slug is
/// expanded into the provider spelling variants (`-part-n`, `-cour-n`,
/// `-season-n`, `-sn`, `-n`) plus the bare base slug.
#[must_use]
pub fn slug_variations(title: &str, english_title: Option<&str>) -> Vec<String> {
    let mut variations = Vec::new();
    let mut push = |s: String| {
        if !s.is_empty() && !variations.contains(&s) {
            variations.push(s);
        }
    };

    push(slugify(title));
    if let Some(english) = english_title {
        push(slugify(english));
    }

    let seq = sequence_number(title)
        .or_else(|| english_title.and_then(sequence_number));

    if let Some(n) = seq.filter(|&n| n > 1) {
        let mut bases = vec![slugify(&base_title(title))];
        if let Some(english) = english_title {
            let b = slugify(&base_title(english));
            if !bases.contains(&b) {
                bases.push(b);
            }
        }

        for base in &bases {
            if base.is_empty() {
                continue;
            }
            push(format!("{base}-part-{n}"));
            push(format!("{base}-cour-{n}"));
            push(format!("{base}-season-{n}"));
            push(format!("{base}-s{n}"));
            push(format!("{base}-{n}"));
        }
        for base in bases {
            push(base);
        }
    }

    variations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_strips_punctuation_and_collapses() {
        assert_eq!(slugify("Koe no Katachi!"), "koe-no-katachi");
        assert_eq!(slugify("Re:Zero -- Starting Life"), "rezero-starting-life");
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
    }

    #[test]
    fn sequence_numbers_from_all_marker_forms() {
        assert_eq!(sequence_number("Example Season 2"), Some(2));
        assert_eq!(sequence_number("Example 3rd Season"), Some(3));
        assert_eq!(sequence_number("Example Part 4"), Some(4));
        assert_eq!(sequence_number("Example Cour 2"), Some(2));
        assert_eq!(sequence_number("Overlord IV"), Some(4));
        assert_eq!(sequence_number("Plain Title"), None);
    }

    #[test]
    fn season_ordinal_catches_compact_and_bare_trailing_forms() {
        assert_eq!(season_ordinal("Show S2"), Some(2));
        assert_eq!(season_ordinal("Show 3"), Some(3));
        assert_eq!(season_ordinal("Show Season 2"), Some(2));
        assert_eq!(season_ordinal("Overlord IV"), Some(4));
        assert_eq!(season_ordinal("Plain Title"), None);
    }

    #[test]
    fn bare_trailing_number_does_not_expand_slug_variations() {
        assert_eq!(slug_variations("Show 2", None), vec!["show-2"]);
        assert_eq!(sequence_number("Show 2"), None);
    }

    #[test]
    fn variations_for_season_two() {
        let vars = slug_variations("Example Season 2", None);
        for expected in [
            "example-season-2",
            "example-s2",
            "example-2",
            "example-part-2",
            "example-cour-2",
            "example",
        ] {
            assert!(vars.iter().any(|v| v == expected), "missing {expected}");
        }
    }

    #[test]
    fn no_expansion_without_marker() {
        let vars = slug_variations("Plain Title", Some("Plain Title English"));
        assert_eq!(vars, vec!["plain-title", "plain-title-english"]);
    }

    #[test]
    fn season_one_is_not_expanded() {
        let vars = slug_variations("Example Season 1", None);
        assert_eq!(vars, vec!["example-season-1"]);
    }

    #[test]
    fn english_title_marker_also_triggers_expansion() {
        let vars = slug_variations("Kimetsu no Yaiba", Some("Demon Slayer Season 2"));
        assert!(vars.iter().any(|v| v == "kimetsu-no-yaiba-s2"));
        assert!(vars.iter().any(|v| v == "demon-slayer-season-2"));
        assert!(vars.iter().any(|v| v == "demon-slayer"));
    }
}
