use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

/// Broad catalog type class used by the identity quick filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleKind {
    Tv,
    Movie,
    Ova,
    Ona,
    Special,
}

impl TitleKind {
    /// Lenient classification of a scraped type string ("TV Series",
    /// "Serial TV", "Movie", ...). Returns `None` when nothing matches.
    #[must_use]
    pub fn from_scraped(raw: &str) -> Option<Self> {
        let t = raw.to_lowercase();
        if t.contains("tv") || t.contains("serial") {
            Some(Self::Tv)
        } else if t.contains("movie") || t.contains("film") {
            Some(Self::Movie)
        } else if t.contains("ova") {
            Some(Self::Ova)
        } else if t.contains("ona") {
            Some(Self::Ona)
        } else if t.contains("special") {
            Some(Self::Special)
        } else {
            None
        }
    }
}

impl std::fmt::Display for TitleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Tv => "tv",
            Self::Movie => "movie",
            Self::Ova => "ova",
            Self::Ona => "ona",
            Self::Special => "special",
        };
        write!(f, "{s}")
    }
}

/// Immutable snapshot of one title from the canonical catalog service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: u32,
    pub title: String,
    pub title_english: Option<String>,
    pub title_japanese: Option<String>,
    #[serde(default)]
    pub title_synonyms: Vec<String>,
    pub kind: Option<TitleKind>,
    pub year: Option<i32>,
    pub season: Option<String>,
    #[serde(default)]
    pub studios: Vec<String>,
    pub source: Option<String>,
    pub status: Option<String>,
    pub score: Option<f64>,
    pub synopsis: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub cover_url: Option<String>,
}

/// One episode as listed on a provider's detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedEpisode {
    pub number: u32,
    pub title: Option<String>,
    pub url: String,
    pub release_date: Option<String>,
}

/// One title as scraped from a provider. Ephemeral: lives only within a
/// single resolution or aggregation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedCandidate {
    pub provider: String,
    pub slug: String,
    pub title: String,
    pub title_english: Option<String>,
    pub title_japanese: Option<String>,
    #[serde(default)]
    pub title_synonyms: Vec<String>,
    /// Raw type string as shown on the site ("TV", "Serial TV", ...).
    pub kind: String,
    pub year: Option<i32>,
    pub season: Option<String>,
    pub studio: Option<String>,
    pub source: Option<String>,
    #[serde(default)]
    pub episodes: Vec<ScrapedEpisode>,
}

/// Per-provider resolution outcome for one catalog id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSlug {
    pub slug: Option<String>,
    pub confidence: Option<u8>,
}

/// Persisted catalog-id -> per-provider slug mapping.
///
/// At most one row per catalog id. A non-null slug is authoritative and is
/// never re-probed automatically; a null slug stays eligible for
/// re-resolution once the caller explicitly invalidates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlugMapping {
    pub catalog_id: u32,
    pub providers: HashMap<String, ProviderSlug>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SlugMapping {
    #[must_use]
    pub fn slug_for(&self, provider: &str) -> Option<&str> {
        self.providers
            .get(provider)
            .and_then(|p| p.slug.as_deref())
    }

    /// Providers that resolved to a usable slug.
    pub fn resolved_providers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.providers
            .iter()
            .filter_map(|(name, p)| p.slug.as_deref().map(|s| (name.as_str(), s)))
    }
}

/// Fixed resolution ranking: 1080p > 720p > 480p > 360p > unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "360p")]
    P360,
    Unknown,
}

impl Resolution {
    /// Higher rank is better quality.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::P1080 => 4,
            Self::P720 => 3,
            Self::P480 => 2,
            Self::P360 => 1,
            Self::Unknown => 0,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::P1080 => "1080p",
            Self::P720 => "720p",
            Self::P480 => "480p",
            Self::P360 => "360p",
            Self::Unknown => "unknown",
        }
    }
}

impl FromStr for Resolution {
    type Err = std::convert::Infallible;

    /// Lenient: "1080p", "HD 1080", "FullHD 1080P" all map to `P1080`;
    /// anything unrecognized is `Unknown`, never an error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let l = s.to_lowercase();
        Ok(if l.contains("1080") {
            Self::P1080
        } else if l.contains("720") {
            Self::P720
        } else if l.contains("480") {
            Self::P480
        } else if l.contains("360") {
            Self::P360
        } else {
            Self::Unknown
        })
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl PartialOrd for Resolution {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Resolution {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// One embed reference scraped from a provider's episode page, before
/// extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSource {
    pub provider: String,
    pub embed_url: String,
    pub resolution: Resolution,
    pub server: u32,
    pub title_hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageTier {
    /// Freshly extracted from the provider this request.
    Fresh,
    /// Served from the external archival ledger.
    Archived,
}

/// A raw source enriched with its extraction result and delivery handle.
///
/// The delivery code is globally unique and immutably bound to this one
/// snapshot for its 24h lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingSource {
    #[serde(flatten)]
    pub raw: RawSource,
    pub resolved_url: Option<String>,
    pub code: String,
    pub tier: StorageTier,
}

/// Ledger row for an episode copy that was archived to cold storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedVideo {
    pub catalog_id: u32,
    pub episode: u32,
    pub resolution: Resolution,
    pub server: u32,
    pub file_name: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_rank_is_total() {
        assert!(Resolution::P1080 > Resolution::P720);
        assert!(Resolution::P720 > Resolution::P480);
        assert!(Resolution::P480 > Resolution::P360);
        assert!(Resolution::P360 > Resolution::Unknown);
    }

    #[test]
    fn resolution_parses_leniently() {
        assert_eq!("1080p".parse::<Resolution>().ok(), Some(Resolution::P1080));
        assert_eq!(
            "HD 720".parse::<Resolution>().ok(),
            Some(Resolution::P720)
        );
        assert_eq!(
            "whatever".parse::<Resolution>().ok(),
            Some(Resolution::Unknown)
        );
    }

    #[test]
    fn title_kind_from_scraped_strings() {
        assert_eq!(TitleKind::from_scraped("Serial TV"), Some(TitleKind::Tv));
        assert_eq!(TitleKind::from_scraped("Movie"), Some(TitleKind::Movie));
        assert_eq!(TitleKind::from_scraped("OVA"), Some(TitleKind::Ova));
        assert_eq!(TitleKind::from_scraped("Donghua"), None);
    }
}
