//! Packer-obfuscated embeds (vidhidepro family).
//!
//! These pages ship their player setup through the classic
//! `eval(function(p,a,c,k,e,d){...})` packer. Instead of evaluating any
//! script, we reverse the packing as a pure text transform: every
//! standalone base-`a` integer token in the payload is an index into the
//! keyword dictionary, substituted from the highest index down. The
//! unpacked source then yields an object carrying `hls2`/`hls3`/`hls4`
//! tiers under some variable name; the highest present tier wins.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::{http_client, VideoExtractor};
use crate::error::{Error, Result};
use crate::models::RawSource;

static PACKED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)eval\(function\(p,a,c,k,e,d\).*?\}\('(.*?)',\s*(\d+),\s*(\d+),\s*'(.*?)'\.split\('\|'\)",
    )
    .expect("valid regex")
});

static LINKS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"var\s+\w+\s*=\s*(\{[^}]*"hls[^}]*\})"#).expect("valid regex"));

#[derive(Debug, Deserialize)]
struct LinkTiers {
    #[serde(default)]
    hls2: Option<String>,
    #[serde(default)]
    hls3: Option<String>,
    #[serde(default)]
    hls4: Option<String>,
}

impl LinkTiers {
    fn best(self) -> Option<String> {
        self.hls4
            .or(self.hls3)
            .or(self.hls2)
            .filter(|u| !u.is_empty())
    }
}

/// Render `value` in base `radix` the way the packer indexes its
/// dictionary (lowercase digits, `0` for zero).
fn to_radix(mut value: usize, radix: usize) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[value % radix]);
        value /= radix;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Reverse one packed payload. Tokens are replaced from the highest
/// dictionary index down so multi-digit tokens are consumed before their
/// prefixes.
fn unpack(payload: &str, radix: usize, count: usize, dictionary: &[&str]) -> Result<String> {
    if !(2..=36).contains(&radix) {
        return Err(Error::Parse(format!("packed radix {radix} out of range")));
    }
    if count > dictionary.len() {
        return Err(Error::Parse(format!(
            "packed token count {count} exceeds dictionary size {}",
            dictionary.len()
        )));
    }
    let mut source = payload.to_string();
    for index in (0..count).rev() {
        let word = dictionary[index];
        if word.is_empty() {
            continue;
        }
        let token = to_radix(index, radix);
        let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(&token)))
            .map_err(|err| Error::Parse(format!("bad token pattern: {err}")))?;
        source = pattern.replace_all(&source, word).into_owned();
    }
    Ok(source)
}

/// Find and reverse the packer call in a page, if present.
pub fn unpack_page(page: &str) -> Result<Option<String>> {
    let Some(caps) = PACKED_RE.captures(page) else {
        return Ok(None);
    };
    let payload = &caps[1];
    let radix: usize = caps[2]
        .parse()
        .map_err(|_| Error::Parse("packed radix is not a number".to_string()))?;
    let count: usize = caps[3]
        .parse()
        .map_err(|_| Error::Parse("packed count is not a number".to_string()))?;
    let dictionary: Vec<&str> = caps[4].split('|').collect();
    unpack(payload, radix, count, &dictionary).map(Some)
}

/// Make a tier URL fetchable: scheme-relative and root-relative forms are
/// absolutized against the embed page.
fn absolutize(raw: &str, embed_url: &str) -> Result<String> {
    if raw.starts_with("//") {
        return Ok(format!("https:{raw}"));
    }
    if raw.starts_with('/') {
        let embed = Url::parse(embed_url)
            .map_err(|err| Error::Parse(format!("bad embed URL {embed_url}: {err}")))?;
        let origin = embed.origin().ascii_serialization();
        return Ok(format!("{origin}{raw}"));
    }
    Ok(raw.to_string())
}

pub struct PackedScriptExtractor {
    client: reqwest::Client,
    host_needles: Vec<String>,
}

impl PackedScriptExtractor {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self::with_hosts(
            timeout,
            vec![
                "vidhidepro.com".to_string(),
                "vidhideplus.com".to_string(),
                "callistanise.com".to_string(),
            ],
        )
    }

    #[must_use]
    pub fn with_hosts(timeout: Duration, host_needles: Vec<String>) -> Self {
        Self {
            client: http_client(timeout),
            host_needles,
        }
    }

    fn parse(page: &str, embed_url: &str) -> Result<Option<String>> {
        let Some(unpacked) = unpack_page(page)? else {
            return Ok(None);
        };
        let Some(caps) = LINKS_RE.captures(&unpacked) else {
            return Ok(None);
        };
        let tiers: LinkTiers = serde_json::from_str(&caps[1])
            .map_err(|err| Error::Parse(format!("links object is not valid JSON: {err}")))?;
        match tiers.best() {
            Some(raw) => absolutize(&raw, embed_url).map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl VideoExtractor for PackedScriptExtractor {
    fn name(&self) -> &'static str {
        "packed-script"
    }

    fn matches(&self, url: &str) -> bool {
        self.host_needles.iter().any(|n| url.contains(n.as_str()))
    }

    async fn extract(&self, source: &RawSource) -> Result<Option<String>> {
        let page = self
            .client
            .get(&source.embed_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Self::parse(&page, &source.embed_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_radix_matches_packer_encoding() {
        assert_eq!(to_radix(0, 36), "0");
        assert_eq!(to_radix(10, 36), "a");
        assert_eq!(to_radix(35, 36), "z");
        assert_eq!(to_radix(36, 36), "10");
        assert_eq!(to_radix(46, 36), "1a");
    }

    #[test]
    fn unpack_substitutes_tokens_high_to_low() {
        // payload "0 1 2" with dictionary ["var","links","sources"]
        let out = unpack("0 1 2", 36, 3, &["var", "links", "sources"]).expect("unpack");
        assert_eq!(out, "var links sources");
    }

    #[test]
    fn empty_dictionary_words_keep_the_token() {
        let out = unpack("0.1(2)", 10, 3, &["a", "", "c"]).expect("unpack");
        assert_eq!(out, "a.1(c)");
    }

    #[test]
    fn unpack_page_round_trip_picks_highest_tier() {
        let page = concat!(
            "<script>eval(function(p,a,c,k,e,d){e=function(c){return c};",
            "if(!''.replace(/^/,String)){while(c--){d[c]=k[c]||c}k=[function(e){return d[e]}];",
            "e=function(){return'\\\\w+'};c=1};while(c--){if(k[c]){",
            "p=p.replace(new RegExp('\\\\b'+e(c)+'\\\\b','g'),k[c])}}return p}",
            "('1 0={\"2\":\"/3/4.5\"};',6,6,'links|var|hls4|stream|master|m3u8'.split('|')",
            ",0,{}))</script>"
        );
        let url = PackedScriptExtractor::parse(page, "https://vidhidepro.com/embed/abc")
            .expect("parse")
            .expect("url");
        assert_eq!(url, "https://vidhidepro.com/stream/master.m3u8");
    }

    #[test]
    fn tier_object_is_found_under_any_variable_name() {
        let unpacked = r#"player.setup();var z9x={"hls2":"","hls4":"/s/m.m3u8"};"#;
        let caps = LINKS_RE.captures(unpacked).expect("tier object");
        assert_eq!(&caps[1], r#"{"hls2":"","hls4":"/s/m.m3u8"}"#);
    }

    #[test]
    fn objects_without_hls_keys_are_ignored() {
        assert!(LINKS_RE.captures(r#"var config={"width":640};"#).is_none());
    }

    #[test]
    fn scheme_relative_urls_gain_https() {
        let got = absolutize("//cdn.example/v/master.m3u8", "https://vidhidepro.com/e/1")
            .expect("absolutize");
        assert_eq!(got, "https://cdn.example/v/master.m3u8");
    }

    #[test]
    fn absolute_urls_pass_through() {
        let got = absolutize(
            "https://cdn.example/v/master.m3u8",
            "https://vidhidepro.com/e/1",
        )
        .expect("absolutize");
        assert_eq!(got, "https://cdn.example/v/master.m3u8");
    }

    #[test]
    fn page_without_packer_yields_none() {
        let got =
            PackedScriptExtractor::parse("<html>plain</html>", "https://vidhidepro.com/e/1")
                .expect("parse");
        assert_eq!(got, None);
    }
}
