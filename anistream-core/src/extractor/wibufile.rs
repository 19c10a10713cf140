//! Wibufile embeds.
//!
//! Two hops: the embed page (which demands a referer) reveals a JSON API
//! URL in its player setup, and that API answers with a `sources` array of
//! file URLs. The API call must carry the embed page as its referer or it
//! returns an empty body.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;

use super::{http_client, VideoExtractor};
use crate::error::{Error, Result};
use crate::models::RawSource;

const EMBED_REFERER: &str = "https://samehadaku.now/";

static API_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"url:\s*['"](?:https?:)?//(api\.wibufile\.com/api/\?[^'"]+)['"]"#)
        .expect("valid regex")
});

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    sources: Vec<ApiSource>,
}

#[derive(Debug, Deserialize)]
struct ApiSource {
    file: String,
}

pub struct WibufileExtractor {
    client: reqwest::Client,
}

impl WibufileExtractor {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
        }
    }

    fn api_url(page: &str) -> Option<String> {
        API_URL_RE
            .captures(page)
            .map(|caps| format!("https://{}", &caps[1]))
    }

    fn pick_source(response: ApiResponse) -> Option<String> {
        if response.status.as_deref() == Some("error") {
            return None;
        }
        response
            .sources
            .into_iter()
            .map(|s| s.file)
            .find(|f| !f.is_empty())
    }
}

#[async_trait]
impl VideoExtractor for WibufileExtractor {
    fn name(&self) -> &'static str {
        "wibufile"
    }

    fn matches(&self, url: &str) -> bool {
        url.contains("wibufile.com")
    }

    async fn extract(&self, source: &RawSource) -> Result<Option<String>> {
        let page = self
            .client
            .get(&source.embed_url)
            .header(reqwest::header::REFERER, EMBED_REFERER)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let Some(api_url) = Self::api_url(&page) else {
            return Ok(None);
        };

        let response: ApiResponse = self
            .client
            .get(&api_url)
            .header(reqwest::header::REFERER, source.embed_url.as_str())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|err| Error::Parse(format!("wibufile API body is not JSON: {err}")))?;

        Ok(Self::pick_source(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_api_url_in_player_setup() {
        let page = r#"<script>jwplayer().setup({url: "//api.wibufile.com/api/?v=abc123&sig=x",});</script>"#;
        assert_eq!(
            WibufileExtractor::api_url(page),
            Some("https://api.wibufile.com/api/?v=abc123&sig=x".to_string())
        );
    }

    #[test]
    fn first_nonempty_source_wins() {
        let response = ApiResponse {
            status: Some("ok".to_string()),
            sources: vec![
                ApiSource { file: String::new() },
                ApiSource {
                    file: "https://cdn.wibufile.com/v/ep1.mp4".to_string(),
                },
            ],
        };
        assert_eq!(
            WibufileExtractor::pick_source(response),
            Some("https://cdn.wibufile.com/v/ep1.mp4".to_string())
        );
    }

    #[test]
    fn error_status_yields_none() {
        let response = ApiResponse {
            status: Some("error".to_string()),
            sources: vec![ApiSource {
                file: "https://cdn.wibufile.com/v/ep1.mp4".to_string(),
            }],
        };
        assert_eq!(WibufileExtractor::pick_source(response), None);
    }
}
