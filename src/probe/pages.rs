//! Rendered-page version probe
//!
//! Watches a set of web pages each encoding a semantic-model version.
//! Fingerprint = version token, preferring a `ver=` query parameter of the
//! final resolved URL over a textual pattern in the page body.

use std::future::Future;
use std::pin::Pin;
use std::sync::OnceLock;

use futures::future::join_all;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};

use super::{Probe, FETCH_TIMEOUT};
use crate::contracts::{Observation, TargetDetail};
use crate::error::{MonitorError, Result};

// Browser-like headers; the monitored pages reject obvious bot fetches.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const BROWSER_ACCEPT_LANGUAGE: &str = "fi-FI,fi;q=0.9,en-US;q=0.8,en;q=0.7";

fn param_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)[?&]ver=([0-9]+\.[0-9]+\.[0-9]+)\b").unwrap())
}

fn body_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bVersio\s+([0-9]+\.[0-9]+\.[0-9]+)\b").unwrap())
}

/// Extract a version token from the resolved URL and page body.
///
/// Preference order: `ver=` parameter in the final URL, `Versio x.y.z` in
/// the body, then any `ver=` fragment the page embeds in links.
pub fn extract_version(final_url: &str, body: &str) -> Option<String> {
    if let Some(captures) = param_re().captures(final_url) {
        return Some(captures[1].to_string());
    }
    if let Some(captures) = body_re().captures(body) {
        return Some(captures[1].to_string());
    }
    param_re()
        .captures(body)
        .map(|captures| captures[1].to_string())
}

/// Probe for a set of version-bearing pages
pub struct PageProbe {
    client: reqwest::Client,
    urls: Vec<String>,
}

impl PageProbe {
    pub fn new(urls: Vec<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|err| MonitorError::Probe(format!("cannot build HTTP client: {}", err)))?;

        Ok(Self { client, urls })
    }

    async fn fetch_page(&self, url: &str) -> Observation {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(%url, error = %err, "page fetch failed");
                return Observation::failed(url, format!("fetch failed: {}", err));
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%url, status = status.as_u16(), "page fetch rejected");
            return Observation::failed(url, format!("page returned status {}", status.as_u16()));
        }

        // Redirects were followed; the version may live in the final URL.
        let resolved_url = response.url().to_string();
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                return Observation::failed(url, format!("cannot read page body: {}", err));
            }
        };

        let detail = TargetDetail {
            timestamp: None,
            url: Some(resolved_url.clone()),
        };

        match extract_version(&resolved_url, &body) {
            Some(version) => Observation::resolved(url, version, detail),
            None => Observation::failed(
                url,
                format!("version token not found (resolved: {})", resolved_url),
            )
            .with_detail(detail),
        }
    }
}

impl Probe for PageProbe {
    fn id(&self) -> &str {
        "pages"
    }

    fn observe(&self) -> Pin<Box<dyn Future<Output = Vec<Observation>> + Send + '_>> {
        Box::pin(async move {
            let fetches = self.urls.iter().map(|url| self.fetch_page(url));
            join_all(fetches).await
        })
    }
}
