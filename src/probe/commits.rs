//! Commit-listing probe
//!
//! Watches the newest commit touching one path of a GitHub repository.
//! Fingerprint = commit SHA; detail = commit timestamp and browsable URL.

use std::future::Future;
use std::pin::Pin;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;

use super::{Probe, FETCH_TIMEOUT};
use crate::contracts::{Observation, TargetDetail};
use crate::error::{MonitorError, Result};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("upstream-monitor/", env!("CARGO_PKG_VERSION"));

/// Probe for the newest commit touching a repository path
pub struct CommitProbe {
    client: reqwest::Client,
    owner: String,
    repo: String,
    path: String,
    api_base: String,
}

impl CommitProbe {
    /// Create a probe for `owner/repo` restricted to `path`. The optional
    /// token is sent as a bearer Authorization header.
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        path: impl Into<String>,
        token: Option<&str>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| MonitorError::config("token contains invalid header characters"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|err| MonitorError::Probe(format!("cannot build HTTP client: {}", err)))?;

        Ok(Self {
            client,
            owner: owner.into(),
            repo: repo.into(),
            path: path.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }

    /// Override the API base URL (tests)
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Stable identifier of the monitored path
    pub fn target_id(&self) -> String {
        format!("{}/{}:{}", self.owner, self.repo, self.path)
    }

    async fn fetch_latest(&self) -> std::result::Result<Observation, String> {
        let url = format!("{}/repos/{}/{}/commits", self.api_base, self.owner, self.repo);
        let response = self
            .client
            .get(&url)
            .query(&[("path", self.path.as_str()), ("per_page", "1")])
            .send()
            .await
            .map_err(|err| format!("fetch failed: {}", err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("commit listing returned status {}", status.as_u16()));
        }

        let entries: Vec<CommitEntry> = response
            .json()
            .await
            .map_err(|err| format!("malformed commit listing: {}", err))?;

        let entry = entries
            .into_iter()
            .next()
            .ok_or_else(|| "no commit data returned".to_string())?;

        Ok(Observation::resolved(
            self.target_id(),
            entry.sha,
            TargetDetail {
                timestamp: entry.commit.and_then(|c| c.committer).and_then(|c| c.date),
                url: entry.html_url,
            },
        ))
    }
}

impl Probe for CommitProbe {
    fn id(&self) -> &str {
        "commits"
    }

    fn observe(&self) -> Pin<Box<dyn Future<Output = Vec<Observation>> + Send + '_>> {
        Box::pin(async move {
            match self.fetch_latest().await {
                Ok(observation) => vec![observation],
                Err(error) => {
                    tracing::warn!(target_id = %self.target_id(), %error, "commit probe failed");
                    vec![Observation::failed(self.target_id(), error)]
                }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct CommitEntry {
    sha: String,
    html_url: Option<String>,
    commit: Option<CommitMeta>,
}

#[derive(Debug, Deserialize)]
struct CommitMeta {
    committer: Option<CommitSignature>,
}

#[derive(Debug, Deserialize)]
struct CommitSignature {
    date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn commit_listing() -> serde_json::Value {
        serde_json::json!([{
            "sha": "abc123",
            "html_url": "https://github.com/sykefi/Ryhti-rajapintakuvaukset/commit/abc123",
            "commit": {"committer": {"date": "2026-01-02T03:04:05Z"}}
        }])
    }

    #[tokio::test]
    async fn test_parses_newest_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/sykefi/Ryhti-rajapintakuvaukset/commits"))
            .and(query_param("path", "OpenApi"))
            .and(query_param("per_page", "1"))
            .and(header("accept", "application/vnd.github+json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(commit_listing()))
            .mount(&server)
            .await;

        let probe = CommitProbe::new("sykefi", "Ryhti-rajapintakuvaukset", "OpenApi", None)
            .unwrap()
            .with_api_base(server.uri());

        let observations = probe.observe().await;
        assert_eq!(observations.len(), 1);

        let obs = &observations[0];
        assert_eq!(obs.target_id, "sykefi/Ryhti-rajapintakuvaukset:OpenApi");
        assert_eq!(obs.fingerprint.as_deref(), Some("abc123"));
        assert_eq!(obs.detail.timestamp.as_deref(), Some("2026-01-02T03:04:05Z"));
        assert!(obs.fetch_error.is_none());
    }

    #[tokio::test]
    async fn test_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer ghp_secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(commit_listing()))
            .expect(1)
            .mount(&server)
            .await;

        let probe = CommitProbe::new("o", "r", "p", Some("ghp_secret"))
            .unwrap()
            .with_api_base(server.uri());

        let observations = probe.observe().await;
        assert!(observations[0].fetch_error.is_none());
    }

    #[tokio::test]
    async fn test_error_status_degrades_to_failed_observation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let probe = CommitProbe::new("o", "r", "p", None)
            .unwrap()
            .with_api_base(server.uri());

        let observations = probe.observe().await;
        let obs = &observations[0];
        assert!(obs.fingerprint.is_none());
        assert!(obs.fetch_error.as_deref().unwrap().contains("403"));
    }

    #[tokio::test]
    async fn test_empty_listing_degrades_to_failed_observation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let probe = CommitProbe::new("o", "r", "p", None)
            .unwrap()
            .with_api_base(server.uri());

        let observations = probe.observe().await;
        assert_eq!(
            observations[0].fetch_error.as_deref(),
            Some("no commit data returned")
        );
    }
}
