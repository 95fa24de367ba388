//! The one capability the pipeline consumes: fetch JSON from a URL.
//!
//! [`JsonFetcher`] is the seam; [`HttpFetcher`] is the reqwest-backed
//! implementation that injects the bearer token, `Accept` and `User-Agent`
//! headers, and a per-request timeout. [`ApiEndpoints`] builds the upstream
//! URLs from a configurable API root.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Url;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::aggregate::Window;
use crate::config::GithubConfig;
use crate::error::{FetchError, FetchResult};

/// Maximum page size the upstream accepts; only one page is ever requested.
pub const PAGE_SIZE: usize = 100;

const ACCEPT_JSON: &str = "application/vnd.github+json";

/// Fetch a JSON document.
///
/// Implementations must map non-success statuses to
/// [`FetchError::Status`] so callers can tell a 403 from a 404.
#[async_trait]
pub trait JsonFetcher: Send + Sync {
    /// GET `url` and return the parsed body.
    async fn get_json(&self, url: &str) -> FetchResult<Value>;
}

/// GET `url` and deserialize the body into `T`.
pub async fn get_as<T: DeserializeOwned>(fetcher: &dyn JsonFetcher, url: &str) -> FetchResult<T> {
    let value = fetcher.get_json(url).await?;
    serde_json::from_value(value).map_err(|source| FetchError::Decode {
        url: url.to_string(),
        source,
    })
}

/// [`JsonFetcher`] over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client from the `[github]` configuration.
    pub fn new(config: &GithubConfig) -> FetchResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON));
        if let Some(token) = config.token() {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                .map_err(|e| FetchError::Client(format!("invalid token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent())
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl JsonFetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn get_json(&self, url: &str) -> FetchResult<Value> {
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        debug!(status = status.as_u16(), "response received");
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await.map_err(transport)?;
        serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

/// Builds upstream URLs relative to an API root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    base: String,
}

impl ApiEndpoints {
    /// Endpoints rooted at `base` (a trailing slash is ignored).
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// `GET /users/{account}/repos`, most recently updated first.
    pub fn user_repos(&self, account: &str) -> FetchResult<String> {
        self.url(
            &["users", account, "repos"],
            &[
                ("sort", "updated".to_string()),
                ("per_page", PAGE_SIZE.to_string()),
                ("type", "owner".to_string()),
            ],
        )
    }

    /// `GET /repos/{account}/{repo}/commits` authored by `account` in `window`.
    pub fn repo_commits(&self, account: &str, repo: &str, window: &Window) -> FetchResult<String> {
        self.url(
            &["repos", account, repo, "commits"],
            &[
                ("since", start_of_day(window.start())),
                ("until", end_of_day(window.end())),
                ("per_page", PAGE_SIZE.to_string()),
                ("author", account.to_string()),
            ],
        )
    }

    /// Appends `segments` to the base path; each one is percent-encoded.
    fn url(&self, segments: &[&str], query: &[(&str, String)]) -> FetchResult<String> {
        let mut url = Url::parse(&self.base)
            .map_err(|e| FetchError::Client(format!("invalid URL {}: {e}", self.base)))?;
        url.path_segments_mut()
            .map_err(|()| FetchError::Client(format!("{} cannot be an API root", self.base)))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut().extend_pairs(query);
        Ok(url.into())
    }
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_API_URL)
    }
}

fn start_of_day(date: NaiveDate) -> String {
    format!("{}T00:00:00Z", date.format("%Y-%m-%d"))
}

fn end_of_day(date: NaiveDate) -> String {
    format!("{}T23:59:59Z", date.format("%Y-%m-%d"))
}
