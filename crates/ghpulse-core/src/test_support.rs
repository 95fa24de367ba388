//! In-memory [`JsonFetcher`] and fixture builders for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{FetchError, FetchResult};
use crate::http::JsonFetcher;
use crate::repos::Repository;

enum Canned {
    Json(Value),
    Status(u16),
}

/// Serves canned responses by exact URL; unknown URLs answer 404.
#[derive(Default)]
pub struct StubFetcher {
    responses: HashMap<String, Canned>,
    delay: Option<Duration>,
    requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json(mut self, url: &str, body: Value) -> Self {
        self.responses.insert(url.to_string(), Canned::Json(body));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.responses.insert(url.to_string(), Canned::Status(status));
        self
    }

    /// Sleep this long inside every request so concurrent callers overlap.
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// URLs requested so far, in call order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Highest number of requests that were outstanding at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JsonFetcher for StubFetcher {
    async fn get_json(&self, url: &str) -> FetchResult<Value> {
        self.requests.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match self.responses.get(url) {
            Some(Canned::Json(body)) => Ok(body.clone()),
            Some(Canned::Status(status)) => Err(FetchError::Status {
                status: *status,
                url: url.to_string(),
            }),
            None => Err(FetchError::Status {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}

/// Detail URL used by [`commit_json`] for `sha`.
pub fn commit_url(sha: &str) -> String {
    format!("https://api.github.com/repos/octocat/commits/{sha}")
}

/// A commit summary as the commit listing returns it.
pub fn commit_json(sha: &str, date: &str) -> Value {
    json!({
        "sha": sha,
        "url": commit_url(sha),
        "commit": {
            "author": {"name": "Octo Cat", "email": "octo@example.com", "date": date},
            "message": format!("commit {sha}")
        }
    })
}

/// A commit detail document with line statistics.
pub fn detail_json(additions: u64, deletions: u64) -> Value {
    json!({"stats": {"additions": additions, "deletions": deletions, "total": additions + deletions}})
}

/// A repository record as the listing returns it.
pub fn repo_json(id: u64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "owner": {"login": "octocat"},
        "description": null,
        "stargazers_count": 0,
        "forks_count": 0,
        "html_url": format!("https://github.com/octocat/{name}"),
        "language": null,
        "updated_at": "2024-03-01T00:00:00Z"
    })
}

/// A decoded repository matching [`repo_json`].
pub fn repo(id: u64, name: &str) -> Repository {
    Repository {
        id,
        name: name.to_string(),
        owner: "octocat".to_string(),
        description: None,
        stargazers_count: 0,
        forks_count: 0,
        html_url: format!("https://github.com/octocat/{name}"),
        language: None,
        updated_at: None,
    }
}
