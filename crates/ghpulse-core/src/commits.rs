//! Per-repository commit listing and per-commit line statistics.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::aggregate::Window;
use crate::error::FetchResult;
use crate::http::{self, ApiEndpoints, JsonFetcher, PAGE_SIZE};
use crate::repos::Repository;

/// A commit authored by the account, as returned by the commit listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRef {
    /// Commit hash.
    pub sha: String,
    /// API URL of the commit detail document.
    pub url: String,
    /// Author timestamp (UTC).
    pub authored_at: DateTime<Utc>,
    /// Name of the repository the commit belongs to.
    pub repository: String,
}

impl CommitRef {
    /// Calendar day (UTC) the commit is bucketed under.
    pub fn day(&self) -> NaiveDate {
        self.authored_at.date_naive()
    }
}

/// Line changes of a single commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStats {
    /// Lines added.
    pub additions: u64,
    /// Lines deleted.
    pub deletions: u64,
}

/// One page of a repository's commit listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitPage {
    /// Commits that carry an author date, in listing order.
    pub commits: Vec<CommitRef>,
    /// The upstream returned a full page, so older commits were not seen.
    /// Counted before undated summaries are dropped.
    pub truncated: bool,
}

#[derive(Deserialize)]
struct CommitSummary {
    sha: String,
    url: String,
    commit: CommitBody,
}

#[derive(Deserialize)]
struct CommitBody {
    author: Option<Signature>,
}

#[derive(Deserialize)]
struct Signature {
    date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct CommitDetail {
    stats: Option<CommitStats>,
}

/// Commits in `repository` authored by `account` within `window`.
///
/// Only the first page (up to [`PAGE_SIZE`] commits) is requested; whether
/// it was full is reported in [`CommitPage::truncated`]. Summaries without an
/// author date are skipped since they cannot be bucketed.
#[instrument(skip(fetcher, endpoints, repository, window), fields(repository = %repository.name))]
pub async fn list_commits(
    fetcher: &dyn JsonFetcher,
    endpoints: &ApiEndpoints,
    account: &str,
    repository: &Repository,
    window: &Window,
) -> FetchResult<CommitPage> {
    let url = endpoints.repo_commits(account, &repository.name, window)?;
    let summaries: Vec<CommitSummary> = http::get_as(fetcher, &url).await?;
    let truncated = summaries.len() >= PAGE_SIZE;
    if truncated {
        debug!(limit = PAGE_SIZE, "commit listing filled a page; older commits are not included");
    }

    let commits: Vec<CommitRef> = summaries
        .into_iter()
        .filter_map(|summary| {
            let Some(authored_at) = summary.commit.author.and_then(|a| a.date) else {
                debug!(sha = %summary.sha, "commit has no author date, skipping");
                return None;
            };
            Some(CommitRef {
                sha: summary.sha,
                url: summary.url,
                authored_at,
                repository: repository.name.clone(),
            })
        })
        .collect();

    debug!(count = commits.len(), "listed commits");
    Ok(CommitPage { commits, truncated })
}

/// Line statistics for `commit`.
///
/// `Ok(None)` means the detail document carried no `stats` object.
#[instrument(skip(fetcher, commit), fields(sha = %commit.sha))]
pub async fn fetch_commit_stats(
    fetcher: &dyn JsonFetcher,
    commit: &CommitRef,
) -> FetchResult<Option<CommitStats>> {
    let detail: CommitDetail = http::get_as(fetcher, &commit.url).await?;
    Ok(detail.stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::test_support::{StubFetcher, commit_json, repo};
    use serde_json::json;

    fn window() -> Window {
        Window::new("2024-03-01".parse().unwrap(), "2024-03-31".parse().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn list_commits_maps_summaries_to_refs() {
        let endpoints = ApiEndpoints::default();
        let url = endpoints.repo_commits("octocat", "api", &window()).unwrap();
        let fetcher = StubFetcher::new().with_json(
            &url,
            json!([
                commit_json("a1", "2024-03-04T23:59:59Z"),
                commit_json("b2", "2024-03-05T00:00:00Z"),
            ]),
        );

        let commits = list_commits(&fetcher, &endpoints, "octocat", &repo(1, "api"), &window())
            .await
            .unwrap()
            .commits;

        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].sha, "a1");
        assert_eq!(commits[0].repository, "api");
        assert_eq!(commits[0].day(), "2024-03-04".parse::<NaiveDate>().unwrap());
        assert_eq!(commits[1].day(), "2024-03-05".parse::<NaiveDate>().unwrap());
        assert!(commits[1].url.ends_with("/commits/b2"));
    }

    #[tokio::test]
    async fn offset_timestamps_are_bucketed_in_utc() {
        let endpoints = ApiEndpoints::default();
        let url = endpoints.repo_commits("octocat", "api", &window()).unwrap();
        let fetcher = StubFetcher::new()
            .with_json(&url, json!([commit_json("c3", "2024-03-04T22:30:00-05:00")]));

        let commits = list_commits(&fetcher, &endpoints, "octocat", &repo(1, "api"), &window())
            .await
            .unwrap()
            .commits;
        assert_eq!(commits[0].day(), "2024-03-05".parse::<NaiveDate>().unwrap());
    }

    #[tokio::test]
    async fn commits_without_author_date_are_skipped() {
        let endpoints = ApiEndpoints::default();
        let url = endpoints.repo_commits("octocat", "api", &window()).unwrap();
        let fetcher = StubFetcher::new().with_json(
            &url,
            json!([
                {"sha": "x", "url": "https://api.github.com/x", "commit": {"author": null}},
                commit_json("d4", "2024-03-06T12:00:00Z"),
            ]),
        );

        let commits = list_commits(&fetcher, &endpoints, "octocat", &repo(1, "api"), &window())
            .await
            .unwrap()
            .commits;
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].sha, "d4");
    }

    #[tokio::test]
    async fn full_page_is_truncated_even_with_undated_summaries() {
        let endpoints = ApiEndpoints::default();
        let url = endpoints.repo_commits("octocat", "api", &window()).unwrap();
        let mut summaries: Vec<_> = (0..PAGE_SIZE - 1)
            .map(|i| commit_json(&format!("s{i}"), "2024-03-06T12:00:00Z"))
            .collect();
        summaries.push(json!({"sha": "nodate", "url": "https://api.github.com/x", "commit": {"author": null}}));
        let fetcher = StubFetcher::new().with_json(&url, json!(summaries));

        let page = list_commits(&fetcher, &endpoints, "octocat", &repo(1, "api"), &window())
            .await
            .unwrap();
        assert_eq!(page.commits.len(), PAGE_SIZE - 1);
        assert!(page.truncated);
    }

    #[tokio::test]
    async fn short_page_is_not_truncated() {
        let endpoints = ApiEndpoints::default();
        let url = endpoints.repo_commits("octocat", "api", &window()).unwrap();
        let fetcher = StubFetcher::new()
            .with_json(&url, json!([commit_json("a1", "2024-03-04T10:00:00Z")]));

        let page = list_commits(&fetcher, &endpoints, "octocat", &repo(1, "api"), &window())
            .await
            .unwrap();
        assert!(!page.truncated);
    }

    #[tokio::test]
    async fn list_commits_propagates_status_errors() {
        let endpoints = ApiEndpoints::default();
        let url = endpoints.repo_commits("octocat", "api", &window()).unwrap();
        let fetcher = StubFetcher::new().with_status(&url, 409);

        let err = list_commits(&fetcher, &endpoints, "octocat", &repo(1, "api"), &window())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(409));
    }

    #[tokio::test]
    async fn unexpected_shape_is_a_decode_error() {
        let endpoints = ApiEndpoints::default();
        let url = endpoints.repo_commits("octocat", "api", &window()).unwrap();
        let fetcher = StubFetcher::new().with_json(&url, json!({"message": "Git Repository is empty."}));

        let err = list_commits(&fetcher, &endpoints, "octocat", &repo(1, "api"), &window())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    fn commit_ref(url: &str) -> CommitRef {
        CommitRef {
            sha: "a1".into(),
            url: url.into(),
            authored_at: "2024-03-04T10:00:00Z".parse().unwrap(),
            repository: "api".into(),
        }
    }

    #[tokio::test]
    async fn fetch_commit_stats_reads_stats_object() {
        let url = "https://api.github.com/repos/octocat/api/commits/a1";
        let fetcher = StubFetcher::new().with_json(
            url,
            json!({"sha": "a1", "stats": {"additions": 12, "deletions": 3, "total": 15}}),
        );

        let stats = fetch_commit_stats(&fetcher, &commit_ref(url)).await.unwrap();
        assert_eq!(
            stats,
            Some(CommitStats {
                additions: 12,
                deletions: 3
            })
        );
    }

    #[tokio::test]
    async fn missing_stats_is_none_not_an_error() {
        let url = "https://api.github.com/repos/octocat/api/commits/a1";
        let fetcher = StubFetcher::new().with_json(url, json!({"sha": "a1"}));

        let stats = fetch_commit_stats(&fetcher, &commit_ref(url)).await.unwrap();
        assert_eq!(stats, None);
    }

    #[tokio::test]
    async fn detail_failure_is_returned() {
        let url = "https://api.github.com/repos/octocat/api/commits/a1";
        let fetcher = StubFetcher::new().with_status(url, 500);

        let err = fetch_commit_stats(&fetcher, &commit_ref(url)).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
    }
}
