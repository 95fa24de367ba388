//! Repository listing for an account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{ActivityError, ActivityResult, FetchError};
use crate::http::{self, ApiEndpoints, JsonFetcher};

/// A repository owned by the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Repository {
    /// Upstream numeric identifier.
    pub id: u64,
    /// Repository name, unique per owner.
    pub name: String,
    /// Owning account.
    pub owner: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Stargazer count.
    pub stargazers_count: u64,
    /// Fork count.
    pub forks_count: u64,
    /// Browser URL.
    pub html_url: String,
    /// Primary language, if detected.
    pub language: Option<String>,
    /// Last update time.
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RepositoryRecord {
    id: u64,
    name: String,
    owner: Option<OwnerRecord>,
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    html_url: String,
    language: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct OwnerRecord {
    login: String,
}

impl RepositoryRecord {
    fn into_repository(self, account: &str) -> Repository {
        Repository {
            id: self.id,
            name: self.name,
            owner: self.owner.map_or_else(|| account.to_string(), |o| o.login),
            description: self.description,
            stargazers_count: self.stargazers_count,
            forks_count: self.forks_count,
            html_url: self.html_url,
            language: self.language,
            updated_at: self.updated_at,
        }
    }
}

/// Repositories owned by `account`, most recently updated first.
///
/// One page only (see [`PAGE_SIZE`](crate::http::PAGE_SIZE)). All or nothing:
/// any failure is returned without a partial list.
///
/// # Errors
///
/// - [`ActivityError::RateLimited`] on HTTP 403 or 429
/// - [`ActivityError::AccountNotFound`] on HTTP 404
/// - [`ActivityError::Fetch`] for anything else
#[instrument(skip(fetcher, endpoints))]
pub async fn list_repositories(
    fetcher: &dyn JsonFetcher,
    endpoints: &ApiEndpoints,
    account: &str,
) -> ActivityResult<Vec<Repository>> {
    let url = endpoints.user_repos(account).map_err(ActivityError::Fetch)?;
    let records: Vec<RepositoryRecord> = http::get_as(fetcher, &url)
        .await
        .map_err(|e| classify(e, account))?;

    let repositories: Vec<Repository> = records
        .into_iter()
        .map(|r| r.into_repository(account))
        .collect();

    info!(count = repositories.len(), "listed repositories");
    debug!(names = ?repositories.iter().map(|r| r.name.as_str()).collect::<Vec<_>>());
    Ok(repositories)
}

fn classify(err: FetchError, account: &str) -> ActivityError {
    match err.status() {
        Some(403 | 429) => ActivityError::RateLimited,
        Some(404) => ActivityError::AccountNotFound {
            account: account.to_string(),
        },
        _ => ActivityError::Fetch(err),
    }
}
