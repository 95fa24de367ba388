//! Activity orchestrator: repositories → commits → details → day buckets.
//!
//! # Flow
//!
//! 1. Resolve the [`Window`] (`[today - days, today]`, UTC).
//! 2. List the account's repositories. This is the only step that can fail
//!    the run ([`ActivityError`]).
//! 3. Queue one job per repository and drain the queue with a fixed number
//!    of worker tasks. A job lists the repository's commits and then fetches
//!    each commit's details one at a time, in listing order, folding every
//!    in-window commit into the job's own [`DayTable`].
//! 4. Merge the per-repository tables into one dense table and return it as
//!    a date-ascending series.
//!
//! Failures after step 2 are absorbed: a repository whose commits cannot be
//! listed contributes nothing, a commit whose details cannot be fetched is
//! still counted but adds no line changes. Each absorbed failure is logged
//! and reported as a [`Diagnostic`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, info_span, instrument, warn};

use crate::aggregate::{DayBucket, DayTable, Window};
use crate::commits;
use crate::config::{Config, GithubConfig};
use crate::error::{ActivityError, ActivityResult};
use crate::http::{ApiEndpoints, HttpFetcher, JsonFetcher, PAGE_SIZE};
use crate::repos::{self, Repository};

/// Repositories processed at once when nothing else is configured.
pub const DEFAULT_CONCURRENCY: usize = 4;

// ──────────────────────────────────────────────
// Request, report, diagnostics
// ──────────────────────────────────────────────

/// What to aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRequest {
    /// Account whose repositories and commits are analyzed.
    pub account: String,
    /// Days before `today` included in the window.
    pub window_days: u64,
    /// Last day of the window; `None` means the current UTC date.
    pub today: Option<NaiveDate>,
}

impl ActivityRequest {
    /// Window of `window_days` days ending today (UTC).
    pub fn new(account: impl Into<String>, window_days: u64) -> Self {
        Self {
            account: account.into(),
            window_days,
            today: None,
        }
    }

    /// Pin the last day of the window.
    #[must_use]
    pub const fn ending_on(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// The inclusive window this request covers.
    pub fn window(&self) -> ActivityResult<Window> {
        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
        Window::ending_on(today, self.window_days).ok_or(ActivityError::InvalidWindow {
            days: self.window_days,
        })
    }
}

/// A failure absorbed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Commits of a repository could not be listed; it contributes nothing.
    RepositoryCommitsFailed {
        /// Repository name.
        repository: String,
        /// Error message.
        error: String,
    },
    /// A commit's details could not be fetched; it is counted without
    /// line changes.
    CommitDetailFailed {
        /// Repository name.
        repository: String,
        /// Commit hash.
        sha: String,
        /// Error message.
        error: String,
    },
    /// A listing filled a whole page, so later entries were not seen.
    Truncated {
        /// What was listed (e.g. `repositories of octocat`).
        scope: String,
        /// Page size that was hit.
        limit: usize,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RepositoryCommitsFailed { repository, error } => {
                write!(f, "{repository}: commits unavailable ({error})")
            }
            Self::CommitDetailFailed {
                repository,
                sha,
                error,
            } => {
                let short = sha.get(..7).unwrap_or(sha);
                write!(f, "{repository}@{short}: line changes unavailable ({error})")
            }
            Self::Truncated { scope, limit } => {
                write!(f, "only the first {limit} {scope} were included")
            }
        }
    }
}

/// Progress and diagnostics, streamed while a run is in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent {
    /// The repository set is known.
    RepositoriesListed {
        /// Number of repositories queued.
        count: usize,
    },
    /// A repository job has finished.
    RepositoryFinished {
        /// Repository name.
        repository: String,
        /// In-window commits folded for it.
        commits: usize,
    },
    /// A failure was absorbed.
    Diagnostic(Diagnostic),
}

/// Sender half of the event stream.
pub type EventSender = mpsc::UnboundedSender<ActivityEvent>;

/// Result of a run: a dense, date-ascending series plus what went wrong.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityReport {
    /// Account analyzed.
    pub account: String,
    /// Window covered.
    pub window: Window,
    /// Repositories listed for the account, most recently updated first.
    pub repositories: Vec<Repository>,
    /// One bucket per day of the window, ascending.
    pub days: Vec<DayBucket>,
    /// Absorbed failures, grouped by repository name.
    pub diagnostics: Vec<Diagnostic>,
}

impl ActivityReport {
    /// Commits across the window.
    pub fn total_commits(&self) -> u64 {
        self.days.iter().map(|d| d.count).sum()
    }

    /// Lines added across the window.
    pub fn total_additions(&self) -> u64 {
        self.days.iter().map(|d| d.additions).sum()
    }

    /// Lines deleted across the window.
    pub fn total_deletions(&self) -> u64 {
        self.days.iter().map(|d| d.deletions).sum()
    }

    /// Days with at least one commit.
    pub fn active_days(&self) -> usize {
        self.days.iter().filter(|d| d.count > 0).count()
    }
}

// ──────────────────────────────────────────────
// Pipeline
// ──────────────────────────────────────────────

/// The aggregation pipeline over a [`JsonFetcher`].
#[derive(Clone)]
pub struct ActivityPipeline {
    fetcher: Arc<dyn JsonFetcher>,
    endpoints: ApiEndpoints,
    concurrency: usize,
}

impl fmt::Debug for ActivityPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityPipeline")
            .field("endpoints", &self.endpoints)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl ActivityPipeline {
    /// Pipeline over `fetcher`, with [`DEFAULT_CONCURRENCY`] workers.
    pub fn new(fetcher: Arc<dyn JsonFetcher>, endpoints: ApiEndpoints) -> Self {
        Self {
            fetcher,
            endpoints,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Pipeline over an [`HttpFetcher`] built from `github`.
    pub fn from_github(github: &GithubConfig) -> ActivityResult<Self> {
        let fetcher = HttpFetcher::new(github).map_err(ActivityError::Client)?;
        Ok(Self::new(
            Arc::new(fetcher),
            ApiEndpoints::new(github.api_url.clone()),
        ))
    }

    /// Pipeline configured from the `[github]` and `[activity]` sections.
    pub fn from_config(config: &Config) -> ActivityResult<Self> {
        Ok(Self::from_github(&config.github)?.with_concurrency(config.activity.concurrency))
    }

    /// Number of repositories processed at once (at least 1).
    #[must_use]
    pub fn with_concurrency(mut self, workers: usize) -> Self {
        self.concurrency = workers.max(1);
        self
    }

    /// Worker count in effect.
    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Compute the daily activity series for `request`.
    ///
    /// Progress and absorbed failures are also sent to `events`, if given;
    /// a dropped receiver is ignored.
    ///
    /// # Errors
    ///
    /// Only window resolution and repository listing can fail. Once the
    /// repository set is known a report is always returned.
    #[instrument(skip(self, request, events), fields(account = %request.account, days = request.window_days))]
    pub async fn run(
        &self,
        request: &ActivityRequest,
        events: Option<EventSender>,
    ) -> ActivityResult<ActivityReport> {
        let window = request.window()?;
        debug!(start = %window.start(), end = %window.end(), "resolved window");

        let repositories =
            repos::list_repositories(&*self.fetcher, &self.endpoints, &request.account).await?;
        let repository_count = repositories.len();
        emit(
            events.as_ref(),
            ActivityEvent::RepositoriesListed {
                count: repository_count,
            },
        );

        let mut diagnostics = Vec::new();
        if repository_count >= PAGE_SIZE {
            let truncated = Diagnostic::Truncated {
                scope: format!("repositories of {}", request.account),
                limit: PAGE_SIZE,
            };
            warn!(%truncated, "repository listing truncated");
            emit(events.as_ref(), ActivityEvent::Diagnostic(truncated.clone()));
            diagnostics.push(truncated);
        }

        let mut outcomes = self
            .drain(repositories.clone(), &request.account, window, events)
            .await;
        outcomes.sort_by(|a, b| a.repository.cmp(&b.repository));

        let mut table = DayTable::dense(window);
        for outcome in outcomes {
            table.merge(outcome.table);
            diagnostics.extend(outcome.diagnostics);
        }

        let report = ActivityReport {
            account: request.account.clone(),
            window,
            repositories,
            days: table.into_series(),
            diagnostics,
        };
        info!(
            repositories = report.repositories.len(),
            commits = report.total_commits(),
            additions = report.total_additions(),
            deletions = report.total_deletions(),
            diagnostics = report.diagnostics.len(),
            "activity aggregated"
        );
        Ok(report)
    }

    /// Run every repository job on a pool of `concurrency` workers.
    async fn drain(
        &self,
        repositories: Vec<Repository>,
        account: &str,
        window: Window,
        events: Option<EventSender>,
    ) -> Vec<RepositoryOutcome> {
        let workers = self.concurrency.min(repositories.len());
        let queue = Arc::new(Mutex::new(VecDeque::from(repositories)));
        let account: Arc<str> = Arc::from(account);

        let mut pool = JoinSet::new();
        for worker in 0..workers {
            let queue = Arc::clone(&queue);
            let fetcher = Arc::clone(&self.fetcher);
            let endpoints = self.endpoints.clone();
            let account = Arc::clone(&account);
            let events = events.clone();

            pool.spawn(
                async move {
                    let mut done = Vec::new();
                    while let Some(repository) = next_job(&queue) {
                        let outcome = aggregate_repository(
                            &*fetcher,
                            &endpoints,
                            &account,
                            &window,
                            &repository,
                        )
                        .await;
                        for diagnostic in &outcome.diagnostics {
                            emit(events.as_ref(), ActivityEvent::Diagnostic(diagnostic.clone()));
                        }
                        emit(
                            events.as_ref(),
                            ActivityEvent::RepositoryFinished {
                                repository: outcome.repository.clone(),
                                commits: outcome.commits,
                            },
                        );
                        done.push(outcome);
                    }
                    done
                }
                .instrument(info_span!("worker", worker)),
            );
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(done) => outcomes.extend(done),
                Err(e) => warn!(error = %e, "repository worker stopped early; its results are lost"),
            }
        }
        outcomes
    }
}

fn next_job(queue: &Mutex<VecDeque<Repository>>) -> Option<Repository> {
    queue.lock().ok()?.pop_front()
}

fn emit(events: Option<&EventSender>, event: ActivityEvent) {
    if let Some(tx) = events {
        // receiver may be gone; the run does not depend on it
        let _ = tx.send(event);
    }
}

/// What one repository job produced.
struct RepositoryOutcome {
    repository: String,
    commits: usize,
    table: DayTable,
    diagnostics: Vec<Diagnostic>,
}

#[instrument(skip_all, fields(repository = %repository.name))]
async fn aggregate_repository(
    fetcher: &dyn JsonFetcher,
    endpoints: &ApiEndpoints,
    account: &str,
    window: &Window,
    repository: &Repository,
) -> RepositoryOutcome {
    let mut outcome = RepositoryOutcome {
        repository: repository.name.clone(),
        commits: 0,
        table: DayTable::dense(*window),
        diagnostics: Vec::new(),
    };

    let page = match commits::list_commits(fetcher, endpoints, account, repository, window).await {
        Ok(page) => page,
        Err(e) => {
            warn!(error = %e, "failed to list commits; counting none for this repository");
            outcome.diagnostics.push(Diagnostic::RepositoryCommitsFailed {
                repository: repository.name.clone(),
                error: e.to_string(),
            });
            return outcome;
        }
    };

    if page.truncated {
        outcome.diagnostics.push(Diagnostic::Truncated {
            scope: format!("commits in {}", repository.name),
            limit: PAGE_SIZE,
        });
    }

    for commit in &page.commits {
        let day = commit.day();
        if !window.contains(day) {
            debug!(sha = %commit.sha, %day, "commit outside window, ignoring");
            continue;
        }

        let stats = match commits::fetch_commit_stats(fetcher, commit).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(sha = %commit.sha, error = %e, "failed to fetch commit details");
                outcome.diagnostics.push(Diagnostic::CommitDetailFailed {
                    repository: repository.name.clone(),
                    sha: commit.sha.clone(),
                    error: e.to_string(),
                });
                None
            }
        };

        outcome.table.fold(day, &repository.name, stats);
        outcome.commits += 1;
    }

    debug!(commits = outcome.commits, "repository aggregated");
    outcome
}

/// Compute activity for `account` over the last `window_days` days.
///
/// Uses the `[github]` and `[activity]` configuration; `token`, when given,
/// replaces the configured token for this call.
pub async fn compute_activity(
    config: &Config,
    account: &str,
    window_days: u64,
    token: Option<String>,
) -> ActivityResult<ActivityReport> {
    let mut config = config.clone();
    if token.is_some() {
        config.github.token = token;
    }
    ActivityPipeline::from_config(&config)?
        .run(&ActivityRequest::new(account, window_days), None)
        .await
}
