use std::sync::atomic::{AtomicBool, Ordering};

use jiff::{SignedDuration, Timestamp};
use tracing::{info, warn};

use crate::cache::CacheStore;
use crate::classifier::classify;
use crate::data::{
    ActionableComment, CacheSnapshot, Comment, PullRequestItem, PullRequestSummary, RepoId,
    RepositorySummary, SeverityCounts, UpdateMetadata,
};
use crate::error::{GhError, RefreshError};
use crate::github::{GitHubSource, PrState};

/// What to fetch on every refresh
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub repositories: Vec<RepoId>,
    /// Repositories not pushed to within this many days are skipped, and only
    /// PRs created within it are listed
    pub staleness_days: u32,
    pub pr_state: PrState,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            repositories: Vec::new(),
            staleness_days: 30,
            pr_state: PrState::Open,
        }
    }
}

/// Long-lived owner of the fetch / classify / persist pipeline
pub struct Refresher<S> {
    source: S,
    settings: RefreshSettings,
    store: CacheStore,
    in_progress: AtomicBool,
}

/// Clears the in-progress flag when the refresh ends, however it ends
struct InProgressGuard<'a>(&'a AtomicBool);

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: GitHubSource> Refresher<S> {
    pub fn new(source: S, settings: RefreshSettings, store: CacheStore) -> Self {
        Self {
            source,
            settings,
            store,
            in_progress: AtomicBool::new(false),
        }
    }

    /// The GitHub source refreshes are fetched from
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Refresh every configured repository and persist the result
    pub async fn refresh_all(&self) -> Result<CacheSnapshot, RefreshError> {
        self.refresh_at(Timestamp::now()).await
    }

    /// Like [`Self::refresh_all`], measuring the staleness window from `now`
    pub async fn refresh_at(&self, now: Timestamp) -> Result<CacheSnapshot, RefreshError> {
        if self.in_progress.swap(true, Ordering::AcqRel) {
            return Err(RefreshError::InProgress);
        }
        let _guard = InProgressGuard(&self.in_progress);

        let cutoff = now
            .checked_sub(SignedDuration::from_hours(
                24 * i64::from(self.settings.staleness_days),
            ))
            .unwrap_or(Timestamp::MIN);
        info!(
            repositories = self.settings.repositories.len(),
            since = %cutoff,
            "refreshing"
        );

        let mut repositories = Vec::new();
        for repo in &self.settings.repositories {
            if let Some(summary) = self.refresh_repository(repo, cutoff).await {
                repositories.push(summary);
            }
        }

        let snapshot = CacheSnapshot::new(now, repositories);
        let metadata = self.store.persist(&snapshot).await?;
        info!(
            repositories = metadata.repository_count,
            pull_requests = metadata.total_prs,
            comments = metadata.total_actionable_comments,
            "refresh complete"
        );
        Ok(snapshot)
    }

    /// The last persisted snapshot, if any
    pub async fn load_cached(&self) -> Option<CacheSnapshot> {
        self.store.load_snapshot().await
    }

    /// The last persisted metadata, if any
    pub async fn get_metadata(&self) -> Option<UpdateMetadata> {
        self.store.load_metadata().await
    }

    /// None if the repository is stale, unreachable, or has nothing actionable
    async fn refresh_repository(
        &self,
        repo: &RepoId,
        cutoff: Timestamp,
    ) -> Option<RepositorySummary> {
        let info = match self.source.repo_info(repo).await {
            Ok(info) => info,
            Err(err) => {
                warn!(%repo, error = %err, "skipping repository");
                return None;
            }
        };

        let last_push = match info.pushed_at {
            Some(pushed_at) if pushed_at >= cutoff => pushed_at,
            pushed_at => {
                info!(%repo, last_push = ?pushed_at, "skipping inactive repository");
                return None;
            }
        };

        let pull_requests = match self
            .source
            .pull_requests(repo, self.settings.pr_state, cutoff)
            .await
        {
            Ok(prs) => prs,
            Err(err) => {
                warn!(%repo, error = %err, "failed to list pull requests");
                return None;
            }
        };

        let mut summaries = Vec::new();
        for pr in pull_requests {
            let comments = self.actionable_comments(repo, pr.number).await;
            if let Some(summary) = summarize_pull_request(pr, comments) {
                summaries.push(summary);
            }
        }

        if summaries.is_empty() {
            return None;
        }
        info!(%repo, pull_requests = summaries.len(), "repository has actionable comments");

        Some(RepositorySummary {
            owner: repo.owner.clone(),
            name: repo.name.clone(),
            url: info.url,
            last_push,
            pull_requests: summaries,
        })
    }

    /// Fetch the three comment sources concurrently and keep the actionable ones
    async fn actionable_comments(&self, repo: &RepoId, number: u64) -> Vec<ActionableComment> {
        let (review_comments, issue_comments, reviews) = tokio::join!(
            self.source.review_comments(repo, number),
            self.source.issue_comments(repo, number),
            self.source.reviews(repo, number),
        );

        let review_comments = or_empty(review_comments, repo, number, "review comments");
        let issue_comments = or_empty(issue_comments, repo, number, "comments");
        let reviews = or_empty(reviews, repo, number, "reviews");

        let mut actionable: Vec<ActionableComment> = review_comments
            .into_iter()
            .map(|item| item.into_comment())
            .chain(issue_comments.into_iter().map(|item| item.into_comment()))
            .filter_map(tag_actionable)
            .collect();

        // A COMMENTED review's body adds nothing beyond its own comments
        actionable.extend(
            reviews
                .into_iter()
                .filter(|review| !review.is_commented())
                .filter_map(|review| review.into_comment())
                .filter_map(tag_actionable),
        );

        actionable.sort_by_key(|c| c.comment.created_at);
        actionable
    }
}

fn or_empty<T>(result: Result<Vec<T>, GhError>, repo: &RepoId, number: u64, what: &str) -> Vec<T> {
    result.unwrap_or_else(|err| {
        warn!(%repo, pr = number, error = %err, "failed to fetch {what}");
        Vec::new()
    })
}

fn tag_actionable(comment: Comment) -> Option<ActionableComment> {
    let (action_type, severity) = classify(Some(comment.body.as_str())).verdict()?;
    Some(ActionableComment {
        comment,
        action_type,
        severity,
    })
}

/// None when the pull request has nothing actionable
fn summarize_pull_request(
    pr: PullRequestItem,
    comments: Vec<ActionableComment>,
) -> Option<PullRequestSummary> {
    if comments.is_empty() {
        return None;
    }

    let mut severity_counts = SeverityCounts::default();
    for comment in &comments {
        severity_counts.record(comment.severity);
    }

    Some(PullRequestSummary {
        number: pr.number,
        author: pr.author_login(),
        title: pr.title,
        created_at: pr.created_at,
        url: pr.url,
        actionable_count: comments.len(),
        actionable_comments: comments,
        severity_counts,
    })
}
