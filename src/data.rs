use std::fmt;
use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Schema version written into every snapshot
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepoIdError {
    #[error("invalid repository format, expected owner/name: {0}")]
    InvalidFormat(String),
}

/// A repository identifier in `owner/name` form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl FromStr for RepoId {
    type Err = RepoIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RepoIdError::InvalidFormat(s.to_owned());
        let (owner, name) = s.trim().split_once('/').ok_or_else(invalid)?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(invalid());
        }
        Ok(Self::new(owner, name))
    }
}

impl TryFrom<String> for RepoId {
    type Error = RepoIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepoId> for String {
    fn from(repo: RepoId) -> Self {
        repo.to_string()
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Where a comment came from on the pull request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentKind {
    /// Line-level comment on the diff
    ReviewComment,
    /// Conversation comment on the PR itself
    GeneralComment,
    /// Body of a submitted review
    Review,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    FixRequired,
    ImprovementNeeded,
    Suggestion,
    Question,
    Request,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        })
    }
}

/// Verdict of the comment classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub actionable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<ActionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

impl Classification {
    pub const NOT_ACTIONABLE: Self = Self {
        actionable: false,
        action_type: None,
        severity: None,
    };

    pub const fn actionable(action_type: ActionType, severity: Severity) -> Self {
        Self {
            actionable: true,
            action_type: Some(action_type),
            severity: Some(severity),
        }
    }

    /// The action type and severity, if the comment is actionable
    pub fn verdict(&self) -> Option<(ActionType, Severity)> {
        match (self.actionable, self.action_type, self.severity) {
            (true, Some(action_type), Some(severity)) => Some((action_type, severity)),
            _ => None,
        }
    }
}

/// A comment, review comment or review as fetched from GitHub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: CommentKind,
    pub author: String,
    pub body: String,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
    pub url: String,
}

/// A comment the classifier flagged, together with its verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionableComment {
    #[serde(flatten)]
    pub comment: Comment,
    pub action_type: ActionType,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestSummary {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub created_at: Timestamp,
    pub url: String,
    pub actionable_comments: Vec<ActionableComment>,
    pub actionable_count: usize,
    pub severity_counts: SeverityCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySummary {
    pub owner: String,
    pub name: String,
    pub url: String,
    pub last_push: Timestamp,
    pub pull_requests: Vec<PullRequestSummary>,
}

/// Everything persisted by one refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    pub last_update: Timestamp,
    pub repositories: Vec<RepositorySummary>,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

impl CacheSnapshot {
    pub fn new(last_update: Timestamp, repositories: Vec<RepositorySummary>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            last_update,
            repositories,
        }
    }

    /// Summary counts matching this snapshot
    pub fn metadata(&self) -> UpdateMetadata {
        let pull_requests = self.repositories.iter().flat_map(|repo| &repo.pull_requests);
        UpdateMetadata {
            last_update: self.last_update,
            repository_count: self.repositories.len(),
            total_prs: pull_requests.clone().count(),
            total_actionable_comments: pull_requests.map(|pr| pr.actionable_count).sum(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMetadata {
    pub last_update: Timestamp,
    pub repository_count: usize,
    #[serde(rename = "totalPRs")]
    pub total_prs: usize,
    pub total_actionable_comments: usize,
}

// Shapes of `gh` output

/// `gh repo view --json url,pushedAt`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoInfo {
    pub url: String,
    pub pushed_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    pub login: String,
}

fn login_or_ghost(author: Option<Author>) -> String {
    author.map(|a| a.login).unwrap_or_else(|| "ghost".to_owned())
}

/// `gh pr list --json number,title,author,createdAt,url`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestItem {
    pub number: u64,
    pub title: String,
    pub author: Option<Author>,
    pub created_at: Timestamp,
    pub url: String,
}

impl PullRequestItem {
    pub fn author_login(&self) -> String {
        login_or_ghost(self.author.clone())
    }
}

/// `gh api repos/{repo}/pulls/{n}/comments`
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewCommentItem {
    pub id: u64,
    pub user: Option<Author>,
    #[serde(default)]
    pub body: Option<String>,
    pub created_at: Timestamp,
    pub path: Option<String>,
    pub line: Option<u64>,
    pub original_line: Option<u64>,
    pub html_url: String,
}

impl ReviewCommentItem {
    pub fn into_comment(self) -> Comment {
        Comment {
            id: self.id,
            kind: CommentKind::ReviewComment,
            author: login_or_ghost(self.user),
            body: self.body.unwrap_or_default(),
            created_at: self.created_at,
            path: self.path,
            line: self.line.or(self.original_line),
            url: self.html_url,
        }
    }
}

/// `gh api repos/{repo}/issues/{n}/comments`
#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommentItem {
    pub id: u64,
    pub user: Option<Author>,
    #[serde(default)]
    pub body: Option<String>,
    pub created_at: Timestamp,
    pub html_url: String,
}

impl IssueCommentItem {
    pub fn into_comment(self) -> Comment {
        Comment {
            id: self.id,
            kind: CommentKind::GeneralComment,
            author: login_or_ghost(self.user),
            body: self.body.unwrap_or_default(),
            created_at: self.created_at,
            path: None,
            line: None,
            url: self.html_url,
        }
    }
}

/// `gh api repos/{repo}/pulls/{n}/reviews`
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewItem {
    pub id: u64,
    pub user: Option<Author>,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    /// Absent on pending reviews
    pub submitted_at: Option<Timestamp>,
    pub html_url: String,
}

impl ReviewItem {
    pub fn is_commented(&self) -> bool {
        self.state.eq_ignore_ascii_case("COMMENTED")
    }

    /// None for reviews that were never submitted
    pub fn into_comment(self) -> Option<Comment> {
        Some(Comment {
            id: self.id,
            kind: CommentKind::Review,
            author: login_or_ghost(self.user),
            body: self.body.unwrap_or_default(),
            created_at: self.submitted_at?,
            path: None,
            line: None,
            url: self.html_url,
        })
    }
}
