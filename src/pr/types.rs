use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical identity of a pull request.
/// Produced by parse_reference() in pr/mod.rs; consumed by every fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl std::fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// Metadata about a pull request fetched from the GitHub API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestSummary {
    /// PR number (e.g., 42)
    pub number: u64,
    /// PR title
    pub title: String,
    /// PR body, or a placeholder when the author left it empty
    pub description: String,
    /// "open" or "closed"
    pub state: String,
    /// Author's GitHub login
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Link to the PR on github.com
    pub html_url: String,
    /// Total lines added
    pub additions: usize,
    /// Total lines deleted
    pub deletions: usize,
    /// Total files changed
    pub changed_files: usize,
    pub base_branch: String,
    pub head_branch: String,
}

/// How a file was touched by the PR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Removed,
    Modified,
    Renamed,
    /// Anything else GitHub reports (copied, changed, unchanged)
    #[serde(untagged)]
    Other(String),
}

impl FileStatus {
    pub fn as_str(&self) -> &str {
        match self {
            FileStatus::Added => "added",
            FileStatus::Removed => "removed",
            FileStatus::Modified => "modified",
            FileStatus::Renamed => "renamed",
            FileStatus::Other(other) => other,
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.as_str();
        let mut chars = status.chars();
        match chars.next() {
            Some(first) => write!(f, "{}{}", first.to_uppercase(), chars.as_str()),
            None => Ok(()),
        }
    }
}

/// A single file changed by the PR, as listed by the files endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedFile {
    /// Path relative to the repository root (e.g., "src/auth/config.rs")
    pub filename: String,
    pub status: FileStatus,
    pub additions: usize,
    pub deletions: usize,
    pub changes: usize,
    /// Unified diff hunks without file headers. Empty for binary files.
    pub patch: String,
    pub blob_url: String,
    pub raw_url: String,
    /// Only set for renamed files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_filename: Option<String>,
}

/// A review comment anchored to a line of a file's diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewComment {
    pub id: u64,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// File the comment is on
    pub path: String,
    /// None when the diff position no longer exists (outdated comment)
    pub line: Option<u64>,
    pub original_line: Option<u64>,
    /// The hunk the comment was written against
    pub diff_hunk: String,
    pub position: Option<u64>,
    pub in_reply_to: Option<u64>,
}

impl ReviewComment {
    pub fn is_outdated(&self) -> bool {
        self.line.is_none()
    }

    /// Line to show next to the comment: current line, else the original one.
    pub fn display_line(&self) -> Option<u64> {
        self.line.or(self.original_line)
    }
}

/// A comment on the conversation tab, not tied to any file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueComment {
    pub id: u64,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchMetadata {
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
    pub fetched_at: DateTime<Utc>,
}

/// Everything the viewer needs about one PR.
/// Only ever built once all four fetches have succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedPR {
    pub pr: PullRequestSummary,
    pub files: Vec<ChangedFile>,
    pub review_comments: Vec<ReviewComment>,
    pub issue_comments: Vec<IssueComment>,
    pub metadata: FetchMetadata,
}

impl AggregatedPR {
    /// Review comments whose path is exactly `path`, in upstream order.
    pub fn review_comments_for<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a ReviewComment> + 'a {
        self.review_comments.iter().filter(move |c| c.path == path)
    }

    pub fn total_comments(&self) -> usize {
        self.review_comments.len() + self.issue_comments.len()
    }
}
