pub mod aggregate;
pub mod client;
pub mod diff;
pub mod types;

pub use aggregate::fetch_aggregated_pr;
pub use client::{GitHubClient, PullRequestSource};
pub use types::{AggregatedPR, ChangedFile, FileStatus, PullRequestRef, ReviewComment};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrError {
    #[error("Invalid PR reference format: {0:?}. Use: https://github.com/owner/repo/pull/123")]
    InvalidReferenceFormat(String),

    #[error("GitHub API Error: {status} - {message}")]
    UpstreamRequestFailed { status: u16, message: String },

    #[error("GitHub API request failed: {0}")]
    UpstreamTransportFailed(#[from] reqwest::Error),
}

impl PrError {
    /// HTTP status returned by GitHub, if a response was received at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            PrError::UpstreamRequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Recovery guidance for the user, keyed on the kind of failure.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            PrError::InvalidReferenceFormat(_) => {
                Some("Accepted forms: https://github.com/owner/repo/pull/123, owner/repo/pull/123, owner/repo#123")
            }
            PrError::UpstreamRequestFailed { status: 401, .. } => {
                Some("Check your GITHUB_TOKEN or the token in .pr-viewer.toml")
            }
            PrError::UpstreamRequestFailed { status: 403, .. } => {
                Some("Rate limit exceeded. Wait or check your token.")
            }
            PrError::UpstreamRequestFailed { status: 404, .. } => {
                Some("PR not found. Check owner/repo/number are correct.")
            }
            _ => None,
        }
    }
}

/// Parse a pull request reference into its component parts.
///
/// Accepted forms, tried in this order:
///   [https://]host/{owner}/{repo}/pull/{number}
///   {owner}/{repo}/pull/{number}
///   {owner}/{repo}#{number}
///
/// Anything after the number in the URL forms (`/files`, `?query`, `#fragment`)
/// is ignored.
pub fn parse_reference(reference: &str) -> Result<PullRequestRef, PrError> {
    let invalid = || PrError::InvalidReferenceFormat(reference.to_string());

    let trimmed = reference.trim();
    let cleaned = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let cleaned = cleaned.strip_suffix('/').unwrap_or(cleaned);

    let segments: Vec<&str> = cleaned.split('/').collect();

    let (owner, repo, number) = match segments.as_slice() {
        [host, owner, repo, "pull", number, ..] if !host.is_empty() => {
            (*owner, *repo, strip_query(number))
        }
        [owner, repo, "pull", number, ..] => (*owner, *repo, strip_query(number)),
        [owner, repo_and_number] => {
            let (repo, number) = repo_and_number.split_once('#').ok_or_else(invalid)?;
            (*owner, repo, number)
        }
        _ => return Err(invalid()),
    };

    if owner.is_empty() || repo.is_empty() {
        return Err(invalid());
    }

    let number = parse_number(number).ok_or_else(invalid)?;

    Ok(PullRequestRef {
        owner: owner.to_string(),
        repo: repo.to_string(),
        number,
    })
}

/// Drop a `?query` or `#fragment` glued to the last URL segment.
fn strip_query(segment: &str) -> &str {
    segment.split(['?', '#']).next().unwrap_or(segment)
}

/// Digits only, base 10, strictly positive.
fn parse_number(segment: &str) -> Option<u64> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse::<u64>().ok().filter(|n| *n > 0)
}
