use chrono::Utc;
use tracing::{debug, info, info_span, Instrument};

use super::client::PullRequestSource;
use super::types::{AggregatedPR, FetchMetadata};
use super::{parse_reference, PrError};

/// Fetch a complete pull request (metadata, files, review and issue comments).
///
/// The four lookups run concurrently via tokio::try_join!. The first failure
/// wins and every other result is dropped, so callers either get the whole
/// AggregatedPR or an error, never a partial one.
pub async fn fetch_aggregated_pr<S>(source: &S, reference: &str) -> Result<AggregatedPR, PrError>
where
    S: PullRequestSource + ?Sized,
{
    let pr_ref = parse_reference(reference)?;
    debug!(owner = %pr_ref.owner, repo = %pr_ref.repo, pr = pr_ref.number, "parsed PR reference");

    let (pr, files, review_comments, issue_comments) = tokio::try_join!(
        source.fetch_summary(&pr_ref).instrument(info_span!("fetch", resource = "summary")),
        source.fetch_files(&pr_ref).instrument(info_span!("fetch", resource = "files")),
        source.fetch_review_comments(&pr_ref).instrument(info_span!("fetch", resource = "review_comments")),
        source.fetch_issue_comments(&pr_ref).instrument(info_span!("fetch", resource = "issue_comments")),
    )?;

    let aggregated = AggregatedPR {
        pr,
        files,
        review_comments,
        issue_comments,
        metadata: FetchMetadata {
            owner: pr_ref.owner,
            repo: pr_ref.repo,
            pr_number: pr_ref.number,
            fetched_at: Utc::now(),
        },
    };
    info!(
        files = aggregated.files.len(),
        comments = aggregated.total_comments(),
        "fetch complete"
    );
    Ok(aggregated)
}
