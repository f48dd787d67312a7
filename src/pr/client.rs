use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::types::{ChangedFile, FileStatus, IssueComment, PullRequestRef, PullRequestSummary, ReviewComment};
use super::PrError;
use crate::config::Config;

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
const NO_DESCRIPTION: &str = "No description provided";

/// The four read-only lookups that make up a PR review.
/// Implementors must be Send + Sync so the lookups can run concurrently via tokio::try_join!.
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    async fn fetch_summary(&self, pr: &PullRequestRef) -> Result<PullRequestSummary, PrError>;

    async fn fetch_files(&self, pr: &PullRequestRef) -> Result<Vec<ChangedFile>, PrError>;

    /// Comments anchored to lines of the diff.
    async fn fetch_review_comments(&self, pr: &PullRequestRef) -> Result<Vec<ReviewComment>, PrError>;

    /// Comments on the PR conversation as a whole.
    async fn fetch_issue_comments(&self, pr: &PullRequestRef) -> Result<Vec<IssueComment>, PrError>;
}

/// GitHub REST client. Built once, then only read from.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    user_agent: String,
}

impl GitHubClient {
    /// Client authenticated with the configured token, if any.
    pub fn new(config: &Config) -> Self {
        Self::with_token(config, config.github_token())
    }

    /// Client with an explicit token; `None` sends requests anonymously.
    pub fn with_token(config: &Config, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.api_url().trim_end_matches('/').to_string(),
            token,
            user_agent: config.user_agent().to_string(),
        }
    }

    /// GET `path` relative to the API base URL and decode the JSON body.
    /// Non-2xx responses become `UpstreamRequestFailed` carrying GitHub's `message`.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, PrError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", GITHUB_ACCEPT);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(PrError::UpstreamRequestFailed {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl PullRequestSource for GitHubClient {
    #[instrument(skip(self, pr), fields(pr = %pr))]
    async fn fetch_summary(&self, pr: &PullRequestRef) -> Result<PullRequestSummary, PrError> {
        debug!("fetching PR metadata from GitHub API");
        let path = format!("/repos/{}/{}/pulls/{}", pr.owner, pr.repo, pr.number);
        let summary: PullRequestSummary = self.get_json::<PullResponse>(&path).await?.into();
        info!(
            title = %summary.title,
            author = %summary.author,
            state = %summary.state,
            additions = summary.additions,
            deletions = summary.deletions,
            changed_files = summary.changed_files,
            "received PR metadata"
        );
        Ok(summary)
    }

    #[instrument(skip(self, pr), fields(pr = %pr))]
    async fn fetch_files(&self, pr: &PullRequestRef) -> Result<Vec<ChangedFile>, PrError> {
        debug!("fetching PR files from GitHub API");
        let path = format!("/repos/{}/{}/pulls/{}/files", pr.owner, pr.repo, pr.number);
        let files: Vec<ChangedFile> = self
            .get_json::<Vec<FileResponse>>(&path)
            .await?
            .into_iter()
            .map(ChangedFile::from)
            .collect();
        info!(files = files.len(), "received PR files");
        for file in &files {
            debug!(file = %file.filename, status = %file.status.as_str(), additions = file.additions, deletions = file.deletions, "changed file");
        }
        Ok(files)
    }

    #[instrument(skip(self, pr), fields(pr = %pr))]
    async fn fetch_review_comments(&self, pr: &PullRequestRef) -> Result<Vec<ReviewComment>, PrError> {
        debug!("fetching review comments from GitHub API");
        let path = format!("/repos/{}/{}/pulls/{}/comments", pr.owner, pr.repo, pr.number);
        let comments: Vec<ReviewComment> = self
            .get_json::<Vec<ReviewCommentResponse>>(&path)
            .await?
            .into_iter()
            .map(ReviewComment::from)
            .collect();
        info!(comments = comments.len(), "received review comments");

        let mut by_author: BTreeMap<&str, usize> = BTreeMap::new();
        for comment in &comments {
            *by_author.entry(comment.author.as_str()).or_default() += 1;
        }
        for (author, count) in by_author {
            debug!(author, count, "review comments by author");
        }
        Ok(comments)
    }

    #[instrument(skip(self, pr), fields(pr = %pr))]
    async fn fetch_issue_comments(&self, pr: &PullRequestRef) -> Result<Vec<IssueComment>, PrError> {
        debug!("fetching issue comments from GitHub API");
        let path = format!("/repos/{}/{}/issues/{}/comments", pr.owner, pr.repo, pr.number);
        let comments: Vec<IssueComment> = self
            .get_json::<Vec<IssueCommentResponse>>(&path)
            .await?
            .into_iter()
            .map(IssueComment::from)
            .collect();
        info!(comments = comments.len(), "received issue comments");
        Ok(comments)
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

#[derive(Deserialize)]
struct User {
    login: String,
}

#[derive(Deserialize)]
struct BranchRef {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Deserialize)]
struct PullResponse {
    number: u64,
    title: String,
    body: Option<String>,
    state: String,
    user: User,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    html_url: String,
    additions: usize,
    deletions: usize,
    changed_files: usize,
    base: BranchRef,
    head: BranchRef,
}

impl From<PullResponse> for PullRequestSummary {
    fn from(pull: PullResponse) -> Self {
        PullRequestSummary {
            number: pull.number,
            title: pull.title,
            description: pull
                .body
                .filter(|body| !body.is_empty())
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            state: pull.state,
            author: pull.user.login,
            created_at: pull.created_at,
            updated_at: pull.updated_at,
            html_url: pull.html_url,
            additions: pull.additions,
            deletions: pull.deletions,
            changed_files: pull.changed_files,
            base_branch: pull.base.name,
            head_branch: pull.head.name,
        }
    }
}

#[derive(Deserialize)]
struct FileResponse {
    filename: String,
    status: FileStatus,
    additions: usize,
    deletions: usize,
    changes: usize,
    patch: Option<String>,
    blob_url: String,
    raw_url: String,
    previous_filename: Option<String>,
}

impl From<FileResponse> for ChangedFile {
    fn from(file: FileResponse) -> Self {
        ChangedFile {
            filename: file.filename,
            status: file.status,
            additions: file.additions,
            deletions: file.deletions,
            changes: file.changes,
            patch: file.patch.unwrap_or_default(),
            blob_url: file.blob_url,
            raw_url: file.raw_url,
            previous_filename: file.previous_filename,
        }
    }
}

#[derive(Deserialize)]
struct ReviewCommentResponse {
    id: u64,
    user: User,
    body: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    path: String,
    line: Option<u64>,
    original_line: Option<u64>,
    diff_hunk: String,
    position: Option<u64>,
    in_reply_to_id: Option<u64>,
}

impl From<ReviewCommentResponse> for ReviewComment {
    fn from(comment: ReviewCommentResponse) -> Self {
        ReviewComment {
            id: comment.id,
            author: comment.user.login,
            body: comment.body,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            path: comment.path,
            line: comment.line,
            original_line: comment.original_line,
            diff_hunk: comment.diff_hunk,
            position: comment.position,
            in_reply_to: comment.in_reply_to_id,
        }
    }
}

#[derive(Deserialize)]
struct IssueCommentResponse {
    id: u64,
    user: User,
    body: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<IssueCommentResponse> for IssueComment {
    fn from(comment: IssueCommentResponse) -> Self {
        IssueComment {
            id: comment.id,
            author: comment.user.login,
            body: comment.body.unwrap_or_default(),
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub fn pull_json() -> Value {
        json!({
            "number": 1,
            "title": "Edited README via GitHub",
            "body": null,
            "state": "open",
            "user": { "login": "octocat" },
            "created_at": "2011-01-26T19:01:12Z",
            "updated_at": "2011-01-26T19:14:43Z",
            "html_url": "https://github.com/octocat/Hello-World/pull/1",
            "additions": 3,
            "deletions": 1,
            "changed_files": 2,
            "base": { "ref": "master" },
            "head": { "ref": "new-topic" }
        })
    }

    pub fn files_json() -> Value {
        json!([
            {
                "filename": "docs/GUIDE.md",
                "status": "added",
                "additions": 2,
                "deletions": 0,
                "changes": 2,
                "patch": "@@ -0,0 +1,2 @@\n+# Guide\n+Welcome",
                "blob_url": "https://github.com/octocat/Hello-World/blob/abc/docs/GUIDE.md",
                "raw_url": "https://github.com/octocat/Hello-World/raw/abc/docs/GUIDE.md"
            },
            {
                "filename": "README",
                "status": "modified",
                "additions": 1,
                "deletions": 1,
                "changes": 2,
                "patch": "@@ -1,2 +1,2 @@\n Hello World\n-old line\n+new line",
                "blob_url": "https://github.com/octocat/Hello-World/blob/abc/README",
                "raw_url": "https://github.com/octocat/Hello-World/raw/abc/README"
            }
        ])
    }

    pub fn review_comments_json() -> Value {
        json!([
            {
                "id": 10,
                "user": { "login": "hubot" },
                "body": "Nice wording",
                "created_at": "2011-01-26T19:05:00Z",
                "updated_at": "2011-01-26T19:05:00Z",
                "path": "README",
                "line": 2,
                "original_line": 2,
                "diff_hunk": "@@ -1,2 +1,2 @@\n Hello World\n-old line\n+new line",
                "position": 3,
                "in_reply_to_id": null
            }
        ])
    }

    pub fn issue_comments_json() -> Value {
        json!([
            {
                "id": 20,
                "user": { "login": "octocat" },
                "body": "Ready for review",
                "created_at": "2011-01-26T19:06:00Z",
                "updated_at": "2011-01-26T19:06:00Z"
            }
        ])
    }

    /// Mount all four Hello-World endpoints on `server`.
    pub async fn mount_hello_world(server: &MockServer) {
        let base = "/repos/octocat/Hello-World";
        for (route, body) in [
            (format!("{base}/pulls/1"), pull_json()),
            (format!("{base}/pulls/1/files"), files_json()),
            (format!("{base}/pulls/1/comments"), review_comments_json()),
            (format!("{base}/issues/1/comments"), issue_comments_json()),
        ] {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(server)
                .await;
        }
    }

    pub fn client_for(server: &MockServer, token: Option<&str>) -> GitHubClient {
        let mut config = Config::default();
        config.github.api_url = Some(server.uri());
        GitHubClient::with_token(&config, token.map(str::to_string))
    }

    fn hello_world() -> PullRequestRef {
        PullRequestRef {
            owner: "octocat".to_string(),
            repo: "Hello-World".to_string(),
            number: 1,
        }
    }

    #[tokio::test]
    async fn test_fetch_summary_maps_fields() {
        let server = MockServer::start().await;
        mount_hello_world(&server).await;
        let client = client_for(&server, None);

        let summary = client.fetch_summary(&hello_world()).await.unwrap();
        assert_eq!(summary.number, 1);
        assert_eq!(summary.author, "octocat");
        assert_eq!(summary.description, NO_DESCRIPTION);
        assert_eq!(summary.base_branch, "master");
        assert_eq!(summary.head_branch, "new-topic");
        assert_eq!(summary.changed_files, 2);
    }

    #[tokio::test]
    async fn test_fetch_files_keeps_upstream_order() {
        let server = MockServer::start().await;
        mount_hello_world(&server).await;
        let client = client_for(&server, None);

        let files = client.fetch_files(&hello_world()).await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].filename, "docs/GUIDE.md");
        assert_eq!(files[0].status, FileStatus::Added);
        assert_eq!(files[1].filename, "README");
        assert!(files[1].previous_filename.is_none());
    }

    #[tokio::test]
    async fn test_fetch_files_missing_patch_becomes_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/Hello-World/pulls/1/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "filename": "logo.png",
                "status": "renamed",
                "additions": 0,
                "deletions": 0,
                "changes": 0,
                "blob_url": "b",
                "raw_url": "r",
                "previous_filename": "img/logo.png"
            }])))
            .mount(&server)
            .await;
        let client = client_for(&server, None);

        let files = client.fetch_files(&hello_world()).await.unwrap();
        assert_eq!(files[0].patch, "");
        assert_eq!(files[0].previous_filename.as_deref(), Some("img/logo.png"));
    }

    #[tokio::test]
    async fn test_fetch_review_and_issue_comments() {
        let server = MockServer::start().await;
        mount_hello_world(&server).await;
        let client = client_for(&server, None);

        let review = client.fetch_review_comments(&hello_world()).await.unwrap();
        assert_eq!(review.len(), 1);
        assert_eq!(review[0].path, "README");
        assert_eq!(review[0].line, Some(2));
        assert_eq!(review[0].in_reply_to, None);

        let issue = client.fetch_issue_comments(&hello_world()).await.unwrap();
        assert_eq!(issue.len(), 1);
        assert_eq!(issue[0].body, "Ready for review");
    }

    #[tokio::test]
    async fn test_bearer_token_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/Hello-World/issues/1/comments"))
            .and(header("authorization", "Bearer secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        let client = client_for(&server, Some("secret-token"));

        let comments = client.fetch_issue_comments(&hello_world()).await.unwrap();
        assert!(comments.is_empty());
    }

    #[tokio::test]
    async fn test_no_token_sends_no_authorization() {
        let server = MockServer::start().await;
        mount_hello_world(&server).await;
        let client = client_for(&server, None);

        client.fetch_summary(&hello_world()).await.unwrap();
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].headers.contains_key("authorization"));
        assert_eq!(requests[0].headers.get("user-agent").unwrap(), "pr-viewer");
        assert_eq!(requests[0].headers.get("accept").unwrap(), GITHUB_ACCEPT);
    }

    #[test]
    fn test_configured_token_is_used() {
        let mut config = Config::default();
        config.github.token = Some("from-config".to_string());
        let client = GitHubClient::new(&config);
        assert_eq!(client.token.as_deref(), Some("from-config"));
    }

    #[tokio::test]
    async fn test_error_status_is_translated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/Hello-World/pulls/1"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
            .mount(&server)
            .await;
        let client = client_for(&server, None);

        let err = client.fetch_summary(&hello_world()).await.unwrap_err();
        match err {
            PrError::UpstreamRequestFailed { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Not Found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_without_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/Hello-World/pulls/1/files"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;
        let client = client_for(&server, None);

        let err = client.fetch_files(&hello_world()).await.unwrap_err();
        assert_eq!(err.status(), Some(502));
        assert!(err.to_string().contains("Unknown error"));
    }

    #[tokio::test]
    async fn test_transport_failure_has_no_status() {
        let mut config = Config::default();
        config.github.api_url = Some("http://127.0.0.1:1".to_string());
        let client = GitHubClient::with_token(&config, None);

        let err = client.fetch_summary(&hello_world()).await.unwrap_err();
        assert!(matches!(err, PrError::UpstreamTransportFailed(_)));
        assert_eq!(err.status(), None);
    }
}
