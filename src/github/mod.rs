use crate::FileChange;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const PER_PAGE: usize = 100;
const USER_AGENT: &str = concat!("flow-coverage/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{method} {endpoint} returned {status}")]
    Status {
        method: &'static str,
        endpoint: String,
        status: u16,
    },
    #[error("invalid repository {0:?}, expected owner/repo")]
    InvalidRepository(String),
}

pub type Result<T> = std::result::Result<T, GitHubError>;

/// The pull request a run reports on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PullRequest {
    /// Build from an `owner/repo` string.
    pub fn from_repository(repository: &str, number: u64) -> Result<Self> {
        match repository.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
                Ok(Self {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                    number,
                })
            }
            _ => Err(GitHubError::InvalidRepository(repository.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub body: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct PullFile {
    filename: String,
    status: String,
}

#[derive(Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

/// The pull-request operations a run needs from the hosting platform.
pub trait PullRequestHost {
    fn list_files(&self) -> Result<Vec<FileChange>>;
    fn list_comments(&self) -> Result<Vec<Comment>>;
    fn create_comment(&self, body: &str) -> Result<Comment>;
    fn update_comment(&self, id: u64, body: &str) -> Result<Comment>;
}

/// Blocking client for the GitHub REST API, bound to one pull request.
pub struct GitHubClient {
    http: Client,
    api_url: String,
    token: String,
    pull: PullRequest,
}

impl GitHubClient {
    pub fn new(api_url: &str, token: &str, pull: PullRequest) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            pull,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
    }

    fn check(method: &'static str, endpoint: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if !status.is_success() {
            return Err(GitHubError::Status {
                method,
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// Fetch every page of a list endpoint.
    fn get_all<T: for<'de> Deserialize<'de>>(&self, endpoint: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let url = format!("{}{}", self.api_url, endpoint);
            let response = self
                .authorized(self.http.get(&url))
                .query(&[("per_page", PER_PAGE), ("page", page)])
                .send()?;
            let batch: Vec<T> = Self::check("GET", endpoint, response)?.json()?;
            let done = batch.len() < PER_PAGE;
            items.extend(batch);
            if done {
                return Ok(items);
            }
            page += 1;
        }
    }

    fn files_endpoint(&self) -> String {
        format!(
            "/repos/{}/{}/pulls/{}/files",
            self.pull.owner, self.pull.repo, self.pull.number
        )
    }

    fn comments_endpoint(&self) -> String {
        format!(
            "/repos/{}/{}/issues/{}/comments",
            self.pull.owner, self.pull.repo, self.pull.number
        )
    }

    fn comment_endpoint(&self, id: u64) -> String {
        format!(
            "/repos/{}/{}/issues/comments/{}",
            self.pull.owner, self.pull.repo, id
        )
    }
}

impl PullRequestHost for GitHubClient {
    fn list_files(&self) -> Result<Vec<FileChange>> {
        let files: Vec<PullFile> = self.get_all(&self.files_endpoint())?;
        tracing::debug!(count = files.len(), "fetched pull request files");
        Ok(files
            .into_iter()
            .map(|f| FileChange::new(f.filename, f.status))
            .collect())
    }

    fn list_comments(&self) -> Result<Vec<Comment>> {
        self.get_all(&self.comments_endpoint())
    }

    fn create_comment(&self, body: &str) -> Result<Comment> {
        let endpoint = self.comments_endpoint();
        let response = self
            .authorized(self.http.post(format!("{}{}", self.api_url, endpoint)))
            .json(&CommentBody { body })
            .send()?;
        Ok(Self::check("POST", &endpoint, response)?.json()?)
    }

    fn update_comment(&self, id: u64, body: &str) -> Result<Comment> {
        let endpoint = self.comment_endpoint(id);
        let response = self
            .authorized(self.http.patch(format!("{}{}", self.api_url, endpoint)))
            .json(&CommentBody { body })
            .send()?;
        Ok(Self::check("PATCH", &endpoint, response)?.json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repository() {
        let pr = PullRequest::from_repository("octo/widgets", 7).unwrap();
        assert_eq!(pr.owner, "octo");
        assert_eq!(pr.repo, "widgets");
        assert_eq!(pr.number, 7);
    }

    #[test]
    fn rejects_malformed_repository() {
        assert!(PullRequest::from_repository("widgets", 1).is_err());
        assert!(PullRequest::from_repository("/widgets", 1).is_err());
        assert!(PullRequest::from_repository("octo/", 1).is_err());
        assert!(PullRequest::from_repository("a/b/c", 1).is_err());
    }

    #[test]
    fn endpoints_target_the_pull_request() {
        let pr = PullRequest::from_repository("octo/widgets", 42).unwrap();
        let client = GitHubClient::new("https://api.example.com/", "t", pr).unwrap();

        assert_eq!(client.api_url, "https://api.example.com");
        assert_eq!(client.files_endpoint(), "/repos/octo/widgets/pulls/42/files");
        assert_eq!(
            client.comments_endpoint(),
            "/repos/octo/widgets/issues/42/comments"
        );
        assert_eq!(
            client.comment_endpoint(9),
            "/repos/octo/widgets/issues/comments/9"
        );
    }

    #[test]
    fn comment_without_body_deserializes() {
        let comment: Comment = serde_json::from_str(r#"{"id": 3, "body": null}"#).unwrap();
        assert_eq!(comment.id, 3);
        assert_eq!(comment.body, "");

        let comment: Comment = serde_json::from_str(r#"{"id": 4}"#).unwrap();
        assert_eq!(comment.body, "");
    }

    #[test]
    fn status_error_names_endpoint() {
        let err = GitHubError::Status {
            method: "GET",
            endpoint: "/repos/o/r/pulls/1/files".into(),
            status: 404,
        };
        assert_eq!(err.to_string(), "GET /repos/o/r/pulls/1/files returned 404");
    }
}
