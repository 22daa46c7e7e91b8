//! Minimal GitHub REST client for posting issue comments.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_GITHUB_API_BASE_URL: &str = "https://api.github.com";
const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";
const CLIENT_USER_AGENT: &str = "neon-dispatch";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const ERROR_BODY_MAX_CHARS: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GitHub API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("invalid comment target: {0}")]
    InvalidTarget(&'static str),
}

#[derive(Debug, Clone)]
pub struct IssueCommentParams<'a> {
    pub owner: &'a str,
    pub repo: &'a str,
    pub issue_number: u64,
    pub body: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Serialize)]
struct CommentPayload<'a> {
    body: &'a str,
}

/// Posts comments to `POST {api_base}/repos/{owner}/{repo}/issues/{n}/comments`.
#[derive(Debug, Clone)]
pub struct IssueCommentClient {
    api_base_url: String,
    token: Option<String>,
    http: Client,
}

impl IssueCommentClient {
    pub fn new(api_base_url: impl Into<String>, token: Option<String>) -> Result<Self, ReportError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            token,
            http,
        })
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn post_issue_comment(
        &self,
        params: &IssueCommentParams<'_>,
    ) -> Result<IssueComment, ReportError> {
        if params.owner.trim().is_empty() || params.repo.trim().is_empty() {
            return Err(ReportError::InvalidTarget("repository owner and name are required"));
        }
        if params.body.trim().is_empty() {
            return Err(ReportError::InvalidTarget("comment body is empty"));
        }

        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_base_url, params.owner, params.repo, params.issue_number
        );
        debug!("posting issue comment to {}", url);

        let mut request = self
            .http
            .post(&url)
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .json(&CommentPayload { body: params.body });
        if let Some(token) = self.token.as_deref() {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ReportError::Api {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_MAX_CHARS).collect(),
            });
        }
        Ok(response.json::<IssueComment>()?)
    }
}
