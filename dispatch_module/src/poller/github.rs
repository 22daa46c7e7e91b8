use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::dispatcher::InboundEvent;

use super::{PendingEvent, PollError, Poller};

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";
const CLIENT_USER_AGENT: &str = "neon-dispatch";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const ERROR_BODY_MAX_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
struct NotificationThread {
    id: String,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    subject: NotificationSubject,
    repository: NotificationRepository,
}

#[derive(Debug, Deserialize)]
struct NotificationSubject {
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    latest_comment_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NotificationRepository {
    html_url: String,
}

/// Shape shared by issue comments and issues themselves; `latest_comment_url`
/// points at the issue when nobody has commented yet.
#[derive(Debug, Deserialize)]
struct CommentPayload {
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    user: Option<CommentAuthor>,
}

#[derive(Debug, Deserialize)]
struct CommentAuthor {
    login: String,
}

/// Reads unread notifications from the GitHub REST API and marks each
/// thread read once it has been dispatched.
#[derive(Debug, Clone)]
pub struct GithubNotificationPoller {
    api_base_url: String,
    token: String,
    http: Client,
}

impl GithubNotificationPoller {
    pub fn new(api_base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, PollError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, PollError> {
        let response = self.authorized(self.http.get(url)).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status.as_u16(), response.text().unwrap_or_default()));
        }
        Ok(response.json::<T>()?)
    }

    fn to_pending(&self, thread: NotificationThread) -> Result<PendingEvent, PollError> {
        let link = thread_link(&thread);
        let (sender, comment) = match thread.subject.latest_comment_url.as_deref() {
            Some(url) => {
                let payload: CommentPayload = self.get_json(url)?;
                (
                    payload.user.map(|user| user.login).unwrap_or_default(),
                    payload.body.unwrap_or_default(),
                )
            }
            None => (String::new(), String::new()),
        };
        let body = if comment.trim().is_empty() {
            link
        } else {
            format!("{}\n\n{}", comment.trim(), link)
        };
        Ok(PendingEvent {
            token: thread.id,
            event: InboundEvent {
                sender,
                subject: thread.subject.title,
                body,
                received_at: thread.updated_at.unwrap_or_else(Utc::now),
            },
        })
    }
}

impl Poller for GithubNotificationPoller {
    fn poll(&mut self) -> Result<Vec<PendingEvent>, PollError> {
        let url = format!("{}/notifications", self.api_base_url);
        let threads: Vec<NotificationThread> = self.get_json(&url)?;
        debug!("fetched {} unread notification threads", threads.len());

        let mut pending = Vec::with_capacity(threads.len());
        for thread in threads {
            let id = thread.id.clone();
            match self.to_pending(thread) {
                Ok(event) => pending.push(event),
                Err(err) => warn!("skip notification thread {} this cycle: {}", id, err),
            }
        }
        Ok(pending)
    }

    fn acknowledge(&mut self, pending: &PendingEvent) -> Result<(), PollError> {
        let url = format!(
            "{}/notifications/threads/{}",
            self.api_base_url, pending.token
        );
        let response = self.authorized(self.http.patch(&url)).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status.as_u16(), response.text().unwrap_or_default()));
        }
        info!("marked notification thread {} as read", pending.token);
        Ok(())
    }
}

/// Browser URL of the thread's issue or pull request, falling back to the
/// repository page.
fn thread_link(thread: &NotificationThread) -> String {
    let repo_url = thread.repository.html_url.trim_end_matches('/');
    let number = thread
        .subject
        .url
        .as_deref()
        .and_then(|url| {
            let mut segments = url.trim_end_matches('/').rsplit('/');
            let number = segments.next()?;
            let kind = segments.next()?;
            matches!(kind, "issues" | "pulls").then_some(number)
        })
        .and_then(|number| number.parse::<u64>().ok());
    match number {
        Some(number) => format!("{}/issues/{}", repo_url, number),
        None => repo_url.to_string(),
    }
}

fn api_error(status: u16, body: String) -> PollError {
    PollError::Api {
        status,
        body: body.chars().take(ERROR_BODY_MAX_CHARS).collect(),
    }
}
