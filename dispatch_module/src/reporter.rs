use report_module::{IssueCommentClient, IssueCommentParams};
use tracing::{debug, info, warn};

use run_task_module::TaskContext;

/// Posts one status message to the issue a task came from.
///
/// Best-effort: returns whether a comment was posted. Failures are logged
/// and never retried.
pub trait IssueReporter {
    fn report(&self, context: &TaskContext, message: &str) -> bool;
}

#[derive(Debug, Clone)]
pub struct GithubIssueReporter {
    client: IssueCommentClient,
}

impl GithubIssueReporter {
    pub fn new(client: IssueCommentClient) -> Self {
        Self { client }
    }
}

impl IssueReporter for GithubIssueReporter {
    fn report(&self, context: &TaskContext, message: &str) -> bool {
        let Some(issue_number) = context.issue_number else {
            debug!(
                "skip report for {}: no issue number in context",
                context.repository
            );
            return false;
        };
        let params = IssueCommentParams {
            owner: &context.repository.owner,
            repo: &context.repository.name,
            issue_number,
            body: message,
        };
        match self.client.post_issue_comment(&params) {
            Ok(comment) => {
                info!(
                    "posted status comment {} to {}#{}",
                    comment.id, context.repository, issue_number
                );
                true
            }
            Err(err) => {
                warn!(
                    "failed to post status comment to {}#{}: {}",
                    context.repository, issue_number, err
                );
                false
            }
        }
    }
}
