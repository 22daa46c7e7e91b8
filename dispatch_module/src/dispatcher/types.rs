use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use run_task_module::{ExecutionResult, ExitClassification, TaskContext};

/// One unread message or notification that may represent work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub sender: String,
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    pub fn new(
        sender: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            subject: subject.into(),
            body: body.into(),
            received_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    UntrustedSender,
    FeedbackNoise,
    NoRepository,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::UntrustedSender => write!(f, "sender is not trusted"),
            DropReason::FeedbackNoise => write!(f, "feedback from a previous dispatch"),
            DropReason::NoRepository => write!(f, "no repository URL found"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum DispatchStatus {
    Dropped(DropReason),
    LaunchFailed(String),
    WorkFailed(ExitClassification),
    CommitFailed(ExitClassification),
    Completed,
}

impl DispatchStatus {
    pub fn is_dropped(&self) -> bool {
        matches!(self, DispatchStatus::Dropped(_))
    }
}

/// Log-only summary of one event's trip through the dispatcher.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchRecord {
    pub id: Uuid,
    pub sender: String,
    pub subject: String,
    pub received_at: DateTime<Utc>,
    pub context: Option<TaskContext>,
    pub work: Option<ExecutionResult>,
    pub commit: Option<ExecutionResult>,
    pub reports_posted: usize,
    pub status: DispatchStatus,
}

impl DispatchRecord {
    pub(super) fn for_event(event: &InboundEvent, status: DispatchStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: event.sender.clone(),
            subject: event.subject.clone(),
            received_at: event.received_at,
            context: None,
            work: None,
            commit: None,
            reports_posted: 0,
            status,
        }
    }
}
