use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// `owner/name` pair identifying a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryId {
    pub owner: String,
    pub name: String,
}

impl RepositoryId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn html_url(&self, host: &str) -> String {
        format!("https://{}/{}/{}", host, self.owner, self.name)
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Where and what a dispatched task applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskContext {
    pub repository: RepositoryId,
    #[serde(default)]
    pub issue_number: Option<u64>,
    #[serde(default)]
    pub issue_url: Option<String>,
    /// Free-text comment recovered from the event body, signature stripped.
    #[serde(default, skip_serializing)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Performs the requested change.
    Work,
    /// Finalizes version-control state after a successful work phase.
    Commit,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Work => "work",
            Phase::Commit => "commit",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "code", rename_all = "snake_case")]
pub enum ExitClassification {
    Success,
    NonZeroExit(i32),
    /// Exited after SIGTERM, within the grace window.
    TimedOut,
    /// Needed SIGKILL, or died from a signal the supervisor did not send.
    Killed,
}

impl ExitClassification {
    pub fn is_success(&self) -> bool {
        matches!(self, ExitClassification::Success)
    }
}

impl fmt::Display for ExitClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitClassification::Success => write!(f, "success"),
            ExitClassification::NonZeroExit(code) => write!(f, "exited with code {}", code),
            ExitClassification::TimedOut => write!(f, "timed out"),
            ExitClassification::Killed => write!(f, "killed"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub classification: ExitClassification,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    #[serde(skip)]
    pub output: String,
}

/// One supervised invocation of the task executable.
#[derive(Debug, Clone)]
pub struct PhaseRequest<'a> {
    pub phase: Phase,
    pub subject: &'a str,
    pub context: &'a TaskContext,
    pub timeout: Duration,
}

/// Process-wide settings for the supervisor, built once at startup.
#[derive(Debug, Clone)]
pub struct PhaseSettings {
    pub executable: String,
    pub extra_args: Vec<String>,
    pub allowed_tools: String,
    pub workspace_root: PathBuf,
    pub kill_grace: Duration,
    pub github_host: String,
    /// Extra environment for the executable (git identity, gh token).
    pub env_overrides: Vec<(String, String)>,
    /// Credential names mapped to presence, recorded in transcripts.
    pub credential_presence: Vec<(String, bool)>,
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub(super) fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.as_secs_f64())
    }
}
