mod constants;
mod core;
mod errors;
mod github_auth;
mod prompt;
mod supervisor;
mod transcript;
mod types;
mod utils;
mod workspace;

pub use constants::{DEFAULT_ALLOWED_TOOLS, DEFAULT_KILL_GRACE_SECS, DEFAULT_TASK_EXECUTABLE};
pub use self::core::run_task;
pub use errors::RunTaskError;
pub use github_auth::{build_github_env, GitHubCredentials};
pub use prompt::normalize_subject;
pub use supervisor::Supervisor;
pub use transcript::TranscriptSink;
pub use types::{
    ExecutionResult, ExitClassification, Phase, PhaseRequest, PhaseSettings, RepositoryId,
    TaskContext,
};
pub use utils::{format_duration, preview};
pub use workspace::workspace_dir_for;
