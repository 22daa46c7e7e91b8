pub mod context;
pub mod dispatcher;
pub mod feedback;
pub mod poller;
pub mod reporter;
pub mod senders;
pub mod service;

pub use context::{extract_task_context, ContextExtractor, DEFAULT_GITHUB_HOST};
pub use dispatcher::{
    DispatchRecord, DispatchStatus, Dispatcher, DropReason, InboundEvent, ModuleExecutor,
    PhaseExecutor,
};
pub use feedback::is_feedback_noise;
pub use poller::{
    run_poll_cycle, run_poll_loop, GithubNotificationPoller, PendingEvent, PollError, Poller,
    SpoolPoller,
};
pub use reporter::{GithubIssueReporter, IssueReporter};
pub use senders::{is_trusted_sender, normalize_sender};
pub use service::{run_service, BoxError, ConfigError, DispatchConfig, PollerKind};
