mod config;
mod runner;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use config::{
    ConfigError, DispatchConfig, PollerKind, DEFAULT_COMMIT_TIMEOUT_SECS,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_SPOOL_DIR, DEFAULT_TRANSCRIPT_DIR,
    DEFAULT_TRUSTED_SENDERS, DEFAULT_WORKSPACE_ROOT, DEFAULT_WORK_TIMEOUT_SECS,
};
pub use runner::{build_dispatcher, build_poller, run_service};
