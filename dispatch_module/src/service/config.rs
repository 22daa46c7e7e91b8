use std::env;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use report_module::DEFAULT_GITHUB_API_BASE_URL;
use run_task_module::{
    build_github_env, GitHubCredentials, PhaseSettings, RunTaskError, DEFAULT_ALLOWED_TOOLS,
    DEFAULT_KILL_GRACE_SECS, DEFAULT_TASK_EXECUTABLE,
};

use crate::context::DEFAULT_GITHUB_HOST;
use crate::senders::parse_sender_list;

pub const DEFAULT_TRUSTED_SENDERS: &str = "notifications@github.com";
pub const DEFAULT_WORKSPACE_ROOT: &str = ".workspace/repos";
pub const DEFAULT_WORK_TIMEOUT_SECS: u64 = 1800;
pub const DEFAULT_COMMIT_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_SPOOL_DIR: &str = ".workspace/spool";
pub const DEFAULT_TRANSCRIPT_DIR: &str = "logs";

const TOKEN_KEYS: &[&str] = &["GH_TOKEN", "GITHUB_TOKEN", "GITHUB_PERSONAL_ACCESS_TOKEN"];
const ASKPASS_DIR_NAME: &str = ".askpass";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("unknown POLLER {0:?} (expected github or spool)")]
    UnknownPoller(String),
    #[error("the github poller needs GH_TOKEN, GITHUB_TOKEN or GITHUB_PERSONAL_ACCESS_TOKEN")]
    MissingToken,
    #[error("the github poller needs TRUSTED_SENDERS listing the GitHub logins allowed to request work")]
    MissingTrustedSenders,
    #[error("failed to resolve path: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerKind {
    Github,
    Spool,
}

impl FromStr for PollerKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(PollerKind::Github),
            "spool" => Ok(PollerKind::Spool),
            _ => Err(ConfigError::UnknownPoller(value.to_string())),
        }
    }
}

impl fmt::Display for PollerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollerKind::Github => write!(f, "github"),
            PollerKind::Spool => write!(f, "spool"),
        }
    }
}

/// Process-wide settings, read once at startup and immutable afterwards.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub trusted_senders: Vec<String>,
    pub workspace_root: PathBuf,
    pub work_timeout: Duration,
    pub commit_timeout: Duration,
    pub kill_grace: Duration,
    pub poll_interval: Duration,
    pub task_executable: String,
    pub task_extra_args: Vec<String>,
    pub allowed_tools: String,
    pub github_host: String,
    pub github_api_base_url: String,
    pub github_token: Option<String>,
    pub github_username: Option<String>,
    /// Only presence is recorded; the key itself stays in the environment.
    pub anthropic_api_key_present: bool,
    pub poller: PollerKind,
    pub spool_dir: PathBuf,
    pub transcript_dir: PathBuf,
    pub transcript_reset_on_start: bool,
    pub run_once: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            trusted_senders: parse_sender_list(DEFAULT_TRUSTED_SENDERS),
            workspace_root: PathBuf::from(DEFAULT_WORKSPACE_ROOT),
            work_timeout: Duration::from_secs(DEFAULT_WORK_TIMEOUT_SECS),
            commit_timeout: Duration::from_secs(DEFAULT_COMMIT_TIMEOUT_SECS),
            kill_grace: Duration::from_secs(DEFAULT_KILL_GRACE_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            task_executable: DEFAULT_TASK_EXECUTABLE.to_string(),
            task_extra_args: Vec::new(),
            allowed_tools: DEFAULT_ALLOWED_TOOLS.to_string(),
            github_host: DEFAULT_GITHUB_HOST.to_string(),
            github_api_base_url: DEFAULT_GITHUB_API_BASE_URL.to_string(),
            github_token: None,
            github_username: None,
            anthropic_api_key_present: false,
            poller: PollerKind::Github,
            spool_dir: PathBuf::from(DEFAULT_SPOOL_DIR),
            transcript_dir: PathBuf::from(DEFAULT_TRANSCRIPT_DIR),
            transcript_reset_on_start: true,
            run_once: false,
        }
    }
}

impl DispatchConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Relative paths
    /// are resolved against the current directory.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let explicit_senders = read("TRUSTED_SENDERS")
            .map(|value| parse_sender_list(&value))
            .filter(|senders| !senders.is_empty());
        let workspace_root = resolve_path(
            read("WORKSPACE_ROOT")
                .or_else(|| read("PROJECT_FOLDER"))
                .unwrap_or_else(|| DEFAULT_WORKSPACE_ROOT.to_string()),
        )?;
        let work_timeout = read_secs(&read, "WORK_TIMEOUT_SECS", DEFAULT_WORK_TIMEOUT_SECS)?;
        let commit_timeout =
            read_secs(&read, "COMMIT_TIMEOUT_SECS", DEFAULT_COMMIT_TIMEOUT_SECS)?;
        let kill_grace = read_secs(&read, "KILL_GRACE_SECS", DEFAULT_KILL_GRACE_SECS)?;
        let poll_interval = read_secs(&read, "POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;

        let task_executable =
            read("TASK_EXECUTABLE").unwrap_or_else(|| DEFAULT_TASK_EXECUTABLE.to_string());
        let task_extra_args = read("TASK_EXTRA_ARGS")
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        let allowed_tools =
            read("ALLOWED_TOOLS").unwrap_or_else(|| DEFAULT_ALLOWED_TOOLS.to_string());

        let github_host = read("GITHUB_HOST")
            .map(|value| value.trim_end_matches('/').to_ascii_lowercase())
            .unwrap_or_else(|| DEFAULT_GITHUB_HOST.to_string());
        let github_api_base_url = read("GITHUB_API_BASE_URL")
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_GITHUB_API_BASE_URL.to_string());
        let github_token = TOKEN_KEYS.iter().find_map(|key| read(*key));
        let github_username = read("GITHUB_USERNAME");
        let anthropic_api_key_present = read("ANTHROPIC_API_KEY").is_some();

        let poller = match read("POLLER") {
            Some(value) => value.parse::<PollerKind>()?,
            None => PollerKind::Github,
        };
        if poller == PollerKind::Github && github_token.is_none() {
            return Err(ConfigError::MissingToken);
        }
        // GitHub reports comment authors by login, never by the notification address.
        if poller == PollerKind::Github && explicit_senders.is_none() {
            return Err(ConfigError::MissingTrustedSenders);
        }
        let trusted_senders = explicit_senders.unwrap_or(defaults.trusted_senders);
        let spool_dir =
            resolve_path(read("SPOOL_DIR").unwrap_or_else(|| DEFAULT_SPOOL_DIR.to_string()))?;
        let transcript_dir = resolve_path(
            read("TRANSCRIPT_DIR").unwrap_or_else(|| DEFAULT_TRANSCRIPT_DIR.to_string()),
        )?;
        let transcript_reset_on_start = read("TRANSCRIPT_RESET_ON_START")
            .map(|value| is_truthy(&value))
            .unwrap_or(true);
        let run_once = read("DISPATCH_RUN_ONCE")
            .map(|value| is_truthy(&value))
            .unwrap_or(false);

        Ok(Self {
            trusted_senders,
            workspace_root,
            work_timeout,
            commit_timeout,
            kill_grace,
            poll_interval,
            task_executable,
            task_extra_args,
            allowed_tools,
            github_host,
            github_api_base_url,
            github_token,
            github_username,
            anthropic_api_key_present,
            poller,
            spool_dir,
            transcript_dir,
            transcript_reset_on_start,
            run_once,
        })
    }

    /// Supervisor settings, including the git/gh environment. Writes the
    /// askpass helper under the workspace root when a token is configured.
    pub fn phase_settings(&self) -> Result<PhaseSettings, RunTaskError> {
        let credentials = GitHubCredentials {
            token: self.github_token.clone(),
            username: self.github_username.clone(),
        };
        let env_overrides = build_github_env(&credentials, &self.askpass_dir())?;
        Ok(PhaseSettings {
            executable: self.task_executable.clone(),
            extra_args: self.task_extra_args.clone(),
            allowed_tools: self.allowed_tools.clone(),
            workspace_root: self.workspace_root.clone(),
            kill_grace: self.kill_grace,
            github_host: self.github_host.clone(),
            env_overrides,
            credential_presence: vec![
                (
                    "ANTHROPIC_API_KEY".to_string(),
                    self.anthropic_api_key_present,
                ),
                ("GH_TOKEN".to_string(), self.github_token.is_some()),
            ],
        })
    }

    pub fn askpass_dir(&self) -> PathBuf {
        self.workspace_root.join(ASKPASS_DIR_NAME)
    }

    pub fn log_summary(&self) {
        info!("dispatcher configuration:");
        info!("  poller={} interval={}s run_once={}", self.poller, self.poll_interval.as_secs(), self.run_once);
        info!("  trusted_senders={}", self.trusted_senders.join(","));
        info!("  workspace_root={}", self.workspace_root.display());
        info!(
            "  executable={} extra_args={:?} allowed_tools={}",
            self.task_executable, self.task_extra_args, self.allowed_tools
        );
        info!(
            "  work_timeout={}s commit_timeout={}s kill_grace={}s",
            self.work_timeout.as_secs(),
            self.commit_timeout.as_secs(),
            self.kill_grace.as_secs()
        );
        info!(
            "  github_host={} api={}",
            self.github_host, self.github_api_base_url
        );
        info!(
            "  github_token={} github_username={} anthropic_api_key={}",
            set_or_not(self.github_token.is_some()),
            self.github_username.as_deref().unwrap_or("not set"),
            set_or_not(self.anthropic_api_key_present)
        );
        if self.poller == PollerKind::Spool {
            info!("  spool_dir={}", self.spool_dir.display());
        }
        info!(
            "  transcript_dir={} reset_on_start={}",
            self.transcript_dir.display(),
            self.transcript_reset_on_start
        );
    }
}

fn read_secs<F>(read: &F, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match read(key) {
        None => Ok(Duration::from_secs(default)),
        Some(value) => value
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or(ConfigError::InvalidNumber { key, value }),
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y"
    )
}

fn set_or_not(present: bool) -> &'static str {
    if present {
        "set"
    } else {
        "not set"
    }
}

fn resolve_path(raw: String) -> Result<PathBuf, io::Error> {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(env::current_dir()?.join(path))
    }
}
