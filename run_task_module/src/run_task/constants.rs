pub const DEFAULT_TASK_EXECUTABLE: &str = "claude";
pub const DEFAULT_ALLOWED_TOOLS: &str = "Bash,Edit";
pub const DEFAULT_KILL_GRACE_SECS: u64 = 30;
pub(super) const OUTPUT_BUFFER_MAX_BYTES: usize = 64 * 1024;
pub(super) const RESPONSE_LOG_TAIL_BYTES: usize = 4000;
pub(super) const SUPERVISOR_POLL_INTERVAL_MS: u64 = 100;
/// Upper bound on waiting for pipes to drain after the child exits.
pub(super) const OUTPUT_DRAIN_TIMEOUT_MS: u64 = 2000;
pub(super) const EXECUTION_LOG_FILE: &str = "execution.log";
pub(super) const RESPONSES_LOG_FILE: &str = "responses.log";
pub(super) const ERRORS_LOG_FILE: &str = "errors.log";
pub(super) const GIT_ASKPASS_SCRIPT: &str = r#"#!/bin/sh
case "$1" in
  *Username*)
    if [ -n "$GITHUB_USERNAME" ]; then
      printf "%s" "$GITHUB_USERNAME"
    else
      printf "%s" "x-access-token"
    fi
    ;;
  *Password*)
    if [ -n "$GH_TOKEN" ]; then
      printf "%s" "$GH_TOKEN"
    elif [ -n "$GITHUB_TOKEN" ]; then
      printf "%s" "$GITHUB_TOKEN"
    fi
    ;;
  *)
    ;;
esac
exit 0
"#;
