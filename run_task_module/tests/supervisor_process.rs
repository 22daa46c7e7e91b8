use run_task_module::{
    run_task, ExitClassification, Phase, PhaseRequest, PhaseSettings, RepositoryId, RunTaskError,
    Supervisor, TaskContext, TranscriptSink,
};
use serial_test::serial;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write script");
    let mut perms = fs::metadata(&path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod");
    path
}

fn settings(executable: &Path, workspace_root: &Path, kill_grace: Duration) -> PhaseSettings {
    PhaseSettings {
        executable: executable.to_string_lossy().into_owned(),
        extra_args: Vec::new(),
        allowed_tools: "Bash,Edit".to_string(),
        workspace_root: workspace_root.to_path_buf(),
        kill_grace,
        github_host: "github.com".to_string(),
        env_overrides: vec![("GH_TOKEN".to_string(), "ghp_super_secret".to_string())],
        credential_presence: vec![
            ("ANTHROPIC_API_KEY".to_string(), false),
            ("GH_TOKEN".to_string(), true),
        ],
    }
}

struct Harness {
    temp: TempDir,
    workdir: PathBuf,
    transcript: TranscriptSink,
}

impl Harness {
    fn new() -> Self {
        let temp = TempDir::new().expect("tempdir");
        let workdir = temp.path().join("work");
        fs::create_dir_all(&workdir).expect("workdir");
        let transcript = TranscriptSink::new(temp.path().join("logs")).expect("transcript");
        Self {
            temp,
            workdir,
            transcript,
        }
    }

    fn supervisor(&self, script_body: &str, kill_grace: Duration) -> (Supervisor, PhaseSettings) {
        let bin_dir = self.temp.path().join("bin");
        fs::create_dir_all(&bin_dir).expect("bin dir");
        let script = write_script(&bin_dir, "fake-agent", script_body);
        let settings = settings(&script, &self.temp.path().join("repos"), kill_grace);
        (
            Supervisor::new(&settings, self.transcript.clone()),
            settings,
        )
    }
}

#[test]
#[serial]
fn exit_zero_is_success_and_output_is_captured() {
    let harness = Harness::new();
    let (supervisor, _) = harness.supervisor(
        "echo one\nsleep 0.2\necho two >&2\nsleep 0.2\necho three",
        Duration::from_secs(5),
    );

    let result = supervisor
        .run("do it", &harness.workdir, Duration::from_secs(10), &[])
        .expect("run");

    assert_eq!(result.classification, ExitClassification::Success);
    assert_eq!(result.output, "one\ntwo\nthree\n");
    assert!(result.duration < Duration::from_secs(10));
}

#[test]
#[serial]
fn prompt_and_tools_are_passed_as_arguments() {
    let harness = Harness::new();
    let (supervisor, _) =
        harness.supervisor("printf '%s|' \"$@\"; echo", Duration::from_secs(5));

    let result = supervisor
        .run("fix the bug", &harness.workdir, Duration::from_secs(10), &[])
        .expect("run");

    assert_eq!(result.output, "-p|fix the bug|--allowedTools|Bash,Edit|\n");
}

#[test]
#[serial]
fn non_zero_exit_carries_code() {
    let harness = Harness::new();
    let (supervisor, _) = harness.supervisor("echo failing >&2\nexit 3", Duration::from_secs(5));

    let result = supervisor
        .run("do it", &harness.workdir, Duration::from_secs(10), &[])
        .expect("run");

    assert_eq!(result.classification, ExitClassification::NonZeroExit(3));
    assert!(result.output.contains("failing"));
}

#[test]
#[serial]
fn sleeping_past_timeout_is_timed_out() {
    let harness = Harness::new();
    let (supervisor, _) = harness.supervisor("echo started\nexec sleep 30", Duration::from_secs(5));

    let result = supervisor
        .run("do it", &harness.workdir, Duration::from_secs(1), &[])
        .expect("run");

    assert_eq!(result.classification, ExitClassification::TimedOut);
    assert!(result.duration >= Duration::from_secs(1));
    assert!(result.duration < Duration::from_secs(10));
    assert!(result.output.contains("started"));
}

#[test]
#[serial]
fn ignoring_sigterm_escalates_to_kill() {
    let harness = Harness::new();
    let (supervisor, _) = harness.supervisor("trap '' TERM\nsleep 30", Duration::from_millis(500));

    let result = supervisor
        .run("do it", &harness.workdir, Duration::from_secs(1), &[])
        .expect("run");

    assert_eq!(result.classification, ExitClassification::Killed);
    assert!(result.duration >= Duration::from_millis(1500));
    assert!(result.duration < Duration::from_secs(10));
}

/// Live unless gone from /proc or a zombie waiting on a reaper.
fn process_alive(pid: u32) -> bool {
    let Ok(stat) = fs::read_to_string(format!("/proc/{}/stat", pid)) else {
        return false;
    };
    let state = stat
        .rsplit_once(')')
        .and_then(|(_, rest)| rest.trim_start().chars().next());
    !matches!(state, Some('Z') | Some('X') | None)
}

fn wait_until_gone(pid: u32) -> bool {
    for _ in 0..40 {
        if !process_alive(pid) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

fn background_pid(workdir: &Path) -> u32 {
    fs::read_to_string(workdir.join("bg.pid"))
        .expect("pid file")
        .trim()
        .parse()
        .expect("pid")
}

#[test]
#[serial]
fn background_process_does_not_outlive_a_clean_exit() {
    let harness = Harness::new();
    let (supervisor, _) = harness.supervisor(
        "sleep 30 >/dev/null 2>&1 &\necho $! > bg.pid\necho done\nexit 0",
        Duration::from_secs(1),
    );

    let result = supervisor
        .run("do it", &harness.workdir, Duration::from_secs(10), &[])
        .expect("run");

    assert_eq!(result.classification, ExitClassification::Success);
    assert!(result.output.contains("done"));
    assert!(result.duration < Duration::from_secs(10));
    assert!(wait_until_gone(background_pid(&harness.workdir)));
}

#[test]
#[serial]
fn background_process_ignoring_sigterm_is_killed_after_timeout() {
    let harness = Harness::new();
    let (supervisor, _) = harness.supervisor(
        "(trap '' TERM; exec sleep 30) >/dev/null 2>&1 &\necho $! > bg.pid\nexec sleep 30",
        Duration::from_millis(500),
    );

    let result = supervisor
        .run("do it", &harness.workdir, Duration::from_secs(1), &[])
        .expect("run");

    assert_eq!(result.classification, ExitClassification::TimedOut);
    assert!(result.duration >= Duration::from_millis(1500));
    assert!(result.duration < Duration::from_secs(10));
    assert!(wait_until_gone(background_pid(&harness.workdir)));
}

#[test]
#[serial]
fn missing_executable_is_a_launch_error() {
    let harness = Harness::new();
    let settings = settings(
        Path::new("/nonexistent/neon-agent-missing"),
        &harness.temp.path().join("repos"),
        Duration::from_secs(1),
    );
    let supervisor = Supervisor::new(&settings, harness.transcript.clone());

    let err = supervisor
        .run("do it", &harness.workdir, Duration::from_secs(1), &[])
        .expect_err("missing executable");
    assert!(matches!(err, RunTaskError::ExecutableNotFound { .. }));
}

#[test]
#[serial]
fn run_task_recreates_workspace_and_records_transcript() {
    let harness = Harness::new();
    let (supervisor, settings) = harness.supervisor(
        "pwd\necho \"repo=$REPOSITORY_URL issue=$ISSUE_URL phase=$TASK_PHASE\"\ntouch created.txt",
        Duration::from_secs(5),
    );
    let context = TaskContext {
        repository: RepositoryId::new("acme", "widgets"),
        issue_number: Some(42),
        issue_url: Some("https://github.com/acme/widgets/issues/42".to_string()),
        comment: None,
    };
    let workspace = settings.workspace_root.join("acme").join("widgets");
    fs::create_dir_all(&workspace).expect("workspace");
    fs::write(workspace.join("stale.txt"), "old").expect("stale");

    let work = run_task(
        &supervisor,
        &settings,
        &PhaseRequest {
            phase: Phase::Work,
            subject: "Fix bug",
            context: &context,
            timeout: Duration::from_secs(10),
        },
    )
    .expect("work phase");

    assert_eq!(work.classification, ExitClassification::Success);
    assert!(work.output.contains(
        "repo=https://github.com/acme/widgets issue=https://github.com/acme/widgets/issues/42 phase=work"
    ));
    assert!(!workspace.join("stale.txt").exists());
    assert!(workspace.join("created.txt").exists());

    let commit = run_task(
        &supervisor,
        &settings,
        &PhaseRequest {
            phase: Phase::Commit,
            subject: "Fix bug",
            context: &context,
            timeout: Duration::from_secs(10),
        },
    )
    .expect("commit phase");
    assert_eq!(commit.classification, ExitClassification::Success);
    assert!(workspace.join("created.txt").exists());

    let execution_log =
        fs::read_to_string(harness.transcript.execution_log_path()).expect("execution log");
    assert!(execution_log.contains("GH_TOKEN present: Yes"));
    assert!(execution_log.contains("ANTHROPIC_API_KEY present: No"));
    assert!(!execution_log.contains("ghp_super_secret"));
    assert!(execution_log.contains("Status: success after"));

    let responses =
        fs::read_to_string(harness.transcript.responses_log_path()).expect("responses log");
    assert!(responses.contains("=== Task work phase finished at"));
    assert!(responses.contains("=== Task commit phase finished at"));
}
