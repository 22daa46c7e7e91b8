use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tracing::{info, warn};

use super::constants::{
    OUTPUT_BUFFER_MAX_BYTES, OUTPUT_DRAIN_TIMEOUT_MS, SUPERVISOR_POLL_INTERVAL_MS,
};
use super::errors::RunTaskError;
use super::transcript::TranscriptSink;
use super::types::{ExecutionResult, ExitClassification, PhaseSettings};
use super::utils::{format_duration, truncate_head};

/// Runs the task executable under a wall-clock budget.
///
/// On expiry the whole process group gets SIGTERM; if it is still alive after
/// the grace window it gets SIGKILL. Nothing from the group outlives `run`:
/// members left behind by an exiting leader get the same TERM/KILL sequence.
#[derive(Debug, Clone)]
pub struct Supervisor {
    executable: String,
    extra_args: Vec<String>,
    allowed_tools: String,
    kill_grace: Duration,
    credential_presence: Vec<(String, bool)>,
    transcript: TranscriptSink,
}

#[derive(Debug, Clone, Copy)]
enum Escalation {
    None,
    Terminating(Instant),
    Killing,
}

enum OutputEvent {
    Line(String),
    Closed,
}

impl Supervisor {
    pub fn new(settings: &PhaseSettings, transcript: TranscriptSink) -> Self {
        Self {
            executable: settings.executable.clone(),
            extra_args: settings.extra_args.clone(),
            allowed_tools: settings.allowed_tools.clone(),
            kill_grace: settings.kill_grace,
            credential_presence: settings.credential_presence.clone(),
            transcript,
        }
    }

    pub fn transcript(&self) -> &TranscriptSink {
        &self.transcript
    }

    pub fn run(
        &self,
        prompt: &str,
        working_dir: &Path,
        timeout: Duration,
        env: &[(String, String)],
    ) -> Result<ExecutionResult, RunTaskError> {
        if !working_dir.is_dir() {
            return Err(RunTaskError::InvalidPath {
                label: "working_dir",
                path: working_dir.to_path_buf(),
                reason: "directory does not exist",
            });
        }

        self.write_header(working_dir, timeout, env);

        let mut child = match self.build_command(prompt, working_dir, env).spawn() {
            Ok(child) => child,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                self.transcript
                    .execution_footer("Task execution completed", "executable not found");
                return Err(RunTaskError::ExecutableNotFound {
                    executable: self.executable.clone(),
                });
            }
            Err(err) => {
                self.transcript
                    .execution_footer("Task execution completed", &format!("spawn failed: {}", err));
                return Err(RunTaskError::Io(err));
            }
        };
        let pid = child.id();
        info!(
            "task executable {} started pid={} timeout={}",
            self.executable,
            pid,
            format_duration(timeout)
        );

        let (tx, rx) = unbounded();
        let mut open_streams = 0;
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, tx.clone());
            open_streams += 1;
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, tx.clone());
            open_streams += 1;
        }
        drop(tx);

        let start = Instant::now();
        let mut output = String::new();
        let (status, escalation) =
            match self.supervise(&mut child, &rx, start, timeout, &mut output, &mut open_streams) {
                Ok(result) => result,
                Err(err) => {
                    send_to_group(pid, Signal::SIGKILL);
                    let _ = child.kill();
                    let _ = child.wait();
                    self.transcript
                        .execution_footer("Task execution completed", &format!("error: {}", err));
                    return Err(RunTaskError::Io(err));
                }
            };
        self.reap_group(pid, escalation);
        self.drain(&rx, &mut output, open_streams);
        let duration = start.elapsed();

        let classification = match escalation {
            Escalation::Killing => ExitClassification::Killed,
            Escalation::Terminating(_) => ExitClassification::TimedOut,
            Escalation::None => classify_status(status),
        };
        info!(
            "task executable {} finished pid={} classification={} duration={} output_bytes={}",
            self.executable,
            pid,
            classification,
            format_duration(duration),
            output.len()
        );
        self.transcript.execution_footer(
            "Task execution completed",
            &format!("{} after {}", classification, format_duration(duration)),
        );

        Ok(ExecutionResult {
            classification,
            duration,
            output,
        })
    }

    fn build_command(&self, prompt: &str, working_dir: &Path, env: &[(String, String)]) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg("-p")
            .arg(prompt)
            .arg("--allowedTools")
            .arg(&self.allowed_tools)
            .args(&self.extra_args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in env {
            cmd.env(key, value);
        }
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }

    fn supervise(
        &self,
        child: &mut Child,
        rx: &Receiver<OutputEvent>,
        start: Instant,
        timeout: Duration,
        output: &mut String,
        open_streams: &mut usize,
    ) -> io::Result<(ExitStatus, Escalation)> {
        let poll = Duration::from_millis(SUPERVISOR_POLL_INTERVAL_MS);
        let mut escalation = Escalation::None;
        loop {
            match rx.recv_timeout(poll) {
                Ok(OutputEvent::Line(line)) => self.push_line(output, &line),
                Ok(OutputEvent::Closed) => *open_streams = open_streams.saturating_sub(1),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => thread::sleep(poll),
            }

            if let Some(status) = child.try_wait()? {
                return Ok((status, escalation));
            }

            let now = Instant::now();
            match escalation {
                Escalation::None if now.duration_since(start) >= timeout => {
                    warn!(
                        "task executable pid={} exceeded {}; sending SIGTERM",
                        child.id(),
                        format_duration(timeout)
                    );
                    self.transcript.execution_line(&format!(
                        "TIMEOUT after {}; sending SIGTERM",
                        format_duration(timeout)
                    ));
                    self.signal(child, Signal::SIGTERM);
                    escalation = Escalation::Terminating(now);
                }
                Escalation::Terminating(since) if now.duration_since(since) >= self.kill_grace => {
                    warn!(
                        "task executable pid={} ignored SIGTERM for {}; sending SIGKILL",
                        child.id(),
                        format_duration(self.kill_grace)
                    );
                    self.transcript
                        .execution_line("grace window elapsed; sending SIGKILL");
                    self.signal(child, Signal::SIGKILL);
                    escalation = Escalation::Killing;
                }
                _ => {}
            }
        }
    }

    /// Waits for the rest of the process group once the leader has exited.
    /// Survivors get SIGTERM (unless the timeout already sent it) and SIGKILL
    /// when the grace window measured from that SIGTERM ends.
    fn reap_group(&self, pid: u32, escalation: Escalation) {
        let term_sent_at = match escalation {
            Escalation::Killing => {
                send_to_group(pid, Signal::SIGKILL);
                return;
            }
            Escalation::Terminating(since) => since,
            Escalation::None => {
                if !group_alive(pid) {
                    return;
                }
                warn!("process group {} outlived its leader; sending SIGTERM", pid);
                self.transcript
                    .execution_line("leftover processes after exit; sending SIGTERM");
                send_to_group(pid, Signal::SIGTERM);
                Instant::now()
            }
        };

        let poll = Duration::from_millis(SUPERVISOR_POLL_INTERVAL_MS);
        while group_alive(pid) {
            if term_sent_at.elapsed() >= self.kill_grace {
                warn!(
                    "process group {} ignored SIGTERM for {}; sending SIGKILL",
                    pid,
                    format_duration(self.kill_grace)
                );
                self.transcript
                    .execution_line("grace window elapsed for leftover processes; sending SIGKILL");
                send_to_group(pid, Signal::SIGKILL);
                return;
            }
            thread::sleep(poll);
        }
    }

    fn signal(&self, child: &mut Child, signal: Signal) {
        let pgid = group_id(child.id());
        match killpg(pgid, signal) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(err) => {
                warn!(
                    "failed to send {} to process group {}: {}; killing child directly",
                    signal, pgid, err
                );
                let _ = child.kill();
            }
        }
    }

    /// Collects output still in flight after exit. Bounded because a
    /// grandchild may keep the pipes open.
    fn drain(&self, rx: &Receiver<OutputEvent>, output: &mut String, mut open_streams: usize) {
        let deadline = Instant::now() + Duration::from_millis(OUTPUT_DRAIN_TIMEOUT_MS);
        while open_streams > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("output pipes still open after exit; dropping remaining output");
                break;
            }
            match rx.recv_timeout(remaining) {
                Ok(OutputEvent::Line(line)) => self.push_line(output, &line),
                Ok(OutputEvent::Closed) => open_streams -= 1,
                Err(_) => break,
            }
        }
    }

    fn push_line(&self, output: &mut String, line: &str) {
        self.transcript.execution_line(line);
        output.push_str(line);
        output.push('\n');
        truncate_head(output, OUTPUT_BUFFER_MAX_BYTES);
    }

    fn write_header(&self, working_dir: &Path, timeout: Duration, env: &[(String, String)]) {
        let phase = env
            .iter()
            .find(|(key, _)| key == "TASK_PHASE")
            .map(|(_, value)| value.clone())
            .unwrap_or_else(|| "-".to_string());
        let mut fields = vec![
            ("Phase", phase),
            ("Executable", self.executable.clone()),
            ("Working directory", working_dir.display().to_string()),
            ("Allowed tools", self.allowed_tools.clone()),
            ("Timeout", format!("{} seconds", timeout.as_secs())),
        ];
        let credentials = self
            .credential_presence
            .iter()
            .map(|(name, present)| format!("{} present: {}", name, if *present { "Yes" } else { "No" }))
            .collect::<Vec<_>>()
            .join(", ");
        if !credentials.is_empty() {
            fields.push(("Credentials", credentials));
        }
        self.transcript
            .execution_header("Task execution started", &fields);
    }
}

fn spawn_reader<R>(reader: R, tx: Sender<OutputEvent>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(|ch| ch == '\n' || ch == '\r')
                        .to_string();
                    if tx.send(OutputEvent::Line(line)).is_err() {
                        return;
                    }
                }
            }
        }
        let _ = tx.send(OutputEvent::Closed);
    });
}

fn group_id(pid: u32) -> Pid {
    Pid::from_raw(pid as i32)
}

/// True while any process is left in the group. Zombies count as alive until
/// their parent reaps them.
fn group_alive(pid: u32) -> bool {
    matches!(killpg(group_id(pid), None), Ok(()) | Err(Errno::EPERM))
}

fn send_to_group(pid: u32, signal: Signal) {
    match killpg(group_id(pid), signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => warn!("failed to send {} to process group {}: {}", signal, pid, err),
    }
}

fn classify_status(status: ExitStatus) -> ExitClassification {
    match status.code() {
        Some(0) => ExitClassification::Success,
        Some(code) => ExitClassification::NonZeroExit(code),
        None => ExitClassification::Killed,
    }
}
