//! Append-only transcript files documenting every supervised run.
//!
//! The task executable is a black box; these files are the only postmortem
//! record of what it printed and how it ended.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Local;
use tracing::{info, warn};

use super::constants::{ERRORS_LOG_FILE, EXECUTION_LOG_FILE, RESPONSES_LOG_FILE};

#[derive(Debug, Clone)]
pub struct TranscriptSink {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl TranscriptSink {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn execution_log_path(&self) -> PathBuf {
        self.dir.join(EXECUTION_LOG_FILE)
    }

    pub fn responses_log_path(&self) -> PathBuf {
        self.dir.join(RESPONSES_LOG_FILE)
    }

    pub fn errors_log_path(&self) -> PathBuf {
        self.dir.join(ERRORS_LOG_FILE)
    }

    /// Removes all transcript files; called once at startup.
    pub fn reset(&self) -> io::Result<()> {
        for path in [
            self.execution_log_path(),
            self.responses_log_path(),
            self.errors_log_path(),
        ] {
            match fs::remove_file(&path) {
                Ok(()) => info!("deleted transcript file {}", path.display()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    pub(crate) fn execution_line(&self, line: &str) {
        self.append(&self.execution_log_path(), &format!("{}\n", line));
    }

    pub(crate) fn execution_header(&self, title: &str, fields: &[(&str, String)]) {
        let mut block = format!("=== {} at {} ===\n", title, timestamp());
        for (key, value) in fields {
            block.push_str(&format!("{}: {}\n", key, value));
        }
        self.append(&self.execution_log_path(), &block);
    }

    pub(crate) fn execution_footer(&self, title: &str, status: &str) {
        let block = format!("Status: {}\n=== {} at {} ===\n", status, title, timestamp());
        self.append(&self.execution_log_path(), &block);
    }

    pub fn record_response(&self, subject: &str, phase: &str, output: &str) {
        let block = format!(
            "\n=== Task {} phase finished at {} ===\nSubject: {}\n\n=== Command response ===\n{}\n",
            phase,
            timestamp(),
            subject,
            output
        );
        self.append(&self.responses_log_path(), &block);
    }

    pub fn record_error(&self, context: &str, error: &str) {
        let block = format!(
            "\n=== Task runner ERROR at {} ===\n{}\n{}\n",
            timestamp(),
            context,
            error
        );
        self.append(&self.errors_log_path(), &block);
    }

    fn append(&self, path: &Path, content: &str) {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = open_append(path).and_then(|mut file| file.write_all(content.as_bytes()))
        {
            warn!("failed to write transcript {}: {}", path.display(), err);
        }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reset_removes_existing_files_only() {
        let temp = TempDir::new().unwrap();
        let sink = TranscriptSink::new(temp.path().join("logs")).unwrap();
        sink.record_error("ctx", "boom");
        assert!(sink.errors_log_path().exists());

        sink.reset().unwrap();
        assert!(!sink.errors_log_path().exists());
        assert!(!sink.execution_log_path().exists());
    }

    #[test]
    fn blocks_are_appended() {
        let temp = TempDir::new().unwrap();
        let sink = TranscriptSink::new(temp.path()).unwrap();
        sink.execution_header("Task execution started", &[("Phase", "work".to_string())]);
        sink.execution_line("hello");
        sink.execution_footer("Task execution completed", "success");

        let content = fs::read_to_string(sink.execution_log_path()).unwrap();
        assert!(content.contains("=== Task execution started at "));
        assert!(content.contains("Phase: work\nhello\nStatus: success\n"));
        assert!(content.contains("=== Task execution completed at "));
    }

    #[test]
    fn responses_record_subject_and_output() {
        let temp = TempDir::new().unwrap();
        let sink = TranscriptSink::new(temp.path()).unwrap();
        sink.record_response("Fix bug", "work", "done");
        let content = fs::read_to_string(sink.responses_log_path()).unwrap();
        assert!(content.contains("Subject: Fix bug"));
        assert!(content.contains("=== Command response ===\ndone"));
    }
}
