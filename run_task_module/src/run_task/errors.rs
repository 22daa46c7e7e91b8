use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RunTaskError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("task executable not found on PATH: {executable}")]
    ExecutableNotFound { executable: String },
    #[error("invalid path for {label}: {} ({reason})", path.display())]
    InvalidPath {
        label: &'static str,
        path: PathBuf,
        reason: &'static str,
    },
}
