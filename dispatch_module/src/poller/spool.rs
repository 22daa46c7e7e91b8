use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::dispatcher::InboundEvent;

use super::{PendingEvent, PollError, Poller};

pub const PROCESSED_DIR_NAME: &str = "processed";
pub const REJECTED_DIR_NAME: &str = "rejected";

/// Consumes `*.json` [`InboundEvent`] files dropped into a directory by an
/// external fetcher. Files are handled in name order; acknowledged files move
/// to `processed/`, unparsable ones to `rejected/`.
#[derive(Debug, Clone)]
pub struct SpoolPoller {
    dir: PathBuf,
}

impl SpoolPoller {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(dir.join(PROCESSED_DIR_NAME))?;
        fs::create_dir_all(dir.join(REJECTED_DIR_NAME))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn pending_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_json = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("json"))
                .unwrap_or(false);
            if is_json && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn move_into(&self, path: &Path, subdir: &str) -> io::Result<()> {
        let Some(name) = path.file_name() else {
            return Ok(());
        };
        fs::rename(path, self.dir.join(subdir).join(name))
    }

    /// A file that cannot be rejected stays in place and is retried next cycle.
    fn reject(&self, path: &Path, reason: &str) {
        error!("rejecting spool file {}: {}", path.display(), reason);
        if let Err(err) = self.move_into(path, REJECTED_DIR_NAME) {
            error!(
                "failed to move {} into {}/: {}",
                path.display(),
                REJECTED_DIR_NAME,
                err
            );
        }
    }
}

impl Poller for SpoolPoller {
    fn poll(&mut self) -> Result<Vec<PendingEvent>, PollError> {
        let mut pending = Vec::new();
        for path in self.pending_files()? {
            let Some(token) = path.file_name().and_then(|name| name.to_str()) else {
                self.reject(&path, "file name is not valid UTF-8");
                continue;
            };
            let token = token.to_string();
            let parsed = fs::read_to_string(&path)
                .map_err(|err| err.to_string())
                .and_then(|raw| {
                    serde_json::from_str::<InboundEvent>(&raw).map_err(|err| err.to_string())
                });
            match parsed {
                Ok(event) => {
                    debug!("spool event {} from {}", token, event.sender);
                    pending.push(PendingEvent { token, event });
                }
                Err(err) => self.reject(&path, &err),
            }
        }
        Ok(pending)
    }

    fn acknowledge(&mut self, pending: &PendingEvent) -> Result<(), PollError> {
        let path = self.dir.join(&pending.token);
        self.move_into(&path, PROCESSED_DIR_NAME)?;
        info!("moved spool event {} to {}/", pending.token, PROCESSED_DIR_NAME);
        Ok(())
    }
}
