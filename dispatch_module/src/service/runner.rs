use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task;
use tracing::info;

use report_module::IssueCommentClient;
use run_task_module::TranscriptSink;

use crate::dispatcher::{Dispatcher, ModuleExecutor};
use crate::poller::{run_poll_loop, GithubNotificationPoller, Poller, SpoolPoller};
use crate::reporter::GithubIssueReporter;

use super::config::{ConfigError, DispatchConfig, PollerKind};
use super::BoxError;

pub fn build_dispatcher(
    config: Arc<DispatchConfig>,
    transcript: TranscriptSink,
) -> Result<Dispatcher<ModuleExecutor, GithubIssueReporter>, BoxError> {
    let settings = config.phase_settings()?;
    let executor = ModuleExecutor::new(settings, transcript);
    let client = IssueCommentClient::new(
        config.github_api_base_url.clone(),
        config.github_token.clone(),
    )?;
    let reporter = GithubIssueReporter::new(client);
    Ok(Dispatcher::new(config, executor, reporter)?)
}

pub fn build_poller(config: &DispatchConfig) -> Result<Box<dyn Poller + Send>, BoxError> {
    match config.poller {
        PollerKind::Github => {
            let token = config
                .github_token
                .clone()
                .ok_or(ConfigError::MissingToken)?;
            Ok(Box::new(GithubNotificationPoller::new(
                config.github_api_base_url.clone(),
                token,
            )?))
        }
        PollerKind::Spool => Ok(Box::new(SpoolPoller::new(&config.spool_dir)?)),
    }
}

/// Runs the poll loop on a blocking thread until `shutdown` resolves, or
/// after one cycle when the configuration asks for a single run. A dispatch
/// in flight is always allowed to finish.
pub async fn run_service(
    config: DispatchConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), BoxError> {
    config.log_summary();
    let config = Arc::new(config);
    let stop = Arc::new(AtomicBool::new(false));

    let mut worker = {
        let config = config.clone();
        let stop = stop.clone();
        task::spawn_blocking(move || -> Result<(), BoxError> {
            let transcript = TranscriptSink::new(&config.transcript_dir)?;
            if config.transcript_reset_on_start {
                transcript.reset()?;
                info!("reset transcript files in {}", transcript.dir().display());
            }
            let dispatcher = build_dispatcher(config.clone(), transcript)?;
            let mut poller = build_poller(&config)?;
            run_poll_loop(
                poller.as_mut(),
                &dispatcher,
                &stop,
                config.poll_interval,
                config.run_once,
            );
            Ok(())
        })
    };

    tokio::select! {
        joined = &mut worker => return joined?,
        _ = shutdown => {
            info!("shutdown requested; waiting for the current dispatch to finish");
            stop.store(true, Ordering::Relaxed);
        }
    }
    worker.await?
}
