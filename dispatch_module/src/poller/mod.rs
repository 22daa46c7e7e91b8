//! Sources of inbound events and the loop that feeds them to the dispatcher.

mod github;
mod spool;

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::dispatcher::{Dispatcher, InboundEvent, PhaseExecutor};
use crate::reporter::IssueReporter;

pub use github::GithubNotificationPoller;
pub use spool::{SpoolPoller, PROCESSED_DIR_NAME, REJECTED_DIR_NAME};

const STOP_CHECK_INTERVAL_MS: u64 = 200;

/// An event plus the poller-specific handle used to acknowledge it.
#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub token: String,
    pub event: InboundEvent,
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GitHub API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Yields unread events. `acknowledge` is called only after the dispatcher
/// returned for that event, so a crash mid-dispatch redelivers it.
pub trait Poller {
    fn poll(&mut self) -> Result<Vec<PendingEvent>, PollError>;
    fn acknowledge(&mut self, pending: &PendingEvent) -> Result<(), PollError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub received: usize,
    pub dispatched: usize,
    pub dropped: usize,
}

/// Polls once and dispatches the batch in order. Stops between events when
/// `stop` is set; unhandled events stay unacknowledged.
pub fn run_poll_cycle<P, E, R>(
    poller: &mut P,
    dispatcher: &Dispatcher<E, R>,
    stop: &AtomicBool,
) -> Result<CycleSummary, PollError>
where
    P: Poller + ?Sized,
    E: PhaseExecutor,
    R: IssueReporter,
{
    let batch = poller.poll()?;
    let mut summary = CycleSummary {
        received: batch.len(),
        ..CycleSummary::default()
    };
    for pending in &batch {
        if stop.load(Ordering::Relaxed) {
            info!("stop requested; leaving remaining events for the next run");
            break;
        }
        let record = dispatcher.dispatch(&pending.event);
        if record.status.is_dropped() {
            summary.dropped += 1;
        } else {
            summary.dispatched += 1;
        }
        if let Err(err) = poller.acknowledge(pending) {
            warn!("failed to acknowledge event {}: {}", pending.token, err);
        }
    }
    Ok(summary)
}

/// Runs poll cycles until `stop` is set, or once when `run_once` is true.
/// Poll errors are logged and the loop continues with the next cycle.
pub fn run_poll_loop<P, E, R>(
    poller: &mut P,
    dispatcher: &Dispatcher<E, R>,
    stop: &AtomicBool,
    interval: Duration,
    run_once: bool,
) where
    P: Poller + ?Sized,
    E: PhaseExecutor,
    R: IssueReporter,
{
    info!("starting poll loop with {}s interval", interval.as_secs());
    while !stop.load(Ordering::Relaxed) {
        match run_poll_cycle(poller, dispatcher, stop) {
            Ok(summary) => {
                if summary.received > 0 {
                    info!(
                        "poll cycle handled {} events ({} dispatched, {} dropped)",
                        summary.received, summary.dispatched, summary.dropped
                    );
                }
            }
            Err(err) => error!("poll failed: {}", err),
        }
        if run_once {
            break;
        }
        sleep_unless_stopped(interval, stop);
    }
    info!("poll loop stopped");
}

fn sleep_unless_stopped(interval: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + interval;
    let step = Duration::from_millis(STOP_CHECK_INTERVAL_MS);
    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(step.min(deadline - now));
    }
}
