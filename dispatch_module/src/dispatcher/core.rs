use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use run_task_module::{preview, ExecutionResult, Phase, PhaseRequest, RunTaskError, TaskContext};

use crate::context::ContextExtractor;
use crate::feedback::is_feedback_noise;
use crate::reporter::IssueReporter;
use crate::senders::is_trusted_sender;
use crate::service::DispatchConfig;

use super::executor::PhaseExecutor;
use super::messages::{launch_failure_message, phase_message};
use super::types::{DispatchRecord, DispatchStatus, DropReason, InboundEvent};

/// Takes one inbound event at a time through filtering, extraction, the work
/// phase, the commit phase and reporting.
pub struct Dispatcher<E: PhaseExecutor, R: IssueReporter> {
    config: Arc<DispatchConfig>,
    extractor: ContextExtractor,
    executor: E,
    reporter: R,
}

impl<E: PhaseExecutor, R: IssueReporter> Dispatcher<E, R> {
    pub fn new(config: Arc<DispatchConfig>, executor: E, reporter: R) -> Result<Self, regex::Error> {
        let extractor = ContextExtractor::new(&config.github_host)?;
        Ok(Self {
            config,
            extractor,
            executor,
            reporter,
        })
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Processes `event` to completion and returns its record. Exactly one
    /// record is produced per call, dropped events included.
    pub fn dispatch(&self, event: &InboundEvent) -> DispatchRecord {
        let record = self.run(event);
        log_record(&record);
        record
    }

    fn run(&self, event: &InboundEvent) -> DispatchRecord {
        if !is_trusted_sender(&event.sender, &self.config.trusted_senders) {
            return self.dropped(event, DropReason::UntrustedSender);
        }
        if is_feedback_noise(&event.subject, &event.body) {
            return self.dropped(event, DropReason::FeedbackNoise);
        }
        let Some(context) = self.extractor.extract(&event.body) else {
            return self.dropped(event, DropReason::NoRepository);
        };

        let mut record = DispatchRecord::for_event(event, DispatchStatus::Completed);
        record.context = Some(context.clone());
        info!(
            "dispatch {} repository={} issue={} subject={}",
            record.id,
            context.repository,
            context
                .issue_number
                .map(|number| number.to_string())
                .unwrap_or_else(|| "-".to_string()),
            preview(&event.subject, 80)
        );

        let work = match self.run_phase(Phase::Work, &event.subject, &context, &mut record) {
            Ok(result) => result,
            Err(status) => {
                record.status = status;
                return record;
            }
        };
        let work_classification = work.classification;
        record.work = Some(work);
        if !work_classification.is_success() {
            record.status = DispatchStatus::WorkFailed(work_classification);
            return record;
        }

        let commit = match self.run_phase(Phase::Commit, &event.subject, &context, &mut record) {
            Ok(result) => result,
            Err(status) => {
                record.status = status;
                return record;
            }
        };
        let commit_classification = commit.classification;
        record.commit = Some(commit);
        if !commit_classification.is_success() {
            record.status = DispatchStatus::CommitFailed(commit_classification);
        }
        record
    }

    /// Executes a phase and reports its outcome. A launch failure is reported
    /// and returned as the terminal status.
    fn run_phase(
        &self,
        phase: Phase,
        subject: &str,
        context: &TaskContext,
        record: &mut DispatchRecord,
    ) -> Result<ExecutionResult, DispatchStatus> {
        let request = PhaseRequest {
            phase,
            subject,
            context,
            timeout: self.phase_timeout(phase),
        };
        match self.executor.execute(&request) {
            Ok(result) => {
                info!(
                    "{} phase for {} finished: {} in {:.1}s",
                    phase,
                    context.repository,
                    result.classification,
                    result.duration.as_secs_f64()
                );
                self.post(context, &phase_message(phase, &result), record);
                Ok(result)
            }
            Err(err) => {
                warn!(
                    "{} phase for {} failed to launch: {}",
                    phase, context.repository, err
                );
                self.post(context, &launch_failure_message(&err), record);
                Err(launch_failed(&err))
            }
        }
    }

    fn post(&self, context: &TaskContext, message: &str, record: &mut DispatchRecord) {
        if self.reporter.report(context, message) {
            record.reports_posted += 1;
        }
    }

    fn phase_timeout(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Work => self.config.work_timeout,
            Phase::Commit => self.config.commit_timeout,
        }
    }

    fn dropped(&self, event: &InboundEvent, reason: DropReason) -> DispatchRecord {
        info!(
            "drop event from {} subject={}: {}",
            event.sender,
            preview(&event.subject, 80),
            reason
        );
        DispatchRecord::for_event(event, DispatchStatus::Dropped(reason))
    }
}

fn launch_failed(err: &RunTaskError) -> DispatchStatus {
    DispatchStatus::LaunchFailed(err.to_string())
}

fn log_record(record: &DispatchRecord) {
    match serde_json::to_string(record) {
        Ok(line) => info!("dispatch record {}", line),
        Err(err) => warn!("failed to serialize dispatch record {}: {}", record.id, err),
    }
}
