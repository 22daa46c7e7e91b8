use run_task_module::{
    run_task, ExecutionResult, PhaseRequest, PhaseSettings, RunTaskError, Supervisor,
    TranscriptSink,
};

/// Runs one supervised phase. The production executor drives the external
/// task executable; tests substitute scripted results.
pub trait PhaseExecutor {
    fn execute(&self, request: &PhaseRequest<'_>) -> Result<ExecutionResult, RunTaskError>;
}

#[derive(Debug, Clone)]
pub struct ModuleExecutor {
    supervisor: Supervisor,
    settings: PhaseSettings,
}

impl ModuleExecutor {
    pub fn new(settings: PhaseSettings, transcript: TranscriptSink) -> Self {
        Self {
            supervisor: Supervisor::new(&settings, transcript),
            settings,
        }
    }

    pub fn settings(&self) -> &PhaseSettings {
        &self.settings
    }
}

impl PhaseExecutor for ModuleExecutor {
    fn execute(&self, request: &PhaseRequest<'_>) -> Result<ExecutionResult, RunTaskError> {
        run_task(&self.supervisor, &self.settings, request)
    }
}
