use run_task_module::{format_duration, ExecutionResult, Phase, RunTaskError};

/// Status comment for a finished phase. Every variant carries a status glyph
/// and a marker the feedback filter recognizes.
pub fn phase_message(phase: Phase, result: &ExecutionResult) -> String {
    let elapsed = format_duration(result.duration);
    match (phase, result.classification.is_success()) {
        (Phase::Work, true) => format!("✅ Task completed successfully in {}.", elapsed),
        (Phase::Work, false) => format!(
            "❌ Task failed: {} after {}.",
            result.classification, elapsed
        ),
        (Phase::Commit, true) => format!("✅ Commit task completed successfully in {}.", elapsed),
        (Phase::Commit, false) => format!(
            "❌ Commit task failed: {} after {}.",
            result.classification, elapsed
        ),
    }
}

pub fn launch_failure_message(error: &RunTaskError) -> String {
    format!(
        "❌ Task failed: could not start the task runner ({}).",
        error
    )
}
