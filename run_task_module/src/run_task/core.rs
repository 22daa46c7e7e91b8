use std::path::Path;

use tracing::{error, info};

use super::constants::RESPONSE_LOG_TAIL_BYTES;
use super::errors::RunTaskError;
use super::prompt::{build_prompt, normalize_subject};
use super::supervisor::Supervisor;
use super::types::{ExecutionResult, Phase, PhaseRequest, PhaseSettings};
use super::utils::{preview, tail_string};
use super::workspace::{ensure_workspace_dir, recreate_workspace_dir, workspace_dir_for};

/// Runs one phase of a task: prepares the workspace, builds the prompt and
/// environment, and supervises the executable.
///
/// The work phase starts from a freshly re-created workspace; the commit
/// phase reuses whatever the work phase left behind.
pub fn run_task(
    supervisor: &Supervisor,
    settings: &PhaseSettings,
    request: &PhaseRequest<'_>,
) -> Result<ExecutionResult, RunTaskError> {
    let workspace_dir = workspace_dir_for(&settings.workspace_root, &request.context.repository);
    let subject = normalize_subject(request.subject);
    info!(
        "running {} phase for {} in {} subject={}",
        request.phase,
        request.context.repository,
        workspace_dir.display(),
        preview(&subject, 50)
    );

    let result = prepare_workspace(request.phase, &workspace_dir).and_then(|()| {
        let prompt = build_prompt(request.phase, &subject, request.context, &settings.github_host);
        let env = phase_env(settings, request, &subject, &workspace_dir);
        supervisor.run(&prompt, &workspace_dir, request.timeout, &env)
    });

    match &result {
        Ok(execution) => supervisor.transcript().record_response(
            &subject,
            request.phase.as_str(),
            &tail_string(&execution.output, RESPONSE_LOG_TAIL_BYTES),
        ),
        Err(err) => {
            error!("{} phase for {} could not run: {}", request.phase, request.context.repository, err);
            supervisor.transcript().record_error(
                &format!(
                    "{} phase for {} (subject: {})",
                    request.phase, request.context.repository, subject
                ),
                &err.to_string(),
            );
        }
    }
    result
}

fn prepare_workspace(phase: Phase, workspace_dir: &Path) -> Result<(), RunTaskError> {
    match phase {
        Phase::Work => recreate_workspace_dir(workspace_dir),
        Phase::Commit => ensure_workspace_dir(workspace_dir),
    }
}

fn phase_env(
    settings: &PhaseSettings,
    request: &PhaseRequest<'_>,
    subject: &str,
    workspace_dir: &Path,
) -> Vec<(String, String)> {
    let context = request.context;
    let mut env = vec![
        (
            "REPOSITORY_URL".to_string(),
            context.repository.html_url(&settings.github_host),
        ),
        (
            "ISSUE_URL".to_string(),
            context.issue_url.clone().unwrap_or_default(),
        ),
        (
            "TASK_COMMENT".to_string(),
            context.comment.clone().unwrap_or_default(),
        ),
        ("TASK_SUBJECT".to_string(), subject.to_string()),
        ("TASK_PHASE".to_string(), request.phase.as_str().to_string()),
        (
            "PROJECT_FOLDER".to_string(),
            workspace_dir.to_string_lossy().into_owned(),
        ),
        ("ALLOWED_TOOLS".to_string(), settings.allowed_tools.clone()),
        ("TIMEOUT".to_string(), request.timeout.as_secs().to_string()),
    ];
    env.extend(settings.env_overrides.iter().cloned());
    env
}
