use super::types::{Phase, TaskContext};

/// Flattens line breaks so the subject fits on one prompt/log line.
pub fn normalize_subject(subject: &str) -> String {
    subject.replace('\r', "").replace('\n', "  ").trim().to_string()
}

pub(super) fn build_prompt(phase: Phase, subject: &str, context: &TaskContext, host: &str) -> String {
    match phase {
        Phase::Work => build_work_prompt(subject, context, host),
        Phase::Commit => build_commit_prompt(subject, context, host),
    }
}

/// Returns the comment only when it adds something beyond the subject.
fn distinct_comment<'a>(subject: &str, context: &'a TaskContext) -> Option<&'a str> {
    context
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|comment| !comment.is_empty())
        .filter(|comment| normalize_subject(comment) != normalize_subject(subject))
}

fn task_section(subject: &str, context: &TaskContext) -> String {
    let subject = normalize_subject(subject);
    match distinct_comment(&subject, context) {
        Some(comment) => format!(
            "Request (from the latest comment; it supersedes the subject wherever they conflict):\n{comment}\n\nSubject (background only):\n{subject}"
        ),
        None => format!("Request:\n{subject}"),
    }
}

fn location_section(context: &TaskContext, host: &str) -> String {
    let repo_url = context.repository.html_url(host);
    match context.issue_url.as_deref() {
        Some(issue_url) => format!("Repository: {repo_url}\nIssue: {issue_url}"),
        None => format!("Repository: {repo_url}\nIssue: (none; this task is not linked to an issue)"),
    }
}

fn build_work_prompt(subject: &str, context: &TaskContext, host: &str) -> String {
    let repo_url = context.repository.html_url(host);
    format!(
        r#"You are an autonomous software engineer working on a GitHub repository.

{location}

{task}

Instructions:
1. The current directory is an empty workspace dedicated to this task. Clone {repo_url} into it (git clone {repo_url} .) before doing anything else.
2. If an issue is linked, read it (gh issue view) for full context before changing code.
3. Make the change the request asks for. Keep the change focused; do not refactor unrelated code.
4. Run the project's tests or build if they exist and fix what you broke.
5. Do not commit, push or open pull requests in this step; a separate step finalizes version control.
6. If the request is unclear or cannot be done, explain why in your final output instead of guessing.
"#,
        location = location_section(context, host),
        task = task_section(subject, context),
        repo_url = repo_url,
    )
}

fn build_commit_prompt(subject: &str, context: &TaskContext, host: &str) -> String {
    let branch = match context.issue_number {
        Some(number) => format!("neon/issue-{}", number),
        None => "neon/task-<UTC timestamp, e.g. 20240101-120000>".to_string(),
    };
    let pr_reference = match context.issue_number {
        Some(number) => format!("Reference the issue in the pull request body with \"Fixes #{}\".", number),
        None => "Describe the change in the pull request body.".to_string(),
    };
    format!(
        r#"You are finalizing work that was just completed in the current directory, a clone of a GitHub repository.

{location}

{task}

Commit policy:
1. Inspect the working tree (git status, git diff). If there are no changes, print "No changes to commit" and stop.
2. If the current branch is the repository's default branch, create and switch to a new branch named {branch}. If a branch with that name already exists on the remote, check it out and add your commit on top of it.
3. Commit all relevant changes with a concise message that summarizes the request. Never commit secrets, build output or log files.
4. Push the branch to origin. Never push to the default branch and never force-push.
5. If no pull request exists for the branch, open one with gh pr create; otherwise update the existing one. {pr_reference}
6. Print the pull request URL as the last line of your output.
"#,
        location = location_section(context, host),
        task = task_section(subject, context),
        branch = branch,
        pr_reference = pr_reference,
    )
}
