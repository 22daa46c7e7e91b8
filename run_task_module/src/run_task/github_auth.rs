use std::fs;
use std::path::{Path, PathBuf};

use super::constants::GIT_ASKPASS_SCRIPT;
use super::errors::RunTaskError;

/// GitHub identity handed to the task executable so it can clone, push and
/// open pull requests without prompting.
#[derive(Debug, Clone, Default)]
pub struct GitHubCredentials {
    pub token: Option<String>,
    pub username: Option<String>,
}

/// Builds the environment overrides for git and gh. When a token is present
/// an askpass helper is written into `askpass_dir`.
pub fn build_github_env(
    credentials: &GitHubCredentials,
    askpass_dir: &Path,
) -> Result<Vec<(String, String)>, RunTaskError> {
    let mut env_overrides = vec![
        ("GH_PROMPT_DISABLED".to_string(), "1".to_string()),
        ("GH_NO_UPDATE_NOTIFIER".to_string(), "1".to_string()),
        ("GIT_TERMINAL_PROMPT".to_string(), "0".to_string()),
        ("GIT_EDITOR".to_string(), "true".to_string()),
        ("VISUAL".to_string(), "true".to_string()),
        ("EDITOR".to_string(), "true".to_string()),
    ];
    if let Some(token) = credentials.token.as_ref() {
        env_overrides.push(("GH_TOKEN".to_string(), token.clone()));
        env_overrides.push(("GITHUB_TOKEN".to_string(), token.clone()));
        let askpass_path = write_git_askpass_script_in(askpass_dir)?;
        env_overrides.push((
            "GIT_ASKPASS".to_string(),
            askpass_path.to_string_lossy().into_owned(),
        ));
    }
    if let Some(username) = credentials.username.as_ref() {
        let email = format!("{}@users.noreply.github.com", username);
        env_overrides.push(("GITHUB_USERNAME".to_string(), username.clone()));
        env_overrides.push(("GIT_AUTHOR_NAME".to_string(), username.clone()));
        env_overrides.push(("GIT_COMMITTER_NAME".to_string(), username.clone()));
        env_overrides.push(("GIT_AUTHOR_EMAIL".to_string(), email.clone()));
        env_overrides.push(("GIT_COMMITTER_EMAIL".to_string(), email));
    }
    Ok(env_overrides)
}

fn write_git_askpass_script_in(dir: &Path) -> Result<PathBuf, RunTaskError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("neon-git-askpass-{}", std::process::id()));
    fs::write(&path, GIT_ASKPASS_SCRIPT)?;
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&path)?.permissions();
        perms.set_mode(0o700);
        fs::set_permissions(&path, perms)?;
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn value<'a>(env: &'a [(String, String)], key: &str) -> Option<&'a str> {
        env.iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn without_credentials_only_disables_prompts() {
        let temp = TempDir::new().unwrap();
        let env = build_github_env(&GitHubCredentials::default(), temp.path()).unwrap();
        assert_eq!(value(&env, "GIT_TERMINAL_PROMPT"), Some("0"));
        assert_eq!(value(&env, "GH_TOKEN"), None);
        assert_eq!(value(&env, "GIT_ASKPASS"), None);
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn token_and_username_populate_git_identity() {
        let temp = TempDir::new().unwrap();
        let credentials = GitHubCredentials {
            token: Some("ghp_test".to_string()),
            username: Some("neon-bot".to_string()),
        };
        let env = build_github_env(&credentials, temp.path()).unwrap();
        assert_eq!(value(&env, "GH_TOKEN"), Some("ghp_test"));
        assert_eq!(value(&env, "GITHUB_TOKEN"), Some("ghp_test"));
        assert_eq!(
            value(&env, "GIT_AUTHOR_EMAIL"),
            Some("neon-bot@users.noreply.github.com")
        );
        let askpass = PathBuf::from(value(&env, "GIT_ASKPASS").unwrap());
        assert!(askpass.starts_with(temp.path()));
        let script = fs::read_to_string(askpass).unwrap();
        assert!(script.contains("GH_TOKEN"));
    }
}
