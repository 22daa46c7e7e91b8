//! Recovers repository, issue and comment context from free-text event bodies.
//!
//! Extraction is best-effort: a body without a recognizable repository URL
//! yields `None` and the event is not actionable.

use regex::Regex;

use run_task_module::{RepositoryId, TaskContext};

pub const DEFAULT_GITHUB_HOST: &str = "github.com";

const SIGNATURE_DELIMITERS: &[&str] = &[
    "\n-- \n",
    "\n--\n",
    "\n___\n",
    "\n----- Original Message -----",
    "\n-----Original Message-----",
    "\nSent from my iPhone",
    "\nSent from my iPad",
];

/// First path segments on the host that are site pages, not repository owners.
const RESERVED_OWNERS: &[&str] = &[
    "notifications",
    "settings",
    "orgs",
    "organizations",
    "apps",
    "marketplace",
    "sponsors",
    "login",
    "logout",
    "features",
    "topics",
    "explore",
    "about",
    "pricing",
];

#[derive(Debug, Clone)]
pub struct ContextExtractor {
    host: String,
    repo_re: Regex,
}

impl ContextExtractor {
    pub fn new(host: &str) -> Result<Self, regex::Error> {
        let host = host.trim().trim_end_matches('/').to_ascii_lowercase();
        let pattern = format!(
            r#"(?i:(?:^|[^A-Za-z0-9.\-])(?:https?://)?(?:www\.)?{host})/([^/\s#?<>()\[\]"']+)/([^/\s#?<>()\[\]"']+)(?:/issues/(\d+))?"#,
            host = regex::escape(&host)
        );
        Ok(Self {
            host,
            repo_re: Regex::new(&pattern)?,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the context of the first well-formed `host/owner/repo` URL in
    /// `body`. Issue fields are filled only when that same URL continues with
    /// `/issues/<n>`.
    pub fn extract(&self, body: &str) -> Option<TaskContext> {
        let (repository, issue_number) = self.repo_re.captures_iter(body).find_map(|caps| {
            let owner = caps.get(1)?.as_str();
            let name = clean_repo_segment(caps.get(2)?.as_str());
            if name.is_empty() || is_reserved_owner(owner) {
                return None;
            }
            let issue_number = caps
                .get(3)
                .filter(|digits| ends_at_boundary(body, digits.end()))
                .and_then(|digits| digits.as_str().parse::<u64>().ok());
            Some((RepositoryId::new(owner, name), issue_number))
        })?;

        let issue_url = issue_number.map(|number| {
            format!(
                "https://{}/{}/{}/issues/{}",
                self.host, repository.owner, repository.name, number
            )
        });

        Some(TaskContext {
            repository,
            issue_number,
            issue_url,
            comment: extract_comment(body),
        })
    }
}

pub fn extract_task_context(body: &str, host: &str) -> Option<TaskContext> {
    ContextExtractor::new(host).ok()?.extract(body)
}

/// The human-written part of a body: mail signature and GitHub's
/// notification footer removed.
pub fn extract_comment(body: &str) -> Option<String> {
    let normalized = body.replace("\r\n", "\n");
    let without_signature = strip_signature(&normalized);
    let without_footer = strip_github_footer(without_signature);
    let trimmed = without_footer.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn strip_signature(content: &str) -> &str {
    for delimiter in SIGNATURE_DELIMITERS {
        if let Some(idx) = content.find(delimiter) {
            return &content[..idx];
        }
    }
    content
}

fn strip_github_footer(content: &str) -> &str {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed == "—" || trimmed.starts_with("Reply to this email directly") {
            return &content[..offset];
        }
        offset += line.len();
    }
    content
}

/// `issues/42abc` names no issue; only a separator or end of text may follow
/// the digits.
fn ends_at_boundary(body: &str, end: usize) -> bool {
    body[end..]
        .chars()
        .next()
        .map_or(true, |next| !(next.is_alphanumeric() || next == '_' || next == '-'))
}

fn clean_repo_segment(raw: &str) -> &str {
    let trimmed = raw.trim_end_matches(|ch: char| matches!(ch, '.' | ',' | ';' | ':' | '!'));
    trimmed.strip_suffix(".git").unwrap_or(trimmed)
}

fn is_reserved_owner(owner: &str) -> bool {
    RESERVED_OWNERS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(owner))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ContextExtractor {
        ContextExtractor::new(DEFAULT_GITHUB_HOST).unwrap()
    }

    #[test]
    fn issue_url_yields_repository_and_issue() {
        let context = extractor()
            .extract("Fix bug: https://github.com/acme/widgets/issues/42")
            .unwrap();
        assert_eq!(context.repository, RepositoryId::new("acme", "widgets"));
        assert_eq!(context.issue_number, Some(42));
        assert_eq!(
            context.issue_url.as_deref(),
            Some("https://github.com/acme/widgets/issues/42")
        );
    }

    #[test]
    fn issue_urls_round_trip_for_many_shapes() {
        let extractor = extractor();
        let cases = [
            ("octo-org", "hello.world", 1_u64),
            ("a", "b", 7),
            ("Some_User", "repo-name_2", 123_456),
        ];
        for (owner, repo, number) in cases {
            for template in [
                "see https://github.com/{o}/{r}/issues/{n}",
                "<https://github.com/{o}/{r}/issues/{n}#issuecomment-5>",
                "github.com/{o}/{r}/issues/{n}.",
                "http://www.github.com/{o}/{r}/issues/{n}?q=1",
            ] {
                let body = template
                    .replace("{o}", owner)
                    .replace("{r}", repo)
                    .replace("{n}", &number.to_string());
                let context = extractor.extract(&body).unwrap_or_else(|| panic!("{body}"));
                assert_eq!(context.repository.owner, owner, "{body}");
                assert_eq!(context.repository.name, repo, "{body}");
                assert_eq!(context.issue_number, Some(number), "{body}");
            }
        }
    }

    #[test]
    fn issue_number_must_end_at_a_separator() {
        for body in [
            "https://github.com/acme/widgets/issues/42abc",
            "see github.com/acme/widgets/issues/42_draft please",
            "github.com/acme/widgets/issues/42-notes",
        ] {
            let ctx = extractor().extract(body).expect(body);
            assert_eq!(ctx.repository.full_name(), "acme/widgets", "{body}");
            assert_eq!(ctx.issue_number, None, "{body}");
            assert_eq!(ctx.issue_url, None, "{body}");
        }

        let ctx = extractor()
            .extract("(github.com/acme/widgets/issues/42)")
            .unwrap();
        assert_eq!(ctx.issue_number, Some(42));
    }

    #[test]
    fn repo_only_mention_is_actionable_without_issue() {
        let context = extractor()
            .extract("Please bump deps in https://github.com/acme/widgets.")
            .unwrap();
        assert_eq!(context.repository, RepositoryId::new("acme", "widgets"));
        assert_eq!(context.issue_number, None);
        assert_eq!(context.issue_url, None);
    }

    #[test]
    fn first_match_decides_issue_linkage() {
        let context = extractor()
            .extract("repo https://github.com/acme/widgets then https://github.com/acme/widgets/issues/9")
            .unwrap();
        assert_eq!(context.issue_number, None);

        let pull = extractor()
            .extract("https://github.com/acme/widgets/pull/5")
            .unwrap();
        assert_eq!(pull.repository.name, "widgets");
        assert_eq!(pull.issue_number, None);
    }

    #[test]
    fn bodies_without_hosting_url_yield_none() {
        let extractor = extractor();
        for body in [
            "",
            "please fix the login page",
            "https://gitlab.com/acme/widgets/issues/4",
            "https://api.github.com/repos/acme/widgets",
            "github.com/acme",
            "https://github.com/notifications/unsubscribe-auth/ABC",
            "https://github.com//widgets",
        ] {
            assert!(extractor.extract(body).is_none(), "{body}");
        }
    }

    #[test]
    fn git_suffix_and_punctuation_are_trimmed() {
        let context = extractor()
            .extract("clone (https://github.com/acme/widgets.git) please")
            .unwrap();
        assert_eq!(context.repository.name, "widgets");
    }

    #[test]
    fn custom_host_is_matched_case_insensitively() {
        let extractor = ContextExtractor::new("git.example.com").unwrap();
        let context = extractor
            .extract("https://GIT.example.com/team/api/issues/3")
            .unwrap();
        assert_eq!(context.repository, RepositoryId::new("team", "api"));
        assert_eq!(
            context.issue_url.as_deref(),
            Some("https://git.example.com/team/api/issues/3")
        );
        assert!(extractor.extract("https://github.com/a/b").is_none());
    }

    #[test]
    fn comment_strips_signature_and_github_footer() {
        let body = "Please add a --verbose flag.\r\n\r\n—\r\nReply to this email directly, view it on GitHub:\r\nhttps://github.com/acme/widgets/issues/42#issuecomment-1\r\nYou are receiving this because you were mentioned.";
        let context = extractor().extract(body).unwrap();
        assert_eq!(context.comment.as_deref(), Some("Please add a --verbose flag."));
        assert_eq!(context.issue_number, Some(42));

        assert_eq!(
            extract_comment("Do it https://github.com/a/b\n-- \nBob\nCEO").as_deref(),
            Some("Do it https://github.com/a/b")
        );
        assert_eq!(extract_comment("\n-- \nsignature only"), None);
    }

    #[test]
    fn comment_may_equal_subject_text() {
        let body = "Fix bug: https://github.com/acme/widgets/issues/42";
        let context = extract_task_context(body, DEFAULT_GITHUB_HOST).unwrap();
        assert_eq!(context.comment.as_deref(), Some(body));
    }
}
