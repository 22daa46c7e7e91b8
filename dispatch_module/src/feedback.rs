//! Recognizes status messages the dispatcher posted itself so they are never
//! dispatched as new work.

use regex::Regex;
use std::sync::LazyLock;

const STATUS_MARKERS: &[&str] = &["Task failed:", "completed successfully in", "Commit task"];
const STATUS_GLYPHS: &[&str] = &["✅", "❌"];

static CLOSED_AS_COMPLETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Closed #\d+ as completed").unwrap());

/// True when `subject` or `body` looks like one of our own status reports, or
/// the body is GitHub's issue-closed notice.
pub fn is_feedback_noise(subject: &str, body: &str) -> bool {
    is_status_report(subject) || is_status_report(body) || CLOSED_AS_COMPLETED.is_match(body)
}

fn is_status_report(text: &str) -> bool {
    STATUS_MARKERS.iter().any(|marker| text.contains(marker))
        && STATUS_GLYPHS.iter().any(|glyph| text.contains(glyph))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_marker_with_glyph_is_noise() {
        assert!(is_feedback_noise(
            "Re: [acme/widgets] Fix bug (#42)",
            "❌ Task failed: timed out after 30m 00s."
        ));
        assert!(is_feedback_noise(
            "❌ Commit task failed: killed after 10s.",
            "https://github.com/acme/widgets/issues/42"
        ));
    }

    #[test]
    fn closed_notice_is_noise() {
        assert!(is_feedback_noise("Re: [acme/widgets] Fix bug", "Closed #7 as completed."));
    }

    #[test]
    fn ordinary_requests_are_not_noise() {
        assert!(!is_feedback_noise(
            "Fix bug",
            "Fix bug: https://github.com/acme/widgets/issues/42"
        ));
        assert!(!is_feedback_noise(
            "Task failed: please investigate",
            "The nightly job says Task failed: see https://github.com/acme/widgets"
        ));
        assert!(!is_feedback_noise("Ship it ✅", "https://github.com/acme/widgets"));
        assert!(!is_feedback_noise("Closed #7", "closed #7 as completed"));
    }

    #[test]
    fn marker_and_glyph_must_share_a_field() {
        assert!(!is_feedback_noise("✅ done", "Task failed: once"));
    }

    #[test]
    fn decision_is_stable_across_redelivery() {
        let subject = "Re: [acme/widgets] Fix bug (#42)";
        let body = "✅ Task completed successfully in 3m 07s.";
        let first = is_feedback_noise(subject, body);
        assert!(first);
        assert_eq!(first, is_feedback_noise(subject, body));
    }
}
