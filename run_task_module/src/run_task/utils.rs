use std::time::Duration;

pub(crate) fn tail_string(input: &str, max_len: usize) -> String {
    let trimmed = input.trim();
    if trimmed.len() <= max_len {
        return trimmed.to_string();
    }
    let mut start = trimmed.len().saturating_sub(max_len);
    while start < trimmed.len() && !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}

/// Drops the head of `buffer` so that at most `max_len` bytes remain.
pub(crate) fn truncate_head(buffer: &mut String, max_len: usize) {
    if buffer.len() <= max_len {
        return;
    }
    let mut start = buffer.len() - max_len;
    while start < buffer.len() && !buffer.is_char_boundary(start) {
        start += 1;
    }
    buffer.drain(..start);
}

/// Renders a duration as `42s`, `3m 07s` or `1h 02m 03s`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Preview used in log lines: first line, at most `max_chars` characters.
pub fn preview(input: &str, max_chars: usize) -> String {
    let first_line = input.lines().next().unwrap_or("");
    let mut out: String = first_line.chars().take(max_chars).collect();
    if first_line.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_duration_picks_largest_unit() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0s");
        assert_eq!(format_duration(Duration::from_millis(42_900)), "42s");
        assert_eq!(format_duration(Duration::from_secs(187)), "3m 07s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h 02m 03s");
    }

    #[test]
    fn truncate_head_keeps_tail_on_char_boundary() {
        let mut buffer = "ééééé".to_string();
        truncate_head(&mut buffer, 3);
        assert_eq!(buffer, "é");

        let mut short = "abc".to_string();
        truncate_head(&mut short, 10);
        assert_eq!(short, "abc");
    }

    #[test]
    fn preview_uses_first_line_only() {
        assert_eq!(preview("hello\nworld", 50), "hello");
        assert_eq!(preview("abcdef", 3), "abc...");
    }
}
