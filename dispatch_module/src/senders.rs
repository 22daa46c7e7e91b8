/// Reduces `Display Name <addr@host>` to `addr@host` and lowercases it.
pub fn normalize_sender(raw: &str) -> String {
    let trimmed = raw.trim();
    let address = match (trimmed.rfind('<'), trimmed.rfind('>')) {
        (Some(start), Some(end)) if start < end => &trimmed[start + 1..end],
        _ => trimmed,
    };
    address.trim().to_ascii_lowercase()
}

/// Exact, case-insensitive match of the normalized sender against the
/// allow-list. An empty sender is never trusted.
pub fn is_trusted_sender(sender: &str, trusted: &[String]) -> bool {
    let normalized = normalize_sender(sender);
    if normalized.is_empty() {
        return false;
    }
    trusted
        .iter()
        .any(|entry| normalize_sender(entry) == normalized)
}

/// Splits a comma or whitespace separated allow-list.
pub fn parse_sender_list(raw: &str) -> Vec<String> {
    raw.split(|ch: char| ch == ',' || ch.is_whitespace())
        .map(normalize_sender)
        .filter(|entry| !entry.is_empty())
        .collect()
}
