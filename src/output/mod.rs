// Output formatting — terminal display of verdicts and run summaries.

pub mod terminal;

/// Truncate a string to at most `max_chars` characters, appending "..."
/// if truncated. Character-based so multi-byte input never panics.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}
