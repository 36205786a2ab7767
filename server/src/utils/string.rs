//! String utility functions

/// Maximum length for response bodies echoed into error messages (in characters)
pub const ERROR_BODY_MAX_LENGTH: usize = 300;

/// Truncate text to max length with ellipsis
pub fn truncate_preview(text: &str, max_len: usize) -> String {
    let text = text.trim();
    if text.chars().count() > max_len {
        format!("{}...", text.chars().take(max_len).collect::<String>())
    } else {
        text.to_string()
    }
}
